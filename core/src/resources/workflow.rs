//! Workflow resources: states, transitions, and the cascades that keep card
//! workflow states consistent with the state list.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::schema::ANY_STATE;
use crate::resources::{Error, ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct WorkflowResource {
    object: ResourceObject,
}

impl WorkflowResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::Workflows)?;
        Ok(WorkflowResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    fn default_doc(&self) -> Value {
        json!({
            "name": self.name().to_string(),
            "displayName": "",
            "states": [
                {"name": "Draft", "category": "initial"},
                {"name": "Approved", "category": "closed"},
                {"name": "Deprecated", "category": "closed"},
            ],
            "transitions": [
                {"name": "Create", "fromState": [""], "toState": "Draft"},
                {"name": "Approve", "fromState": ["Draft"], "toState": "Approved"},
                {"name": "Archive", "fromState": [ANY_STATE], "toState": "Deprecated"},
            ],
        })
    }

    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content.unwrap_or_else(|| self.default_doc());
        self.object.create(doc, &[]).await
    }

    /// Applies an operation to the workflow document.
    ///
    /// Renaming a state rewrites the transitions referencing it in the same
    /// candidate document, then propagates the new name to every card sitting
    /// in the old state. Removing a state that cards still occupy fails.
    #[instrument(skip(self, op), fields(name = %self.object.name(), field = %field.key))]
    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        if field.key == "states" && field.sub_key.is_none() {
            match op {
                Operation::Remove { target } => {
                    if let Some(state) = target.get("name").and_then(Value::as_str) {
                        self.assert_state_unused(state).await?;
                    }
                }
                Operation::Change { target, to } => {
                    let old = target.get("name").and_then(Value::as_str);
                    let new = to.get("name").and_then(Value::as_str);
                    if let (Some(old), Some(new)) = (old, new) {
                        if old != new {
                            return self.rename_state(field, op, old, new).await;
                        }
                    }
                }
                _ => {}
            }
        }
        self.object.update_with(field, op, |_| Ok(())).await?;
        Ok(())
    }

    async fn rename_state(
        &self,
        field: &FieldSelector,
        op: &Operation,
        old: &str,
        new: &str,
    ) -> Result<()> {
        let changed = self
            .object
            .update_with(field, op, |doc| {
                rewrite_transitions(doc, old, new);
                Ok(())
            })
            .await?;
        if !changed {
            return Ok(());
        }

        let card_types = self.card_types_using().await?;
        let updated = self
            .object
            .project()
            .update_cards(|_, metadata| {
                if card_types.contains(&metadata.card_type) && metadata.workflow_state == old {
                    metadata.workflow_state = new.to_string();
                    true
                } else {
                    false
                }
            })
            .await?;
        debug!(
            "State '{}' renamed to '{}'; {} cards updated",
            old, new, updated
        );
        Ok(())
    }

    async fn assert_state_unused(&self, state: &str) -> Result<()> {
        let card_types = self.card_types_using().await?;
        let holders = self
            .object
            .project()
            .scan_cards(|metadata| {
                card_types.contains(&metadata.card_type) && metadata.workflow_state == state
            })
            .await?;
        match holders.first() {
            Some(key) => Err(Error::InUse {
                target: state.to_string(),
                holder: format!("card '{}'", key),
            }),
            None => Ok(()),
        }
    }

    /// Renames the workflow and repoints every card type referencing it.
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        let old = self.name().to_string();
        self.object.rename(to).await?;

        let new = to.to_string();
        let updated = self
            .object
            .project()
            .update_local_resources(ResourceType::CardTypes, |doc| {
                if doc.get("workflow").and_then(Value::as_str) == Some(old.as_str()) {
                    doc["workflow"] = json!(new);
                    true
                } else {
                    false
                }
            })
            .await?;
        debug!("Workflow rename updated {} card types", updated);
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.object.delete().await
    }

    pub async fn validate(&self) -> Result<()> {
        self.object.validate().await
    }

    pub async fn show(&self) -> Result<Value> {
        self.object.show().await
    }

    /// Card types referencing this workflow.
    pub async fn usage(&self) -> Result<Vec<String>> {
        Ok(self
            .card_type_documents()
            .await?
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect())
    }

    async fn card_type_documents(&self) -> Result<Vec<(ResourceName, Value)>> {
        let name = self.name().to_string();
        Ok(self
            .object
            .project()
            .local_resource_documents(ResourceType::CardTypes)
            .await?
            .into_iter()
            .filter(|(_, doc)| doc.get("workflow").and_then(Value::as_str) == Some(name.as_str()))
            .collect())
    }

    async fn card_types_using(&self) -> Result<Vec<String>> {
        Ok(self
            .card_type_documents()
            .await?
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect())
    }
}

/// Rewrites transitions after a state rename: `toState` and `fromState`
/// entries equal to the old name are replaced. The creation marker and the
/// any-state wildcard are left alone.
fn rewrite_transitions(doc: &mut Value, old: &str, new: &str) {
    let Some(transitions) = doc.get_mut("transitions").and_then(Value::as_array_mut) else {
        return;
    };
    for transition in transitions {
        if transition.get("toState").and_then(Value::as_str) == Some(old) {
            transition["toState"] = json!(new);
        }
        if let Some(from) = transition.get_mut("fromState").and_then(Value::as_array_mut) {
            for entry in from {
                if entry.as_str() == Some(old) && old != ANY_STATE && !old.is_empty() {
                    *entry = json!(new);
                }
            }
        }
    }
}
