//! Card type resources: the workflow binding, custom-field references, and
//! visible-field bookkeeping.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{Error, ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct CardTypeResource {
    object: ResourceObject,
}

impl CardTypeResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::CardTypes)?;
        Ok(CardTypeResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    /// Creates the card type from a supplied document. The document must
    /// name an existing workflow; there is no synthesized default because
    /// `workflow` has no sensible default value.
    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content.ok_or_else(|| {
            Error::InvalidOperation(
                "Card type creation requires a document with a 'workflow' field".to_string(),
            )
        })?;
        let workflow = doc
            .get("workflow")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.assert_workflow_exists(&workflow).await?;
        self.object.create(doc, &[]).await
    }

    /// Creates the card type bound to an existing workflow, with empty
    /// custom-field lists.
    pub async fn create_card_type(&self, workflow: &str) -> Result<()> {
        self.assert_workflow_exists(workflow).await?;
        let doc = json!({
            "name": self.name().to_string(),
            "displayName": "",
            "workflow": workflow,
            "customFields": [],
            "alwaysVisibleFields": [],
            "optionallyVisibleFields": [],
        });
        self.object.create(doc, &[]).await
    }

    /// Applies an operation to the card type document.
    ///
    /// Changing the workflow requires the new workflow to exist. Adding a
    /// custom field requires the referenced field type to exist. Removing or
    /// renaming a custom field keeps the visible-field lists consistent in
    /// the same candidate document.
    #[instrument(skip(self, op), fields(name = %self.object.name(), field = %field.key))]
    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        if field.key == "workflow" && field.sub_key.is_none() {
            if let Operation::Change { to, .. } = op {
                let workflow = to.as_str().unwrap_or_default().to_string();
                self.assert_workflow_exists(&workflow).await?;
            }
        }

        if field.key == "customFields" && field.sub_key.is_none() {
            match op {
                Operation::Add { target } => {
                    let field_type = target
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    self.assert_field_type_exists(&field_type).await?;
                }
                Operation::Remove { target } => {
                    let removed = target.get("name").and_then(Value::as_str).map(str::to_string);
                    self.object
                        .update_with(field, op, |doc| {
                            if let Some(removed) = removed {
                                prune_visible_fields(doc, &removed, None);
                            }
                            Ok(())
                        })
                        .await?;
                    return Ok(());
                }
                Operation::Change { target, to } => {
                    let old = target.get("name").and_then(Value::as_str).map(str::to_string);
                    let new = to.get("name").and_then(Value::as_str).map(str::to_string);
                    if let Some(new) = &new {
                        if old.as_deref() != Some(new.as_str()) {
                            self.assert_field_type_exists(new).await?;
                        }
                    }
                    self.object
                        .update_with(field, op, |doc| {
                            if let (Some(old), Some(new)) = (old, new) {
                                prune_visible_fields(doc, &old, Some(&new));
                            }
                            Ok(())
                        })
                        .await?;
                    return Ok(());
                }
                _ => {}
            }
        }

        self.object.update_with(field, op, |_| Ok(())).await?;
        Ok(())
    }

    /// Renames the card type, repointing cards and link-type endpoint lists.
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        let old = self.name().to_string();
        self.object.rename(to).await?;
        let new = to.to_string();

        let cards = self
            .object
            .project()
            .update_cards(|_, metadata| {
                if metadata.card_type == old {
                    metadata.card_type = new.clone();
                    true
                } else {
                    false
                }
            })
            .await?;

        let link_types = self
            .object
            .project()
            .update_local_resources(ResourceType::LinkTypes, |doc| {
                let mut changed = false;
                for key in ["sourceCardTypes", "destinationCardTypes"] {
                    if let Some(entries) = doc.get_mut(key).and_then(Value::as_array_mut) {
                        for entry in entries {
                            if entry.as_str() == Some(old.as_str()) {
                                *entry = json!(new);
                                changed = true;
                            }
                        }
                    }
                }
                changed
            })
            .await?;
        debug!(
            "Card type rename updated {} cards and {} link types",
            cards, link_types
        );
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

    /// Cards of this type and link types whose endpoint lists name it.
    pub async fn usage(&self) -> Result<Vec<String>> {
        let name = self.name().to_string();
        let mut holders = self
            .object
            .project()
            .scan_cards(|metadata| metadata.card_type == name)
            .await?;
        for (lt_name, doc) in self
            .object
            .project()
            .local_resource_documents(ResourceType::LinkTypes)
            .await?
        {
            let references = ["sourceCardTypes", "destinationCardTypes"].iter().any(|key| {
                doc.get(*key)
                    .and_then(Value::as_array)
                    .is_some_and(|entries| entries.iter().any(|e| e.as_str() == Some(&name)))
            });
            if references {
                holders.push(lt_name.to_string());
            }
        }
        Ok(holders)
    }

    async fn assert_workflow_exists(&self, workflow: &str) -> Result<()> {
        let parsed = ResourceName::parse(workflow)
            .map_err(|_| Error::WorkflowNotFound(workflow.to_string()))?;
        if parsed.resource_type() != ResourceType::Workflows
            || !self.object.project().resource_exists(&parsed).await
        {
            return Err(Error::WorkflowNotFound(workflow.to_string()));
        }
        Ok(())
    }

    async fn assert_field_type_exists(&self, field_type: &str) -> Result<()> {
        let parsed = ResourceName::parse(field_type)
            .map_err(|_| Error::ReferenceNotFound(field_type.to_string()))?;
        if parsed.resource_type() != ResourceType::FieldTypes
            || !self.object.project().resource_exists(&parsed).await
        {
            return Err(Error::ReferenceNotFound(field_type.to_string()));
        }
        Ok(())
    }
}

/// Drops (or repoints) one custom-field reference from the visible-field
/// lists so removals and renames cannot leave dangling entries.
fn prune_visible_fields(doc: &mut Value, old: &str, new: Option<&str>) {
    for key in ["alwaysVisibleFields", "optionallyVisibleFields"] {
        let Some(entries) = doc.get_mut(key).and_then(Value::as_array_mut) else {
            continue;
        };
        match new {
            Some(new) => {
                for entry in entries {
                    if entry.as_str() == Some(old) {
                        *entry = json!(new);
                    }
                }
            }
            None => entries.retain(|entry| entry.as_str() != Some(old)),
        }
    }
}
