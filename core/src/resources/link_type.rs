//! Link type resources: typed card-to-card relations.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct LinkTypeResource {
    object: ResourceObject,
}

impl LinkTypeResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::LinkTypes)?;
        Ok(LinkTypeResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    fn default_doc(&self) -> Value {
        // Empty endpoint lists mean "any card type".
        json!({
            "name": self.name().to_string(),
            "displayName": "",
            "sourceCardTypes": [],
            "destinationCardTypes": [],
            "inboundDisplayName": "",
            "outboundDisplayName": "",
            "enableLinkDescription": false,
        })
    }

    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content.unwrap_or_else(|| self.default_doc());
        self.object.create(doc, &[]).await
    }

    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        self.object.update_with(field, op, |_| Ok(())).await?;
        Ok(())
    }

    /// Renames the link type and repoints every card link carrying it.
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        let old = self.name().to_string();
        self.object.rename(to).await?;
        let new = to.to_string();

        let updated = self
            .object
            .project()
            .update_cards(|_, metadata| {
                let mut changed = false;
                for link in &mut metadata.links {
                    if link.link_type == old {
                        link.link_type = new.clone();
                        changed = true;
                    }
                }
                changed
            })
            .await?;
        debug!("Link type rename updated {} cards", updated);
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

    /// Cards holding a link of this type.
    pub async fn usage(&self) -> Result<Vec<String>> {
        let name = self.name().to_string();
        self.object
            .project()
            .scan_cards(|metadata| metadata.links.iter().any(|link| link.link_type == name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardLink;
    use crate::resources::card_type::CardTypeResource;
    use crate::resources::workflow::WorkflowResource;
    use tempfile::tempdir;

    #[tokio::test]
    async fn rename_repoints_card_links() {
        let dir = tempdir().unwrap();
        let project = Project::create(&dir.path().join("proj"), "decision")
            .await
            .unwrap();
        WorkflowResource::new(
            project.clone(),
            ResourceName::parse("decision/workflows/simple").unwrap(),
        )
        .unwrap()
        .create(None)
        .await
        .unwrap();
        CardTypeResource::new(
            project.clone(),
            ResourceName::parse("decision/cardTypes/decision").unwrap(),
        )
        .unwrap()
        .create_card_type("decision/workflows/simple")
        .await
        .unwrap();

        let lt = LinkTypeResource::new(
            project.clone(),
            ResourceName::parse("decision/linkTypes/blocks").unwrap(),
        )
        .unwrap();
        lt.create(None).await.unwrap();

        let card = project
            .create_card("decision/cardTypes/decision", None, "Linked")
            .await
            .unwrap();
        let mut metadata = card.metadata.unwrap();
        metadata.links.push(CardLink {
            link_type: "decision/linkTypes/blocks".to_string(),
            card_key: "decision_other001".to_string(),
            link_description: None,
        });
        crate::cards::container::save_metadata(&card.path, &mut metadata)
            .await
            .unwrap();

        assert_eq!(lt.usage().await.unwrap(), vec![card.key.clone()]);

        lt.rename(&ResourceName::parse("decision/linkTypes/dependsOn").unwrap())
            .await
            .unwrap();

        let read = project.card(&card.key, false).await.unwrap();
        assert_eq!(
            read.metadata.unwrap().links[0].link_type,
            "decision/linkTypes/dependsOn"
        );
    }
}
