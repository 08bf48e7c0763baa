//! Template resources: a metadata document plus a card tree under the
//! template folder's `c/` subdirectory, instantiated into projects by the
//! calling layer.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::instrument;

use crate::cards::{Card, CardContainer, CHILDREN_DIR};
use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{Error, ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct TemplateResource {
    object: ResourceObject,
}

impl TemplateResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::Templates)?;
        Ok(TemplateResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content
            .unwrap_or_else(|| json!({"name": self.name().to_string(), "displayName": ""}));
        self.object.create(doc, &[]).await
    }

    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        self.object.update_with(field, op, |_| Ok(())).await?;
        Ok(())
    }

    /// Renames the template folder; the card tree moves with it.
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        self.object.rename(to).await
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

    pub async fn usage(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// The container over this template's card tree.
    pub fn card_container(&self) -> Result<CardContainer> {
        let folder = self
            .object
            .metadata_path()
            .parent()
            .ok_or_else(|| Error::NotFound(self.name().to_string()))?
            .to_path_buf();
        Ok(CardContainer::new(folder.join(CHILDREN_DIR)))
    }

    /// The template's top-level cards with their child trees.
    pub async fn cards(&self, include_content: bool) -> Result<Vec<Card>> {
        if !self.object.exists().await {
            return Err(Error::NotFound(self.name().to_string()));
        }
        self.card_container()?.cards(include_content).await
    }

    /// Adds a card to the template's tree, at the top level or under an
    /// existing template card.
    #[instrument(skip(self), fields(template = %self.object.name()))]
    pub async fn add_card(
        &self,
        card_type: &str,
        parent_key: Option<&str>,
        title: &str,
    ) -> Result<Card> {
        if !self.object.exists().await {
            return Err(Error::NotFound(self.name().to_string()));
        }
        let container = self.card_container()?;
        let sibling_count = match parent_key {
            Some(parent) => container.card(parent, false).await?.children.len(),
            None => container.cards(false).await?.len(),
        };
        let project = self.object.project();
        let metadata = project
            .new_card_metadata(card_type, title, sibling_count)
            .await?;
        container
            .create_card(parent_key, &project.new_card_key(), metadata)
            .await
    }
}
