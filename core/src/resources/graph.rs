//! Graph model and graph view resources: folder resources whose payload is a
//! logic program (`model.lp`) or a view template (`view.lp.hbs`).

use std::sync::Arc;

use serde_json::{Value, json};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct GraphModelResource {
    object: ResourceObject,
}

impl GraphModelResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::GraphModels)?;
        Ok(GraphModelResource {
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
}

#[derive(Debug)]
pub struct GraphViewResource {
    object: ResourceObject,
}

impl GraphViewResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::GraphViews)?;
        Ok(GraphViewResource {
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
}
