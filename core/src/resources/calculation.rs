//! Calculation resources: a metadata document plus a sibling logic program.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct CalculationResource {
    object: ResourceObject,
}

impl CalculationResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::Calculations)?;
        Ok(CalculationResource {
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

    /// The `calculation` field selector addresses the logic program file.
    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        self.object.update_with(field, op, |_| Ok(())).await?;
        Ok(())
    }

    /// Renames the metadata file and the sibling logic program together.
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

    /// Nothing in the data model references calculations by name.
    pub async fn usage(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
