//! Report resources: metadata plus a query template, a content template, and
//! a JSON schema describing the report's macro parameters.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::{ResourceName, ResourceType, Result};

const DEFAULT_QUERY_TEMPLATE: &str = "\
% Query template. Handlebars placeholders are substituted before evaluation.
result(Card) :- card(Card).
";

const DEFAULT_CONTENT_TEMPLATE: &str = "\
{{#each results}}
* {{this}}
{{/each}}
";

fn default_parameter_schema() -> Value {
    json!({
        "title": "Report parameters",
        "type": "object",
        "properties": {
            "cardKey": {
                "type": "string",
                "description": "Key of the card the report is rendered for"
            }
        },
        "required": ["cardKey"]
    })
}

#[derive(Debug)]
pub struct ReportResource {
    object: ResourceObject,
}

impl ReportResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::Reports)?;
        Ok(ReportResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    /// Creates the report folder: metadata, both templates, and the
    /// parameter schema, all with working boilerplate.
    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content
            .unwrap_or_else(|| json!({"name": self.name().to_string(), "displayName": ""}));
        let schema = serde_json::to_string_pretty(&default_parameter_schema())?;
        self.object
            .create(
                doc,
                &[
                    ("queryTemplate", DEFAULT_QUERY_TEMPLATE),
                    ("contentTemplate", DEFAULT_CONTENT_TEMPLATE),
                    ("schema", &schema),
                ],
            )
            .await
    }

    /// The `queryTemplate`, `contentTemplate`, and `schema` field selectors
    /// address the content files.
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

    /// Schema validation plus content-file checks; the parameter schema must
    /// be well-formed JSON.
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creation_writes_boilerplate_files() {
        let dir = tempdir().unwrap();
        let project = Project::create(&dir.path().join("proj"), "decision")
            .await
            .unwrap();
        let report = ReportResource::new(
            project.clone(),
            ResourceName::parse("decision/reports/overview").unwrap(),
        )
        .unwrap();
        report.create(None).await.unwrap();
        report.validate().await.unwrap();

        let shown = report.show().await.unwrap();
        assert!(
            shown["queryTemplate"]
                .as_str()
                .unwrap()
                .contains("Query template")
        );
        assert!(shown["contentTemplate"].as_str().unwrap().contains("each"));
        assert_eq!(shown["schema"]["title"], json!("Report parameters"));
    }
}
