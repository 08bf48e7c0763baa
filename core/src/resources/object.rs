//! Shared storage behavior of all resource-type classes.
//!
//! A [`ResourceObject`] is a transient handle pairing a project with a
//! resource name. It owns the path math for both layouts (single file and
//! folder), the validate-then-persist write cycle, and the generic field
//! dispatch for update operations. Type classes compose it and add creation
//! defaults, referential checks, and cascades.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::fs;
use tracing::{debug, instrument};

use crate::project::{Project, read_json_file, write_json_file};
use crate::resources::name::{ContentFileSpec, ResourceLayout, ResourceName, ResourceType};
use crate::resources::operation::{FieldSelector, Operation, apply_to_array, apply_to_scalar};
use crate::resources::{Error, Result, schema};

#[derive(Debug, Clone)]
pub(crate) struct ResourceObject {
    project: Arc<Project>,
    name: ResourceName,
}

impl ResourceObject {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Self {
        ResourceObject { project, name }
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    fn resource_type(&self) -> ResourceType {
        self.name.resource_type()
    }

    fn is_local(&self) -> bool {
        self.name.prefix() == self.project.prefix()
    }

    /// The directory holding this type's resources, for the owning prefix.
    fn type_dir(&self) -> PathBuf {
        let root = if self.is_local() {
            self.project.local_resources_dir()
        } else {
            self.project.modules_dir().join(self.name.prefix())
        };
        root.join(self.resource_type().folder_name())
    }

    /// Folder-layout resources own this directory.
    fn folder_path(&self) -> PathBuf {
        self.type_dir().join(self.name.identifier())
    }

    /// Path of the metadata JSON document.
    pub fn metadata_path(&self) -> PathBuf {
        match self.resource_type().layout() {
            ResourceLayout::SingleFile => self
                .type_dir()
                .join(format!("{}.json", self.name.identifier())),
            ResourceLayout::Folder { metadata_file } => self.folder_path().join(metadata_file),
        }
    }

    fn content_file_path(&self, spec: &ContentFileSpec) -> PathBuf {
        let file_name = spec.file_name(self.name.identifier());
        match self.resource_type().layout() {
            ResourceLayout::SingleFile => self.type_dir().join(file_name),
            ResourceLayout::Folder { .. } => self.folder_path().join(file_name),
        }
    }

    pub async fn exists(&self) -> bool {
        self.project.resource_exists(&self.name).await
    }

    /// Reads the metadata document fresh from disk.
    pub async fn read(&self) -> Result<Value> {
        match read_json_file(&self.metadata_path()).await {
            Ok(doc) => Ok(doc),
            Err(Error::NotFound(_)) => Err(Error::NotFound(self.name.to_string())),
            Err(e) => Err(e),
        }
    }

    fn assert_local(&self, action: &str) -> Result<()> {
        if self.is_local() {
            Ok(())
        } else {
            Err(Error::InvalidOperation(format!(
                "Cannot {} module resource '{}'",
                action, self.name
            )))
        }
    }

    /// Creates the resource on disk from a candidate document.
    ///
    /// The `name` field is stamped from the handle's own name, the document
    /// validated, all declared content files written (using the provided
    /// text per content-file key, or empty), and the collector refreshed.
    #[instrument(skip(self, doc, content), fields(name = %self.name))]
    pub async fn create(&self, mut doc: Value, content: &[(&str, &str)]) -> Result<()> {
        let known = self.project.prefixes().await?;
        self.name.assert_prefix_owned(&known)?;
        self.assert_local("create")?;
        if self.exists().await {
            return Err(Error::AlreadyExists(self.name.to_string()));
        }

        match doc.get("name") {
            None | Some(Value::Null) => {
                doc["name"] = json!(self.name.to_string());
            }
            Some(Value::String(supplied)) if *supplied == self.name.to_string() => {}
            Some(supplied) => {
                return Err(Error::SchemaValidation {
                    schema: self.resource_type().schema_id().to_string(),
                    detail: format!(
                        "property 'name': {} does not match target '{}'",
                        supplied, self.name
                    ),
                });
            }
        }
        schema::validate(self.resource_type(), &doc)?;

        let metadata_path = self.metadata_path();
        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        write_json_file(&metadata_path, &doc).await?;

        for spec in self.resource_type().content_files() {
            let text = content
                .iter()
                .find(|(key, _)| *key == spec.key)
                .map(|(_, text)| *text)
                .unwrap_or_default();
            fs::write(self.content_file_path(spec), text).await?;
        }

        self.project.collect_resources().await?;
        debug!("Resource '{}' created", self.name);
        Ok(())
    }

    /// Applies one update operation to the selected field, validates the
    /// candidate document, and persists it.
    ///
    /// The `adjust` hook runs on the candidate after the operation and before
    /// validation; type classes use it to keep dependent fields of the same
    /// document consistent (e.g. rewriting transitions when a workflow state
    /// is renamed). Returns whether anything was written.
    #[instrument(skip(self, op, adjust), fields(name = %self.name, field = %field.key))]
    pub async fn update_with<F>(
        &self,
        field: &FieldSelector,
        op: &Operation,
        adjust: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        self.assert_local("update")?;

        if let Some(spec) = self.resource_type().content_file(&field.key) {
            return self.update_content_file(spec, op).await;
        }
        if field.key == "name" {
            return Err(Error::InvalidOperation(
                "Cannot update the 'name' field; rename the resource instead".to_string(),
            ));
        }

        let mut doc = self.read().await?;
        let changed = apply_to_field(&mut doc, field, op)?;
        if !changed {
            debug!("Update is a no-op, nothing written");
            return Ok(false);
        }

        adjust(&mut doc)?;
        schema::validate(self.resource_type(), &doc)?;
        write_json_file(&self.metadata_path(), &doc).await?;
        debug!("Resource '{}' updated", self.name);
        Ok(true)
    }

    /// Content files hold opaque text and support only `change`.
    async fn update_content_file(&self, spec: &ContentFileSpec, op: &Operation) -> Result<bool> {
        let Operation::Change { to, .. } = op else {
            return Err(Error::InvalidOperation(format!(
                "Cannot do operation {} on content file '{}'",
                op.kind(),
                spec.key
            )));
        };
        let text = to.as_str().ok_or_else(|| {
            Error::InvalidOperation(format!("Content file '{}' takes a string value", spec.key))
        })?;

        if !self.exists().await {
            return Err(Error::NotFound(self.name.to_string()));
        }
        let path = self.content_file_path(spec);
        let current = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        if current == text {
            return Ok(false);
        }
        fs::write(&path, text).await?;
        debug!("Content file '{}' of '{}' updated", spec.key, self.name);
        Ok(true)
    }

    /// Moves the resource to a new identifier within the same project.
    ///
    /// Module resources cannot be renamed, and the type segment is fixed. The
    /// metadata file or folder moves, single-file content siblings move with
    /// it, and the document's `name` field is rewritten.
    #[instrument(skip(self), fields(from = %self.name, to = %to))]
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        let known = self.project.prefixes().await?;
        to.assert_prefix_owned(&known)?;
        if !self.is_local() || to.prefix() != self.project.prefix() {
            return Err(Error::CrossProjectRename);
        }
        if to.resource_type() != self.resource_type() {
            return Err(Error::TypeChange);
        }
        if !self.exists().await {
            return Err(Error::NotFound(self.name.to_string()));
        }
        let target = ResourceObject::new(self.project.clone(), to.clone());
        if target.exists().await {
            return Err(Error::AlreadyExists(to.to_string()));
        }

        match self.resource_type().layout() {
            ResourceLayout::SingleFile => {
                fs::rename(self.metadata_path(), target.metadata_path()).await?;
                for spec in self.resource_type().content_files() {
                    let old = self.content_file_path(spec);
                    if fs::try_exists(&old).await? {
                        fs::rename(old, target.content_file_path(spec)).await?;
                    }
                }
            }
            ResourceLayout::Folder { .. } => {
                fs::rename(self.folder_path(), target.folder_path()).await?;
            }
        }

        let mut doc = target.read().await?;
        doc["name"] = json!(to.to_string());
        write_json_file(&target.metadata_path(), &doc).await?;

        self.project.collect_resources().await?;
        debug!("Resource '{}' renamed to '{}'", self.name, to);
        Ok(())
    }

    /// Deletes the resource's files. Dangling references in other resources
    /// or cards are left in place for `validate` to report.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn delete(&self) -> Result<()> {
        self.assert_local("delete")?;
        if !self.exists().await {
            return Err(Error::NotFound(self.name.to_string()));
        }

        match self.resource_type().layout() {
            ResourceLayout::SingleFile => {
                fs::remove_file(self.metadata_path()).await?;
                for spec in self.resource_type().content_files() {
                    let path = self.content_file_path(spec);
                    if fs::try_exists(&path).await? {
                        fs::remove_file(path).await?;
                    }
                }
            }
            ResourceLayout::Folder { .. } => {
                fs::remove_dir_all(self.folder_path()).await?;
            }
        }

        self.project.collect_resources().await?;
        debug!("Resource '{}' deleted", self.name);
        Ok(())
    }

    /// Re-reads the document from disk and checks it against its schema,
    /// plus the presence and well-formedness of declared content files.
    pub async fn validate(&self) -> Result<()> {
        let doc = self.read().await?;
        schema::validate(self.resource_type(), &doc)?;

        for spec in self.resource_type().content_files() {
            let path = self.content_file_path(spec);
            match fs::read_to_string(&path).await {
                Ok(text) => {
                    if path.extension().is_some_and(|ext| ext == "json") {
                        serde_json::from_str::<Value>(&text).map_err(|e| {
                            Error::SchemaValidation {
                                schema: self.resource_type().schema_id().to_string(),
                                detail: format!("content file '{}' is not valid JSON: {}", spec.key, e),
                            }
                        })?;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::SchemaValidation {
                        schema: self.resource_type().schema_id().to_string(),
                        detail: format!("content file '{}' is missing", spec.key),
                    });
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    /// Full view of the resource: the metadata document with each content
    /// file merged in under its field key (JSON files parsed, others as
    /// text). Missing content files are omitted.
    pub async fn show(&self) -> Result<Value> {
        let doc = self.read().await?;
        let mut merged = match doc {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        for spec in self.resource_type().content_files() {
            let path = self.content_file_path(spec);
            match fs::read_to_string(&path).await {
                Ok(text) => {
                    let value = if path.extension().is_some_and(|ext| ext == "json") {
                        serde_json::from_str(&text).unwrap_or(Value::String(text))
                    } else {
                        Value::String(text)
                    };
                    merged.insert(spec.key.to_string(), value);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(Value::Object(merged))
    }
}

/// Navigates the field selector and applies the operation.
///
/// An absent field is materialized as an empty array for `add` and set
/// directly for `change`; `remove` and `rank` on an absent field fail.
fn apply_to_field(doc: &mut Value, field: &FieldSelector, op: &Operation) -> Result<bool> {
    let object = doc.as_object().ok_or_else(|| {
        Error::InvalidOperation("Resource document is not a JSON object".to_string())
    })?;

    let present = match &field.sub_key {
        None => object.contains_key(&field.key),
        Some(sub_key) => match object.get(&field.key) {
            None => false,
            Some(Value::Object(nested)) => nested.contains_key(sub_key),
            Some(_) => {
                return Err(Error::InvalidOperation(format!(
                    "Field '{}' is not an object; cannot select '{}'",
                    field.key, sub_key
                )));
            }
        },
    };

    if !present {
        return match op {
            Operation::Add { target } => {
                insert_field(doc, field, Value::Array(vec![target.clone()]))?;
                Ok(true)
            }
            Operation::Change { to, .. } => {
                insert_field(doc, field, to.clone())?;
                Ok(true)
            }
            _ => Err(Error::InvalidOperation(format!(
                "Cannot do operation {} on missing field '{}'",
                op.kind(),
                selector_path(field)
            ))),
        };
    }

    let slot = match &field.sub_key {
        None => doc.get_mut(&field.key),
        Some(sub_key) => doc.get_mut(&field.key).and_then(|v| v.get_mut(sub_key)),
    }
    .ok_or_else(|| {
        Error::InvalidOperation(format!("Field '{}' does not exist", selector_path(field)))
    })?;

    match slot {
        Value::Array(items) => apply_to_array(items, op),
        scalar => apply_to_scalar(scalar, op),
    }
}

fn insert_field(doc: &mut Value, field: &FieldSelector, value: Value) -> Result<()> {
    let object = doc.as_object_mut().ok_or_else(|| {
        Error::InvalidOperation("Resource document is not a JSON object".to_string())
    })?;
    match &field.sub_key {
        None => {
            object.insert(field.key.clone(), value);
        }
        Some(sub_key) => {
            let nested = object
                .entry(field.key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let nested = nested.as_object_mut().ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "Field '{}' is not an object; cannot select '{}'",
                    field.key, sub_key
                ))
            })?;
            nested.insert(sub_key.clone(), value);
        }
    }
    Ok(())
}

fn selector_path(field: &FieldSelector) -> String {
    match &field.sub_key {
        Some(sub_key) => format!("{}.{}", field.key, sub_key),
        None => field.key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn project() -> (tempfile::TempDir, Arc<Project>) {
        let dir = tempdir().unwrap();
        let project = Project::create(&dir.path().join("proj"), "decision")
            .await
            .unwrap();
        (dir, project)
    }

    fn workflow_doc() -> Value {
        json!({
            "name": "decision/workflows/simple",
            "displayName": "Simple",
            "states": [
                {"name": "Draft", "category": "initial"},
                {"name": "Approved", "category": "closed"},
            ],
            "transitions": [
                {"name": "Create", "fromState": [""], "toState": "Draft"},
                {"name": "Approve", "fromState": ["Draft"], "toState": "Approved"},
            ],
        })
    }

    #[tokio::test]
    async fn create_read_delete_round_trip() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/workflows/simple").unwrap();
        let object = ResourceObject::new(project.clone(), name.clone());

        object.create(workflow_doc(), &[]).await.unwrap();
        assert!(object.exists().await);
        let doc = object.read().await.unwrap();
        assert_eq!(doc["name"], json!("decision/workflows/simple"));

        let err = object.create(workflow_doc(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        object.delete().await.unwrap();
        assert!(!object.exists().await);
        let err = object.delete().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_document_is_never_written() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/workflows/simple").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        object.create(workflow_doc(), &[]).await.unwrap();

        // Removing a state that transitions still reference fails validation.
        let err = object
            .update_with(
                &FieldSelector::new("states"),
                &Operation::Remove {
                    target: json!({"name": "Draft", "category": "initial"}),
                },
                |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));

        let doc = object.read().await.unwrap();
        assert_eq!(doc["states"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_add_and_rank() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/workflows/simple").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        object.create(workflow_doc(), &[]).await.unwrap();

        object
            .update_with(
                &FieldSelector::new("states"),
                &Operation::Add {
                    target: json!({"name": "Rejected", "category": "closed"}),
                },
                |_| Ok(()),
            )
            .await
            .unwrap();
        object
            .update_with(
                &FieldSelector::new("states"),
                &Operation::Rank {
                    target: json!({"name": "Rejected", "category": "closed"}),
                    new_index: 0,
                },
                |_| Ok(()),
            )
            .await
            .unwrap();

        let doc = object.read().await.unwrap();
        assert_eq!(doc["states"][0]["name"], json!("Rejected"));
    }

    #[tokio::test]
    async fn update_materializes_missing_array_on_add() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/cardTypes/decision").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        let workflow = ResourceObject::new(
            project.clone(),
            ResourceName::parse("decision/workflows/simple").unwrap(),
        );
        workflow.create(workflow_doc(), &[]).await.unwrap();
        object
            .create(
                json!({"workflow": "decision/workflows/simple",
                       "customFields": [{"name": "decision/fieldTypes/owner"}]}),
                &[],
            )
            .await
            .unwrap();

        object
            .update_with(
                &FieldSelector::new("alwaysVisibleFields"),
                &Operation::Add {
                    target: json!("decision/fieldTypes/owner"),
                },
                |_| Ok(()),
            )
            .await
            .unwrap();
        let doc = object.read().await.unwrap();
        assert_eq!(
            doc["alwaysVisibleFields"],
            json!(["decision/fieldTypes/owner"])
        );

        let err = object
            .update_with(
                &FieldSelector::new("bogusList"),
                &Operation::Remove { target: json!("x") },
                |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn rename_moves_files_and_rewrites_name() {
        let (_dir, project) = project().await;
        let from = ResourceName::parse("decision/calculations/score").unwrap();
        let object = ResourceObject::new(project.clone(), from.clone());
        object
            .create(json!({}), &[("calculation", "% logic")])
            .await
            .unwrap();

        let to = ResourceName::parse("decision/calculations/priority").unwrap();
        object.rename(&to).await.unwrap();

        let renamed = ResourceObject::new(project.clone(), to);
        assert!(renamed.exists().await);
        assert!(!object.exists().await);
        let doc = renamed.read().await.unwrap();
        assert_eq!(doc["name"], json!("decision/calculations/priority"));

        let shown = renamed.show().await.unwrap();
        assert_eq!(shown["calculation"], json!("% logic"));
    }

    #[tokio::test]
    async fn rename_guards() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/workflows/simple").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        object.create(workflow_doc(), &[]).await.unwrap();

        let err = object
            .rename(&ResourceName::parse("other/workflows/simple").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PrefixMismatch { .. }));

        let err = object
            .rename(&ResourceName::parse("decision/cardTypes/simple").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TypeChange));
    }

    #[tokio::test]
    async fn content_file_change_only() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/calculations/score").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        object.create(json!({}), &[]).await.unwrap();

        let changed = object
            .update_with(
                &FieldSelector::new("calculation"),
                &Operation::Change {
                    target: json!(""),
                    to: json!("result(X) :- input(X)."),
                },
                |_| Ok(()),
            )
            .await
            .unwrap();
        assert!(changed);

        let err = object
            .update_with(
                &FieldSelector::new("calculation"),
                &Operation::Add { target: json!("x") },
                |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        let shown = object.show().await.unwrap();
        assert_eq!(shown["calculation"], json!("result(X) :- input(X)."));
    }

    #[tokio::test]
    async fn validate_reports_missing_content_file() {
        let (_dir, project) = project().await;
        let name = ResourceName::parse("decision/graphModels/flow").unwrap();
        let object = ResourceObject::new(project.clone(), name);
        object.create(json!({}), &[]).await.unwrap();
        object.validate().await.unwrap();

        fs::remove_file(object.folder_path().join("model.lp"))
            .await
            .unwrap();
        let err = object.validate().await.unwrap_err();
        assert!(err.to_string().contains("model"));
    }
}
