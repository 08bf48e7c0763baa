//! The project container: owns a base path and scopes every card and
//! resource operation to it.
//!
//! A project directory contains a `.cards` internal directory (configuration,
//! local resources, imported modules) and a `cardRoot` directory holding the
//! card tree:
//!
//! ```text
//! <project>/
//!   .cards/
//!     config.json        { "cardKeyPrefix": "...", "version": 1 }
//!     local/             local resources, one folder per resource type
//!     modules/<prefix>/  imported module resources, mirrors local/
//!   cardRoot/            project cards
//! ```
//!
//! Resource objects are transient projections re-loaded from disk per
//! request; the only long-lived shared state is the [`ResourceCollector`],
//! owned by the project behind a read/write lock and refreshed explicitly
//! after mutations that change set membership.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::cards::{Card, CardContainer, CardMetadata, CHILDREN_DIR, container};
use crate::resources::schema::WorkflowDoc;
use crate::resources::{
    CollectedResource, Error, Resource, ResourceCollector, ResourceName, ResourceType, Result,
    schema,
};

pub const INTERNAL_DIR_NAME: &str = ".cards";
pub const PROJECT_CONFIG_FILENAME: &str = "config.json";
pub const LOCAL_DIR_NAME: &str = "local";
pub const MODULES_DIR_NAME: &str = "modules";
pub const CARD_ROOT_DIR_NAME: &str = "cardRoot";

/// Project configuration stored in `.cards/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub card_key_prefix: String,
    pub version: u32,
}

impl ProjectConfig {
    fn new(prefix: &str) -> Self {
        ProjectConfig {
            card_key_prefix: prefix.to_string(),
            version: 1,
        }
    }
}

/// Represents the root project directory containing cards and resources.
#[derive(Debug)]
pub struct Project {
    absolute_path: PathBuf,
    internal_dir: PathBuf,
    config: ProjectConfig,
    collector: RwLock<ResourceCollector>,
}

impl Project {
    /// Returns the root path of the project.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// The project's own card-key prefix.
    pub fn prefix(&self) -> &str {
        &self.config.card_key_prefix
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn local_resources_dir(&self) -> PathBuf {
        self.internal_dir.join(LOCAL_DIR_NAME)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.internal_dir.join(MODULES_DIR_NAME)
    }

    pub fn card_root_dir(&self) -> PathBuf {
        self.absolute_path.join(CARD_ROOT_DIR_NAME)
    }

    /// The card container over the project's card tree.
    pub fn card_root(&self) -> CardContainer {
        CardContainer::new(self.card_root_dir())
    }

    /// Opens an existing project directory.
    ///
    /// Checks that the directory exists, contains the `.cards` subdirectory,
    /// and has a valid configuration file, then collects all resources.
    pub async fn open(path: &Path) -> Result<Arc<Project>> {
        debug!("Attempting to open project");

        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let absolute_path = fs::canonicalize(path).await?;
        let internal_dir = absolute_path.join(INTERNAL_DIR_NAME);
        let internal_meta = fs::metadata(&internal_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotAProject(absolute_path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        if !internal_meta.is_dir() {
            return Err(Error::NotAProject(absolute_path));
        }

        let config_path = internal_dir.join(PROJECT_CONFIG_FILENAME);
        let config = read_project_config(&config_path).await?;

        let project = Project {
            absolute_path,
            internal_dir,
            config,
            collector: RwLock::new(ResourceCollector::new()),
        };
        project.collect_resources().await?;
        project.module_imported().await?;
        debug!("Project opened successfully");
        Ok(Arc::new(project))
    }

    /// Creates a new project at the specified path.
    ///
    /// - If the path does not exist, creates the directory tree.
    /// - If the path exists and is an empty directory, initializes it.
    /// - Fails if the path exists and is a file, is a non-empty directory,
    ///   or already contains a `.cards` directory.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn create(path: &Path, prefix: &str) -> Result<Arc<Project>> {
        crate::resources::name::validate_prefix(prefix)?;
        let internal_dir = path.join(INTERNAL_DIR_NAME);

        match fs::metadata(&path).await {
            Ok(meta) => {
                if !meta.is_dir() {
                    return Err(Error::ProjectCreationConflict(path.to_path_buf()));
                }
                if fs::metadata(&internal_dir).await.is_ok() {
                    return Err(Error::ProjectCreationConflict(path.to_path_buf()));
                }
                let mut read_dir = fs::read_dir(&path).await?;
                if read_dir.next_entry().await?.is_some() {
                    return Err(Error::ProjectCreationConflict(path.to_path_buf()));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&path).await?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        fs::create_dir(&internal_dir).await?;
        fs::create_dir(internal_dir.join(LOCAL_DIR_NAME)).await?;
        fs::create_dir(path.join(CARD_ROOT_DIR_NAME)).await?;

        let config = ProjectConfig::new(prefix);
        let config_path = internal_dir.join(PROJECT_CONFIG_FILENAME);
        write_json_file(&config_path, &serde_json::to_value(&config)?).await?;
        debug!("Project created successfully");

        Project::open(path).await
    }

    /// All prefixes known to this project: its own plus one per module.
    pub async fn prefixes(&self) -> Result<Vec<String>> {
        let mut prefixes = vec![self.prefix().to_string()];
        prefixes.extend(self.module_prefixes().await?);
        Ok(prefixes)
    }

    /// Prefixes of the imported modules, from the modules directory.
    pub async fn module_prefixes(&self) -> Result<Vec<String>> {
        let mut prefixes = Vec::new();
        let mut read_dir = match fs::read_dir(self.modules_dir()).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(prefixes),
            Err(e) => return Err(Error::Io(e)),
        };
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    prefixes.push(name.to_string());
                }
            }
        }
        prefixes.sort();
        Ok(prefixes)
    }

    /// Resolves a resource by name, dispatching on its type segment.
    pub fn resource(self: &Arc<Self>, name: &str) -> Result<Resource> {
        let name = ResourceName::parse(name)?;
        Resource::new(self.clone(), name)
    }

    /// Flat list of resource names of a type, local and module-scoped.
    pub async fn resource_names(&self, resource_type: ResourceType) -> Vec<ResourceName> {
        self.collector
            .read()
            .await
            .of_type(resource_type)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Membership check against the collector's in-memory listings.
    pub async fn resource_exists(&self, name: &ResourceName) -> bool {
        self.collector
            .read()
            .await
            .resource_exists(name.resource_type(), name)
    }

    pub(crate) async fn find_resource(&self, name: &ResourceName) -> Option<CollectedResource> {
        self.collector.read().await.find(name).cloned()
    }

    pub(crate) async fn local_resource_names(&self, resource_type: ResourceType) -> Vec<ResourceName> {
        self.collector
            .read()
            .await
            .local_of_type(resource_type)
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub(crate) async fn module_resource_names(&self, resource_type: ResourceType) -> Vec<ResourceName> {
        self.collector
            .read()
            .await
            .modules_of_type(resource_type)
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Re-walks the local resource tree, replacing the collector's listings.
    ///
    /// Must be called after any mutation that changes resource set
    /// membership; the collector does not watch the filesystem.
    pub async fn collect_resources(&self) -> Result<()> {
        let mut collector = self.collector.write().await;
        collector
            .collect_local_resources(&self.local_resources_dir(), self.prefix())
            .await
    }

    /// Recomputes module listings after a module import or removal.
    pub async fn module_imported(&self) -> Result<()> {
        let mut collector = self.collector.write().await;
        collector.module_imported(&self.modules_dir()).await
    }

    /// Imports another project as a module, copying its local resources
    /// under `.cards/modules/<prefix>`.
    #[instrument(skip(self, source), fields(source = %source.display()))]
    pub async fn import_module(&self, source: &Path) -> Result<String> {
        let module = Project::open(source).await?;
        let prefix = module.prefix().to_string();
        if prefix == self.prefix() {
            return Err(Error::ModuleExists(prefix));
        }
        let target = self.modules_dir().join(&prefix);
        if fs::try_exists(&target).await? {
            return Err(Error::ModuleExists(prefix));
        }
        copy_dir(&module.local_resources_dir(), &target).await?;
        self.module_imported().await?;
        debug!("Module '{}' imported", prefix);
        Ok(prefix)
    }

    /// Removes an imported module and its resources.
    pub async fn remove_module(&self, prefix: &str) -> Result<()> {
        let target = self.modules_dir().join(prefix);
        if !fs::try_exists(&target).await? {
            return Err(Error::ModuleNotFound(prefix.to_string()));
        }
        fs::remove_dir_all(&target).await?;
        self.module_imported().await?;
        debug!("Module '{}' removed", prefix);
        Ok(())
    }

    // --- Card operations ---

    /// Creates a card of the given card type, under a parent card or at the
    /// card root, with a generated key and the workflow's initial state.
    #[instrument(skip(self))]
    pub async fn create_card(
        &self,
        card_type: &str,
        parent_key: Option<&str>,
        title: &str,
    ) -> Result<Card> {
        let container = self.card_root();
        let sibling_count = match parent_key {
            Some(parent) => container.card(parent, false).await?.children.len(),
            None => container.cards(false).await?.len(),
        };
        let metadata = self.new_card_metadata(card_type, title, sibling_count).await?;
        container
            .create_card(parent_key, &self.new_card_key(), metadata)
            .await
    }

    /// Builds metadata for a new card: resolves the card type, looks up its
    /// workflow's initial state, and ranks the card after `sibling_count`
    /// existing siblings.
    pub(crate) async fn new_card_metadata(
        &self,
        card_type: &str,
        title: &str,
        sibling_count: usize,
    ) -> Result<CardMetadata> {
        let card_type_name = ResourceName::parse(card_type)?;
        card_type_name.assert_type_matches(ResourceType::CardTypes)?;
        let collected = self
            .find_resource(&card_type_name)
            .await
            .ok_or_else(|| Error::ReferenceNotFound(card_type.to_string()))?;
        let card_type_doc = read_json_file(&collected.path).await?;

        let workflow = card_type_doc
            .get("workflow")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let initial_state = self.initial_workflow_state(&workflow).await?;
        Ok(CardMetadata::new(
            title,
            card_type,
            &initial_state,
            &rank_at(sibling_count),
        ))
    }

    /// Finds a card by key in the project card tree.
    pub async fn card(&self, key: &str, include_content: bool) -> Result<Card> {
        self.card_root().card(key, include_content).await
    }

    /// Lists the top-level project cards with their child trees.
    pub async fn cards(&self) -> Result<Vec<Card>> {
        self.card_root().cards(false).await
    }

    async fn initial_workflow_state(&self, workflow: &str) -> Result<String> {
        let workflow_name = ResourceName::parse(workflow)
            .map_err(|_| Error::WorkflowNotFound(workflow.to_string()))?;
        let collected = self
            .find_resource(&workflow_name)
            .await
            .ok_or_else(|| Error::WorkflowNotFound(workflow.to_string()))?;
        let doc: WorkflowDoc = serde_json::from_value(read_json_file(&collected.path).await?)?;
        let initial = doc
            .states
            .iter()
            .find(|s| s.category == schema::StateCategory::Initial)
            .or_else(|| doc.states.first())
            .map(|s| s.name.clone())
            .unwrap_or_default();
        Ok(initial)
    }

    pub(crate) fn new_card_key(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}", self.prefix(), &suffix[..8])
    }

    // --- Cascade walk helpers ---

    /// Card containers whose metadata local cascades may touch: the project
    /// card root plus each local template's card tree.
    pub(crate) async fn card_containers(&self) -> Result<Vec<CardContainer>> {
        let mut containers = vec![self.card_root()];
        let templates = self
            .collector
            .read()
            .await
            .local_of_type(ResourceType::Templates)
            .to_vec();
        for template in templates {
            if let Some(folder) = template.path.parent() {
                containers.push(CardContainer::new(folder.join(CHILDREN_DIR)));
            }
        }
        Ok(containers)
    }

    /// Applies `f` to every local card's metadata and rewrites the cards it
    /// changed. Failures on individual cards are logged and skipped; the
    /// scan continues (cascades are best effort, not transactional).
    pub(crate) async fn update_cards<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(&str, &mut CardMetadata) -> bool,
    {
        let mut changed = 0;
        for card_container in self.card_containers().await? {
            for dir in card_container.card_dirs().await? {
                let key = match dir.file_name().and_then(|n| n.to_str()) {
                    Some(key) => key.to_string(),
                    None => continue,
                };
                let mut metadata = match container::read_metadata(&dir).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!("Skipping card '{}' during cascade: {}", key, e);
                        continue;
                    }
                };
                if f(&key, &mut metadata) {
                    match container::save_metadata(&dir, &mut metadata).await {
                        Ok(()) => changed += 1,
                        Err(e) => warn!("Failed to update card '{}' during cascade: {}", key, e),
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Returns the keys of every local card matching the predicate.
    pub(crate) async fn scan_cards<F>(&self, mut f: F) -> Result<Vec<String>>
    where
        F: FnMut(&CardMetadata) -> bool,
    {
        let mut keys = Vec::new();
        for card_container in self.card_containers().await? {
            for dir in card_container.card_dirs().await? {
                let Some(key) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
                else {
                    continue;
                };
                match container::read_metadata(&dir).await {
                    Ok(metadata) => {
                        if f(&metadata) {
                            keys.push(key);
                        }
                    }
                    Err(e) => warn!("Skipping card '{}' during scan: {}", key, e),
                }
            }
        }
        Ok(keys)
    }

    /// Reads every local resource document of a type.
    pub(crate) async fn local_resource_documents(
        &self,
        resource_type: ResourceType,
    ) -> Result<Vec<(ResourceName, Value)>> {
        let collected = self
            .collector
            .read()
            .await
            .local_of_type(resource_type)
            .to_vec();
        let mut documents = Vec::with_capacity(collected.len());
        for resource in collected {
            match read_json_file(&resource.path).await {
                Ok(doc) => documents.push((resource.name, doc)),
                Err(e) => warn!("Skipping unreadable resource '{}': {}", resource.name, e),
            }
        }
        Ok(documents)
    }

    /// Applies `f` to every local resource document of a type and rewrites
    /// the ones it changed, re-validating each against its schema first.
    /// Invalid or unwritable results are logged and skipped (best effort).
    pub(crate) async fn update_local_resources<F>(
        &self,
        resource_type: ResourceType,
        mut f: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut Value) -> bool,
    {
        let collected = self
            .collector
            .read()
            .await
            .local_of_type(resource_type)
            .to_vec();
        let mut changed = 0;
        for resource in collected {
            let mut doc = match read_json_file(&resource.path).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping unreadable resource '{}': {}", resource.name, e);
                    continue;
                }
            };
            if !f(&mut doc) {
                continue;
            }
            if let Err(e) = schema::validate(resource_type, &doc) {
                warn!(
                    "Skipping cascade update of '{}': candidate is invalid: {}",
                    resource.name, e
                );
                continue;
            }
            match write_json_file(&resource.path, &doc).await {
                Ok(()) => changed += 1,
                Err(e) => warn!("Failed to update resource '{}': {}", resource.name, e),
            }
        }
        Ok(changed)
    }
}

/// Rank of a card appended after `position` existing siblings.
fn rank_at(position: usize) -> String {
    format!("0|{:08}", position)
}

/// Reads and deserializes a JSON file.
pub(crate) async fn read_json_file(path: &Path) -> Result<Value> {
    let content = fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Serializes and writes a JSON file (pretty-printed).
pub(crate) async fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}

async fn read_project_config(path: &Path) -> Result<ProjectConfig> {
    let content = fs::read(path).await.map_err(|e| {
        warn!("Failed to read project config '{}': {}", path.display(), e);
        Error::InvalidProjectConfig(path.to_path_buf())
    })?;
    serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse project config '{}': {}", path.display(), e);
        Error::InvalidProjectConfig(path.to_path_buf())
    })
}

fn copy_dir<'a>(
    source: &'a Path,
    target: &'a Path,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        fs::create_dir_all(target).await?;
        let mut read_dir = fs::read_dir(source).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let from = entry.path();
            let to = target.join(entry.file_name());
            if from.is_dir() {
                copy_dir(&from, &to).await?;
            } else {
                fs::copy(&from, &to).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_and_open_project() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj");

        let project = Project::create(&path, "decision").await.unwrap();
        assert_eq!(project.prefix(), "decision");
        assert!(path.join(INTERNAL_DIR_NAME).is_dir());
        assert!(path.join(CARD_ROOT_DIR_NAME).is_dir());

        let reopened = Project::open(&path).await.unwrap();
        assert_eq!(reopened.prefix(), "decision");
    }

    #[tokio::test]
    async fn create_fails_on_non_empty_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj");
        fs::create_dir_all(&path).await.unwrap();
        fs::write(path.join("something.txt"), "x").await.unwrap();

        let result = Project::create(&path, "decision").await;
        assert!(matches!(result, Err(Error::ProjectCreationConflict(_))));
    }

    #[tokio::test]
    async fn create_rejects_invalid_prefix() {
        let dir = tempdir().unwrap();
        let result = Project::create(&dir.path().join("proj"), "NO").await;
        assert!(matches!(result, Err(Error::InvalidName(_))));
    }

    #[tokio::test]
    async fn open_fails_without_internal_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain");
        fs::create_dir_all(&path).await.unwrap();

        let result = Project::open(&path).await;
        assert!(matches!(result, Err(Error::NotAProject(_))));
    }

    #[tokio::test]
    async fn open_fails_with_malformed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj");
        fs::create_dir_all(path.join(INTERNAL_DIR_NAME)).await.unwrap();
        fs::write(
            path.join(INTERNAL_DIR_NAME).join(PROJECT_CONFIG_FILENAME),
            "{ not json }",
        )
        .await
        .unwrap();

        let result = Project::open(&path).await;
        assert!(matches!(result, Err(Error::InvalidProjectConfig(_))));
    }

    #[tokio::test]
    async fn rank_is_lexically_ordered() {
        assert!(rank_at(0) < rank_at(1));
        assert!(rank_at(9) < rank_at(10));
    }
}
