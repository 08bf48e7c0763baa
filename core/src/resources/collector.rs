use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::resources::name::{ResourceLayout, ResourceName, ResourceType, validate_identifier};
use crate::resources::{Error, Result};

/// One resource found on disk: its name and the path of its metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedResource {
    pub name: ResourceName,
    pub path: PathBuf,
}

/// Per-type in-memory listings of resources, local and module-scoped.
///
/// The collector is a refresh-on-demand cache owned by one project instance.
/// Callers that mutate resources must refresh it afterwards; reads between a
/// mutation and the next refresh see the previous listing.
#[derive(Debug, Default)]
pub struct ResourceCollector {
    local: HashMap<ResourceType, Vec<CollectedResource>>,
    modules: HashMap<ResourceType, Vec<CollectedResource>>,
}

impl ResourceCollector {
    pub fn new() -> Self {
        ResourceCollector::default()
    }

    /// Walks the local resource tree once, replacing all per-type listings.
    ///
    /// Repeated calls are idempotent: listings are replaced, never appended.
    #[instrument(skip(self, local_dir), fields(local_dir = %local_dir.display()))]
    pub async fn collect_local_resources(&mut self, local_dir: &Path, prefix: &str) -> Result<()> {
        let results = join_all(
            ResourceType::ALL
                .iter()
                .map(|t| collect_type(local_dir.to_path_buf(), prefix.to_string(), *t)),
        )
        .await;
        for (resource_type, result) in ResourceType::ALL.iter().zip(results) {
            self.local.insert(*resource_type, result?);
        }
        debug!("Collected {} local resources", self.count_local());
        Ok(())
    }

    /// Walks every imported module's resource tree, replacing the
    /// module-scoped listings. Local listings are untouched.
    #[instrument(skip(self, modules_dir), fields(modules_dir = %modules_dir.display()))]
    pub async fn collect_module_resources(&mut self, modules_dir: &Path) -> Result<()> {
        let mut module_roots = Vec::new();
        let mut read_dir = match fs::read_dir(modules_dir).await {
            Ok(rd) => Some(rd),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Io(e)),
        };
        if let Some(rd) = read_dir.as_mut() {
            while let Some(entry) = rd.next_entry().await? {
                if entry.path().is_dir() {
                    module_roots.push(entry.path());
                }
            }
        }
        module_roots.sort();

        let mut collected: HashMap<ResourceType, Vec<CollectedResource>> = ResourceType::ALL
            .iter()
            .map(|t| (*t, Vec::new()))
            .collect();
        for root in module_roots {
            let Some(prefix) = root.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            let results = join_all(
                ResourceType::ALL
                    .iter()
                    .map(|t| collect_type(root.clone(), prefix.clone(), *t)),
            )
            .await;
            for (resource_type, result) in ResourceType::ALL.iter().zip(results) {
                collected
                    .get_mut(resource_type)
                    .expect("all types present")
                    .extend(result?);
            }
        }
        self.modules = collected;
        debug!("Collected {} module resources", self.count_modules());
        Ok(())
    }

    /// Recomputes module listings after a module import or removal.
    pub async fn module_imported(&mut self, modules_dir: &Path) -> Result<()> {
        self.collect_module_resources(modules_dir).await
    }

    /// Membership check against the in-memory listings, local and module.
    pub fn resource_exists(&self, resource_type: ResourceType, name: &ResourceName) -> bool {
        self.of_type(resource_type).any(|r| &r.name == name)
    }

    /// Looks up the collected entry for a name, local or module.
    pub fn find(&self, name: &ResourceName) -> Option<&CollectedResource> {
        self.of_type(name.resource_type())
            .find(|r| &r.name == name)
    }

    /// All resources of a type, local first, then module-scoped.
    pub fn of_type(
        &self,
        resource_type: ResourceType,
    ) -> impl Iterator<Item = &CollectedResource> {
        self.local_of_type(resource_type)
            .iter()
            .chain(self.modules_of_type(resource_type).iter())
    }

    pub fn local_of_type(&self, resource_type: ResourceType) -> &[CollectedResource] {
        self.local
            .get(&resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn modules_of_type(&self, resource_type: ResourceType) -> &[CollectedResource] {
        self.modules
            .get(&resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn count_local(&self) -> usize {
        self.local.values().map(Vec::len).sum()
    }

    fn count_modules(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }
}

/// Collects the resources of one type under a resource root (a project's
/// `local` dir or one module dir). The owning prefix is the project's own
/// prefix for the local root, or the module directory's name for module
/// roots.
async fn collect_type(
    root: PathBuf,
    prefix: String,
    resource_type: ResourceType,
) -> Result<Vec<CollectedResource>> {
    let dir = root.join(resource_type.folder_name());
    let mut read_dir = match fs::read_dir(&dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut collected = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        let (identifier, metadata_path) = match resource_type.layout() {
            ResourceLayout::SingleFile => {
                if !path.is_file() || !file_name.ends_with(".json") {
                    continue;
                }
                let identifier = file_name.trim_end_matches(".json").to_string();
                (identifier, path.clone())
            }
            ResourceLayout::Folder { metadata_file } => {
                if !path.is_dir() {
                    continue;
                }
                let metadata_path = path.join(metadata_file);
                if !fs::try_exists(&metadata_path).await? {
                    warn!(
                        "Skipping resource folder without metadata: {}",
                        path.display()
                    );
                    continue;
                }
                (file_name, metadata_path)
            }
        };

        if validate_identifier(&identifier).is_err() {
            warn!("Skipping resource with invalid identifier: {}", path.display());
            continue;
        }
        let name = ResourceName::new(&prefix, resource_type, &identifier)?;
        collected.push(CollectedResource {
            name,
            path: metadata_path,
        });
    }
    collected.sort_by(|a, b| a.name.identifier().cmp(b.name.identifier()));
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn seed_local(internal_dir: &Path) -> PathBuf {
        let local = internal_dir.join("local");
        let workflows = local.join("workflows");
        fs::create_dir_all(&workflows).await.unwrap();
        fs::write(workflows.join("simple.json"), "{}").await.unwrap();
        fs::write(workflows.join("other.json"), "{}").await.unwrap();
        // Calculation logic programs are not metadata files.
        let calculations = local.join("calculations");
        fs::create_dir_all(&calculations).await.unwrap();
        fs::write(calculations.join("score.json"), "{}").await.unwrap();
        fs::write(calculations.join("score.lp"), "% lp").await.unwrap();
        // Folder resource with metadata.
        let reports = local.join("reports").join("overview");
        fs::create_dir_all(&reports).await.unwrap();
        fs::write(reports.join("report.json"), "{}").await.unwrap();
        local
    }

    #[tokio::test]
    async fn collect_local_is_idempotent() {
        let dir = tempdir().unwrap();
        let internal = dir.path().join(".cards");
        let local = seed_local(&internal).await;

        let mut collector = ResourceCollector::new();
        collector
            .collect_local_resources(&local, "decision")
            .await
            .unwrap();
        let first: Vec<_> = collector
            .local_of_type(ResourceType::Workflows)
            .iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(
            first,
            vec![
                "decision/workflows/other".to_string(),
                "decision/workflows/simple".to_string()
            ]
        );
        assert_eq!(collector.local_of_type(ResourceType::Calculations).len(), 1);
        assert_eq!(collector.local_of_type(ResourceType::Reports).len(), 1);

        collector
            .collect_local_resources(&local, "decision")
            .await
            .unwrap();
        let second: Vec<_> = collector
            .local_of_type(ResourceType::Workflows)
            .iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(first, second, "repeated collection must not grow listings");
    }

    #[tokio::test]
    async fn module_resources_keep_their_own_prefix() {
        let dir = tempdir().unwrap();
        let internal = dir.path().join(".cards");
        let local = seed_local(&internal).await;

        let module_workflows = internal.join("modules").join("base").join("workflows");
        fs::create_dir_all(&module_workflows).await.unwrap();
        fs::write(module_workflows.join("simple.json"), "{}")
            .await
            .unwrap();

        let mut collector = ResourceCollector::new();
        collector
            .collect_local_resources(&local, "decision")
            .await
            .unwrap();
        collector
            .collect_module_resources(&internal.join("modules"))
            .await
            .unwrap();

        let local_name = ResourceName::parse("decision/workflows/simple").unwrap();
        let module_name = ResourceName::parse("base/workflows/simple").unwrap();
        assert!(collector.resource_exists(ResourceType::Workflows, &local_name));
        assert!(collector.resource_exists(ResourceType::Workflows, &module_name));
        assert_ne!(local_name, module_name);

        // Recomputing module listings leaves local counts unchanged.
        let local_count = collector.local_of_type(ResourceType::Workflows).len();
        collector
            .module_imported(&internal.join("modules"))
            .await
            .unwrap();
        assert_eq!(collector.local_of_type(ResourceType::Workflows).len(), local_count);
    }

    #[tokio::test]
    async fn missing_resource_dirs_yield_empty_listings() {
        let dir = tempdir().unwrap();
        let local = dir.path().join(".cards").join("local");
        fs::create_dir_all(&local).await.unwrap();

        let mut collector = ResourceCollector::new();
        collector
            .collect_local_resources(&local, "decision")
            .await
            .unwrap();
        for resource_type in ResourceType::ALL {
            assert!(collector.local_of_type(resource_type).is_empty());
        }
    }
}
