//! Serializable read model of every resource in a project, nested as
//! group, module, type, resource.

use serde::Serialize;

use crate::project::Project;
use crate::resources::{ResourceType, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Group,
    Module,
    ResourceType,
    Resource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTreeNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceTreeNode>,
}

impl ResourceTreeNode {
    fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        ResourceTreeNode {
            id: id.into(),
            kind,
            children: Vec::new(),
        }
    }
}

/// Builds the full resource tree from the project's collected listings:
/// a `local` group of per-type nodes, and a `modules` group holding one
/// module node per imported prefix. Empty type nodes are omitted.
pub async fn resource_tree(project: &Project) -> Result<ResourceTreeNode> {
    let mut root = ResourceTreeNode::new(project.prefix(), NodeKind::Group);

    let mut local = ResourceTreeNode::new("local", NodeKind::Group);
    for resource_type in ResourceType::ALL {
        let names = project.local_resource_names(resource_type).await;
        if names.is_empty() {
            continue;
        }
        let mut type_node = ResourceTreeNode::new(resource_type.folder_name(), NodeKind::ResourceType);
        type_node.children = names
            .iter()
            .map(|name| ResourceTreeNode::new(name.to_string(), NodeKind::Resource))
            .collect();
        local.children.push(type_node);
    }
    root.children.push(local);

    let mut modules = ResourceTreeNode::new("modules", NodeKind::Group);
    for prefix in project.module_prefixes().await? {
        let mut module_node = ResourceTreeNode::new(&prefix, NodeKind::Module);
        for resource_type in ResourceType::ALL {
            let names: Vec<_> = project
                .module_resource_names(resource_type)
                .await
                .into_iter()
                .filter(|name| name.prefix() == prefix)
                .collect();
            if names.is_empty() {
                continue;
            }
            let mut type_node =
                ResourceTreeNode::new(resource_type.folder_name(), NodeKind::ResourceType);
            type_node.children = names
                .iter()
                .map(|name| ResourceTreeNode::new(name.to_string(), NodeKind::Resource))
                .collect();
            module_node.children.push(type_node);
        }
        modules.children.push(module_node);
    }
    root.children.push(modules);

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::workflow::WorkflowResource;
    use crate::resources::ResourceName;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tree_nests_local_and_module_resources() {
        let dir = tempdir().unwrap();
        let module = Project::create(&dir.path().join("module"), "base")
            .await
            .unwrap();
        WorkflowResource::new(
            module.clone(),
            ResourceName::parse("base/workflows/simple").unwrap(),
        )
        .unwrap()
        .create(None)
        .await
        .unwrap();

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
        project.import_module(module.path()).await.unwrap();

        let tree = resource_tree(&project).await.unwrap();
        assert_eq!(tree.id, "decision");

        let local = &tree.children[0];
        assert_eq!(local.id, "local");
        assert_eq!(local.children[0].id, "workflows");
        assert_eq!(
            local.children[0].children[0].id,
            "decision/workflows/simple"
        );

        let modules = &tree.children[1];
        assert_eq!(modules.id, "modules");
        assert_eq!(modules.children[0].id, "base");
        assert_eq!(modules.children[0].kind, NodeKind::Module);
        assert_eq!(
            modules.children[0].children[0].children[0].id,
            "base/workflows/simple"
        );
    }
}
