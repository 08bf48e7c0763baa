//! End-to-end tests over the public project and resource API.

use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use tokio::fs;

use cyberismo_core::project::Project;
use cyberismo_core::resources::card_type::CardTypeResource;
use cyberismo_core::resources::field_type::FieldTypeResource;
use cyberismo_core::resources::schema::DataType;
use cyberismo_core::resources::{
    Error, FieldSelector, NodeKind, Operation, ResourceName, ResourceType, resource_tree,
};

async fn new_project(prefix: &str) -> (TempDir, Arc<Project>) {
    let dir = tempdir().unwrap();
    let project = Project::create(&dir.path().join("proj"), prefix)
        .await
        .unwrap();
    (dir, project)
}

/// Workflow, card type, and field type wired together.
async fn seeded_project() -> (TempDir, Arc<Project>) {
    let (dir, project) = new_project("decision").await;
    project
        .resource("decision/workflows/simple")
        .unwrap()
        .create(None)
        .await
        .unwrap();
    FieldTypeResource::new(
        project.clone(),
        ResourceName::parse("decision/fieldTypes/estimate").unwrap(),
    )
    .unwrap()
    .create_field_type(DataType::Number)
    .await
    .unwrap();
    CardTypeResource::new(
        project.clone(),
        ResourceName::parse("decision/cardTypes/decision").unwrap(),
    )
    .unwrap()
    .create(Some(json!({
        "workflow": "decision/workflows/simple",
        "customFields": [{"name": "decision/fieldTypes/estimate"}],
    })))
    .await
    .unwrap();
    (dir, project)
}

/// Overwrites one custom-field value in a card's metadata file.
async fn set_card_value(project: &Project, key: &str, field: &str, value: Value) {
    let card = project.card(key, false).await.unwrap();
    let path = card.path.join("index.json");
    let mut doc: Value =
        serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();
    doc[field] = value;
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn round_trip_every_resource_type() {
    let (_dir, project) = seeded_project().await;

    // The seeded types plus the remaining default-creatable ones.
    for name in [
        "decision/calculations/score",
        "decision/graphModels/flow",
        "decision/graphViews/overview",
        "decision/linkTypes/blocks",
        "decision/reports/summary",
        "decision/templates/starter",
    ] {
        project
            .resource(name)
            .unwrap()
            .create(None)
            .await
            .unwrap();
    }

    for resource_type in ResourceType::ALL {
        for name in project.resource_names(resource_type).await {
            let resource = project.resource(&name.to_string()).unwrap();
            resource.validate().await.unwrap();
            let doc = resource.show().await.unwrap();
            assert_eq!(doc["name"], json!(name.to_string()));
        }
    }
}

#[tokio::test]
async fn collection_is_idempotent() {
    let (_dir, project) = seeded_project().await;
    let before = project.resource_names(ResourceType::Workflows).await.len();
    project.collect_resources().await.unwrap();
    project.collect_resources().await.unwrap();
    let after = project.resource_names(ResourceType::Workflows).await.len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn invalid_identifiers_are_rejected() {
    let (_dir, project) = new_project("decision").await;
    for bad in [
        "decision/workflows/has-hyphen",
        "decision/workflows/über",
        "decision/workflows/has space",
    ] {
        let err = project.resource(bad).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)), "{bad}");
    }
}

#[tokio::test]
async fn unknown_prefix_is_rejected() {
    let (_dir, project) = seeded_project().await;

    let err = project
        .resource("stranger/workflows/simple")
        .unwrap()
        .create(None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PrefixMismatch { .. }));

    let err = project
        .resource("decision/workflows/simple")
        .unwrap()
        .rename(&ResourceName::parse("stranger/workflows/simple").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PrefixMismatch { .. }));
}

#[tokio::test]
async fn state_rename_cascades_to_every_card() {
    let (_dir, project) = seeded_project().await;
    let mut keys = Vec::new();
    for i in 0..5 {
        let card = project
            .create_card("decision/cardTypes/decision", None, &format!("Card {i}"))
            .await
            .unwrap();
        keys.push(card.key);
    }

    project
        .resource("decision/workflows/simple")
        .unwrap()
        .update(
            &FieldSelector::new("states"),
            &Operation::Change {
                target: json!({"name": "Draft", "category": "initial"}),
                to: json!({"name": "Proposed", "category": "initial"}),
            },
        )
        .await
        .unwrap();

    for key in keys {
        let card = project.card(&key, false).await.unwrap();
        assert_eq!(card.metadata.unwrap().workflow_state, "Proposed");
    }
}

#[tokio::test]
async fn narrowing_field_type_coerces_card_values() {
    let (_dir, project) = seeded_project().await;
    let card = project
        .create_card("decision/cardTypes/decision", None, "Estimated")
        .await
        .unwrap();
    set_card_value(&project, &card.key, "decision/fieldTypes/estimate", json!(1.5)).await;

    project
        .resource("decision/fieldTypes/estimate")
        .unwrap()
        .update(
            &FieldSelector::new("dataType"),
            &Operation::Change {
                target: json!("number"),
                to: json!("integer"),
            },
        )
        .await
        .unwrap();

    let card = project.card(&card.key, false).await.unwrap();
    assert_eq!(
        card.metadata.unwrap().custom_fields["decision/fieldTypes/estimate"],
        json!(1)
    );
}

#[tokio::test]
async fn delete_then_delete_again_reports_missing() {
    let (_dir, project) = seeded_project().await;
    let resource = project.resource("decision/workflows/simple").unwrap();
    resource.delete().await.unwrap();

    let err = resource.delete().await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("decision/workflows/simple"));
}

#[tokio::test]
async fn new_workflow_defaults_and_rank_scenario() {
    let (_dir, project) = new_project("decision").await;
    let workflow = project.resource("decision/workflows/newWF").unwrap();
    workflow.create(None).await.unwrap();

    let doc = workflow.show().await.unwrap();
    let states: Vec<&str> = doc["states"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["Draft", "Approved", "Deprecated"]);

    workflow
        .update(
            &FieldSelector::new("states"),
            &Operation::Add {
                target: json!({"name": "Reviewed", "category": "active"}),
            },
        )
        .await
        .unwrap();
    workflow
        .update(
            &FieldSelector::new("states"),
            &Operation::Rank {
                target: json!({"name": "Reviewed", "category": "active"}),
                new_index: 0,
            },
        )
        .await
        .unwrap();

    let doc = workflow.show().await.unwrap();
    let states: Vec<&str> = doc["states"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["Reviewed", "Draft", "Approved", "Deprecated"]);
    assert_eq!(doc["transitions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn adding_missing_field_type_reference_is_rejected() {
    let (_dir, project) = seeded_project().await;
    let err = project
        .resource("decision/cardTypes/decision")
        .unwrap()
        .update(
            &FieldSelector::new("customFields"),
            &Operation::Add {
                target: json!({"name": "decision/fieldTypes/doesNotExist"}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReferenceNotFound(_)));
}

#[tokio::test]
async fn deleting_a_field_type_leaves_dangling_references() {
    // Observed behavior: delete does not cascade-null dependents; the stale
    // reference stays until validation surfaces it.
    let (_dir, project) = seeded_project().await;
    project
        .resource("decision/fieldTypes/estimate")
        .unwrap()
        .delete()
        .await
        .unwrap();

    let doc = project
        .resource("decision/cardTypes/decision")
        .unwrap()
        .show()
        .await
        .unwrap();
    assert_eq!(
        doc["customFields"][0]["name"],
        json!("decision/fieldTypes/estimate")
    );
}

#[tokio::test]
async fn module_import_and_removal() {
    let dir = tempdir().unwrap();
    let module = Project::create(&dir.path().join("module"), "base")
        .await
        .unwrap();
    module
        .resource("base/workflows/simple")
        .unwrap()
        .create(None)
        .await
        .unwrap();

    let project = Project::create(&dir.path().join("proj"), "decision")
        .await
        .unwrap();
    let prefix = project.import_module(module.path()).await.unwrap();
    assert_eq!(prefix, "base");
    assert_eq!(
        project.prefixes().await.unwrap(),
        vec!["decision".to_string(), "base".to_string()]
    );
    assert!(
        project
            .resource_exists(&ResourceName::parse("base/workflows/simple").unwrap())
            .await
    );

    // Module resources are visible but read-only.
    let err = project
        .resource("base/workflows/simple")
        .unwrap()
        .delete()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));

    let err = project.import_module(module.path()).await.unwrap_err();
    assert!(matches!(err, Error::ModuleExists(_)));

    project.remove_module("base").await.unwrap();
    assert!(
        !project
            .resource_exists(&ResourceName::parse("base/workflows/simple").unwrap())
            .await
    );
    let err = project.remove_module("base").await.unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound(_)));
}

#[tokio::test]
async fn resource_tree_spans_local_and_modules() {
    let dir = tempdir().unwrap();
    let module = Project::create(&dir.path().join("module"), "base")
        .await
        .unwrap();
    module
        .resource("base/workflows/simple")
        .unwrap()
        .create(None)
        .await
        .unwrap();

    let project = Project::create(&dir.path().join("proj"), "decision")
        .await
        .unwrap();
    project
        .resource("decision/workflows/simple")
        .unwrap()
        .create(None)
        .await
        .unwrap();
    project.import_module(module.path()).await.unwrap();

    let tree = resource_tree(&project).await.unwrap();
    assert_eq!(tree.kind, NodeKind::Group);
    let ids: Vec<&str> = tree.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["local", "modules"]);

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["children"][1]["children"][0]["kind"], json!("module"));
}

#[tokio::test]
async fn card_lifecycle_under_parent() {
    let (_dir, project) = seeded_project().await;
    let parent = project
        .create_card("decision/cardTypes/decision", None, "Parent")
        .await
        .unwrap();
    let child = project
        .create_card("decision/cardTypes/decision", Some(&parent.key), "Child")
        .await
        .unwrap();

    let cards = project.cards().await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].children.len(), 1);
    assert_eq!(cards[0].children[0].key, child.key);
    assert_eq!(
        cards[0].metadata.as_ref().unwrap().workflow_state,
        "Draft",
        "initial state comes from the workflow"
    );

    project.card_root().remove_card(&parent.key).await.unwrap();
    assert!(project.cards().await.unwrap().is_empty());
    let err = project.card(&child.key, false).await.unwrap_err();
    assert!(matches!(err, Error::CardNotFound(_)));
}
