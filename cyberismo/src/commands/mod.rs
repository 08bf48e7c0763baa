use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cyberismo_core::project::Project;
use cyberismo_core::resources::schema::DataType;
use cyberismo_core::resources::{FieldSelector, Operation, ResourceName, resource_tree};
use serde_json::Value;
use tracing::info;

use crate::cli::{
    CardAddArgs, CardCommands, CardRemoveArgs, CardShowArgs, CreateArgs, InitArgs, ListArgs,
    ModuleCommands, ModuleImportArgs, ModuleRemoveArgs, RemoveArgs, RenameArgs, ShowArgs,
    UpdateArgs, UsageArgs, ValidateArgs,
};

// --- Handler Functions ---

pub async fn handle_init(args: &InitArgs) -> Result<()> {
    let project = Project::create(&args.path, &args.prefix)
        .await
        .with_context(|| format!("Failed to create project at {}", args.path.display()))?;
    println!(
        "Created project '{}' at {}",
        project.prefix(),
        project.path().display()
    );
    Ok(())
}

pub async fn handle_tree(project: Arc<Project>) -> Result<()> {
    let tree = resource_tree(&project).await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

pub async fn handle_list(args: ListArgs, project: Arc<Project>) -> Result<()> {
    let resource_type = args
        .resource_type
        .parse()
        .with_context(|| format!("Unknown resource type '{}'", args.resource_type))?;
    for name in project.resource_names(resource_type).await {
        println!("{name}");
    }
    Ok(())
}

pub async fn handle_show(args: ShowArgs, project: Arc<Project>) -> Result<()> {
    let doc = project.resource(&args.name)?.show().await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub async fn handle_create(args: CreateArgs, project: Arc<Project>) -> Result<()> {
    let resource = project.resource(&args.name)?;

    if let Some(workflow) = &args.workflow {
        let Some(card_type) = resource.as_card_type() else {
            bail!("--workflow only applies to cardTypes");
        };
        card_type.create_card_type(workflow).await?;
    } else if let Some(data_type) = &args.data_type {
        let Some(field_type) = resource.as_field_type() else {
            bail!("--data-type only applies to fieldTypes");
        };
        let data_type: DataType = data_type
            .parse()
            .with_context(|| format!("Unknown data type '{data_type}'"))?;
        field_type.create_field_type(data_type).await?;
    } else {
        let content = match &args.content {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Some(serde_json::from_str(&text)?)
            }
            None => None,
        };
        resource.create(content).await?;
    }
    info!("Created resource '{}'", args.name);
    println!("Created {}", args.name);
    Ok(())
}

pub async fn handle_update(args: UpdateArgs, project: Arc<Project>) -> Result<()> {
    let field = match &args.sub_key {
        Some(sub_key) => FieldSelector::with_sub_key(&args.key, sub_key),
        None => FieldSelector::new(&args.key),
    };
    let op = parse_operation(&args)?;

    project.resource(&args.name)?.update(&field, &op).await?;
    println!("Updated {}", args.name);
    Ok(())
}

pub async fn handle_rename(args: RenameArgs, project: Arc<Project>) -> Result<()> {
    let to = ResourceName::parse(&args.to)?;
    project.resource(&args.from)?.rename(&to).await?;
    println!("Renamed {} to {}", args.from, args.to);
    Ok(())
}

pub async fn handle_remove(args: RemoveArgs, project: Arc<Project>) -> Result<()> {
    project.resource(&args.name)?.delete().await?;
    println!("Removed {}", args.name);
    Ok(())
}

pub async fn handle_validate(args: ValidateArgs, project: Arc<Project>) -> Result<()> {
    match project.resource(&args.name)?.validate().await {
        Ok(()) => {
            println!("{} is valid", args.name);
            Ok(())
        }
        Err(e) => bail!("{} is invalid: {}", args.name, e),
    }
}

pub async fn handle_usage(args: UsageArgs, project: Arc<Project>) -> Result<()> {
    let holders = project.resource(&args.name)?.usage().await?;
    if holders.is_empty() {
        println!("{} is not referenced", args.name);
    } else {
        for holder in holders {
            println!("{holder}");
        }
    }
    Ok(())
}

pub async fn handle_card(command: CardCommands, project: Arc<Project>) -> Result<()> {
    match command {
        CardCommands::Add(args) => handle_card_add(args, project).await,
        CardCommands::Show(args) => handle_card_show(args, project).await,
        CardCommands::List => handle_card_list(project).await,
        CardCommands::Remove(args) => handle_card_remove(args, project).await,
    }
}

async fn handle_card_add(args: CardAddArgs, project: Arc<Project>) -> Result<()> {
    let card = match &args.template {
        Some(template) => {
            let resource = project.resource(template)?;
            let Some(template) = resource.as_template() else {
                bail!("'{template}' is not a template");
            };
            template
                .add_card(&args.card_type, args.parent.as_deref(), &args.title)
                .await?
        }
        None => {
            project
                .create_card(&args.card_type, args.parent.as_deref(), &args.title)
                .await?
        }
    };
    println!("Created card {}", card.key);
    Ok(())
}

async fn handle_card_show(args: CardShowArgs, project: Arc<Project>) -> Result<()> {
    let card = project.card(&args.key, true).await?;
    if let Some(metadata) = &card.metadata {
        println!("{}", serde_json::to_string_pretty(metadata)?);
    }
    if let Some(content) = &card.content {
        if !content.is_empty() {
            println!("\n{content}");
        }
    }
    if !card.attachments.is_empty() {
        println!("\nAttachments: {}", card.attachments.join(", "));
    }
    Ok(())
}

async fn handle_card_list(project: Arc<Project>) -> Result<()> {
    let cards = project.cards().await?;
    print_card_tree(&cards, 0);
    Ok(())
}

fn print_card_tree(cards: &[cyberismo_core::cards::Card], depth: usize) {
    for card in cards {
        let title = card
            .metadata
            .as_ref()
            .map(|m| m.title.as_str())
            .unwrap_or("(no metadata)");
        println!("{}{}  {}", "  ".repeat(depth), card.key, title);
        print_card_tree(&card.children, depth + 1);
    }
}

async fn handle_card_remove(args: CardRemoveArgs, project: Arc<Project>) -> Result<()> {
    project.card_root().remove_card(&args.key).await?;
    println!("Removed card {}", args.key);
    Ok(())
}

pub async fn handle_module(command: ModuleCommands, project: Arc<Project>) -> Result<()> {
    match command {
        ModuleCommands::Import(args) => handle_module_import(args, project).await,
        ModuleCommands::Remove(args) => handle_module_remove(args, project).await,
        ModuleCommands::List => {
            for prefix in project.module_prefixes().await? {
                println!("{prefix}");
            }
            Ok(())
        }
    }
}

async fn handle_module_import(args: ModuleImportArgs, project: Arc<Project>) -> Result<()> {
    let prefix = project.import_module(&args.path).await?;
    println!("Imported module '{prefix}'");
    Ok(())
}

async fn handle_module_remove(args: ModuleRemoveArgs, project: Arc<Project>) -> Result<()> {
    project.remove_module(&args.prefix).await?;
    println!("Removed module '{}'", args.prefix);
    Ok(())
}

/// Builds an operation from the flag triplet; values parse as JSON, with
/// bare words falling back to plain strings.
fn parse_operation(args: &UpdateArgs) -> Result<Operation> {
    let target = || -> Result<Value> {
        let raw = args
            .target
            .as_deref()
            .context("--target is required for this operation")?;
        Ok(parse_json_value(raw))
    };

    match args.op.as_str() {
        "add" => Ok(Operation::Add { target: target()? }),
        "remove" => Ok(Operation::Remove { target: target()? }),
        "change" => {
            let raw = args
                .to
                .as_deref()
                .context("--to is required for change operations")?;
            Ok(Operation::Change {
                target: args
                    .target
                    .as_deref()
                    .map(parse_json_value)
                    .unwrap_or(Value::Null),
                to: parse_json_value(raw),
            })
        }
        "rank" => Ok(Operation::Rank {
            target: target()?,
            new_index: args.index.context("--index is required for rank operations")?,
        }),
        other => bail!("Unknown operation '{other}' (expected add, remove, change, or rank)"),
    }
}

fn parse_json_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
