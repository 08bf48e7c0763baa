use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Cyberismo: manage file-backed card projects and their resources.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default project path detection.
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project.
    Init(InitArgs),
    /// Print the resource tree (local and module resources).
    Tree,
    /// List resource names of one type.
    List(ListArgs),
    /// Show a resource's full document, content files included.
    Show(ShowArgs),
    /// Create a resource.
    Create(CreateArgs),
    /// Apply one update operation to a resource field.
    Update(UpdateArgs),
    /// Rename a resource within the project.
    Rename(RenameArgs),
    /// Delete a resource.
    Remove(RemoveArgs),
    /// Validate a resource against its schema.
    Validate(ValidateArgs),
    /// List the cards and resources referencing a resource.
    Usage(UsageArgs),
    /// Manage cards.
    Card(CardArgs),
    /// Manage imported modules.
    Module(ModuleArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to create the project in.
    pub path: PathBuf,

    /// Card key prefix for the new project (3-10 lowercase letters).
    #[arg(long)]
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Resource type (e.g. workflows, cardTypes, fieldTypes).
    pub resource_type: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,

    /// JSON file holding the resource document; a default is synthesized
    /// when omitted.
    #[arg(long)]
    pub content: Option<PathBuf>,

    /// Workflow name for card type creation.
    #[arg(long)]
    pub workflow: Option<String>,

    /// Data type for field type creation.
    #[arg(long)]
    pub data_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,

    /// Field key to operate on (a document field or a content-file key).
    #[arg(long)]
    pub key: String,

    /// Nested key inside an object-valued field.
    #[arg(long)]
    pub sub_key: Option<String>,

    /// Operation name: add, remove, change, or rank.
    #[arg(long)]
    pub op: String,

    /// Target value as JSON (bare strings are taken literally).
    #[arg(long)]
    pub target: Option<String>,

    /// Replacement value as JSON, for change operations.
    #[arg(long)]
    pub to: Option<String>,

    /// New index, for rank operations.
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Current resource name.
    pub from: String,

    /// New resource name (same prefix and type).
    pub to: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,
}

#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Full resource name (prefix/type/identifier).
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CardArgs {
    #[command(subcommand)]
    pub command: CardCommands,
}

#[derive(Subcommand, Debug)]
pub enum CardCommands {
    /// Create a card in the project (or under a parent card).
    Add(CardAddArgs),
    /// Show a card's metadata and content.
    Show(CardShowArgs),
    /// List the project's card tree.
    List,
    /// Remove a card and its children.
    Remove(CardRemoveArgs),
}

#[derive(Args, Debug)]
pub struct CardAddArgs {
    /// Card type resource name.
    pub card_type: String,

    /// Card title.
    pub title: String,

    /// Parent card key; top level when omitted.
    #[arg(long)]
    pub parent: Option<String>,

    /// Create the card inside this template instead of the project.
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args, Debug)]
pub struct CardShowArgs {
    /// Card key.
    pub key: String,
}

#[derive(Args, Debug)]
pub struct CardRemoveArgs {
    /// Card key.
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub command: ModuleCommands,
}

#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    /// Import another project's resources as a module.
    Import(ModuleImportArgs),
    /// Remove an imported module.
    Remove(ModuleRemoveArgs),
    /// List imported module prefixes.
    List,
}

#[derive(Args, Debug)]
pub struct ModuleImportArgs {
    /// Path of the project to import.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ModuleRemoveArgs {
    /// Prefix of the module to remove.
    pub prefix: String,
}
