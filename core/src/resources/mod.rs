//! Resource objects and the generic update-operation protocol.
//!
//! A Cyberismo project stores its configuration as typed *resources*:
//! workflows, card types, field types, link types, templates, reports,
//! graph models/views, and calculations. Each resource is a JSON document on
//! disk, addressable by a structured name (`prefix/type/identifier`), and
//! mutated through a small set of generic, schema-aware operations.
//!
//! # Core Concepts
//!
//! *   **[`ResourceName`]:** the validated `prefix/type/identifier` triple.
//!     Names are immutable value objects; renaming a resource produces a new
//!     name and moves the underlying files.
//! *   **[`Resource`]:** the closed set of resource-type classes, selected by
//!     the type segment of the name. All of them share the same
//!     create/update/rename/delete/validate/show/usage surface and differ in
//!     creation defaults, referential checks, and cascades.
//! *   **[`Operation`]:** one of `add`/`remove`/`change`/`rank`, applied to a
//!     scalar or ordered-array field picked by a [`FieldSelector`].
//! *   **[`ResourceCollector`]:** per-type in-memory listings of local and
//!     module resources, refreshed on demand after mutations.
//!
//! # Validate-then-persist
//!
//! Every mutation builds a candidate document, validates it against the
//! resource type's schema, and only then rewrites the file. An operation that
//! would produce an invalid document is rejected with no partial write.
//! Cross-resource cascades (rename propagation, data-type coercion of card
//! values) run after the primary write and are best effort: a failure partway
//! through the scan is logged and the scan continues. They are not
//! transactional.
//!
//! # On-disk layout
//!
//! Single-file resources live at `<type>/<identifier>.json` (calculations add
//! a sibling `<identifier>.lp` logic program). Folder resources own
//! `<type>/<identifier>/` with a metadata file plus content files, e.g. a
//! report's `query.lp.hbs`, `index.adoc.hbs`, and `parameterSchema.json`.

pub use self::collector::{CollectedResource, ResourceCollector};
pub use self::name::{
    ContentFileName, ContentFileSpec, ResourceLayout, ResourceName, ResourceType,
};
pub use self::operation::{FieldSelector, Operation};
pub use self::resource::Resource;
pub use self::tree::{NodeKind, ResourceTreeNode, resource_tree};

pub mod calculation;
pub mod card_type;
pub mod field_type;
pub mod graph;
pub mod link_type;
pub mod report;
pub mod template;
pub mod workflow;

mod collector;
pub(crate) mod name;
mod object;
mod operation;
mod resource;
pub mod schema;
mod tree;

use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Invalid resource name: {0}")]
    InvalidName(String),

    #[error(
        "Resource name can only refer to project that it is part of. \
         Prefix '{prefix}' is not included in '{known:?}'"
    )]
    PrefixMismatch { prefix: String, known: Vec<String> },

    #[error("Resource name type '{actual}' does not match expected type '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("Workflow '{0}' does not exist in the project")]
    WorkflowNotFound(String),

    #[error("Referenced resource '{0}' does not exist in the project")]
    ReferenceNotFound(String),

    #[error("Schema '{schema}' validation failed: {detail}")]
    SchemaValidation { schema: String, detail: String },

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Resource '{0}' does not exist in the project")]
    NotFound(String),

    #[error("Resource '{0}' already exists in the project")]
    AlreadyExists(String),

    #[error("Can only rename project resources")]
    CrossProjectRename,

    #[error("Cannot change resource type")]
    TypeChange,

    #[error("'{target}' cannot be removed because it is still used by {holder}")]
    InUse { target: String, holder: String },

    #[error("Card '{0}' does not exist in the project")]
    CardNotFound(String),

    #[error("Path is not a Cyberismo project (missing '.cards' subdirectory): {0}")]
    NotAProject(PathBuf),

    #[error("Cannot create project: path exists and is not an empty directory: {0}")]
    ProjectCreationConflict(PathBuf),

    #[error("Project configuration file is missing or invalid: {0}")]
    InvalidProjectConfig(PathBuf),

    #[error("Module '{0}' is already imported")]
    ModuleExists(String),

    #[error("Module '{0}' is not imported")]
    ModuleNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Metadata serialization/deserialization error")]
    Metadata(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;
