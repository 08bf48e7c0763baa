//! File-backed data layer for Cyberismo projects: cards organized in a
//! directory tree plus typed, schema-validated JSON resources mutated
//! through generic update operations.
//!
//! Entry point is [`project::Project`]; resources are resolved by name via
//! [`Project::resource`](project::Project::resource) and mutated through the
//! closed [`resources::Resource`] dispatch.

pub mod cards;
pub mod project;
pub mod resources;
