//! Closed dispatch over the resource-type classes.
//!
//! The type segment of a [`ResourceName`] selects the variant; every variant
//! shares the create/update/rename/delete/validate/show/usage surface, so
//! callers resolve a name once and work through this enum.

use std::sync::Arc;

use serde_json::Value;

use crate::project::Project;
use crate::resources::calculation::CalculationResource;
use crate::resources::card_type::CardTypeResource;
use crate::resources::field_type::FieldTypeResource;
use crate::resources::graph::{GraphModelResource, GraphViewResource};
use crate::resources::link_type::LinkTypeResource;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::report::ReportResource;
use crate::resources::template::TemplateResource;
use crate::resources::workflow::WorkflowResource;
use crate::resources::{ResourceName, ResourceType, Result};

#[derive(Debug)]
pub enum Resource {
    Calculation(CalculationResource),
    CardType(CardTypeResource),
    FieldType(FieldTypeResource),
    GraphModel(GraphModelResource),
    GraphView(GraphViewResource),
    LinkType(LinkTypeResource),
    Report(ReportResource),
    Template(TemplateResource),
    Workflow(WorkflowResource),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Resource::Calculation($inner) => $body,
            Resource::CardType($inner) => $body,
            Resource::FieldType($inner) => $body,
            Resource::GraphModel($inner) => $body,
            Resource::GraphView($inner) => $body,
            Resource::LinkType($inner) => $body,
            Resource::Report($inner) => $body,
            Resource::Template($inner) => $body,
            Resource::Workflow($inner) => $body,
        }
    };
}

impl Resource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        Ok(match name.resource_type() {
            ResourceType::Calculations => {
                Resource::Calculation(CalculationResource::new(project, name)?)
            }
            ResourceType::CardTypes => Resource::CardType(CardTypeResource::new(project, name)?),
            ResourceType::FieldTypes => {
                Resource::FieldType(FieldTypeResource::new(project, name)?)
            }
            ResourceType::GraphModels => {
                Resource::GraphModel(GraphModelResource::new(project, name)?)
            }
            ResourceType::GraphViews => {
                Resource::GraphView(GraphViewResource::new(project, name)?)
            }
            ResourceType::LinkTypes => Resource::LinkType(LinkTypeResource::new(project, name)?),
            ResourceType::Reports => Resource::Report(ReportResource::new(project, name)?),
            ResourceType::Templates => Resource::Template(TemplateResource::new(project, name)?),
            ResourceType::Workflows => Resource::Workflow(WorkflowResource::new(project, name)?),
        })
    }

    pub fn name(&self) -> &ResourceName {
        dispatch!(self, r => r.name())
    }

    /// Creates the resource, from the supplied document or a type-specific
    /// default. See the typed constructors (`create_card_type`,
    /// `create_field_type`) for the parameterized creation paths.
    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        dispatch!(self, r => r.create(content).await)
    }

    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        dispatch!(self, r => r.update(field, op).await)
    }

    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        dispatch!(self, r => r.rename(to).await)
    }

    pub async fn delete(&self) -> Result<()> {
        dispatch!(self, r => r.delete().await)
    }

    pub async fn validate(&self) -> Result<()> {
        dispatch!(self, r => r.validate().await)
    }

    pub async fn show(&self) -> Result<Value> {
        dispatch!(self, r => r.show().await)
    }

    /// Card keys and resource names referencing this resource.
    pub async fn usage(&self) -> Result<Vec<String>> {
        dispatch!(self, r => r.usage().await)
    }

    pub fn as_template(&self) -> Option<&TemplateResource> {
        match self {
            Resource::Template(template) => Some(template),
            _ => None,
        }
    }

    pub fn as_card_type(&self) -> Option<&CardTypeResource> {
        match self {
            Resource::CardType(card_type) => Some(card_type),
            _ => None,
        }
    }

    pub fn as_field_type(&self) -> Option<&FieldTypeResource> {
        match self {
            Resource::FieldType(field_type) => Some(field_type),
            _ => None,
        }
    }
}
