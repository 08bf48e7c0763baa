//! Schema registry for resource documents.
//!
//! Each resource type maps to a typed document struct. Validation of a
//! candidate document is typed deserialization (unknown fields rejected)
//! followed by the cross-field checks serde cannot express, such as
//! transitions referencing declared workflow states or visible-field lists
//! being a subset of the card type's custom fields.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resources::name::{ResourceName, ResourceType};
use crate::resources::{Error, Result};

/// Wildcard accepted in a transition's `fromState` list, meaning "any state".
pub const ANY_STATE: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub states: Vec<WorkflowState>,
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowState {
    pub name: String,
    pub category: StateCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateCategory {
    Initial,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowTransition {
    pub name: String,
    pub from_state: Vec<String>,
    pub to_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CardTypeDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub workflow: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub always_visible_fields: Vec<String>,
    #[serde(default)]
    pub optionally_visible_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldTypeDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<EnumDefinition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    ShortText,
    LongText,
    Number,
    Integer,
    Boolean,
    Date,
    DateTime,
    Person,
    Enum,
    List,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::ShortText => "shortText",
            DataType::LongText => "longText",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::Person => "person",
            DataType::Enum => "enum",
            DataType::List => "list",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string())).map_err(|_| {
            Error::InvalidOperation(format!("'{}' is not a valid field data type", s))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnumDefinition {
    pub enum_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkTypeDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Empty list means "any card type".
    #[serde(default)]
    pub source_card_types: Vec<String>,
    #[serde(default)]
    pub destination_card_types: Vec<String>,
    #[serde(default)]
    pub inbound_display_name: String,
    #[serde(default)]
    pub outbound_display_name: String,
    #[serde(default)]
    pub enable_link_description: bool,
}

/// Shared document shape of templates, reports, graph models/views, and
/// calculations: a metadata header whose real payload lives in content files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetadataDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Validates a candidate document against the schema for `resource_type`.
///
/// Fails with [`Error::SchemaValidation`] naming the schema id and the
/// offending property. The document is not modified; callers persist only
/// after this returns `Ok`.
pub fn validate(resource_type: ResourceType, doc: &Value) -> Result<()> {
    let schema = resource_type.schema_id();
    match resource_type {
        ResourceType::Workflows => {
            let wf: WorkflowDoc = deserialize(schema, doc)?;
            check_name(schema, resource_type, &wf.name)?;
            check_workflow(schema, &wf)
        }
        ResourceType::CardTypes => {
            let ct: CardTypeDoc = deserialize(schema, doc)?;
            check_name(schema, resource_type, &ct.name)?;
            check_card_type(schema, &ct)
        }
        ResourceType::FieldTypes => {
            let ft: FieldTypeDoc = deserialize(schema, doc)?;
            check_name(schema, resource_type, &ft.name)?;
            check_field_type(schema, &ft)
        }
        ResourceType::LinkTypes => {
            let lt: LinkTypeDoc = deserialize(schema, doc)?;
            check_name(schema, resource_type, &lt.name)
        }
        ResourceType::Templates
        | ResourceType::Reports
        | ResourceType::GraphModels
        | ResourceType::GraphViews
        | ResourceType::Calculations => {
            let md: MetadataDoc = deserialize(schema, doc)?;
            check_name(schema, resource_type, &md.name)
        }
    }
}

fn deserialize<T: for<'de> Deserialize<'de>>(schema: &str, doc: &Value) -> Result<T> {
    serde_json::from_value(doc.clone()).map_err(|e| Error::SchemaValidation {
        schema: schema.to_string(),
        detail: e.to_string(),
    })
}

fn invalid(schema: &str, detail: impl Into<String>) -> Error {
    Error::SchemaValidation {
        schema: schema.to_string(),
        detail: detail.into(),
    }
}

/// The `name` field must be a full resource name of the document's own type.
fn check_name(schema: &str, resource_type: ResourceType, name: &str) -> Result<()> {
    let parsed = ResourceName::parse(name)
        .map_err(|e| invalid(schema, format!("property 'name': {}", e)))?;
    parsed
        .assert_type_matches(resource_type)
        .map_err(|e| invalid(schema, format!("property 'name': {}", e)))
}

fn check_workflow(schema: &str, wf: &WorkflowDoc) -> Result<()> {
    let mut states = HashSet::new();
    for state in &wf.states {
        if !states.insert(state.name.as_str()) {
            return Err(invalid(
                schema,
                format!("property 'states': duplicate state '{}'", state.name),
            ));
        }
    }
    for transition in &wf.transitions {
        if !states.contains(transition.to_state.as_str()) {
            return Err(invalid(
                schema,
                format!(
                    "property 'transitions': transition '{}' targets unknown state '{}'",
                    transition.name, transition.to_state
                ),
            ));
        }
        for from in &transition.from_state {
            // Empty string marks the creation transition; '*' matches any state.
            if !from.is_empty() && from != ANY_STATE && !states.contains(from.as_str()) {
                return Err(invalid(
                    schema,
                    format!(
                        "property 'transitions': transition '{}' leaves unknown state '{}'",
                        transition.name, from
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_card_type(schema: &str, ct: &CardTypeDoc) -> Result<()> {
    let fields: HashSet<&str> = ct.custom_fields.iter().map(|f| f.name.as_str()).collect();
    if fields.len() != ct.custom_fields.len() {
        return Err(invalid(schema, "property 'customFields': duplicate entry"));
    }
    for (list, property) in [
        (&ct.always_visible_fields, "alwaysVisibleFields"),
        (&ct.optionally_visible_fields, "optionallyVisibleFields"),
    ] {
        for entry in list {
            if !fields.contains(entry.as_str()) {
                return Err(invalid(
                    schema,
                    format!(
                        "property '{}': '{}' is not one of the customFields",
                        property, entry
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_field_type(schema: &str, ft: &FieldTypeDoc) -> Result<()> {
    if let Some(values) = &ft.enum_values {
        let mut seen = HashSet::new();
        for value in values {
            if !seen.insert(value.enum_value.as_str()) {
                return Err(invalid(
                    schema,
                    format!(
                        "property 'enumValues': duplicate enumValue '{}'",
                        value.enum_value
                    ),
                ));
            }
        }
    }
    Ok(())
}
