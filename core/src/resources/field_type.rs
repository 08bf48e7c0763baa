//! Field type resources: the data-type domain of card custom fields and the
//! value coercion that runs when that domain changes.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::project::Project;
use crate::resources::object::ResourceObject;
use crate::resources::operation::{FieldSelector, Operation};
use crate::resources::schema::DataType;
use crate::resources::{Error, ResourceName, ResourceType, Result};

#[derive(Debug)]
pub struct FieldTypeResource {
    object: ResourceObject,
}

impl FieldTypeResource {
    pub fn new(project: Arc<Project>, name: ResourceName) -> Result<Self> {
        name.assert_type_matches(ResourceType::FieldTypes)?;
        Ok(FieldTypeResource {
            object: ResourceObject::new(project, name),
        })
    }

    pub fn name(&self) -> &ResourceName {
        self.object.name()
    }

    /// Creates the field type from a supplied document; `dataType` is
    /// required, so no default is synthesized without one.
    pub async fn create(&self, content: Option<Value>) -> Result<()> {
        let doc = content.ok_or_else(|| {
            Error::InvalidOperation(
                "Field type creation requires a document with a 'dataType' field".to_string(),
            )
        })?;
        self.object.create(doc, &[]).await
    }

    /// Creates the field type with the given data type. Enumerated types
    /// start with an empty value list.
    pub async fn create_field_type(&self, data_type: DataType) -> Result<()> {
        let mut doc = json!({
            "name": self.name().to_string(),
            "displayName": "",
            "dataType": data_type.as_str(),
        });
        if matches!(data_type, DataType::Enum | DataType::List) {
            doc["enumValues"] = json!([]);
        }
        self.object.create(doc, &[]).await
    }

    /// Applies an operation to the field type document.
    ///
    /// Changing `dataType` coerces every card value of this field into the
    /// new domain once the document is persisted; values outside the domain
    /// become null rather than staying stale.
    #[instrument(skip(self, op), fields(name = %self.object.name(), field = %field.key))]
    pub async fn update(&self, field: &FieldSelector, op: &Operation) -> Result<()> {
        let changed = self.object.update_with(field, op, |_| Ok(())).await?;

        if changed && field.key == "dataType" && field.sub_key.is_none() {
            self.coerce_card_values().await?;
        }
        Ok(())
    }

    async fn coerce_card_values(&self) -> Result<()> {
        let doc = self.object.read().await?;
        let Some(data_type) = doc
            .get("dataType")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DataType>().ok())
        else {
            warn!("Field type has no parseable dataType; skipping value coercion");
            return Ok(());
        };
        let enum_values: Vec<String> = doc
            .get("enumValues")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.get("enumValue").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let key = self.name().to_string();
        let coerced = self
            .object
            .project()
            .update_cards(|_, metadata| {
                let Some(current) = metadata.custom_fields.get(&key) else {
                    return false;
                };
                let next = coerce_value(current, data_type, &enum_values);
                if next == *current {
                    return false;
                }
                metadata.custom_fields.insert(key.clone(), next);
                true
            })
            .await?;
        debug!(
            "Data type changed to {}; {} card values coerced",
            data_type, coerced
        );
        Ok(())
    }

    /// Renames the field type, repointing card-type references and the
    /// custom-field keys of card metadata.
    pub async fn rename(&self, to: &ResourceName) -> Result<()> {
        let old = self.name().to_string();
        self.object.rename(to).await?;
        let new = to.to_string();

        let card_types = self
            .object
            .project()
            .update_local_resources(ResourceType::CardTypes, |doc| {
                rewrite_field_reference(doc, &old, &new)
            })
            .await?;

        let cards = self
            .object
            .project()
            .update_cards(|_, metadata| match metadata.custom_fields.remove(&old) {
                Some(value) => {
                    metadata.custom_fields.insert(new.clone(), value);
                    true
                }
                None => false,
            })
            .await?;
        debug!(
            "Field type rename updated {} card types and {} cards",
            card_types, cards
        );
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.object.delete().await
    }

    pub async fn validate(&self) -> Result<()> {
        self.object.validate().await
    }

    pub async fn show(&self) -> Result<Value> {
        self.object.show().await
    }

    /// Card types whose custom fields include this field type, plus cards
    /// carrying a value for it.
    pub async fn usage(&self) -> Result<Vec<String>> {
        let name = self.name().to_string();
        let mut holders = Vec::new();
        for (ct_name, doc) in self
            .object
            .project()
            .local_resource_documents(ResourceType::CardTypes)
            .await?
        {
            let references = doc
                .get("customFields")
                .and_then(Value::as_array)
                .is_some_and(|fields| {
                    fields
                        .iter()
                        .any(|f| f.get("name").and_then(Value::as_str) == Some(&name))
                });
            if references {
                holders.push(ct_name.to_string());
            }
        }
        holders.extend(
            self.object
                .project()
                .scan_cards(|metadata| metadata.custom_fields.contains_key(&name))
                .await?,
        );
        Ok(holders)
    }
}

/// Rewrites one field-type reference in a card type document: the
/// `customFields` entry and both visible-field lists.
fn rewrite_field_reference(doc: &mut Value, old: &str, new: &str) -> bool {
    let mut changed = false;
    if let Some(fields) = doc.get_mut("customFields").and_then(Value::as_array_mut) {
        for entry in fields {
            if entry.get("name").and_then(Value::as_str) == Some(old) {
                entry["name"] = json!(new);
                changed = true;
            }
        }
    }
    for key in ["alwaysVisibleFields", "optionallyVisibleFields"] {
        if let Some(entries) = doc.get_mut(key).and_then(Value::as_array_mut) {
            for entry in entries {
                if entry.as_str() == Some(old) {
                    *entry = json!(new);
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Coerces one card value into the domain of a data type. Values that cannot
/// be represented in the new domain become null.
fn coerce_value(value: &Value, to: DataType, enum_values: &[String]) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match to {
        DataType::Integer => match value {
            Value::Number(n) => n
                .as_f64()
                .map(|f| json!(f.trunc() as i64))
                .unwrap_or(Value::Null),
            Value::String(s) => s
                .parse::<f64>()
                .map(|f| json!(f.trunc() as i64))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        DataType::Number => match value {
            Value::Number(_) => value.clone(),
            Value::String(s) => s.parse::<f64>().ok().and_then(|f| {
                serde_json::Number::from_f64(f).map(Value::Number)
            }).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        DataType::ShortText | DataType::LongText => match value {
            Value::String(_) => value.clone(),
            Value::Number(n) => json!(n.to_string()),
            Value::Bool(b) => json!(b.to_string()),
            _ => Value::Null,
        },
        DataType::Boolean => match value {
            Value::Bool(_) => value.clone(),
            _ => Value::Null,
        },
        DataType::List => match value {
            Value::String(s) => json!([s]),
            Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
            _ => Value::Null,
        },
        DataType::Enum => match value {
            Value::String(s) if enum_values.iter().any(|v| v == s) => value.clone(),
            _ => Value::Null,
        },
        DataType::Date | DataType::DateTime | DataType::Person => match value {
            Value::String(_) => value.clone(),
            _ => Value::Null,
        },
    }
}
