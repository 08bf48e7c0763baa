use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resources::{Error, Result};

/// Selects the field an [`Operation`] applies to.
///
/// `key` names a top-level field of the resource document, or the key of a
/// content file (e.g. `calculation` for a calculation's logic program).
/// `sub_key` addresses one level of nesting inside an object-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelector {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
}

impl FieldSelector {
    pub fn new(key: impl Into<String>) -> Self {
        FieldSelector {
            key: key.into(),
            sub_key: None,
        }
    }

    pub fn with_sub_key(key: impl Into<String>, sub_key: impl Into<String>) -> Self {
        FieldSelector {
            key: key.into(),
            sub_key: Some(sub_key.into()),
        }
    }
}

/// The generic unit of mutation applied to a resource field.
///
/// `add`, `remove`, and `rank` are only valid on ordered array fields.
/// `change` replaces a scalar value, or the array element deep-equal to
/// `target`. For scalar changes `target` carries the previous value and is
/// used only for the no-op short circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Operation {
    Add {
        target: Value,
    },
    Remove {
        target: Value,
    },
    Change {
        target: Value,
        to: Value,
    },
    Rank {
        target: Value,
        #[serde(rename = "newIndex")]
        new_index: usize,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Remove { .. } => "remove",
            Operation::Change { .. } => "change",
            Operation::Rank { .. } => "rank",
        }
    }
}

/// Applies an operation to an ordered array field.
///
/// Returns `true` if the array changed. Element matching is deep equality.
/// A `change` whose target matches no element is a no-op; a `remove` or
/// `rank` whose target matches no element fails.
pub(crate) fn apply_to_array(items: &mut Vec<Value>, op: &Operation) -> Result<bool> {
    match op {
        Operation::Add { target } => {
            items.push(target.clone());
            Ok(true)
        }
        Operation::Remove { target } => {
            let pos = items
                .iter()
                .position(|item| item == target)
                .ok_or_else(|| Error::ReferenceNotFound(compact(target)))?;
            items.remove(pos);
            Ok(true)
        }
        Operation::Change { target, to } => {
            match items.iter().position(|item| item == target) {
                Some(pos) => {
                    if items[pos] == *to {
                        return Ok(false);
                    }
                    items[pos] = to.clone();
                    Ok(true)
                }
                // No matching element: deliberate no-op.
                None => Ok(false),
            }
        }
        Operation::Rank { target, new_index } => {
            let pos = items
                .iter()
                .position(|item| item == target)
                .ok_or_else(|| Error::ReferenceNotFound(compact(target)))?;
            if *new_index >= items.len() {
                return Err(Error::InvalidOperation(format!(
                    "Cannot rank {} to index {}; field has {} entries",
                    compact(target),
                    new_index,
                    items.len()
                )));
            }
            if pos == *new_index {
                return Ok(false);
            }
            let item = items.remove(pos);
            items.insert(*new_index, item);
            Ok(true)
        }
    }
}

/// Applies an operation to a scalar field.
///
/// Only `change` is valid; if the new value equals the current value the
/// operation is a no-op. Returns `true` if the value changed.
pub(crate) fn apply_to_scalar(current: &mut Value, op: &Operation) -> Result<bool> {
    match op {
        Operation::Change { to, .. } => {
            if current == to {
                Ok(false)
            } else {
                *current = to.clone();
                Ok(true)
            }
        }
        other => Err(Error::InvalidOperation(format!(
            "Cannot do operation {} on scalar value",
            other.kind()
        ))),
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
