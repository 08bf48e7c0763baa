//! Card storage: metadata, content, attachments, and the directory walker.
//!
//! A card is a directory named by its key (`<prefix>_<suffix>`), containing
//! `index.json` (metadata), `index.adoc` (content), an optional `a/`
//! directory for attachments, and an optional `c/` directory holding child
//! cards. Card trees hang off a project's `cardRoot` or off a template's
//! folder; both are walked by the same [`CardContainer`].

pub use self::container::CardContainer;

pub(crate) mod container;

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CARD_METADATA_FILE: &str = "index.json";
pub const CARD_CONTENT_FILE: &str = "index.adoc";
pub const CHILDREN_DIR: &str = "c";
pub const ATTACHMENTS_DIR: &str = "a";

/// Matches valid card directory names, e.g. `decision_4fa21b0c`.
pub static CARD_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+_[0-9a-z]+$").unwrap());

/// A link from one card to another, typed by a link-type resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLink {
    pub link_type: String,
    pub card_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
}

/// Card metadata as stored in `index.json`.
///
/// Custom-field values are keyed by the full field-type resource name and
/// flattened into the same JSON object as the fixed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    pub title: String,
    pub card_type: String,
    pub workflow_state: String,
    pub rank: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CardLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub custom_fields: Map<String, Value>,
}

impl CardMetadata {
    pub fn new(title: &str, card_type: &str, workflow_state: &str, rank: &str) -> Self {
        CardMetadata {
            title: title.to_string(),
            card_type: card_type.to_string(),
            workflow_state: workflow_state.to_string(),
            rank: rank.to_string(),
            links: Vec::new(),
            last_updated: None,
            custom_fields: Map::new(),
        }
    }
}

/// An in-memory projection of one card directory.
#[derive(Debug, Clone)]
pub struct Card {
    pub key: String,
    pub path: PathBuf,
    pub metadata: Option<CardMetadata>,
    pub content: Option<String>,
    pub children: Vec<Card>,
    pub attachments: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_name_pattern() {
        assert!(CARD_NAME_RE.is_match("decision_4fa21b0c"));
        assert!(CARD_NAME_RE.is_match("base_1"));
        assert!(!CARD_NAME_RE.is_match("decision"));
        assert!(!CARD_NAME_RE.is_match("Decision_abc"));
        assert!(!CARD_NAME_RE.is_match("decision_ABC"));
        assert!(!CARD_NAME_RE.is_match("a/b_c"));
    }

    #[test]
    fn metadata_round_trips_custom_fields() {
        let mut metadata = CardMetadata::new("Title", "decision/cardTypes/decision", "Draft", "0|a");
        metadata
            .custom_fields
            .insert("decision/fieldTypes/owner".to_string(), json!("alice"));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["title"], json!("Title"));
        assert_eq!(value["decision/fieldTypes/owner"], json!("alice"));

        let back: CardMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(
            back.custom_fields.get("decision/fieldTypes/owner"),
            Some(&json!("alice"))
        );
    }
}
