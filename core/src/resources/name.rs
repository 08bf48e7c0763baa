use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::resources::{Error, Result};

/// Allowed characters for the identifier segment of a resource name.
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Project prefixes are short lowercase words.
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{3,10}$").unwrap());

/// The closed set of resource types the data layer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    Calculations,
    CardTypes,
    FieldTypes,
    GraphModels,
    GraphViews,
    LinkTypes,
    Reports,
    Templates,
    Workflows,
}

/// How a resource type lays its files out on disk.
///
/// Single-file resources live at `<type>/<identifier>.json`; folder resources
/// own a directory `<type>/<identifier>/` containing a metadata file plus
/// type-specific content files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLayout {
    SingleFile,
    Folder { metadata_file: &'static str },
}

/// A content file that belongs to a resource alongside its metadata JSON.
///
/// The `key` is how the file is addressed in `update`/`show` field selectors.
#[derive(Debug, Clone, Copy)]
pub struct ContentFileSpec {
    pub key: &'static str,
    pub file: ContentFileName,
}

#[derive(Debug, Clone, Copy)]
pub enum ContentFileName {
    /// Fixed file name inside the resource folder.
    Fixed(&'static str),
    /// `<identifier>.<ext>` sibling of a single-file resource.
    IdentifierWithExt(&'static str),
}

impl ContentFileSpec {
    pub fn file_name(&self, identifier: &str) -> String {
        match self.file {
            ContentFileName::Fixed(name) => name.to_string(),
            ContentFileName::IdentifierWithExt(ext) => format!("{}.{}", identifier, ext),
        }
    }
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::Calculations,
        ResourceType::CardTypes,
        ResourceType::FieldTypes,
        ResourceType::GraphModels,
        ResourceType::GraphViews,
        ResourceType::LinkTypes,
        ResourceType::Reports,
        ResourceType::Templates,
        ResourceType::Workflows,
    ];

    /// The folder (and name segment) this type uses on disk and in names.
    pub fn folder_name(&self) -> &'static str {
        match self {
            ResourceType::Calculations => "calculations",
            ResourceType::CardTypes => "cardTypes",
            ResourceType::FieldTypes => "fieldTypes",
            ResourceType::GraphModels => "graphModels",
            ResourceType::GraphViews => "graphViews",
            ResourceType::LinkTypes => "linkTypes",
            ResourceType::Reports => "reports",
            ResourceType::Templates => "templates",
            ResourceType::Workflows => "workflows",
        }
    }

    pub fn layout(&self) -> ResourceLayout {
        match self {
            ResourceType::Calculations
            | ResourceType::CardTypes
            | ResourceType::FieldTypes
            | ResourceType::LinkTypes
            | ResourceType::Workflows => ResourceLayout::SingleFile,
            ResourceType::GraphModels => ResourceLayout::Folder {
                metadata_file: "graphModel.json",
            },
            ResourceType::GraphViews => ResourceLayout::Folder {
                metadata_file: "graphView.json",
            },
            ResourceType::Reports => ResourceLayout::Folder {
                metadata_file: "report.json",
            },
            ResourceType::Templates => ResourceLayout::Folder {
                metadata_file: "template.json",
            },
        }
    }

    /// Content files stored alongside the metadata document.
    pub fn content_files(&self) -> &'static [ContentFileSpec] {
        match self {
            ResourceType::Calculations => &[ContentFileSpec {
                key: "calculation",
                file: ContentFileName::IdentifierWithExt("lp"),
            }],
            ResourceType::GraphModels => &[ContentFileSpec {
                key: "model",
                file: ContentFileName::Fixed("model.lp"),
            }],
            ResourceType::GraphViews => &[ContentFileSpec {
                key: "view",
                file: ContentFileName::Fixed("view.lp.hbs"),
            }],
            ResourceType::Reports => &[
                ContentFileSpec {
                    key: "queryTemplate",
                    file: ContentFileName::Fixed("query.lp.hbs"),
                },
                ContentFileSpec {
                    key: "contentTemplate",
                    file: ContentFileName::Fixed("index.adoc.hbs"),
                },
                ContentFileSpec {
                    key: "schema",
                    file: ContentFileName::Fixed("parameterSchema.json"),
                },
            ],
            _ => &[],
        }
    }

    pub fn content_file(&self, key: &str) -> Option<&'static ContentFileSpec> {
        self.content_files().iter().find(|spec| spec.key == key)
    }

    /// Identifier of the JSON schema documents of this type validate against.
    pub fn schema_id(&self) -> &'static str {
        match self {
            ResourceType::Calculations => "calculationSchema",
            ResourceType::CardTypes => "cardTypeSchema",
            ResourceType::FieldTypes => "fieldTypeSchema",
            ResourceType::GraphModels => "graphModelSchema",
            ResourceType::GraphViews => "graphViewSchema",
            ResourceType::LinkTypes => "linkTypeSchema",
            ResourceType::Reports => "reportSchema",
            ResourceType::Templates => "templateSchema",
            ResourceType::Workflows => "workflowSchema",
        }
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.folder_name() == s)
            .ok_or_else(|| Error::InvalidName(format!("unknown resource type '{}'", s)))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// A validated `prefix/type/identifier` resource name.
///
/// Resource names are immutable value objects; renaming a resource produces a
/// new `ResourceName` and moves the underlying storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    prefix: String,
    resource_type: ResourceType,
    identifier: String,
}

impl ResourceName {
    pub fn new(prefix: &str, resource_type: ResourceType, identifier: &str) -> Result<Self> {
        validate_prefix(prefix)?;
        validate_identifier(identifier)?;
        Ok(ResourceName {
            prefix: prefix.to_string(),
            resource_type,
            identifier: identifier.to_string(),
        })
    }

    /// Parses a `prefix/type/identifier` string into a resource name.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        let [prefix, type_segment, identifier] = segments[..] else {
            return Err(Error::InvalidName(format!(
                "expected 'prefix/type/identifier', got '{}'",
                raw
            )));
        };
        let resource_type = type_segment.parse::<ResourceType>()?;
        ResourceName::new(prefix, resource_type, identifier)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fails unless this name's prefix is one of the prefixes known to the
    /// owning project (the project's own prefix or an imported module's).
    pub fn assert_prefix_owned(&self, known_prefixes: &[String]) -> Result<()> {
        if known_prefixes.iter().any(|p| p == &self.prefix) {
            Ok(())
        } else {
            Err(Error::PrefixMismatch {
                prefix: self.prefix.clone(),
                known: known_prefixes.to_vec(),
            })
        }
    }

    /// Fails unless the type segment matches the expected resource type.
    pub fn assert_type_matches(&self, expected: ResourceType) -> Result<()> {
        if self.resource_type == expected {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: expected.folder_name().to_string(),
                actual: self.resource_type.folder_name().to_string(),
            })
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.prefix,
            self.resource_type.folder_name(),
            self.identifier
        )
    }
}

impl FromStr for ResourceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceName::parse(s)
    }
}

/// Validates the identifier segment character rules.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if IDENTIFIER_RE.is_match(identifier) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "identifier '{}' contains characters outside [A-Za-z0-9_]",
            identifier
        )))
    }
}

/// Validates the prefix segment character rules.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if PREFIX_RE.is_match(prefix) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "prefix '{}' must be 3-10 lowercase letters",
            prefix
        )))
    }
}
