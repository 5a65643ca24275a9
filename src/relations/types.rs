//! Core relation type definitions.
//!
//! Defines [`RelationType`] (the four entity kinds and their key properties),
//! [`Relation`] (a stored record with an open property bag), [`DeclareMode`]
//! and the deterministic id scheme.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Open property bag carried by every relation.
pub type Properties = Map<String, Value>;

/// Properties the store owns; caller-supplied values are dropped on declare.
pub const RESERVED_PROPERTIES: [&str; 2] = ["deleted", "deleted_at"];

/// The kinds of entity the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    /// A generated command-line tool.
    Tool,
    /// A derived document (viewer output, documentation, reports).
    Artifact,
    /// A document fetched from a URL.
    #[serde(rename = "URLArtifact")]
    UrlArtifact,
    /// One agent conversation.
    MemorySession,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        Self::Tool,
        Self::Artifact,
        Self::UrlArtifact,
        Self::MemorySession,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "Tool",
            Self::Artifact => "Artifact",
            Self::UrlArtifact => "URLArtifact",
            Self::MemorySession => "MemorySession",
        }
    }

    /// The property whose value identifies a relation within its type.
    pub fn key_property(&self) -> &'static str {
        match self {
            Self::Tool | Self::Artifact => "name",
            Self::UrlArtifact => "url",
            Self::MemorySession => "session_id",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Artifact => "artifact",
            Self::UrlArtifact => "url",
            Self::MemorySession => "session",
        }
    }

    /// Whether the key value appears verbatim as a path segment.
    fn key_is_path_segment(&self) -> bool {
        !matches!(self, Self::UrlArtifact)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Tool" => Ok(Self::Tool),
            "Artifact" => Ok(Self::Artifact),
            "URLArtifact" => Ok(Self::UrlArtifact),
            "MemorySession" => Ok(Self::MemorySession),
            _ => Err(ValidationError::UnknownType(s.to_string())),
        }
    }
}

/// How a declare treats the properties of an existing relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclareMode {
    /// New keys overlay the old property bag.
    #[default]
    Merge,
    /// The new bag replaces the old one entirely.
    Replace,
}

impl DeclareMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

impl std::str::FromStr for DeclareMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            _ => Err(ValidationError::InvalidProperty {
                property: "mode".into(),
                reason: format!("expected `merge` or `replace`, got `{s}`"),
            }),
        }
    }
}

/// A relation record, matching the `relations` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Deterministic id derived from type and key; never changes.
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub properties: Properties,
    /// Content store id of the relation's bytes, if it has any.
    pub content_id: Option<String>,
    /// RFC 3339 UTC timestamp with microseconds; sorts lexicographically.
    pub created_at: String,
    pub updated_at: String,
}

impl Relation {
    pub fn str_prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn bool_prop(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }

    /// String items of an array property. A bare string counts as a one-item list.
    pub fn string_list(&self, key: &str) -> Vec<&str> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    /// Value of the type's key property.
    pub fn key(&self) -> &str {
        self.str_prop(self.relation_type.key_property())
            .unwrap_or(self.id.as_str())
    }

    /// `name` when present, otherwise the key.
    pub fn display_name(&self) -> &str {
        self.str_prop("name").unwrap_or_else(|| self.key())
    }

    pub fn is_deleted(&self) -> bool {
        self.bool_prop("deleted").unwrap_or(false)
    }

    pub fn is_auto_spawned(&self) -> bool {
        self.bool_prop("auto_spawned").unwrap_or(false)
    }

    /// `YYYY-MM-DD` part of `created_at`.
    pub fn created_date(&self) -> &str {
        self.created_at.get(..10).unwrap_or(self.created_at.as_str())
    }
}

/// Deterministic relation id: `<prefix>-<slug>-<12 hex of sha256(type \0 key)>`.
pub fn relation_id(relation_type: RelationType, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relation_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}-{}", relation_type.id_prefix(), slug(key), &digest[..12])
}

/// Lowercase ASCII alphanumerics joined by single dashes, at most 40 chars.
pub fn slug(value: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
        if out.len() >= 40 {
            break;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Current time in the store's timestamp format.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Check a property bag against its type's requirements and return the key.
///
/// Fills in a generated `session_id` for a `MemorySession` that has none and
/// strips reserved properties.
pub fn validate_properties(
    relation_type: RelationType,
    properties: &mut Properties,
) -> Result<String, ValidationError> {
    for reserved in RESERVED_PROPERTIES {
        properties.remove(reserved);
    }

    if relation_type == RelationType::MemorySession {
        require_string(relation_type, properties, "agent")?;
        if !properties.contains_key("session_id") {
            properties.insert(
                "session_id".into(),
                Value::String(uuid::Uuid::now_v7().to_string()),
            );
        }
    }

    let key_property = relation_type.key_property();
    let key = require_string(relation_type, properties, key_property)?;
    if relation_type.key_is_path_segment() {
        if let Some(reason) = unusable_segment(&key) {
            return Err(ValidationError::InvalidProperty {
                property: key_property.into(),
                reason: reason.into(),
            });
        }
    }

    for list_property in ["transforms", "tags"] {
        if let Some(value) = properties.get(list_property) {
            let ok = match value {
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            };
            if !ok {
                return Err(ValidationError::InvalidProperty {
                    property: list_property.into(),
                    reason: "must be a list of strings".into(),
                });
            }
        }
    }

    Ok(key)
}

/// Why `key` cannot name a path segment, if it cannot.
fn unusable_segment(key: &str) -> Option<&'static str> {
    if key.contains('/') {
        Some("must not contain `/`")
    } else if key == "." || key == ".." {
        Some("must not be `.` or `..`")
    } else if key.trim() != key {
        Some("must not start or end with whitespace")
    } else {
        None
    }
}

fn require_string(
    relation_type: RelationType,
    properties: &Properties,
    property: &str,
) -> Result<String, ValidationError> {
    match properties.get(property) {
        None | Some(Value::Null) => Err(ValidationError::MissingProperty {
            relation_type: relation_type.as_str().into(),
            property: property.into(),
        }),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ValidationError::InvalidProperty {
            property: property.into(),
            reason: "must not be empty".into(),
        }),
        Some(_) => Err(ValidationError::InvalidProperty {
            property: property.into(),
            reason: "must be a string".into(),
        }),
    }
}
