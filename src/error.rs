//! Error taxonomy for the relation store core.
//!
//! Library operations return [`Result`]. Validation and storage failures abort a
//! declare; [`Error::NotFound`] is reserved for lookups that require a target
//! (read paths return `Option` instead); [`Error::RuleExecution`] only ever reaches
//! the log, never the caller of the declare that triggered the rule.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed input to a declare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown relation type: {0}")]
    UnknownType(String),

    #[error("{relation_type} requires property `{property}`")]
    MissingProperty {
        relation_type: String,
        property: String,
    },

    #[error("invalid property `{property}`: {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("invalid virtual path: {0}")]
    InvalidPath(String),
}

/// Failure in the persistence layer (SQLite or the content object files).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("content store {op} failed at {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Top-level error for relfs operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0} is a directory")]
    IsDirectory(String),

    #[error("{path} is ambiguous: {count} relations are bound to it")]
    Ambiguous { path: String, count: usize },

    #[error("rule `{rule_id}` failed for relation {relation_id}: {source}")]
    RuleExecution {
        rule_id: String,
        relation_id: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Sqlite(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(StorageError::Serialization(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_property_names_the_property() {
        let err = Error::from(ValidationError::MissingProperty {
            relation_type: "Tool".into(),
            property: "name".into(),
        });
        assert_eq!(
            err.to_string(),
            "validation failed: Tool requires property `name`"
        );
    }

    #[test]
    fn io_error_names_the_operation_and_path() {
        let err = Error::Storage(StorageError::Io {
            op: "write",
            path: PathBuf::from("/tmp/objects/ab/cd/ef"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        let msg = err.to_string();
        assert!(msg.contains("content store write failed"));
        assert!(msg.contains("/tmp/objects/ab/cd/ef"));
    }
}
