//! Error types for the querychain crate.

use thiserror::Error;

/// Errors that can occur when encoding, decoding or persisting query chains.
///
/// Evaluation never produces these: a chain that cannot be evaluated against a
/// candidate simply does not match it.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No built-in or registered kind has the given tag.
    #[error("unknown value kind '{0}'")]
    UnknownKind(String),

    /// The payload could not be parsed as a value of the given kind.
    #[error("failed to decode {kind} value: {reason}")]
    DecodingError { kind: String, reason: String },

    /// A serialized node carries a connector but no linked node.
    #[error("serialized node has a link but no linked node")]
    LinkWithoutLinkedNode,

    /// The display name does not match any field of the entity.
    #[error("unknown field name '{0}'")]
    UnknownFieldName(String),

    /// A filter with this name already exists for the entity type.
    #[error("a filter named '{0}' already exists")]
    DuplicateName(String),

    /// No filter with this name is stored for the entity type.
    #[error("no filter named '{0}'")]
    NodeNotFound(String),

    /// The process-wide kind registry was already installed.
    #[error("the global kind registry is already installed")]
    RegistryAlreadyInstalled,

    /// JSON encoding or decoding of a persisted document failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing store failed to read or write.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a decoding error for a value kind.
    pub fn decoding(kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::DecodingError {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for querychain operations.
pub type Result<T> = std::result::Result<T, QueryError>;
