//! Error types for the diff crate.

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Only JSON objects can be flattened into field paths.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Two paths disagree about whether a segment is a leaf or an object.
    #[error("field path collision at {0}")]
    PathCollision(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
