use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown request kind: {0}")]
    UnknownRequestKind(String),

    #[error("instance {instance} is not accessible to user {user}")]
    InstanceNotAccessible { user: String, instance: String },

    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
