use portal_types::{InstanceId, UserId};

/// Errors from instance backend operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested entity copy does not exist in that instance.
    #[error("{entity} not found for user {user} in instance {instance}")]
    NotFound {
        user: UserId,
        instance: InstanceId,
        entity: String,
    },

    /// The instance could not be reached.
    #[error("instance {0} unavailable: {1}")]
    Unavailable(InstanceId, String),

    /// The instance refused the write.
    #[error("instance {instance} rejected write: {reason}")]
    Rejected { instance: InstanceId, reason: String },

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;
