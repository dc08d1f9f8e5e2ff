use portal_types::{ConflictId, InstanceId, SessionId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync already in progress for {user}/{entity}")]
    SyncInProgress { user: UserId, entity: String },

    #[error("sync task failed: {0}")]
    TaskFailed(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} already committed")]
    AlreadyCommitted(SessionId),

    #[error("unknown conflict {0}")]
    UnknownConflict(ConflictId),

    #[error("conflict {conflict} is on instance {instance}, which the user cannot access")]
    InstanceNotAccessible {
        conflict: ConflictId,
        instance: InstanceId,
    },

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("invalid resolution {0:?}: expected \"current\" or \"new\"")]
    InvalidResolution(String),
}

pub type EngineResult<T> = Result<T, SyncError>;
