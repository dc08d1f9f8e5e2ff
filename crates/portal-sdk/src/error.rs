use portal_types::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    #[error("routing error: {0}")]
    Routing(#[from] portal_directory::RoutingError),

    #[error("directory error: {0}")]
    Directory(#[from] portal_directory::DirectoryError),

    #[error("aggregation error: {0}")]
    Aggregate(#[from] portal_aggregate::AggregateError),

    #[error("sync error: {0}")]
    Sync(#[from] portal_sync::SyncError),

    #[error("session error: {0}")]
    Session(#[from] portal_sync::SessionError),

    #[error("store error: {0}")]
    Store(#[from] portal_store::StoreError),

    #[error("diff error: {0}")]
    Diff(#[from] portal_diff::DiffError),

    #[error("{0}")]
    Type(#[from] portal_types::TypeError),

    #[error("invalid entity: {0}")]
    InvalidEntity(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
