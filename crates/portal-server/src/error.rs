use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use portal_sdk::{
    AggregateError, RoutingError, SdkError, SessionError, StoreError, SyncError, TypeError,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Sdk(e) => sdk_status(e),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn sdk_status(e: &SdkError) -> StatusCode {
    match e {
        SdkError::UnknownUser(_) => StatusCode::NOT_FOUND,
        SdkError::Routing(e) if e.is_configuration() => StatusCode::UNPROCESSABLE_ENTITY,
        SdkError::Routing(RoutingError::NoAccessibleInstance { .. }) => StatusCode::NOT_FOUND,
        SdkError::Routing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SdkError::Aggregate(AggregateError::NotAggregate(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        SdkError::Aggregate(_) => StatusCode::BAD_GATEWAY,
        SdkError::Sync(SyncError::SyncInProgress { .. }) => StatusCode::CONFLICT,
        SdkError::Sync(SyncError::Session(e)) | SdkError::Session(e) => session_status(e),
        SdkError::Sync(SyncError::TaskFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        SdkError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        SdkError::Store(StoreError::Unavailable(..) | StoreError::Rejected { .. }) => {
            StatusCode::BAD_GATEWAY
        }
        SdkError::Store(StoreError::Serialization(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        SdkError::Diff(_) | SdkError::InvalidEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SdkError::Type(TypeError::InstanceNotAccessible { .. }) => StatusCode::FORBIDDEN,
        SdkError::Type(_) => StatusCode::BAD_REQUEST,
        SdkError::Directory(_) | SdkError::Config(_) | SdkError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn session_status(e: &SessionError) -> StatusCode {
    match e {
        SessionError::AlreadyCommitted(_) => StatusCode::GONE,
        SessionError::UnknownSession(_) | SessionError::UnknownConflict(_) => StatusCode::NOT_FOUND,
        SessionError::InstanceNotAccessible { .. } => StatusCode::FORBIDDEN,
        SessionError::InvalidResolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        }
        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        if let Self::Sdk(SdkError::Aggregate(e)) = &self {
            if let Some(errors) = e.instance_errors() {
                body["instances"] = json!(errors);
            }
        }
        (status, Json(body)).into_response()
    }
}
