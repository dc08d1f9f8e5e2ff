//! Error types for directory and routing operations.

use portal_types::{InstanceId, RequestKind, UserId};
use thiserror::Error;

/// Errors raised while registering a user's directory entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// More than one instance is flagged as primary for the user.
    #[error("user {user} has {count} primary instances")]
    MultiplePrimaries { user: UserId, count: usize },

    /// The same instance appears twice in one directory entry.
    #[error("duplicate instance {instance} for user {user}")]
    DuplicateInstance { user: UserId, instance: InstanceId },
}

/// Errors returned by the router. Callers must not read or write when
/// routing fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The rule's target is absent or inaccessible.
    #[error("no accessible instance for {kind} (user {user})")]
    NoAccessibleInstance { user: UserId, kind: RequestKind },

    /// No rule is configured for the request kind.
    #[error("no routing rule configured for {0}")]
    NoRule(RequestKind),

    /// The request kind name is not recognised.
    #[error("unknown request kind: {0}")]
    UnknownRequestKind(String),
}

impl RoutingError {
    /// `true` for misconfiguration rather than a user-specific outcome.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NoRule(_) | Self::UnknownRequestKind(_))
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
pub type RoutingResult<T> = Result<T, RoutingError>;
