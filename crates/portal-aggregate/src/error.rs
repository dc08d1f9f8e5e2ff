use std::collections::BTreeMap;

use portal_types::{InstanceId, RequestKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("every instance failed ({} errors)", errors.len())]
    AllFailed { errors: BTreeMap<InstanceId, String> },

    #[error("all-or-nothing fetch incomplete: {} instance(s) failed", errors.len())]
    Incomplete { errors: BTreeMap<InstanceId, String> },

    #[error("request kind {0} cannot be aggregated")]
    NotAggregate(RequestKind),
}

impl AggregateError {
    /// The per-instance failures behind this error, if any.
    pub fn instance_errors(&self) -> Option<&BTreeMap<InstanceId, String>> {
        match self {
            Self::AllFailed { errors } | Self::Incomplete { errors } => Some(errors),
            Self::NotAggregate(_) => None,
        }
    }
}

pub type AggregateResult<T> = Result<T, AggregateError>;
