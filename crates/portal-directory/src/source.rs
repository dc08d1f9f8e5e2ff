//! The external source of per-user instance access.

use std::collections::HashMap;

use async_trait::async_trait;
use portal_types::{Instance, UserId};

use crate::error::DirectoryResult;

/// Supplies the instances a user may access, as established at login.
#[async_trait]
pub trait AccessSource: Send + Sync {
    async fn accessible_instances(&self, user: &UserId) -> DirectoryResult<Vec<Instance>>;
}

/// An access source backed by a fixed table. Unknown users have no instances.
#[derive(Clone, Debug, Default)]
pub struct StaticAccessSource {
    entries: HashMap<UserId, Vec<Instance>>,
}

impl StaticAccessSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<UserId>, instances: Vec<Instance>) -> Self {
        self.entries.insert(user.into(), instances);
        self
    }
}

#[async_trait]
impl AccessSource for StaticAccessSource {
    async fn accessible_instances(&self, user: &UserId) -> DirectoryResult<Vec<Instance>> {
        Ok(self.entries.get(user).cloned().unwrap_or_default())
    }
}
