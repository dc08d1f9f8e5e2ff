use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use portal_types::{Instance, UserContext, UserId};
use tracing::debug;

use crate::error::{DirectoryError, DirectoryResult};
use crate::source::AccessSource;

/// Per-user instance lists, fixed at login.
///
/// Lookups never fail: an unknown user simply has no instances and no
/// primary. Entries are validated on registration so that at most one
/// instance per user is primary.
#[derive(Debug, Default)]
pub struct InstanceDirectory {
    entries: RwLock<HashMap<UserId, Vec<Instance>>>,
}

impl InstanceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user's directory entry, replacing any previous one.
    pub fn register(&self, user: UserId, instances: Vec<Instance>) -> DirectoryResult<()> {
        let primaries = instances.iter().filter(|i| i.is_primary).count();
        if primaries > 1 {
            return Err(DirectoryError::MultiplePrimaries {
                user,
                count: primaries,
            });
        }
        let mut seen = HashSet::new();
        for instance in &instances {
            if !seen.insert(&instance.id) {
                return Err(DirectoryError::DuplicateInstance {
                    user,
                    instance: instance.id.clone(),
                });
            }
        }

        debug!(user = %user, instances = instances.len(), "directory entry registered");
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(user, instances);
        Ok(())
    }

    /// Populate a user's entry from the external access source.
    pub async fn load_from(&self, source: &dyn AccessSource, user: &UserId) -> DirectoryResult<()> {
        let instances = source.accessible_instances(user).await?;
        self.register(user.clone(), instances)
    }

    /// Every instance in the user's entry, accessible or not, in login order.
    pub fn list_all(&self, user: &UserId) -> Vec<Instance> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Instances the user can currently reach, in login order.
    pub fn list_accessible(&self, user: &UserId) -> Vec<Instance> {
        self.list_all(user)
            .into_iter()
            .filter(|i| i.has_access)
            .collect()
    }

    /// The user's primary instance, whether or not it is reachable.
    pub fn primary_of(&self, user: &UserId) -> Option<Instance> {
        self.list_all(user).into_iter().find(|i| i.is_primary)
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(user)
    }

    /// Registered users, sorted.
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        users.sort();
        users
    }

    /// Build the explicit per-call context for a user.
    pub fn context_for(&self, user: &UserId) -> UserContext {
        UserContext::new(user.clone(), self.list_all(user))
    }
}
