//! Per-(user, entity) serialization of syncs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use portal_types::UserId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{EngineResult, SyncError};

type LockKey = (UserId, String);
type Slots = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

/// Registry of sync slots, one per (user, entity).
///
/// A slot exists only while someone holds or waits for it. Cloning shares
/// the registry.
#[derive(Clone, Default)]
pub struct SyncLocks {
    slots: Slots,
}

/// Holds the sync slot for one (user, entity) until dropped.
pub struct SyncGuard {
    user: UserId,
    entity: String,
    slots: Slots,
    _slot: OwnedMutexGuard<()>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: &UserId, entity: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().expect("lock poisoned");
        Arc::clone(
            slots
                .entry((user.clone(), entity.to_string()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Take the slot now, or fail with `SyncInProgress`.
    pub fn try_acquire(&self, user: &UserId, entity: &str) -> EngineResult<SyncGuard> {
        let slot = self
            .slot(user, entity)
            .try_lock_owned()
            .map_err(|_| SyncError::SyncInProgress {
                user: user.clone(),
                entity: entity.to_string(),
            })?;
        debug!(user = %user, entity, "sync slot acquired");
        Ok(self.guard(user, entity, slot))
    }

    /// Wait for the slot.
    pub async fn acquire(&self, user: &UserId, entity: &str) -> SyncGuard {
        let slot = self.slot(user, entity).lock_owned().await;
        debug!(user = %user, entity, "sync slot acquired after wait");
        self.guard(user, entity, slot)
    }

    fn guard(&self, user: &UserId, entity: &str, slot: OwnedMutexGuard<()>) -> SyncGuard {
        SyncGuard {
            user: user.clone(),
            entity: entity.to_string(),
            slots: Arc::clone(&self.slots),
            _slot: slot,
        }
    }

    /// Read-only: never creates a slot.
    pub fn is_locked(&self, user: &UserId, entity: &str) -> bool {
        let slots = self.slots.lock().expect("lock poisoned");
        slots
            .get(&(user.clone(), entity.to_string()))
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of (user, entity) slots currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SyncLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock().expect("lock poisoned").len();
        f.debug_struct("SyncLocks").field("slots", &slots).finish()
    }
}

impl SyncGuard {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Debug for SyncGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGuard")
            .field("user", &self.user)
            .field("entity", &self.entity)
            .finish()
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().expect("lock poisoned");
        let key = (self.user.clone(), self.entity.clone());
        // One reference in the registry, one in our own guard. Anything more
        // is a waiter that still needs the slot.
        if slots.get(&key).is_some_and(|slot| Arc::strong_count(slot) <= 2) {
            slots.remove(&key);
        }
        debug!(user = %self.user, entity = %self.entity, "sync slot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_attempt_is_rejected_while_held() {
        let locks = SyncLocks::new();
        let user = UserId::from("user-123");
        let guard = locks.try_acquire(&user, "personalInfo").unwrap();
        assert!(locks.is_locked(&user, "personalInfo"));

        let err = locks.try_acquire(&user, "personalInfo").unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress { .. }));

        drop(guard);
        assert!(!locks.is_locked(&user, "personalInfo"));
        assert!(locks.try_acquire(&user, "personalInfo").is_ok());
    }

    #[test]
    fn released_slots_leave_the_registry() {
        let locks = SyncLocks::new();
        for i in 0..100 {
            let user = UserId::from(format!("u{i}"));
            let _guard = locks.try_acquire(&user, "personalInfo").unwrap();
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());

        assert!(!locks.is_locked(&"never-seen".into(), "personalInfo"));
        assert!(locks.is_empty());
    }

    #[test]
    fn slots_are_independent_per_entity_and_user() {
        let locks = SyncLocks::new();
        let _a = locks.try_acquire(&"u1".into(), "personalInfo").unwrap();
        assert!(locks.try_acquire(&"u1".into(), "bankDetails").is_ok());
        assert!(locks.try_acquire(&"u2".into(), "personalInfo").is_ok());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let locks = SyncLocks::new();
        let user = UserId::from("u");
        let guard = locks.try_acquire(&user, "e").unwrap();

        let waiter = {
            let locks = locks.clone();
            let user = user.clone();
            tokio::spawn(async move { locks.acquire(&user, "e").await.entity().to_string() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), "e");
        assert!(locks.is_empty());
    }
}
