//! Registry of open conflict sessions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use portal_sync::{ConflictSession, SessionError};
use portal_types::SessionId;
use tokio::sync::Mutex as AsyncMutex;

/// How many committed session ids are remembered for `AlreadyCommitted`.
pub const COMMITTED_RETAINED: usize = 1024;

pub type SessionHandle = Arc<AsyncMutex<ConflictSession>>;

/// Open sessions, each behind its own lock, plus a bounded memory of
/// committed ids.
///
/// The registry lock is never held across an await; a slow commit only
/// blocks callers of the same session.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    retained: usize,
}

#[derive(Debug, Default)]
struct Inner {
    open: HashMap<SessionId, SessionHandle>,
    committed: HashSet<SessionId>,
    order: VecDeque<SessionId>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_retention(COMMITTED_RETAINED)
    }

    pub fn with_retention(retained: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retained,
        }
    }

    pub fn insert(&self, session: ConflictSession) {
        let id = session.id().clone();
        self.inner
            .lock()
            .expect("lock poisoned")
            .open
            .insert(id, Arc::new(AsyncMutex::new(session)));
    }

    /// The open session `id`, or why there is none.
    pub fn get(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        let inner = self.inner.lock().expect("lock poisoned");
        if let Some(handle) = inner.open.get(id) {
            return Ok(Arc::clone(handle));
        }
        if inner.committed.contains(id) {
            return Err(SessionError::AlreadyCommitted(id.clone()));
        }
        Err(SessionError::UnknownSession(id.clone()))
    }

    /// Forget a committed session, keeping only its id. The oldest ids are
    /// dropped past the retention limit.
    pub fn retire(&self, id: &SessionId) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.open.remove(id).is_none() || self.retained == 0 {
            return;
        }
        if inner.committed.insert(id.clone()) {
            inner.order.push_back(id.clone());
        }
        while inner.order.len() > self.retained {
            if let Some(oldest) = inner.order.pop_front() {
                inner.committed.remove(&oldest);
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").open.len()
    }

    pub fn committed_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").committed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ConflictSession {
        ConflictSession::open("user-123".into(), "personalInfo", vec![])
    }

    #[test]
    fn retired_sessions_report_already_committed() {
        let registry = SessionRegistry::new();
        let s = session();
        let id = s.id().clone();
        registry.insert(s);
        assert!(registry.get(&id).is_ok());

        registry.retire(&id);
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.get(&id).unwrap_err(), SessionError::AlreadyCommitted(id));
        assert!(matches!(
            registry.get(&SessionId::new()),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn committed_ids_are_bounded() {
        let registry = SessionRegistry::with_retention(3);
        let mut ids = Vec::new();
        for _ in 0..10 {
            let s = session();
            ids.push(s.id().clone());
            registry.insert(s);
            registry.retire(ids.last().unwrap());
        }
        assert_eq!(registry.committed_count(), 3);
        assert!(matches!(registry.get(&ids[0]), Err(SessionError::UnknownSession(_))));
        assert!(matches!(registry.get(&ids[9]), Err(SessionError::AlreadyCommitted(_))));
    }

    #[test]
    fn retiring_an_unknown_id_is_ignored() {
        let registry = SessionRegistry::new();
        registry.retire(&SessionId::new());
        assert_eq!(registry.committed_count(), 0);
    }
}
