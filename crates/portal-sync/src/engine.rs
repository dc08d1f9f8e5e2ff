use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portal_diff::plan_writes;
use portal_store::InstanceBackend;
use portal_types::{ConflictId, FieldMap, InstanceId, UserContext, UserId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{EngineResult, SessionError, SyncError};
use crate::lock::{SyncGuard, SyncLocks};
use crate::session::{CommitPlan, ConflictSession};
use crate::types::{AppliedWrite, Conflict, ResolutionResult, SyncResult};

/// Conflicts from the latest sync of each (user, entity) not yet taken
/// into a session.
type Outstanding = Arc<Mutex<HashMap<(UserId, String), Vec<Conflict>>>>;

/// Pushes candidate entity values to every accessible instance.
///
/// Cheap to clone; clones share the backend, the lock registry and the
/// outstanding conflicts.
#[derive(Clone)]
pub struct SyncEngine {
    backend: Arc<dyn InstanceBackend>,
    locks: SyncLocks,
    outstanding: Outstanding,
    config: SyncConfig,
}

/// A session commit that holds the entity's sync slot but has not written
/// anything yet. See [`SyncEngine::prepare_commit`].
#[derive(Debug)]
pub struct PendingCommit {
    guard: SyncGuard,
    plan: CommitPlan,
}

impl PendingCommit {
    pub fn plan(&self) -> &CommitPlan {
        &self.plan
    }
}

impl SyncEngine {
    pub fn new(backend: Arc<dyn InstanceBackend>, config: SyncConfig) -> Self {
        Self {
            backend,
            locks: SyncLocks::new(),
            outstanding: Arc::default(),
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn InstanceBackend> {
        &self.backend
    }

    pub fn locks(&self) -> &SyncLocks {
        &self.locks
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Strict sync: every field whose stored value differs from the
    /// candidate is a conflict.
    pub async fn sync(
        &self,
        ctx: &UserContext,
        entity: &str,
        candidate: FieldMap,
    ) -> EngineResult<SyncResult> {
        self.run(ctx, entity, candidate, None).await
    }

    /// Sync against the values the user started editing from. A field whose
    /// stored value still equals `baseline` is written without a conflict.
    pub async fn sync_with_baseline(
        &self,
        ctx: &UserContext,
        entity: &str,
        baseline: FieldMap,
        candidate: FieldMap,
    ) -> EngineResult<SyncResult> {
        self.run(ctx, entity, candidate, Some(baseline)).await
    }

    /// Open a session over conflicts this engine reported for
    /// (`ctx.user_id`, `entity`).
    ///
    /// Only conflicts from the latest sync of that entity qualify, each at
    /// most once, and only while their instance is still accessible. Nothing
    /// is taken unless every id qualifies.
    pub fn open_session(
        &self,
        ctx: &UserContext,
        entity: &str,
        ids: &[ConflictId],
    ) -> EngineResult<ConflictSession> {
        let key = (ctx.user_id.clone(), entity.to_string());
        let mut outstanding = self.outstanding.lock().expect("lock poisoned");
        let issued = outstanding.get(&key).map(Vec::as_slice).unwrap_or_default();

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let conflict = issued
                .iter()
                .find(|c| &c.id == id)
                .ok_or(SessionError::UnknownConflict(*id))?;
            if !ctx.can_access(&conflict.instance_id) {
                return Err(SessionError::InstanceNotAccessible {
                    conflict: *id,
                    instance: conflict.instance_id.clone(),
                }
                .into());
            }
            if !claimed.iter().any(|c: &Conflict| &c.id == id) {
                claimed.push(conflict.clone());
            }
        }

        if let Some(issued) = outstanding.get_mut(&key) {
            issued.retain(|c| !ids.contains(&c.id));
            if issued.is_empty() {
                outstanding.remove(&key);
            }
        }
        drop(outstanding);
        Ok(ConflictSession::open(ctx.user_id.clone(), entity, claimed))
    }

    /// Conflicts from the latest sync of (`user`, `entity`) that no session
    /// has taken yet.
    pub fn outstanding(&self, user: &UserId, entity: &str) -> Vec<Conflict> {
        self.outstanding
            .lock()
            .expect("lock poisoned")
            .get(&(user.clone(), entity.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Commit a resolution session while holding the entity's sync slot.
    pub async fn commit_session(&self, session: &mut ConflictSession) -> EngineResult<ResolutionResult> {
        let pending = self.prepare_commit(session).await?;
        self.finish_commit(pending).await
    }

    /// Take the entity's sync slot and consume `session`. No write has been
    /// issued when this returns.
    pub async fn prepare_commit(&self, session: &mut ConflictSession) -> EngineResult<PendingCommit> {
        session.ensure_open()?;
        let guard = self.guard(session.user(), session.entity()).await?;
        let plan = session.begin_commit()?;
        Ok(PendingCommit { guard, plan })
    }

    /// Apply a prepared commit.
    ///
    /// The writes run detached and keep the sync slot until they finish,
    /// even if this future is dropped.
    pub async fn finish_commit(&self, pending: PendingCommit) -> EngineResult<ResolutionResult> {
        let backend = Arc::clone(&self.backend);
        let timeout = self.config.write_timeout();
        let task = tokio::spawn(async move {
            let PendingCommit { guard, plan } = pending;
            let _guard = guard;
            plan.apply(&backend, timeout).await
        });
        task.await.map_err(|e| SyncError::TaskFailed(e.to_string()))
    }

    async fn guard(&self, user: &UserId, entity: &str) -> EngineResult<SyncGuard> {
        if self.config.reject_concurrent {
            self.locks.try_acquire(user, entity)
        } else {
            Ok(self.locks.acquire(user, entity).await)
        }
    }

    async fn run(
        &self,
        ctx: &UserContext,
        entity: &str,
        candidate: FieldMap,
        baseline: Option<FieldMap>,
    ) -> EngineResult<SyncResult> {
        if candidate.is_empty() {
            debug!(user = %ctx.user_id, entity, "empty candidate is already in sync");
            return Ok(SyncResult {
                success: true,
                instances_updated: ctx.accessible_ids(),
                ..SyncResult::default()
            });
        }
        let guard = self.guard(&ctx.user_id, entity).await?;

        // The body owns the guard and runs detached, so abandoning this
        // future never leaves a half-issued write behind.
        let engine = self.clone();
        let ctx = ctx.clone();
        let entity = entity.to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            engine.sync_locked(&ctx, &entity, &candidate, baseline.as_ref()).await
        });
        task.await.map_err(|e| SyncError::TaskFailed(e.to_string()))
    }

    async fn sync_locked(
        &self,
        ctx: &UserContext,
        entity: &str,
        candidate: &FieldMap,
        baseline: Option<&FieldMap>,
    ) -> SyncResult {
        let user = &ctx.user_id;
        let instances = ctx.accessible_ids();
        debug!(user = %user, entity, instances = instances.len(), fields = candidate.len(), "sync started");

        let mut result = SyncResult::default();
        let mut conflicts = Vec::new();
        let mut pending: Vec<(InstanceId, FieldMap)> = Vec::new();

        for (instance, fetched) in self.fetch_copies(user, entity, instances).await {
            let stored = match fetched {
                Ok(stored) => stored,
                Err(reason) => {
                    warn!(user = %user, %instance, entity, %reason, "stored copy unavailable");
                    result.failures.insert(instance, reason);
                    continue;
                }
            };

            let plan = plan_writes(&stored, candidate, baseline);
            if plan.is_blocked() {
                warn!(
                    user = %user,
                    %instance,
                    entity,
                    conflicts = plan.conflicts.len(),
                    "instance blocked by conflicts"
                );
                conflicts.extend(plan.conflicts.into_iter().map(|c| Conflict {
                    id: ConflictId::new(),
                    instance_id: instance.clone(),
                    field: c.path,
                    current_value: c.current,
                    new_value: c.new,
                    resolution: None,
                }));
            } else if plan.is_noop() {
                result.instances_updated.push(instance);
            } else {
                pending.push((instance, plan.writes));
            }
        }

        for (instance, written) in self.write_copies(user, entity, pending).await {
            match written {
                Ok(fields) => {
                    debug!(user = %user, %instance, entity, fields = fields.len(), "fields written");
                    result.applied.push(AppliedWrite {
                        instance_id: instance.clone(),
                        fields,
                    });
                    result.instances_updated.push(instance);
                }
                Err(reason) => {
                    warn!(user = %user, %instance, entity, %reason, "write failed");
                    result.failures.insert(instance, reason);
                }
            }
        }

        result.success = conflicts.is_empty() && result.failures.is_empty();
        self.record_outstanding(user, entity, &conflicts);
        if !conflicts.is_empty() {
            result.conflicts = Some(conflicts);
        }

        info!(
            user = %user,
            entity,
            success = result.success,
            updated = result.instances_updated.len(),
            writes = result.applied.len(),
            conflicts = result.conflicts().len(),
            failures = result.failures.len(),
            "sync finished"
        );
        result
    }

    /// Replace the outstanding conflicts for (`user`, `entity`). Earlier
    /// unclaimed conflicts are stale once the entity has been synced again.
    fn record_outstanding(&self, user: &UserId, entity: &str, conflicts: &[Conflict]) {
        let key = (user.clone(), entity.to_string());
        let mut outstanding = self.outstanding.lock().expect("lock poisoned");
        if conflicts.is_empty() {
            outstanding.remove(&key);
        } else {
            outstanding.insert(key, conflicts.to_vec());
        }
    }

    /// Fetch every instance's stored copy concurrently, in instance order.
    async fn fetch_copies(
        &self,
        user: &UserId,
        entity: &str,
        instances: Vec<InstanceId>,
    ) -> Vec<(InstanceId, Result<FieldMap, String>)> {
        let timeout = self.config.read_timeout();
        let handles: Vec<_> = instances
            .into_iter()
            .map(|instance| {
                let backend = Arc::clone(&self.backend);
                let user = user.clone();
                let entity = entity.to_string();
                let target = instance.clone();
                let handle = tokio::spawn(async move {
                    bounded(timeout, backend.get_entity(&user, &target, &entity)).await
                });
                (instance, handle)
            })
            .collect();
        join_units(handles).await
    }

    /// Issue every pending write concurrently, in instance order.
    ///
    /// Each write returns the list of field paths it carried.
    async fn write_copies(
        &self,
        user: &UserId,
        entity: &str,
        pending: Vec<(InstanceId, FieldMap)>,
    ) -> Vec<(InstanceId, Result<Vec<String>, String>)> {
        let timeout = self.config.write_timeout();
        let handles: Vec<_> = pending
            .into_iter()
            .map(|(instance, fields)| {
                let backend = Arc::clone(&self.backend);
                let user = user.clone();
                let entity = entity.to_string();
                let target = instance.clone();
                let handle = tokio::spawn(async move {
                    bounded(timeout, backend.put_entity(&user, &target, &entity, &fields)).await?;
                    Ok::<Vec<String>, String>(fields.into_keys().collect())
                });
                (instance, handle)
            })
            .collect();
        join_units(handles).await
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish()
    }
}

/// Await `fut`, turning a backend error or a timeout into a reason string.
pub(crate) async fn bounded<T, E, F>(timeout: Duration, fut: F) -> Result<T, String>
where
    E: fmt::Display,
    F: std::future::Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    }
}

/// Await spawned per-instance units in dispatch order.
pub(crate) async fn join_units<T>(
    handles: Vec<(InstanceId, JoinHandle<Result<T, String>>)>,
) -> Vec<(InstanceId, Result<T, String>)> {
    let mut out = Vec::with_capacity(handles.len());
    for (instance, handle) in handles {
        let outcome = handle
            .await
            .unwrap_or_else(|e| Err(format!("instance task failed: {e}")));
        out.push((instance, outcome));
    }
    out
}
