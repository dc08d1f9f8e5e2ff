use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use portal_aggregate::{AggregateError, AggregateFilter, FetchOptions, InstanceAggregator};
use portal_diff::{to_field_map, unflatten};
use portal_directory::{InstanceDirectory, InstanceRouter};
use portal_store::{InMemoryBackend, InstanceBackend};
use portal_sync::{Resolution, ResolutionResult, SyncEngine, SyncError, SyncResult};
use portal_types::{
    ConflictId, FieldMap, InstanceId, PersonalInfo, RequestKind, SessionId, UserContext, UserId,
    PERSONAL_INFO,
};
use tracing::{debug, info};

use crate::config::PortalConfig;
use crate::error::{SdkError, SdkResult};
use crate::fixture::Fixture;
use crate::sessions::SessionRegistry;
use crate::view::{Fetched, InstanceStatus, Routed, SessionSummary};

/// The multi-instance portal API.
///
/// One `Portal` serves every user. All per-user state (accessible instances,
/// active instance) is turned into an explicit [`UserContext`] per call.
pub struct Portal {
    directory: Arc<InstanceDirectory>,
    router: InstanceRouter,
    aggregator: InstanceAggregator,
    engine: SyncEngine,
    backend: Arc<dyn InstanceBackend>,
    active: RwLock<HashMap<UserId, InstanceId>>,
    sessions: SessionRegistry,
}

impl Portal {
    pub fn new(
        directory: Arc<InstanceDirectory>,
        backend: Arc<dyn InstanceBackend>,
        config: PortalConfig,
    ) -> Self {
        Self {
            directory,
            router: InstanceRouter::with_default_rules(),
            aggregator: InstanceAggregator::new(config.aggregate),
            engine: SyncEngine::new(Arc::clone(&backend), config.sync),
            backend,
            active: RwLock::new(HashMap::new()),
            sessions: SessionRegistry::new(),
        }
    }

    /// Build a portal over an in-memory backend seeded from `fixture`.
    pub fn from_fixture(fixture: &Fixture, config: PortalConfig) -> SdkResult<Self> {
        let directory = Arc::new(InstanceDirectory::new());
        let backend = Arc::new(InMemoryBackend::new());
        fixture.seed(&directory, &backend)?;
        info!(users = fixture.users.len(), "portal seeded from fixture");
        Ok(Self::new(directory, backend, config))
    }

    /// Replace the routing table.
    pub fn with_router(mut self, router: InstanceRouter) -> Self {
        self.router = router;
        self
    }

    pub fn directory(&self) -> &InstanceDirectory {
        &self.directory
    }

    pub fn backend(&self) -> &Arc<dyn InstanceBackend> {
        &self.backend
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    // ---- Context ----

    /// The explicit context for `user`, with their selected active instance.
    pub fn context(&self, user: &UserId) -> SdkResult<UserContext> {
        if !self.directory.contains_user(user) {
            return Err(SdkError::UnknownUser(user.clone()));
        }
        let mut ctx = self.directory.context_for(user);
        let selected = self.active.read().expect("lock poisoned").get(user).cloned();
        if let Some(instance) = selected {
            // A selection that lost access falls back to the default.
            let _ = ctx.set_active_instance(instance);
        }
        Ok(ctx)
    }

    /// Select the instance used by `Active` routing rules.
    pub fn select_instance(&self, user: &UserId, instance: InstanceId) -> SdkResult<()> {
        let mut ctx = self.context(user)?;
        ctx.set_active_instance(instance.clone())?;
        debug!(user = %user, %instance, "active instance selected");
        self.active
            .write()
            .expect("lock poisoned")
            .insert(user.clone(), instance);
        Ok(())
    }

    // ---- Routing ----

    pub fn resolve_instance(&self, kind: RequestKind, user: &UserId) -> SdkResult<InstanceId> {
        let ctx = self.context(user)?;
        Ok(self.router.resolve(kind, &ctx)?)
    }

    /// Resolve by wire name, e.g. `getPersonalInfo`.
    pub fn resolve_named(&self, kind: &str, user: &UserId) -> SdkResult<InstanceId> {
        let ctx = self.context(user)?;
        Ok(self.router.resolve_named(kind, &ctx)?)
    }

    // ---- Aggregation ----

    /// Fan a document or payslip listing out over every accessible instance.
    pub async fn aggregate_fetch(
        &self,
        kind: RequestKind,
        user: &UserId,
        filter: Option<AggregateFilter>,
    ) -> SdkResult<Fetched> {
        let ctx = self.context(user)?;
        let filter = filter.unwrap_or_default();
        let fetched = match kind {
            RequestKind::GetPayslips => Fetched::Payslips(
                self.aggregator
                    .fetch_payslips(Arc::clone(&self.backend), &ctx, FetchOptions::new().scoped(filter))
                    .await?,
            ),
            _ => Fetched::Documents(
                self.aggregator
                    .fetch_documents(
                        Arc::clone(&self.backend),
                        &ctx,
                        kind,
                        FetchOptions::new().scoped(filter),
                    )
                    .await?,
            ),
        };
        Ok(fetched)
    }

    // ---- Single-instance reads and writes ----

    /// Read an entity from the instance routed for `GetPersonalInfo`.
    pub async fn get_entity(&self, user: &UserId, entity: &str) -> SdkResult<Routed<FieldMap>> {
        let instance = self.resolve_instance(RequestKind::GetPersonalInfo, user)?;
        let value = self.backend.get_entity(user, &instance, entity).await?;
        Ok(Routed { instance, value })
    }

    pub async fn get_personal_info(&self, user: &UserId) -> SdkResult<Routed<PersonalInfo>> {
        let Routed { instance, value } = self.get_entity(user, PERSONAL_INFO).await?;
        let value: PersonalInfo = serde_json::from_value(unflatten(&value)?)?;
        Ok(Routed { instance, value })
    }

    /// Save personal info to the single instance routed for
    /// `UpdatePersonalInfo`. Other instances are untouched.
    ///
    /// The write holds the entity's sync slot until it completes, even if
    /// the caller stops waiting.
    pub async fn update_personal_info(
        &self,
        user: &UserId,
        info: &PersonalInfo,
    ) -> SdkResult<InstanceId> {
        let instance = self.resolve_instance(RequestKind::UpdatePersonalInfo, user)?;
        let fields = to_field_map(info)?;
        let guard = self.engine.locks().try_acquire(user, PERSONAL_INFO)?;

        let backend = Arc::clone(&self.backend);
        let owner = user.clone();
        let target = instance.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            backend
                .put_entity(&owner, &target, PERSONAL_INFO, &fields)
                .await
                .map(|()| fields.len())
        });
        let written = task
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))??;
        info!(user = %user, %instance, fields = written, "personal info saved");
        Ok(instance)
    }

    // ---- Sync ----

    pub async fn sync(&self, user: &UserId, entity: &str, candidate: FieldMap) -> SdkResult<SyncResult> {
        let ctx = self.context(user)?;
        Ok(self.engine.sync(&ctx, entity, candidate).await?)
    }

    pub async fn sync_with_baseline(
        &self,
        user: &UserId,
        entity: &str,
        baseline: FieldMap,
        candidate: FieldMap,
    ) -> SdkResult<SyncResult> {
        let ctx = self.context(user)?;
        Ok(self
            .engine
            .sync_with_baseline(&ctx, entity, baseline, candidate)
            .await?)
    }

    /// Sync a complete typed personal-info value to every instance.
    pub async fn sync_personal_info(&self, user: &UserId, info: &PersonalInfo) -> SdkResult<SyncResult> {
        self.sync(user, PERSONAL_INFO, to_field_map(info)?).await
    }

    // ---- Conflict sessions ----

    /// Open a session over conflicts from the latest sync of `entity`.
    ///
    /// Only conflicts the engine reported for this user qualify, each at
    /// most once, and only while their instance is accessible. Every
    /// conflict starts resolved to `current`.
    pub async fn open_conflict_session(
        &self,
        user: &UserId,
        entity: &str,
        conflicts: &[ConflictId],
    ) -> SdkResult<SessionSummary> {
        let ctx = self.context(user)?;
        let session = self.engine.open_session(&ctx, entity, conflicts)?;
        let summary = SessionSummary::of(&session);
        self.sessions.insert(session);
        Ok(summary)
    }

    pub async fn session(&self, id: &SessionId) -> SdkResult<SessionSummary> {
        let handle = self.sessions.get(id)?;
        let session = handle.lock().await;
        Ok(SessionSummary::of(&session))
    }

    pub async fn set_resolution(
        &self,
        id: &SessionId,
        conflict: ConflictId,
        resolution: Resolution,
    ) -> SdkResult<()> {
        let handle = self.sessions.get(id)?;
        handle.lock().await.set_resolution(conflict, resolution)?;
        Ok(())
    }

    pub async fn resolve_all(&self, id: &SessionId, resolution: Resolution) -> SdkResult<()> {
        let handle = self.sessions.get(id)?;
        handle.lock().await.resolve_all(resolution)?;
        Ok(())
    }

    /// Commit a session. Once committed it leaves the registry; only its id
    /// is remembered, so a second commit reports `AlreadyCommitted`.
    pub async fn commit(&self, id: &SessionId) -> SdkResult<ResolutionResult> {
        let handle = self.sessions.get(id)?;
        let pending = {
            let mut session = handle.lock().await;
            self.engine.prepare_commit(&mut session).await?
        };
        self.sessions.retire(id);
        Ok(self.engine.finish_commit(pending).await?)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    // ---- Status ----

    /// Per-instance overview for `user`: every directory entry, with
    /// reachability and document counts for the accessible ones.
    pub async fn instance_status(&self, user: &UserId) -> SdkResult<Vec<InstanceStatus>> {
        let ctx = self.context(user)?;
        let backend = Arc::clone(&self.backend);
        let owner = user.clone();
        let reachability = self
            .aggregator
            .fetch_all(
                RequestKind::GetDocuments,
                &ctx,
                move |instance| {
                    let backend = Arc::clone(&backend);
                    let owner = owner.clone();
                    async move {
                        let docs = backend.get_documents(&owner, &instance, None).await?;
                        Ok::<_, portal_store::StoreError>(vec![(instance, docs.len())])
                    }
                },
                FetchOptions::new(),
            )
            .await;

        let (counts, errors) = match reachability {
            Ok(agg) => (agg.items.into_iter().collect::<HashMap<_, _>>(), agg.per_instance_errors),
            Err(AggregateError::AllFailed { errors }) => (HashMap::new(), errors),
            Err(e) => return Err(e.into()),
        };

        let statuses = self
            .directory
            .list_all(user)
            .into_iter()
            .map(|instance| InstanceStatus {
                is_active: ctx.active_instance() == Some(&instance.id),
                reachable: counts.contains_key(&instance.id),
                document_count: counts.get(&instance.id).copied(),
                error: errors.get(&instance.id).cloned(),
                instance_id: instance.id,
                name: instance.name,
                is_primary: instance.is_primary,
                has_access: instance.has_access,
            })
            .collect();
        Ok(statuses)
    }
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("users", &self.directory.users().len())
            .field("router", &self.router)
            .field("engine", &self.engine)
            .finish()
    }
}
