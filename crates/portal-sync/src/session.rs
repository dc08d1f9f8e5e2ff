//! Conflict resolution sessions.
//!
//! A session holds the conflicts produced by one sync. Every conflict starts
//! resolved to [`Resolution::Current`]; the caller flips individual ones to
//! [`Resolution::New`] and commits once. Only `New` resolutions cause writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use portal_store::InstanceBackend;
use portal_types::{ConflictId, FieldMap, InstanceId, SessionId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{bounded, join_units};
use crate::error::SessionError;
use crate::types::{Conflict, FailedResolution, Resolution, ResolutionResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Freshly opened; every conflict resolves to `Current`.
    Open,
    /// At least one resolution has been set.
    Resolving,
    /// Consumed. No further changes or commits.
    Committed,
}

/// A single-use set of pending conflicts for one (user, entity).
#[derive(Clone, Debug)]
pub struct ConflictSession {
    id: SessionId,
    user: UserId,
    entity: String,
    conflicts: Vec<Conflict>,
    resolutions: BTreeMap<ConflictId, Resolution>,
    state: SessionState,
}

impl ConflictSession {
    /// Open a session. Any resolution already carried by `conflicts` is
    /// ignored: every conflict starts at [`Resolution::Current`].
    pub fn open(user: UserId, entity: impl Into<String>, conflicts: Vec<Conflict>) -> Self {
        let resolutions = conflicts
            .iter()
            .map(|c| (c.id, Resolution::Current))
            .collect();
        let session = Self {
            id: SessionId::new(),
            user,
            entity: entity.into(),
            conflicts,
            resolutions,
            state: SessionState::Open,
        };
        debug!(session = %session.id.short_id(), user = %session.user, conflicts = session.conflicts.len(), "conflict session opened");
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn resolution(&self, id: &ConflictId) -> Option<Resolution> {
        self.resolutions.get(id).copied()
    }

    /// The conflicts with their current resolution filled in.
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.conflicts
            .iter()
            .map(|c| Conflict {
                resolution: self.resolution(&c.id),
                ..c.clone()
            })
            .collect()
    }

    /// Choose a side for one conflict. Last write wins.
    pub fn set_resolution(&mut self, id: ConflictId, resolution: Resolution) -> Result<(), SessionError> {
        self.ensure_open()?;
        let slot = self
            .resolutions
            .get_mut(&id)
            .ok_or(SessionError::UnknownConflict(id))?;
        *slot = resolution;
        self.state = SessionState::Resolving;
        Ok(())
    }

    /// Choose the same side for every conflict.
    pub fn resolve_all(&mut self, resolution: Resolution) -> Result<(), SessionError> {
        self.ensure_open()?;
        for slot in self.resolutions.values_mut() {
            *slot = resolution;
        }
        self.state = SessionState::Resolving;
        Ok(())
    }

    /// Fields to write per instance: every conflict resolved to `New`.
    pub fn pending_writes(&self) -> BTreeMap<InstanceId, FieldMap> {
        let mut writes: BTreeMap<InstanceId, FieldMap> = BTreeMap::new();
        for conflict in &self.conflicts {
            if self.resolution(&conflict.id) == Some(Resolution::New) {
                writes
                    .entry(conflict.instance_id.clone())
                    .or_default()
                    .insert(conflict.field.clone(), conflict.new_value.clone());
            }
        }
        writes
    }

    /// Apply the chosen values and consume the session.
    pub async fn commit(
        &mut self,
        backend: &Arc<dyn InstanceBackend>,
        write_timeout: Duration,
    ) -> Result<ResolutionResult, SessionError> {
        Ok(self.begin_commit()?.apply(backend, write_timeout).await)
    }

    /// Consume the session and hand back the writes it decided on.
    ///
    /// The session is `Committed` from here on, whether or not the plan is
    /// ever applied.
    pub fn begin_commit(&mut self) -> Result<CommitPlan, SessionError> {
        self.ensure_open()?;
        self.state = SessionState::Committed;
        Ok(CommitPlan {
            session: self.id.clone(),
            user: self.user.clone(),
            entity: self.entity.clone(),
            writes: self.pending_writes(),
            conflicts: self.conflicts(),
        })
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Committed {
            return Err(SessionError::AlreadyCommitted(self.id.clone()));
        }
        Ok(())
    }
}

/// The writes of a committed session, detached from the session itself.
#[derive(Clone, Debug)]
pub struct CommitPlan {
    session: SessionId,
    user: UserId,
    entity: String,
    writes: BTreeMap<InstanceId, FieldMap>,
    conflicts: Vec<Conflict>,
}

impl CommitPlan {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Instances are written concurrently, one write per instance. Failures
    /// are reported per conflict.
    pub async fn apply(self, backend: &Arc<dyn InstanceBackend>, write_timeout: Duration) -> ResolutionResult {
        let handles: Vec<_> = self
            .writes
            .into_iter()
            .map(|(instance, fields)| {
                let backend = Arc::clone(backend);
                let user = self.user.clone();
                let entity = self.entity.clone();
                let target = instance.clone();
                let handle = tokio::spawn(async move {
                    bounded(write_timeout, backend.put_entity(&user, &target, &entity, &fields)).await
                });
                (instance, handle)
            })
            .collect();
        let failed_instances: BTreeMap<InstanceId, String> = join_units(handles)
            .await
            .into_iter()
            .filter_map(|(instance, outcome)| outcome.err().map(|reason| (instance, reason)))
            .collect();

        let mut resolved = 0;
        let mut failed = Vec::new();
        for conflict in &self.conflicts {
            let writes_new = conflict.resolution == Some(Resolution::New);
            match failed_instances.get(&conflict.instance_id) {
                Some(reason) if writes_new => failed.push(FailedResolution {
                    conflict_id: conflict.id,
                    instance_id: conflict.instance_id.clone(),
                    field: conflict.field.clone(),
                    reason: reason.clone(),
                }),
                _ => resolved += 1,
            }
        }

        if failed.is_empty() {
            info!(session = %self.session.short_id(), user = %self.user, entity = %self.entity, resolved, "conflict session committed");
        } else {
            warn!(session = %self.session.short_id(), user = %self.user, entity = %self.entity, resolved, failed = failed.len(), "conflict session committed with failures");
        }

        ResolutionResult {
            success: failed.is_empty(),
            resolved_conflicts: resolved,
            failed_resolutions: (!failed.is_empty()).then_some(failed),
        }
    }
}
