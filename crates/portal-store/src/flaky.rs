//! Fault-injecting backend wrapper.
//!
//! [`FlakyBackend`] forwards to an inner backend while counting calls per
//! instance, tracking how many calls are in flight at once, and optionally
//! failing or delaying calls to chosen instances. Used to exercise fan-out,
//! partial failure and cancellation paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use portal_types::{Document, DocumentKind, FieldMap, InstanceId, Payslip, UserId};

use crate::error::{StoreError, StoreResult};
use crate::traits::InstanceBackend;

#[derive(Default)]
struct Faults {
    failing_reads: HashSet<InstanceId>,
    failing_writes: HashSet<InstanceId>,
    delays: HashMap<InstanceId, Duration>,
}

pub struct FlakyBackend {
    inner: Arc<dyn InstanceBackend>,
    faults: RwLock<Faults>,
    calls: RwLock<HashMap<InstanceId, usize>>,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(inner: Arc<dyn InstanceBackend>) -> Self {
        Self {
            inner,
            faults: RwLock::new(Faults::default()),
            calls: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every read against `instance` fail with `Unavailable`.
    pub fn fail_reads(&self, instance: impl Into<InstanceId>) {
        self.faults.write().expect("lock poisoned").failing_reads.insert(instance.into());
    }

    /// Make every write against `instance` fail with `Rejected`.
    pub fn fail_writes(&self, instance: impl Into<InstanceId>) {
        self.faults.write().expect("lock poisoned").failing_writes.insert(instance.into());
    }

    /// Delay every call against `instance` by `delay`.
    pub fn delay(&self, instance: impl Into<InstanceId>, delay: Duration) {
        self.faults.write().expect("lock poisoned").delays.insert(instance.into(), delay);
    }

    /// Total calls (reads and writes) issued against `instance`.
    pub fn calls_to(&self, instance: &InstanceId) -> usize {
        self.calls.read().expect("lock poisoned").get(instance).copied().unwrap_or(0)
    }

    /// Total calls across all instances.
    pub fn total_calls(&self) -> usize {
        self.calls.read().expect("lock poisoned").values().sum()
    }

    /// Number of successful `put_entity` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, instance: &InstanceId) -> InFlight<'_> {
        *self
            .calls
            .write()
            .expect("lock poisoned")
            .entry(instance.clone())
            .or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.faults.read().expect("lock poisoned").delays.get(instance).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        InFlight(&self.in_flight)
    }

    fn read_fault(&self, instance: &InstanceId) -> StoreResult<()> {
        if self.faults.read().expect("lock poisoned").failing_reads.contains(instance) {
            return Err(StoreError::Unavailable(instance.clone(), "injected read failure".into()));
        }
        Ok(())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InstanceBackend for FlakyBackend {
    async fn get_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
    ) -> StoreResult<FieldMap> {
        let _guard = self.enter(instance).await;
        self.read_fault(instance)?;
        self.inner.get_entity(user, instance, entity).await
    }

    async fn put_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
        fields: &FieldMap,
    ) -> StoreResult<()> {
        let _guard = self.enter(instance).await;
        if self.faults.read().expect("lock poisoned").failing_writes.contains(instance) {
            return Err(StoreError::Rejected {
                instance: instance.clone(),
                reason: "injected write failure".into(),
            });
        }
        self.inner.put_entity(user, instance, entity, fields).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_documents(
        &self,
        user: &UserId,
        instance: &InstanceId,
        kind: Option<&DocumentKind>,
    ) -> StoreResult<Vec<Document>> {
        let _guard = self.enter(instance).await;
        self.read_fault(instance)?;
        self.inner.get_documents(user, instance, kind).await
    }

    async fn get_payslips(&self, user: &UserId, instance: &InstanceId) -> StoreResult<Vec<Payslip>> {
        let _guard = self.enter(instance).await;
        self.read_fault(instance)?;
        self.inner.get_payslips(user, instance).await
    }
}
