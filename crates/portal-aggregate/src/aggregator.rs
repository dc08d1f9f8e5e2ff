use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use portal_store::InstanceBackend;
use portal_types::{Document, InstanceId, Payslip, RequestKind, UserContext};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AggregateConfig;
use crate::error::{AggregateError, AggregateResult};
use crate::options::FetchOptions;

/// The merged outcome of one fan-out read.
///
/// `items` holds every successful instance's results in instance order
/// (unless a comparator was supplied). `per_instance_errors` records every
/// instance that failed, so callers that ignore it still see correct but
/// possibly incomplete data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate<T> {
    pub items: Vec<T>,
    pub per_instance_errors: BTreeMap<InstanceId, String>,
    /// Instances that answered, in dispatch order.
    pub succeeded: Vec<InstanceId>,
}

impl<T> Aggregate<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `true` when at least one instance failed.
    pub fn is_partial(&self) -> bool {
        !self.per_instance_errors.is_empty()
    }
}

/// Issues the same read against every accessible instance at once.
#[derive(Clone, Debug, Default)]
pub struct InstanceAggregator {
    config: AggregateConfig,
}

impl InstanceAggregator {
    pub fn new(config: AggregateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Fan `fetch` out to every instance in `ctx`, then merge.
    ///
    /// Every unit is spawned before any is awaited. Units keep running if
    /// the returned future is dropped; their results are simply discarded.
    /// The call fails only when every instance failed, or when
    /// all-or-nothing mode is on (per call or in the config) and any did.
    pub async fn fetch_all<T, E, F, Fut>(
        &self,
        kind: RequestKind,
        ctx: &UserContext,
        fetch: F,
        options: FetchOptions<T>,
    ) -> AggregateResult<Aggregate<T>>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(InstanceId) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    {
        if !kind.is_aggregate() {
            return Err(AggregateError::NotAggregate(kind));
        }

        let instances = ctx.accessible_ids();
        debug!(user = %ctx.user_id, %kind, instances = instances.len(), "aggregate fan-out");

        let timeout = self.config.read_timeout();
        let handles: Vec<(InstanceId, JoinHandle<Result<Vec<T>, String>>)> = instances
            .into_iter()
            .map(|instance| {
                let unit = fetch(instance.clone());
                let handle = tokio::spawn(run_unit(unit, timeout));
                (instance, handle)
            })
            .collect();

        let mut aggregate = Aggregate {
            items: Vec::new(),
            per_instance_errors: BTreeMap::new(),
            succeeded: Vec::new(),
        };
        for (instance, handle) in handles {
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(format!("fetch task failed: {e}")));
            match outcome {
                Ok(mut items) => {
                    debug!(user = %ctx.user_id, %instance, items = items.len(), "instance answered");
                    aggregate.items.append(&mut items);
                    aggregate.succeeded.push(instance);
                }
                Err(reason) => {
                    warn!(user = %ctx.user_id, %instance, %reason, "instance fetch failed");
                    aggregate.per_instance_errors.insert(instance, reason);
                }
            }
        }

        if aggregate.is_partial() {
            if aggregate.succeeded.is_empty() {
                return Err(AggregateError::AllFailed {
                    errors: aggregate.per_instance_errors,
                });
            }
            if options.all_or_nothing || self.config.all_or_nothing {
                return Err(AggregateError::Incomplete {
                    errors: aggregate.per_instance_errors,
                });
            }
        }

        options.shape(&mut aggregate.items);
        Ok(aggregate)
    }

    /// Payslips from every accessible instance.
    pub async fn fetch_payslips(
        &self,
        backend: Arc<dyn InstanceBackend>,
        ctx: &UserContext,
        options: FetchOptions<Payslip>,
    ) -> AggregateResult<Aggregate<Payslip>> {
        let user = ctx.user_id.clone();
        self.fetch_all(
            RequestKind::GetPayslips,
            ctx,
            move |instance| {
                let backend = Arc::clone(&backend);
                let user = user.clone();
                async move { backend.get_payslips(&user, &instance).await }
            },
            options,
        )
        .await
    }

    /// Documents of the type implied by `kind` from every accessible instance.
    ///
    /// `GetDocuments` lists every type.
    pub async fn fetch_documents(
        &self,
        backend: Arc<dyn InstanceBackend>,
        ctx: &UserContext,
        kind: RequestKind,
        options: FetchOptions<Document>,
    ) -> AggregateResult<Aggregate<Document>> {
        let user = ctx.user_id.clone();
        let doc_kind = kind.document_kind();
        self.fetch_all(
            kind,
            ctx,
            move |instance| {
                let backend = Arc::clone(&backend);
                let user = user.clone();
                let doc_kind = doc_kind.clone();
                async move { backend.get_documents(&user, &instance, doc_kind.as_ref()).await }
            },
            options,
        )
        .await
    }
}

async fn run_unit<T, E, Fut>(unit: Fut, timeout: Duration) -> Result<Vec<T>, String>
where
    E: fmt::Display,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    match tokio::time::timeout(timeout, unit).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portal_store::{FlakyBackend, InMemoryBackend};
    use portal_types::{DocumentKind, Instance};

    use crate::options::AggregateFilter;

    fn ctx() -> UserContext {
        UserContext::new(
            "user-123".into(),
            vec![
                Instance::new("primary", "Primary").primary(),
                Instance::new("post-primary", "Post Primary"),
                Instance::new("pensioners", "Pensioners").without_access(),
            ],
        )
    }

    fn document(instance: &str, id: &str, kind: DocumentKind, month: u32) -> Document {
        Document {
            id: id.into(),
            user_id: "user-123".into(),
            instance_id: instance.into(),
            kind,
            title: format!("{id} title"),
            date: NaiveDate::from_ymd_opt(2024, month, 28).unwrap(),
            url: format!("/documents/{id}.pdf"),
        }
    }

    fn payslip(instance: &str, id: &str, month: u32) -> Payslip {
        Payslip {
            document: document(instance, id, DocumentKind::Payslip, month),
            month: format!("{month:02}"),
            year: 2024,
            gross_pay: 4200.0,
            net_pay: 3100.0,
        }
    }

    fn seeded() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend.insert_payslip(payslip("primary", "p-jan", 1));
        backend.insert_payslip(payslip("primary", "p-feb", 2));
        backend.insert_payslip(payslip("post-primary", "pp-jan", 1));
        backend.insert_document(document("primary", "cert-1", DocumentKind::Certificate, 3));
        backend.insert_document(document("post-primary", "contract-1", DocumentKind::Contract, 4));
        Arc::new(backend)
    }

    fn flaky() -> Arc<FlakyBackend> {
        Arc::new(FlakyBackend::new(seeded()))
    }

    #[tokio::test]
    async fn merges_all_instances_in_instance_order() {
        let backend = flaky();
        let agg = InstanceAggregator::default()
            .fetch_payslips(backend.clone(), &ctx(), FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(agg.len(), 3);
        let ids: Vec<&str> = agg.items.iter().map(|p| p.document.id.as_str()).collect();
        assert_eq!(ids, vec!["p-jan", "p-feb", "pp-jan"]);
        assert!(!agg.is_partial());
        assert_eq!(backend.total_calls(), 2);
        assert_eq!(backend.calls_to(&"pensioners".into()), 0);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_items() {
        let backend = flaky();
        backend.fail_reads("primary");
        let agg = InstanceAggregator::default()
            .fetch_payslips(backend, &ctx(), FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(agg.len(), 1);
        assert!(agg.is_partial());
        assert!(agg.per_instance_errors.contains_key(&InstanceId::from("primary")));
        assert_eq!(agg.succeeded, vec![InstanceId::from("post-primary")]);
    }

    #[tokio::test]
    async fn every_instance_failing_is_an_error() {
        let backend = flaky();
        backend.fail_reads("primary");
        backend.fail_reads("post-primary");
        let err = InstanceAggregator::default()
            .fetch_payslips(backend, &ctx(), FetchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.instance_errors().map(|e| e.len()), Some(2));
        assert!(matches!(err, AggregateError::AllFailed { .. }));
    }

    #[tokio::test]
    async fn all_or_nothing_rejects_partial_result() {
        let backend = flaky();
        backend.fail_reads("post-primary");
        let err = InstanceAggregator::default()
            .fetch_payslips(backend, &ctx(), FetchOptions::new().all_or_nothing(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Incomplete { .. }));
    }

    #[tokio::test]
    async fn config_all_or_nothing_applies_to_every_call() {
        let backend = flaky();
        backend.fail_reads("post-primary");
        let aggregator = InstanceAggregator::new(AggregateConfig {
            all_or_nothing: true,
            ..AggregateConfig::default()
        });
        assert!(aggregator
            .fetch_payslips(backend, &ctx(), FetchOptions::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn slow_instance_times_out_alone() {
        let backend = flaky();
        backend.delay("post-primary", Duration::from_millis(500));
        let aggregator = InstanceAggregator::new(AggregateConfig {
            read_timeout_ms: 50,
            ..AggregateConfig::default()
        });
        let agg = aggregator
            .fetch_payslips(backend, &ctx(), FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(agg.len(), 2);
        assert!(agg.per_instance_errors[&InstanceId::from("post-primary")].contains("timed out"));
    }

    #[tokio::test]
    async fn units_are_dispatched_concurrently() {
        let backend = flaky();
        backend.delay("primary", Duration::from_millis(50));
        backend.delay("post-primary", Duration::from_millis(50));
        InstanceAggregator::default()
            .fetch_payslips(backend.clone(), &ctx(), FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(backend.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn dropped_fetch_still_completes_units() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let finished = Arc::new(AtomicUsize::new(0));
        let aggregator = InstanceAggregator::default();
        let ctx = ctx();
        let counter = Arc::clone(&finished);
        let fut = aggregator.fetch_all(
            RequestKind::GetDocuments,
            &ctx,
            move |_instance| {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<Vec<u8>, String>(vec![1])
                }
            },
            FetchOptions::new(),
        );
        // Poll just long enough to dispatch, then abandon the call.
        assert!(tokio::time::timeout(Duration::from_millis(5), fut).await.is_err());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filter_and_comparator_apply_after_merge() {
        let options = FetchOptions::new()
            .scoped(AggregateFilter::default().between(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ))
            .sorted_by(|a: &Payslip, b: &Payslip| a.document.id.cmp(&b.document.id));
        let agg = InstanceAggregator::default()
            .fetch_payslips(flaky(), &ctx(), options)
            .await
            .unwrap();
        let ids: Vec<&str> = agg.items.iter().map(|p| p.document.id.as_str()).collect();
        assert_eq!(ids, vec!["p-jan", "pp-jan"]);
    }

    #[tokio::test]
    async fn document_kind_narrows_backend_query() {
        let aggregator = InstanceAggregator::default();
        let certs = aggregator
            .fetch_documents(flaky(), &ctx(), RequestKind::GetCertificates, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs.items[0].kind, DocumentKind::Certificate);

        let all = aggregator
            .fetch_documents(flaky(), &ctx(), RequestKind::GetDocuments, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn single_instance_kind_is_rejected() {
        let err = InstanceAggregator::default()
            .fetch_documents(flaky(), &ctx(), RequestKind::GetPersonalInfo, FetchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::NotAggregate(RequestKind::GetPersonalInfo));
    }

    #[tokio::test]
    async fn no_accessible_instances_is_empty_success() {
        let ctx = UserContext::new("ghost".into(), vec![]);
        let agg = InstanceAggregator::default()
            .fetch_payslips(flaky(), &ctx, FetchOptions::new())
            .await
            .unwrap();
        assert!(agg.is_empty());
    }
}
