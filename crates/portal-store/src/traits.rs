use async_trait::async_trait;
use portal_types::{Document, DocumentKind, FieldMap, InstanceId, Payslip, UserId};

use crate::error::StoreResult;

/// Interface to the external per-instance record systems.
///
/// Implementations must be `Send + Sync` so one backend can be shared by
/// concurrent per-instance tasks. Each call addresses exactly one instance;
/// the sync core performs fan-out itself.
#[async_trait]
pub trait InstanceBackend: Send + Sync {
    /// Read the stored copy of `entity` in one instance.
    ///
    /// Returns `Err(StoreError::NotFound)` if the instance holds no copy.
    async fn get_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
    ) -> StoreResult<FieldMap>;

    /// Merge `fields` into the stored copy of `entity` in one instance.
    ///
    /// Fields not named in `fields` are left untouched.
    async fn put_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
        fields: &FieldMap,
    ) -> StoreResult<()>;

    /// List documents held by one instance, optionally restricted to a kind.
    async fn get_documents(
        &self,
        user: &UserId,
        instance: &InstanceId,
        kind: Option<&DocumentKind>,
    ) -> StoreResult<Vec<Document>>;

    /// List payslips held by one instance.
    async fn get_payslips(&self, user: &UserId, instance: &InstanceId) -> StoreResult<Vec<Payslip>>;
}
