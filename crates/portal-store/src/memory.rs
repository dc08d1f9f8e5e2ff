use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use portal_types::{Document, DocumentKind, FieldMap, InstanceId, Payslip, UserId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::InstanceBackend;

type EntityKey = (UserId, InstanceId, String);
type OwnerKey = (UserId, InstanceId);

/// In-memory, HashMap-based instance backend.
///
/// Intended for tests, fixtures and embedding. Every instance's data sits in
/// the same process behind `RwLock`s; copies are still fully independent
/// per `(user, instance)`.
pub struct InMemoryBackend {
    entities: RwLock<HashMap<EntityKey, FieldMap>>,
    documents: RwLock<HashMap<OwnerKey, Vec<Document>>>,
    payslips: RwLock<HashMap<OwnerKey, Vec<Payslip>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            payslips: RwLock::new(HashMap::new()),
        }
    }

    /// Seed (or replace) an entity copy.
    pub fn insert_entity(
        &self,
        user: impl Into<UserId>,
        instance: impl Into<InstanceId>,
        entity: impl Into<String>,
        fields: FieldMap,
    ) {
        let key = (user.into(), instance.into(), entity.into());
        self.entities.write().expect("lock poisoned").insert(key, fields);
    }

    /// Snapshot of an entity copy, bypassing the async interface.
    pub fn entity(&self, user: &UserId, instance: &InstanceId, entity: &str) -> Option<FieldMap> {
        let key = (user.clone(), instance.clone(), entity.to_string());
        self.entities.read().expect("lock poisoned").get(&key).cloned()
    }

    pub fn insert_document(&self, document: Document) {
        let key = (document.user_id.clone(), document.instance_id.clone());
        self.documents
            .write()
            .expect("lock poisoned")
            .entry(key)
            .or_default()
            .push(document);
    }

    pub fn insert_payslip(&self, payslip: Payslip) {
        let key = (
            payslip.document.user_id.clone(),
            payslip.document.instance_id.clone(),
        );
        self.payslips
            .write()
            .expect("lock poisoned")
            .entry(key)
            .or_default()
            .push(payslip);
    }

    /// Number of entity copies held across all users and instances.
    pub fn entity_count(&self) -> usize {
        self.entities.read().expect("lock poisoned").len()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceBackend for InMemoryBackend {
    async fn get_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
    ) -> StoreResult<FieldMap> {
        self.entity(user, instance, entity)
            .ok_or_else(|| StoreError::NotFound {
                user: user.clone(),
                instance: instance.clone(),
                entity: entity.to_string(),
            })
    }

    async fn put_entity(
        &self,
        user: &UserId,
        instance: &InstanceId,
        entity: &str,
        fields: &FieldMap,
    ) -> StoreResult<()> {
        let key = (user.clone(), instance.clone(), entity.to_string());
        let mut map = self.entities.write().expect("lock poisoned");
        let stored = map.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            user: user.clone(),
            instance: instance.clone(),
            entity: entity.to_string(),
        })?;
        for (path, value) in fields {
            stored.insert(path.clone(), value.clone());
        }
        debug!(user = %user, instance = %instance, entity, fields = fields.len(), "entity updated");
        Ok(())
    }

    async fn get_documents(
        &self,
        user: &UserId,
        instance: &InstanceId,
        kind: Option<&DocumentKind>,
    ) -> StoreResult<Vec<Document>> {
        let map = self.documents.read().expect("lock poisoned");
        let docs = map
            .get(&(user.clone(), instance.clone()))
            .map(|docs| {
                docs.iter()
                    .filter(|d| kind.map_or(true, |k| &d.kind == k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn get_payslips(&self, user: &UserId, instance: &InstanceId) -> StoreResult<Vec<Payslip>> {
        let map = self.payslips.read().expect("lock poisoned");
        Ok(map
            .get(&(user.clone(), instance.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("entity_count", &self.entity_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn doc(id: &str, instance: &str, kind: DocumentKind) -> Document {
        Document {
            id: id.into(),
            user_id: "user-123".into(),
            instance_id: instance.into(),
            kind,
            title: id.to_uppercase(),
            date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            url: format!("/documents/{id}.pdf"),
        }
    }

    #[tokio::test]
    async fn get_missing_entity_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend
            .get_entity(&"user-123".into(), &"primary".into(), "personalInfo")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn put_merges_fields_into_existing_copy() {
        let backend = InMemoryBackend::new();
        backend.insert_entity(
            "user-123",
            "primary",
            "personalInfo",
            fields(&[
                ("contactDetails.phone", json!("087-123-4567")),
                ("civilStatus", json!("Married")),
            ]),
        );

        let user = UserId::from("user-123");
        let instance = InstanceId::from("primary");
        backend
            .put_entity(
                &user,
                &instance,
                "personalInfo",
                &fields(&[("contactDetails.phone", json!("087-999-0000"))]),
            )
            .await
            .unwrap();

        let stored = backend.get_entity(&user, &instance, "personalInfo").await.unwrap();
        assert_eq!(stored["contactDetails.phone"], json!("087-999-0000"));
        assert_eq!(stored["civilStatus"], json!("Married"));
    }

    #[tokio::test]
    async fn put_on_missing_copy_fails() {
        let backend = InMemoryBackend::new();
        let err = backend
            .put_entity(&"u".into(), &"i".into(), "personalInfo", &FieldMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn copies_are_independent_per_instance() {
        let backend = InMemoryBackend::new();
        backend.insert_entity("u", "a", "e", fields(&[("x", json!(1))]));
        backend.insert_entity("u", "b", "e", fields(&[("x", json!(1))]));
        backend
            .put_entity(&"u".into(), &"a".into(), "e", &fields(&[("x", json!(2))]))
            .await
            .unwrap();
        assert_eq!(backend.entity(&"u".into(), &"b".into(), "e").unwrap()["x"], json!(1));
    }

    #[tokio::test]
    async fn documents_filter_by_kind() {
        let backend = InMemoryBackend::new();
        backend.insert_document(doc("doc-001", "primary", DocumentKind::Certificate));
        backend.insert_document(doc("doc-002", "primary", DocumentKind::Contract));

        let user = UserId::from("user-123");
        let instance = InstanceId::from("primary");
        let all = backend.get_documents(&user, &instance, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let certs = backend
            .get_documents(&user, &instance, Some(&DocumentKind::Certificate))
            .await
            .unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].id, "doc-001");
    }

    #[tokio::test]
    async fn unknown_owner_has_no_documents() {
        let backend = InMemoryBackend::new();
        let docs = backend
            .get_payslips(&"nobody".into(), &"primary".into())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }
}
