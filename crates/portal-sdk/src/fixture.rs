//! TOML fixtures describing users, their instances and per-instance data.
//!
//! A fixture seeds an [`InstanceDirectory`] and an [`InMemoryBackend`] so the
//! CLI, the server and tests can run without real record systems.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use portal_diff::{flatten, to_field_map};
use portal_directory::InstanceDirectory;
use portal_store::InMemoryBackend;
use portal_types::{
    Document, DocumentKind, Instance, InstanceId, Payslip, PersonalInfo, User, UserId,
    PERSONAL_INFO,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// The demo fixture shipped with the SDK.
pub const SAMPLE_FIXTURE: &str = include_str!("../fixtures/portal.toml");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<FixtureUser>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureUser {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub records: Vec<InstanceRecord>,
}

/// Everything one instance stores for one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance: InstanceId,
    #[serde(default)]
    pub personal_info: Option<PersonalInfo>,
    /// Free-form entities, stored after flattening.
    #[serde(default)]
    pub entities: BTreeMap<String, Value>,
    #[serde(default)]
    pub documents: Vec<FixtureDocument>,
    #[serde(default)]
    pub payslips: Vec<FixturePayslip>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub title: String,
    pub date: NaiveDate,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixturePayslip {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub url: String,
    pub month: String,
    pub year: u16,
    pub gross_pay: f64,
    pub net_pay: f64,
}

impl Fixture {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// The demo fixture.
    pub fn sample() -> SdkResult<Self> {
        Self::from_toml_str(SAMPLE_FIXTURE)
    }

    pub fn user(&self, id: &UserId) -> Option<User> {
        self.users.iter().find(|u| &u.id == id).map(FixtureUser::to_user)
    }

    /// Register every user and store every record.
    ///
    /// Records for instances the user is not registered in are rejected.
    pub fn seed(&self, directory: &InstanceDirectory, backend: &InMemoryBackend) -> SdkResult<()> {
        for user in &self.users {
            directory.register(user.id.clone(), user.instances.clone())?;
            for record in &user.records {
                if !user.instances.iter().any(|i| i.id == record.instance) {
                    return Err(SdkError::Config(format!(
                        "record for {} names unregistered instance {}",
                        user.id, record.instance
                    )));
                }
                record.store(&user.id, backend)?;
            }
            debug!(user = %user.id, records = user.records.len(), "fixture user seeded");
        }
        Ok(())
    }
}

impl FixtureUser {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            instances: self.instances.iter().map(|i| i.id.clone()).collect(),
            roles: self.roles.clone(),
        }
    }
}

impl InstanceRecord {
    fn store(&self, user: &UserId, backend: &InMemoryBackend) -> SdkResult<()> {
        if let Some(info) = &self.personal_info {
            backend.insert_entity(user.clone(), self.instance.clone(), PERSONAL_INFO, to_field_map(info)?);
        }
        for (entity, value) in &self.entities {
            backend.insert_entity(user.clone(), self.instance.clone(), entity.clone(), flatten(value)?);
        }
        for doc in &self.documents {
            backend.insert_document(doc.to_document(user, &self.instance));
        }
        for slip in &self.payslips {
            backend.insert_payslip(slip.to_payslip(user, &self.instance));
        }
        Ok(())
    }
}

impl FixtureDocument {
    fn to_document(&self, user: &UserId, instance: &InstanceId) -> Document {
        Document {
            id: self.id.clone(),
            user_id: user.clone(),
            instance_id: instance.clone(),
            kind: self.kind.clone(),
            title: self.title.clone(),
            date: self.date,
            url: self.url.clone(),
        }
    }
}

impl FixturePayslip {
    fn to_payslip(&self, user: &UserId, instance: &InstanceId) -> Payslip {
        Payslip {
            document: Document {
                id: self.id.clone(),
                user_id: user.clone(),
                instance_id: instance.clone(),
                kind: DocumentKind::Payslip,
                title: self.title.clone(),
                date: self.date,
                url: self.url.clone(),
            },
            month: self.month.clone(),
            year: self.year,
            gross_pay: self.gross_pay,
            net_pay: self.net_pay,
        }
    }
}
