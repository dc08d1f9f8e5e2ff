use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identity::{InstanceId, UserId};

/// Document category. Unknown categories are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentKind {
    Certificate,
    Contract,
    Payslip,
    Other(String),
}

impl DocumentKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Certificate => "certificate",
            Self::Contract => "contract",
            Self::Payslip => "payslip",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DocumentKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "certificate" => Self::Certificate,
            "contract" => Self::Contract,
            "payslip" => Self::Payslip,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for DocumentKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<DocumentKind> for String {
    fn from(kind: DocumentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document stored in one instance. The content itself is an opaque blob
/// addressed by `url`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: UserId,
    pub instance_id: InstanceId,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub title: String,
    pub date: NaiveDate,
    pub url: String,
}

/// A payslip: a document with pay figures for one month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    #[serde(flatten)]
    pub document: Document,
    pub month: String,
    pub year: u16,
    pub gross_pay: f64,
    pub net_pay: f64,
}

/// Items that belong to exactly one instance and carry a date, so that
/// aggregated collections can be filtered by instance or date window.
pub trait InstanceScoped {
    fn instance_id(&self) -> &InstanceId;
    fn date(&self) -> NaiveDate;
}

impl InstanceScoped for Document {
    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl InstanceScoped for Payslip {
    fn instance_id(&self) -> &InstanceId {
        &self.document.instance_id
    }

    fn date(&self) -> NaiveDate {
        self.document.date
    }
}
