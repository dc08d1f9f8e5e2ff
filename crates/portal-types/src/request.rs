use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;
use crate::error::TypeError;

/// The kinds of request the routing and aggregation layers understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    GetPersonalInfo,
    UpdatePersonalInfo,
    GetDocuments,
    GetPayslips,
    GetCertificates,
    GetContracts,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        Self::GetPersonalInfo,
        Self::UpdatePersonalInfo,
        Self::GetDocuments,
        Self::GetPayslips,
        Self::GetCertificates,
        Self::GetContracts,
    ];

    /// Wire name of the request kind (e.g. `getPersonalInfo`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetPersonalInfo => "getPersonalInfo",
            Self::UpdatePersonalInfo => "updatePersonalInfo",
            Self::GetDocuments => "getDocuments",
            Self::GetPayslips => "getPayslips",
            Self::GetCertificates => "getCertificates",
            Self::GetContracts => "getContracts",
        }
    }

    /// Document-listing kinds may be fanned out across every instance.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::GetDocuments | Self::GetPayslips | Self::GetCertificates | Self::GetContracts
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::UpdatePersonalInfo)
    }

    /// The document type filter implied by this kind, if any.
    pub fn document_kind(&self) -> Option<DocumentKind> {
        match self {
            Self::GetPayslips => Some(DocumentKind::Payslip),
            Self::GetCertificates => Some(DocumentKind::Certificate),
            Self::GetContracts => Some(DocumentKind::Contract),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TypeError::UnknownRequestKind(s.to_string()))
    }
}
