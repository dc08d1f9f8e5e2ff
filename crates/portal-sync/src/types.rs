use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use portal_types::{ConflictId, InstanceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// Which side of a conflict wins when a session commits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the value stored in the instance. Nothing is written.
    #[default]
    Current,
    /// Write the candidate value to the instance.
    New,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::New => "new",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "new" => Ok(Self::New),
            _ => Err(SessionError::InvalidResolution(s.to_string())),
        }
    }
}

/// One field of one instance whose stored value would be overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub id: ConflictId,
    pub instance_id: InstanceId,
    pub field: String,
    pub current_value: Value,
    pub new_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// Fields written to one instance by a sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedWrite {
    pub instance_id: InstanceId,
    pub fields: Vec<String>,
}

/// Outcome of one sync call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// `true` only when there are no conflicts and no failures.
    pub success: bool,
    /// Every instance that now holds the candidate's values.
    pub instances_updated: Vec<InstanceId>,
    /// The writes this call actually issued. Empty on an idempotent re-run.
    pub applied: Vec<AppliedWrite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Conflict>>,
    /// Instances whose fetch or write failed, with the reason.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<InstanceId, String>,
}

impl SyncResult {
    pub fn conflicts(&self) -> &[Conflict] {
        self.conflicts.as_deref().unwrap_or(&[])
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts().is_empty()
    }

    /// `true` when nothing needed writing anywhere.
    pub fn is_noop(&self) -> bool {
        self.success && self.applied.is_empty()
    }
}

/// A conflict whose chosen value could not be written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedResolution {
    pub conflict_id: ConflictId,
    pub instance_id: InstanceId,
    pub field: String,
    pub reason: String,
}

/// Outcome of committing a conflict session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub success: bool,
    pub resolved_conflicts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_resolutions: Option<Vec<FailedResolution>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolution_parses_case_insensitively() {
        assert_eq!("new".parse::<Resolution>().unwrap(), Resolution::New);
        assert_eq!("Current".parse::<Resolution>().unwrap(), Resolution::Current);
        assert_eq!(
            "both".parse::<Resolution>().unwrap_err(),
            SessionError::InvalidResolution("both".into())
        );
    }

    #[test]
    fn default_resolution_keeps_current() {
        assert_eq!(Resolution::default(), Resolution::Current);
    }

    #[test]
    fn sync_result_wire_shape() {
        let result = SyncResult {
            success: true,
            instances_updated: vec!["primary".into()],
            ..SyncResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({ "success": true, "instancesUpdated": ["primary"], "applied": [] })
        );
        assert!(result.is_noop());
    }

    #[test]
    fn conflict_wire_shape() {
        let conflict = Conflict {
            id: ConflictId::new(),
            instance_id: "primary".into(),
            field: "contactDetails.phone".into(),
            current_value: json!("087-123-4567"),
            new_value: json!("087-999-0000"),
            resolution: Some(Resolution::New),
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["instanceId"], "primary");
        assert_eq!(json["currentValue"], "087-123-4567");
        assert_eq!(json["resolution"], "new");
    }
}
