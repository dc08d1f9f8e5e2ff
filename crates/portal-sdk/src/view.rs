//! Serializable results returned by [`Portal`](crate::Portal) calls.

use portal_aggregate::Aggregate;
use portal_sync::{Conflict, ConflictSession, SessionState};
use portal_types::{Document, InstanceId, Payslip, SessionId, UserId};
use serde::Serialize;

/// A value read from, or written to, a single routed instance.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Routed<T> {
    pub instance: InstanceId,
    pub value: T,
}

/// Result of an aggregated listing.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Fetched {
    Payslips(Aggregate<Payslip>),
    Documents(Aggregate<Document>),
}

impl Fetched {
    pub fn len(&self) -> usize {
        match self {
            Fetched::Payslips(agg) => agg.len(),
            Fetched::Documents(agg) => agg.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One-line summary such as `3 item(s) from 2 instance(s)`.
    pub fn summary(&self) -> String {
        let (len, ok, failed) = match self {
            Fetched::Payslips(agg) => (agg.len(), agg.succeeded.len(), agg.per_instance_errors.len()),
            Fetched::Documents(agg) => (agg.len(), agg.succeeded.len(), agg.per_instance_errors.len()),
        };
        if failed == 0 {
            format!("{len} item(s) from {ok} instance(s)")
        } else {
            format!("{len} item(s) from {ok} instance(s), {failed} failed")
        }
    }
}

/// Reachability of one directory entry for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub instance_id: InstanceId,
    pub name: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub has_access: bool,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of a conflict session, with current resolutions filled in.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub user: UserId,
    pub entity: String,
    pub state: SessionState,
    pub conflicts: Vec<Conflict>,
}

impl SessionSummary {
    pub fn of(session: &ConflictSession) -> Self {
        Self {
            id: session.id().clone(),
            user: session.user().clone(),
            entity: session.entity().to_string(),
            state: session.state(),
            conflicts: session.conflicts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_sync::Resolution;
    use portal_types::ConflictId;
    use serde_json::json;

    #[test]
    fn summary_reflects_session_resolutions() {
        let conflict = Conflict {
            id: ConflictId::new(),
            instance_id: "primary".into(),
            field: "contactDetails.phone".into(),
            current_value: json!("087-123-4567"),
            new_value: json!("087-999-0000"),
            resolution: None,
        };
        let mut session = ConflictSession::open("user-123".into(), "personalInfo", vec![conflict.clone()]);
        session.set_resolution(conflict.id, Resolution::New).unwrap();

        let summary = SessionSummary::of(&session);
        assert_eq!(summary.state, SessionState::Resolving);
        assert_eq!(summary.conflicts[0].resolution, Some(Resolution::New));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "resolving");
        assert_eq!(json["conflicts"][0]["resolution"], "new");
    }

    #[test]
    fn status_omits_absent_counts() {
        let status = InstanceStatus {
            instance_id: "pensioners".into(),
            name: "Pensioners".into(),
            is_primary: false,
            is_active: false,
            has_access: false,
            reachable: false,
            document_count: None,
            error: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("documentCount").is_none());
        assert_eq!(json["hasAccess"], false);
    }
}
