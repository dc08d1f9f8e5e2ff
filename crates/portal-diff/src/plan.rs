//! Per-instance write plans.
//!
//! A plan classifies each candidate field against one instance's stored copy:
//!
//! - stored value equals the candidate: nothing to do;
//! - field absent from the stored copy: written directly;
//! - stored value still equals the pre-edit baseline: written directly;
//! - otherwise: a [`FieldConflict`], never written by the plan.
//!
//! Without a baseline every stored/candidate mismatch is a conflict.

use portal_types::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field_diff::{diff_fields, FieldChange};

/// A candidate field that cannot be written without a user decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub path: String,
    pub current: Value,
    pub new: Value,
}

/// What a sync should do to one instance's copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WritePlan {
    /// Fields that may be written without overwriting anyone else's edit.
    pub writes: FieldMap,
    /// Fields whose stored value diverged and differs from the candidate.
    pub conflicts: Vec<FieldConflict>,
    /// Candidate fields already stored verbatim.
    pub unchanged: usize,
}

impl WritePlan {
    /// An instance with any open conflict receives no writes at all.
    pub fn is_blocked(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// `true` when the stored copy already matches the candidate.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && self.conflicts.is_empty()
    }
}

/// Build the write plan for one instance.
pub fn plan_writes(stored: &FieldMap, candidate: &FieldMap, baseline: Option<&FieldMap>) -> WritePlan {
    let diff = diff_fields(stored, candidate);
    let mut plan = WritePlan {
        unchanged: diff.unchanged,
        ..WritePlan::default()
    };

    for change in diff.changes {
        match change {
            FieldChange::Added { path, value } => {
                plan.writes.insert(path, value);
            }
            FieldChange::Modified { path, current, new } => {
                let untouched = baseline
                    .and_then(|b| b.get(&path))
                    .is_some_and(|base| *base == current);
                if untouched {
                    plan.writes.insert(path, new);
                } else {
                    plan.conflicts.push(FieldConflict { path, current, new });
                }
            }
        }
    }

    plan
}
