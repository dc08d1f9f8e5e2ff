//! Two-way field diff: compare a stored entity copy with a candidate write.
//!
//! Only the candidate's fields are considered. A field the candidate does not
//! mention is never touched, so it can never be reported as removed.

use portal_types::FieldMap;
use serde_json::Value;

/// The result of comparing a stored copy with a candidate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDiff {
    /// The list of field changes, in path order.
    pub changes: Vec<FieldChange>,
    /// Number of candidate fields whose stored value already matches.
    pub unchanged: usize,
}

impl FieldDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the candidate is already fully stored.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of fields whose stored value differs from the candidate.
    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Modified { .. }))
            .count()
    }
}

/// A single difference between stored copy and candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldChange {
    /// The stored copy has no value at this path.
    Added { path: String, value: Value },
    /// The stored copy holds a different value at this path.
    Modified {
        path: String,
        current: Value,
        new: Value,
    },
}

impl FieldChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Modified { path, .. } => path,
        }
    }

    /// The value the candidate wants at this path.
    pub fn new_value(&self) -> &Value {
        match self {
            Self::Added { value, .. } => value,
            Self::Modified { new, .. } => new,
        }
    }
}

/// Compute the diff between a stored copy and a candidate.
pub fn diff_fields(stored: &FieldMap, candidate: &FieldMap) -> FieldDiff {
    let mut diff = FieldDiff::new();

    for (path, new_val) in candidate {
        match stored.get(path) {
            Some(current) if current == new_val => diff.unchanged += 1,
            Some(current) => diff.changes.push(FieldChange::Modified {
                path: path.clone(),
                current: current.clone(),
                new: new_val.clone(),
            }),
            None => diff.changes.push(FieldChange::Added {
                path: path.clone(),
                value: new_val.clone(),
            }),
        }
    }

    diff
}
