//! Field-level diff engine for the multi-instance portal.
//!
//! Entities are compared as flat maps of dotted field paths to JSON values.
//! The diff detects field additions and modifications in a candidate write;
//! the write plan then decides, per field, whether the write is applied
//! directly or reported as a conflict.
//!
//! # Key Types
//!
//! - [`flatten`] / [`unflatten`] -- nested JSON <-> [`FieldMap`](portal_types::FieldMap)
//! - [`FieldDiff`] / [`FieldChange`] -- two-way diff of stored copy vs candidate
//! - [`WritePlan`] / [`FieldConflict`] -- per-instance decision of what to write

pub mod error;
pub mod field_diff;
pub mod path;
pub mod plan;

pub use error::{DiffError, DiffResult};
pub use field_diff::{diff_fields, FieldChange, FieldDiff};
pub use path::{flatten, to_field_map, unflatten};
pub use plan::{plan_writes, FieldConflict, WritePlan};
