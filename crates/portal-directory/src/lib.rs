//! Instance directory and request routing for the multi-instance portal.
//!
//! The [`InstanceDirectory`] records, per user, which instances exist, which
//! one is primary and which are reachable. It is populated at login by the
//! session collaborator and is read-only from the sync core's perspective.
//!
//! The [`InstanceRouter`] picks exactly one target instance for a
//! single-instance request from a table of per-kind [`RoutingRule`]s.

pub mod directory;
pub mod error;
pub mod router;
pub mod source;

pub use directory::InstanceDirectory;
pub use error::{DirectoryError, DirectoryResult, RoutingError, RoutingResult};
pub use router::{InstanceRouter, RoutingRule};
pub use source::{AccessSource, StaticAccessSource};
