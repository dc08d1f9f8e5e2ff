//! High-level SDK for the multi-instance portal.
//!
//! Provides one API over the routing, aggregation, and sync subsystems.
//! This is the entry point for the CLI, the HTTP server and any application
//! embedding the portal.
//!
//! # Key Types
//!
//! - [`Portal`]: the facade; one value serves every user
//! - [`PortalConfig`]: sync and aggregation tuning, loadable from TOML
//! - [`Fixture`]: TOML-described users and instance data for demos and tests

pub mod config;
pub mod error;
pub mod fixture;
pub mod portal;
pub mod sessions;
pub mod view;

pub use config::PortalConfig;
pub use error::{SdkError, SdkResult};
pub use fixture::{Fixture, SAMPLE_FIXTURE};
pub use portal::Portal;
pub use sessions::SessionRegistry;
pub use view::{Fetched, InstanceStatus, Routed, SessionSummary};

// Re-export key types
pub use portal_aggregate::{Aggregate, AggregateConfig, AggregateError, AggregateFilter};
pub use portal_directory::{InstanceDirectory, InstanceRouter, RoutingError, RoutingRule};
pub use portal_store::{InMemoryBackend, InstanceBackend, StoreError};
pub use portal_sync::{
    Conflict, Resolution, ResolutionResult, SessionError, SessionState, SyncConfig, SyncError,
    SyncResult,
};
pub use portal_types::{
    ConflictId, Document, DocumentKind, FieldMap, Instance, InstanceId, Payslip, PersonalInfo,
    RequestKind, SessionId, TypeError, UserContext, UserId, PERSONAL_INFO,
};
