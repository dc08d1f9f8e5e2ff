//! Cross-instance synchronization for the multi-instance portal.
//!
//! A sync pushes one candidate entity value to every instance the user can
//! access. Each instance's stored copy is diffed field by field; fields that
//! can be written safely are written, and fields that would overwrite a
//! diverged value become [`Conflict`]s. An instance with any conflict
//! receives no writes until the conflicts are resolved through a
//! [`ConflictSession`].
//!
//! At most one sync runs per (user, entity) at a time; see [`SyncLocks`].
//!
//! # Key Types
//!
//! - [`SyncEngine`]: fan-out fetch, plan, and write
//! - [`SyncResult`]: per-call outcome: consistent instances, writes issued, conflicts, failures
//! - [`ConflictSession`]: Open → Resolving → Committed resolution state machine
//! - [`ResolutionResult`]: outcome of committing a session

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod session;
pub mod types;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{EngineResult, SessionError, SyncError};
pub use lock::{SyncGuard, SyncLocks};
pub use engine::PendingCommit;
pub use session::{CommitPlan, ConflictSession, SessionState};
pub use types::{
    AppliedWrite, Conflict, FailedResolution, Resolution, ResolutionResult, SyncResult,
};
