//! Per-instance record-system backends for the multi-instance portal.
//!
//! Every entity copy and document lives in an external per-instance store,
//! addressed by `(user, instance, entity)`. The sync core owns no persisted
//! state of its own; it only talks to backends through [`InstanceBackend`].
//!
//! # Backends
//!
//! - [`InMemoryBackend`] -- `HashMap`-based backend for tests, fixtures and demos
//! - [`FlakyBackend`] -- wrapper that counts calls and injects failures or delays
//!
//! # Rules
//!
//! 1. A backend never interprets entity contents beyond merging fields.
//! 2. Every backend error is scoped to one instance; none is fatal.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod flaky;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use flaky::FlakyBackend;
pub use memory::InMemoryBackend;
pub use traits::InstanceBackend;
