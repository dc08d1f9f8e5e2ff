//! Cross-instance aggregation for the multi-instance portal.
//!
//! The same read is issued concurrently to every instance the user can
//! access. Successful results are merged in instance order; failures are
//! reported per instance next to whatever data did arrive.
//!
//! # Key Types
//!
//! - [`InstanceAggregator`]: fan-out reader with a per-instance timeout
//! - [`Aggregate`]: merged items plus the per-instance error map
//! - [`FetchOptions`]: post-merge filter, comparator and all-or-nothing mode
//! - [`AggregateFilter`]: instance and date-window filter for documents

pub mod aggregator;
pub mod config;
pub mod error;
pub mod options;

pub use aggregator::{Aggregate, InstanceAggregator};
pub use config::AggregateConfig;
pub use error::{AggregateError, AggregateResult};
pub use options::{AggregateFilter, FetchOptions};
