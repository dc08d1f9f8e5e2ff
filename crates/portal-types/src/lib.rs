//! Foundation types for the multi-instance portal.
//!
//! A user may be registered in several independent backend record systems
//! ("instances"). Each instance holds its own copy of the user's profile and
//! documents. Every other portal crate depends on `portal-types`.
//!
//! # Key Types
//!
//! - [`UserId`] / [`InstanceId`]: string identifiers issued by the session collaborator
//! - [`ConflictId`] / [`SessionId`]: UUID v7 identifiers minted by the sync core
//! - [`Instance`]: one accessible (or inaccessible) record system for a user
//! - [`UserContext`]: explicit per-call user and instance context
//! - [`RequestKind`]: the request kinds understood by routing and aggregation
//! - [`FieldMap`]: an entity copy keyed by dotted field paths
//! - [`Document`] / [`Payslip`]: per-instance documents fetched by reference
//! - [`PersonalInfo`]: the typed personal-information entity

pub mod document;
pub mod error;
pub mod identity;
pub mod instance;
pub mod profile;
pub mod request;

use std::collections::BTreeMap;

pub use document::{Document, DocumentKind, InstanceScoped, Payslip};
pub use error::TypeError;
pub use identity::{ConflictId, InstanceId, SessionId, UserId};
pub use instance::{Instance, User, UserContext};
pub use profile::{Address, BankDetails, ContactDetails, EmergencyContact, PersonalInfo};
pub use request::RequestKind;

/// One copy of an entity, keyed by dotted field path (e.g. `contactDetails.phone`).
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// Entity name used for the personal-information profile.
pub const PERSONAL_INFO: &str = "personalInfo";
