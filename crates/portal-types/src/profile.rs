//! The personal-information entity replicated across instances.
//!
//! Field names serialize in camelCase so that flattened paths match the
//! paths reported in conflicts (e.g. `contactDetails.phone`).

use serde::{Deserialize, Serialize};

use crate::identity::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub user_id: UserId,
    pub full_name: String,
    pub staff_id: String,
    pub school_assignment: String,
    pub contact_details: ContactDetails,
    pub emergency_contact: EmergencyContact,
    pub bank_details: BankDetails,
    pub civil_status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub county: String,
    pub eircode: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_name: String,
    pub iban: String,
    pub bic: String,
}
