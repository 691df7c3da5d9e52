// models/src/medical/patient.rs

use serde::{Deserialize, Serialize};

/// One-to-one extension of a patient `User` with demographic fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: u64,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub contact: Option<String>,
    pub address: Option<String>,
}

/// Partial update submitted by the patient. Absent or falsy fields (empty
/// strings, zero age) leave the stored value unchanged, so "clear to empty"
/// is not expressible through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientProfileUpdate {
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub contact: Option<String>,
    pub address: Option<String>,
}

impl PatientProfile {
    pub fn new(user_id: u64) -> Self {
        PatientProfile {
            user_id,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, update: PatientProfileUpdate) {
        if let Some(name) = update.full_name.filter(|v| !v.is_empty()) {
            self.full_name = Some(name);
        }
        if let Some(age) = update.age.filter(|v| *v > 0) {
            self.age = Some(age);
        }
        if let Some(contact) = update.contact.filter(|v| !v.is_empty()) {
            self.contact = Some(contact);
        }
        if let Some(address) = update.address.filter(|v| !v.is_empty()) {
            self.address = Some(address);
        }
    }
}
