// models/src/medical/treatment.rs

use serde::{Deserialize, Serialize};

/// Clinical note attached 1:1 to a completed appointment. Written exactly
/// once, when the appointment completes; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: u64,
    pub appointment_id: u64,
    pub diagnosis: String,
    pub prescription: String,
    pub notes: String,
}
