// models/src/medical/doctor.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HmsError, HmsResult};

/// One calendar entry of a doctor's availability: a date and whether the
/// doctor is offering appointments that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub open: bool,
}

/// A doctor's availability calendar, validated at write time.
///
/// The wire form is the `{"YYYY-MM-DD": bool}` object clients submit; entries
/// keep their submission order, and slot listings are emitted in that same
/// order rather than date order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityCalendar(Vec<AvailabilityDay>);

impl AvailabilityCalendar {
    /// Parses the wire-form map, rejecting malformed dates and non-boolean
    /// values immediately instead of deferring the failure to read time.
    pub fn from_map(map: &Map<String, Value>) -> HmsResult<Self> {
        let mut days = Vec::with_capacity(map.len());
        for (raw_date, value) in map {
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
                HmsError::validation(format!("Invalid availability date: {}", raw_date))
            })?;
            let open = value.as_bool().ok_or_else(|| {
                HmsError::validation(format!(
                    "Availability for {} must be true or false",
                    raw_date
                ))
            })?;
            days.push(AvailabilityDay { date, open });
        }
        Ok(AvailabilityCalendar(days))
    }

    /// The wire form handed back to clients.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for day in &self.0 {
            map.insert(
                day.date.format("%Y-%m-%d").to_string(),
                Value::Bool(day.open),
            );
        }
        map
    }

    pub fn days(&self) -> &[AvailabilityDay] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One-to-one extension of a doctor `User`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user_id: u64,
    pub specialization_id: u64,
    pub experience: Option<u32>,
    #[serde(default)]
    pub availability: AvailabilityCalendar,
}
