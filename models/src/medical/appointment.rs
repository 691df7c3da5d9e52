// models/src/medical/appointment.rs

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::{HmsError, HmsResult};

/// Booking lifecycle. Status transitions are the only mutation after
/// creation; the date and time of a booking never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_booked(&self) -> bool {
        matches!(self, AppointmentStatus::Booked)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Booked => "Booked",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// Booking record joining doctor, patient and department.
///
/// Invariant, enforced by the storage layer: at most one Booked appointment
/// exists for a given (doctor, date, time) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u64,
    pub doctor_id: u64,
    pub patient_id: u64,
    pub department_id: Option<u64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub remarks: Option<String>,
}

impl Appointment {
    /// Date in the `YYYY-MM-DD` form used on the wire.
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Time in the `hh:mm:ss` form used on the wire.
    pub fn time_label(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

/// Parses a booking date submitted as `YYYY-MM-DD`.
pub fn parse_appointment_date(raw: &str) -> HmsResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| HmsError::validation("Invalid date format"))
}

/// Parses a booking time submitted in 12-hour form, e.g. `04:00 PM`.
pub fn parse_appointment_time(raw: &str) -> HmsResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%I:%M %p")
        .map_err(|_| HmsError::validation("Invalid time format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_iso_date() {
        assert_eq!(
            parse_appointment_date("2025-01-10").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
        );
    }

    #[test]
    fn should_reject_bad_date() {
        assert!(parse_appointment_date("10/01/2025").is_err());
        assert!(parse_appointment_date("2025-02-30").is_err());
        assert!(parse_appointment_date("").is_err());
    }

    #[test]
    fn should_parse_twelve_hour_time() {
        assert_eq!(
            parse_appointment_time("11:00 AM").unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap()
        );
        assert_eq!(
            parse_appointment_time("04:30 PM").unwrap(),
            NaiveTime::from_hms_opt(16, 30, 0).unwrap()
        );
    }

    #[test]
    fn should_reject_bad_time() {
        assert!(parse_appointment_time("16:30").is_err());
        assert!(parse_appointment_time("11:00").is_err());
        assert!(parse_appointment_time("noon").is_err());
    }

    #[test]
    fn should_format_wire_labels() {
        let appt = Appointment {
            id: 1,
            doctor_id: 2,
            patient_id: 3,
            department_id: None,
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            time: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            status: AppointmentStatus::Booked,
            remarks: None,
        };
        assert_eq!(appt.date_label(), "2025-01-10");
        assert_eq!(appt.time_label(), "16:30:00");
        assert_eq!(appt.status.to_string(), "Booked");
    }
}
