// scheduling/src/lib.rs
//! Derivation of bookable time slots from a doctor's availability calendar.
//!
//! The grid is fixed: 30-minute slots from 11:00 inclusive to 17:00
//! exclusive, twelve per day. A slot is open unless a Booked appointment
//! already holds it.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

use models::medical::AvailabilityCalendar;

pub const FIRST_SLOT_HOUR: u32 = 11;
pub const LAST_SLOT_HOUR: u32 = 17;
pub const SLOT_MINUTES: u32 = 30;

/// Open slots for one calendar date, labels in 12-hour form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

/// The canonical slot grid, in time order.
pub fn slot_grid() -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    let mut current = NaiveTime::from_hms_opt(FIRST_SLOT_HOUR, 0, 0).expect("valid grid start");
    while current.hour() < LAST_SLOT_HOUR {
        slots.push(current);
        current += chrono::Duration::minutes(SLOT_MINUTES as i64);
    }
    slots
}

/// Display label for a slot, e.g. `11:00 AM` or `04:30 PM`.
pub fn slot_label(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

/// The grid minus booked times, in time order.
pub fn open_slot_labels(booked: &HashSet<NaiveTime>) -> Vec<String> {
    slot_grid()
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .map(slot_label)
        .collect()
}

/// Expands a calendar into per-day open slots. Days marked closed are
/// skipped; days are emitted in calendar (submission) order, not date order.
/// `booked_times` supplies the Booked slot set for a date.
pub fn available_days<F>(calendar: &AvailabilityCalendar, mut booked_times: F) -> Vec<DaySlots>
where
    F: FnMut(NaiveDate) -> HashSet<NaiveTime>,
{
    calendar
        .days()
        .iter()
        .filter(|day| day.open)
        .map(|day| DaySlots {
            date: day.date,
            slots: open_slot_labels(&booked_times(day.date)),
        })
        .collect()
}
