// reports/src/lib.rs
//! CSV report generation and background jobs.

pub mod export;
pub mod scheduler;

pub use export::{
    doctor_report_filename, export_doctor_appointments, export_patient_treatments, list_reports,
    patient_report_filename, sanitize_filename,
};
pub use scheduler::{daily_reminder, monthly_doctor_activity, spawn_beat, JobTracker};
