// reports/src/export.rs
//! CSV exports, written into the reports directory keyed by entity id.
//! A fresh export for an id overwrites the previous one; files are not
//! versioned.

use std::fs;
use std::path::{Path, PathBuf};

use models::errors::{HmsError, HmsResult};
use storage::HospitalStore;

pub fn doctor_report_filename(doctor_id: u64) -> String {
    format!("doctor_{}_appointments.csv", doctor_id)
}

pub fn patient_report_filename(patient_id: u64) -> String {
    format!("patient_{}_treatments.csv", patient_id)
}

/// Rejects names that could escape the reports directory.
pub fn sanitize_filename(name: &str) -> HmsResult<&str> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(HmsError::validation("Invalid report filename"));
    }
    Ok(name)
}

fn ensure_dir(dir: &Path) -> HmsResult<()> {
    fs::create_dir_all(dir).map_err(|e| {
        HmsError::Storage(format!("Failed to create reports directory {:?}: {}", dir, e))
    })
}

/// All appointments of one doctor, one row per appointment.
pub fn export_doctor_appointments(
    store: &HospitalStore,
    reports_dir: &Path,
    doctor_id: u64,
) -> HmsResult<PathBuf> {
    ensure_dir(reports_dir)?;
    let path = reports_dir.join(doctor_report_filename(doctor_id));
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| HmsError::Storage(format!("Failed to open report {:?}: {}", path, e)))?;

    writer
        .write_record(["appointment_id", "patient_id", "date", "time", "status", "remarks"])
        .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    for appointment in store.appointments_for_doctor(doctor_id)? {
        writer
            .write_record([
                appointment.id.to_string(),
                appointment.patient_id.to_string(),
                appointment.date_label(),
                appointment.time_label(),
                appointment.status.to_string(),
                appointment.remarks.clone().unwrap_or_default(),
            ])
            .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    Ok(path)
}

/// All treatments of one patient, joined with appointment and doctor data.
pub fn export_patient_treatments(
    store: &HospitalStore,
    reports_dir: &Path,
    patient_id: u64,
) -> HmsResult<PathBuf> {
    ensure_dir(reports_dir)?;
    let path = reports_dir.join(patient_report_filename(patient_id));
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| HmsError::Storage(format!("Failed to open report {:?}: {}", path, e)))?;

    writer
        .write_record([
            "appointment_date",
            "doctor_username",
            "diagnosis",
            "prescription",
            "notes",
        ])
        .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    for (treatment, appointment) in store.treatments_for_patient(patient_id)? {
        let doctor_username = store
            .user_by_id(appointment.doctor_id)?
            .map(|u| u.username)
            .unwrap_or_default();
        writer
            .write_record([
                appointment.date_label(),
                doctor_username,
                treatment.diagnosis,
                treatment.prescription,
                treatment.notes,
            ])
            .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| HmsError::Internal(format!("Report write failed: {}", e)))?;
    Ok(path)
}

/// `.csv` files currently present in the reports directory.
pub fn list_reports(reports_dir: &Path) -> HmsResult<Vec<String>> {
    ensure_dir(reports_dir)?;
    let mut files = Vec::new();
    let entries = fs::read_dir(reports_dir).map_err(|e| {
        HmsError::Storage(format!("Failed to read reports directory {:?}: {}", reports_dir, e))
    })?;
    for entry in entries {
        let entry =
            entry.map_err(|e| HmsError::Storage(format!("Failed to read report entry: {}", e)))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".csv") {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
