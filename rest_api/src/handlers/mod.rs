// rest_api/src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod doctor;
pub mod patient;

use std::path::Path;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use models::errors::HmsError;
use models::medical::Appointment;
use storage::HospitalStore;

use crate::RestApiError;

/// Wire form of an appointment enriched with doctor and department names.
pub(crate) fn appointment_to_dict(
    store: &HospitalStore,
    appointment: &Appointment,
) -> Result<Value, RestApiError> {
    let doctor_name = store
        .user_by_id(appointment.doctor_id)?
        .map(|u| u.username);
    let department_name = match appointment.department_id {
        Some(id) => store.department(id)?.map(|d| d.name),
        None => None,
    };
    Ok(json!({
        "id": appointment.id,
        "patient_id": appointment.patient_id,
        "doctor_id": appointment.doctor_id,
        "doctor_name": doctor_name,
        "department_id": appointment.department_id,
        "department_name": department_name,
        "date": appointment.date_label(),
        "time": appointment.time_label(),
        "status": appointment.status.to_string(),
        "remarks": appointment.remarks,
    }))
}

/// Streams a generated CSV back as an attachment. Traversal-shaped names
/// are rejected before touching the filesystem.
pub(crate) fn serve_report(reports_dir: &Path, filename: &str) -> Result<Response, RestApiError> {
    let name = reports::sanitize_filename(filename)?;
    let path = reports_dir.join(name);
    let bytes =
        std::fs::read(&path).map_err(|_| HmsError::not_found("Report not found"))?;
    let headers = [
        (CONTENT_TYPE, "text/csv".to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", name),
        ),
    ];
    Ok((headers, bytes).into_response())
}
