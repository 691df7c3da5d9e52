// rest_api/src/handlers/patient.rs

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use models::errors::HmsError;
use models::medical::{
    parse_appointment_date, parse_appointment_time, PatientProfile, PatientProfileUpdate, Role,
};
use security::AuthClaims;

use crate::handlers::serve_report;
use crate::{AppState, RestApiError};

/// Handler for GET /patient/profile.
pub async fn patient_profile_get_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    let Some(profile) = state.store.patient_profile(claims.user_id)? else {
        return Ok(Json(json!({ "message": "no profile" })));
    };
    Ok(Json(json!({
        "user_id": profile.user_id,
        "full_name": profile.full_name,
        "age": profile.age,
        "contact": profile.contact,
        "address": profile.address,
    })))
}

/// Handler for POST /patient/profile: field merge. Absent or falsy fields
/// leave stored values unchanged.
pub async fn patient_profile_post_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<PatientProfileUpdate>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    let mut profile = state
        .store
        .patient_profile(claims.user_id)?
        .unwrap_or_else(|| PatientProfile::new(claims.user_id));
    profile.apply(payload);
    state.store.put_patient_profile(&profile)?;
    Ok(Json(json!({ "message": "saved" })))
}

/// Handler for GET /patient/dashboard.
pub async fn patient_dashboard_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    let Some(patient) = state.store.user_by_id(claims.user_id)? else {
        return Err(HmsError::not_found("Patient not found").into());
    };
    let departments: Vec<Value> = state
        .store
        .departments()?
        .iter()
        .map(|d| json!({ "id": d.id, "name": d.name, "description": d.description }))
        .collect();
    Ok(Json(json!({
        "message": "Dashboard loaded successfully",
        "category": "success",
        "patient": patient.username,
        "departments": departments,
    })))
}

/// Handler for GET /departments: public catalog listing.
pub async fn departments_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, RestApiError> {
    let departments: Vec<Value> = state
        .store
        .departments()?
        .iter()
        .map(|d| json!({ "id": d.id, "name": d.name, "description": d.description }))
        .collect();
    Ok(Json(Value::Array(departments)))
}

/// Handler for GET /departments/{dept_id}: department info plus its
/// approved doctors.
pub async fn department_detail_handler(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Path(dept_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    let Some(department) = state.store.department(dept_id)? else {
        return Err(HmsError::not_found("Department not found").into());
    };

    let mut doctors = Vec::new();
    for user in state.store.users_by_role(Role::Doctor)? {
        if !user.approved {
            continue;
        }
        let Some(profile) = state.store.doctor_profile(user.id)? else {
            continue;
        };
        if profile.specialization_id == dept_id {
            doctors.push(json!({
                "id": user.id,
                "name": user.username,
                "experience": profile.experience,
            }));
        }
    }

    Ok(Json(json!({
        "department": {
            "id": department.id,
            "name": department.name,
            "description": department.description,
        },
        "doctors": doctors,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub doctor_id: Option<u64>,
    pub department_id: Option<u64>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Handler for POST /appointments/book. The storage layer's slot claim is
/// the only conflict check; a taken slot answers 400.
pub async fn book_appointment_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<BookRequest>,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    claims.require_role(Role::Patient)?;
    let (Some(doctor_id), Some(date_raw), Some(time_raw)) =
        (payload.doctor_id, payload.date, payload.time)
    else {
        return Err(HmsError::validation("Missing data").into());
    };
    let date = parse_appointment_date(&date_raw)?;
    let time = parse_appointment_time(&time_raw)?;

    // Department defaults to the doctor's specialization.
    let department_id = match payload.department_id {
        Some(id) => Some(id),
        None => state
            .store
            .doctor_profile(doctor_id)?
            .map(|p| p.specialization_id),
    };

    let appointment =
        state
            .store
            .book_appointment(doctor_id, claims.user_id, department_id, date, time)?;
    info!(
        appointment_id = appointment.id,
        doctor_id,
        patient_id = claims.user_id,
        "appointment booked"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Appointment booked successfully!" })),
    ))
}

/// Handler for GET /patient/appointments, newest first.
pub async fn patient_appointments_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    let mut listing = Vec::new();
    for a in state.store.appointments_for_patient(claims.user_id)? {
        let doctor_username = state
            .store
            .user_by_id(a.doctor_id)?
            .map(|u| u.username)
            .unwrap_or_else(|| "Unknown".to_string());
        let department = match a.department_id {
            Some(id) => state
                .store
                .department(id)?
                .map(|d| d.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            None => "Unknown".to_string(),
        };
        listing.push(json!({
            "id": a.id,
            "date": a.date_label(),
            "time": a.time_label(),
            "status": a.status.to_string(),
            "remarks": a.remarks,
            "doctor_username": doctor_username,
            "department": department,
            "can_cancel": a.status.is_booked(),
        }));
    }
    Ok(Json(Value::Array(listing)))
}

/// Handler for POST /patient/appointments/{id}/cancel.
pub async fn patient_cancel_appointment_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(appointment_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    state
        .store
        .cancel_appointment(appointment_id, claims.user_id)?;
    info!(appointment_id, patient_id = claims.user_id, "appointment cancelled");
    Ok(Json(json!({ "message": "cancelled" })))
}

/// Handler for GET /patient/treatments.
pub async fn patient_treatments_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Patient)?;
    let listing: Vec<Value> = state
        .store
        .treatments_for_patient(claims.user_id)?
        .iter()
        .map(|(treatment, appointment)| {
            json!({
                "treatment_id": treatment.id,
                "appointment_id": treatment.appointment_id,
                "appointment_date": appointment.date_label(),
                "diagnosis": treatment.diagnosis,
                "prescription": treatment.prescription,
                "notes": treatment.notes,
            })
        })
        .collect();
    Ok(Json(Value::Array(listing)))
}

/// Handler for GET /patient/export_treatments: spawns the CSV export job.
pub async fn patient_export_treatments_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    claims.require_role(Role::Patient)?;
    let store = state.store.clone();
    let reports_dir = state.reports_dir.clone();
    let patient_id = claims.user_id;
    let task_id = state
        .jobs
        .spawn("patient_export", move || {
            reports::export_patient_treatments(&store, &reports_dir, patient_id)
        })
        .await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "task_id": task_id }))))
}

/// Handler for GET /reports/download/{filename}: any authenticated caller.
pub async fn reports_download_handler(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Path(filename): Path<String>,
) -> Result<Response, RestApiError> {
    serve_report(&state.reports_dir, &filename)
}
