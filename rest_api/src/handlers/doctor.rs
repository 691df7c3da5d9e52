// rest_api/src/handlers/doctor.rs

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use models::errors::HmsError;
use models::medical::{AvailabilityCalendar, DoctorProfile, Role};
use notifications::{DeliveryReport, MailBody, OutboundMail};
use security::AuthClaims;

use crate::{AppState, RestApiError};

/// Handler for GET /doctor/profile (self).
pub async fn doctor_profile_get_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;
    let Some(profile) = state.store.doctor_profile(claims.user_id)? else {
        return Ok(Json(json!({ "message": "no profile" })));
    };
    Ok(Json(json!({
        "username": claims.sub,
        "specialization_id": profile.specialization_id,
        "experience": profile.experience,
        "availability": profile.availability.to_map(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct DoctorProfileRequest {
    pub specialization_id: Option<u64>,
    pub experience: Option<u32>,
    pub availability: Option<Map<String, Value>>,
}

/// Handler for POST /doctor/profile (self upsert). Submitted fields replace
/// stored ones; the calendar is validated before anything is written.
pub async fn doctor_profile_post_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<DoctorProfileRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;

    let availability = match &payload.availability {
        Some(map) => AvailabilityCalendar::from_map(map)?,
        None => AvailabilityCalendar::default(),
    };
    let existing = state.store.doctor_profile(claims.user_id)?;
    let specialization_id = payload
        .specialization_id
        .or(existing.as_ref().map(|p| p.specialization_id))
        .ok_or_else(|| HmsError::validation("Specialization required"))?;

    state.store.put_doctor_profile(&DoctorProfile {
        user_id: claims.user_id,
        specialization_id,
        experience: payload.experience.or(existing.and_then(|p| p.experience)),
        availability,
    })?;
    Ok(Json(json!({ "message": "Profile updated successfully" })))
}

/// Handler for GET /doctor/availability (own calendar).
pub async fn doctor_availability_get_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;
    let Some(profile) = state.store.doctor_profile(claims.user_id)? else {
        return Err(HmsError::not_found("Doctor profile not found").into());
    };
    Ok(Json(json!({ "availability": profile.availability.to_map() })))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub availability: Option<Map<String, Value>>,
}

/// Handler for POST /doctor/availability: replaces the calendar.
pub async fn doctor_availability_post_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;
    let Some(map) = payload.availability.filter(|m| !m.is_empty()) else {
        return Err(HmsError::validation("No availability data received").into());
    };
    let calendar = AvailabilityCalendar::from_map(&map)?;
    state
        .store
        .replace_doctor_availability(claims.user_id, calendar)?;
    Ok(Json(json!({ "message": "Availability updated successfully" })))
}

/// Handler for GET /doctor/appointments (self), oldest first.
pub async fn doctor_appointments_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;
    let listing: Vec<Value> = state
        .store
        .appointments_for_doctor(claims.user_id)?
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "patient_id": a.patient_id,
                "date": a.date_label(),
                "time": a.time_label(),
                "status": a.status.to_string(),
                "remarks": a.remarks,
            })
        })
        .collect();
    Ok(Json(Value::Array(listing)))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub notes: String,
}

/// Handler for POST /doctor/appointments/{id}/complete. The patient
/// notification is fired off after the transition; its outcome lands in the
/// log and never affects the response.
pub async fn doctor_complete_appointment_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(appointment_id): Path<u64>,
    Json(payload): Json<CompleteRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Doctor)?;
    let (appointment, treatment) = state.store.complete_appointment(
        appointment_id,
        claims.user_id,
        payload.diagnosis,
        payload.prescription,
        payload.notes,
    )?;
    info!(appointment_id, doctor_id = claims.user_id, "appointment completed");

    if let Some(patient) = state
        .store
        .user_by_id(appointment.patient_id)?
        .filter(|p| p.has_mail_address())
    {
        let mailer = state.mailer.clone();
        let recipient = patient.username.clone();
        let mail = OutboundMail {
            to: patient.username,
            subject: "Your visit summary".to_string(),
            body: MailBody::Text(format!(
                "Your appointment on {} with doctor id {} is completed.\nDiagnosis: {}\nPrescription: {}",
                appointment.date_label(),
                appointment.doctor_id,
                treatment.diagnosis,
                treatment.prescription,
            )),
        };
        tokio::spawn(async move {
            let mut report = DeliveryReport::default();
            let outcome = mailer.send(&mail).await;
            report.record(&outcome, &recipient);
            report.log("visit_summary");
        });
    }

    Ok(Json(json!({ "message": "Appointment completed and treatment saved" })))
}

/// Handler for GET /doctor/{doctor_id}/availability: the bookable slot
/// listing patients browse. Days come out in calendar order; slots held by
/// a Booked appointment are excluded.
pub async fn public_doctor_availability_handler(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Path(doctor_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    let Some(profile) = state.store.doctor_profile(doctor_id)? else {
        return Ok(Json(json!({ "availability": [] })));
    };
    if profile.availability.is_empty() {
        return Ok(Json(json!({ "availability": [] })));
    }

    let mut lookup_error = None;
    let days = scheduling::available_days(&profile.availability, |date| {
        match state.store.booked_times(doctor_id, date) {
            Ok(times) => times,
            Err(e) => {
                lookup_error.get_or_insert(e);
                Default::default()
            }
        }
    });
    if let Some(e) = lookup_error {
        return Err(e.into());
    }
    Ok(Json(json!({ "availability": days })))
}

/// Handler for GET /doctor/{doctor_id}/appointments: enriched listing.
pub async fn public_doctor_appointments_handler(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Path(doctor_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    let mut booked = Vec::new();
    for appointment in state.store.appointments_for_doctor(doctor_id)? {
        booked.push(crate::handlers::appointment_to_dict(&state.store, &appointment)?);
    }
    Ok(Json(json!({ "appointments": booked })))
}
