// rest_api/src/handlers/admin.rs

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use models::errors::HmsError;
use models::medical::{
    AvailabilityCalendar, DoctorProfile, Login, NewDepartment, NewUser, Role,
};
use security::AuthClaims;

use crate::handlers::serve_report;
use crate::{AppState, RestApiError};

const DEFAULT_DOCTOR_PASSWORD: &str = "changeme123";

/// Handler for the /admin/login endpoint.
pub async fn admin_login_handler(
    State(state): State<AppState>,
    Json(payload): Json<Login>,
) -> Result<Json<Value>, RestApiError> {
    let token = security::admin_login(&state.store, &state.tokens, &payload)?;
    Ok(Json(json!({ "access_token": token })))
}

/// Handler for the /admin/dashboard endpoint.
pub async fn admin_dashboard_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let today = Local::now().date_naive();
    Ok(Json(json!({
        "total_doctors": state.store.count_users_by_role(Role::Doctor)?,
        "total_patients": state.store.count_users_by_role(Role::Patient)?,
        "total_appointments": state.store.count_appointments(),
        "upcoming_appointments": state.store.count_appointments_from(today)?,
    })))
}

fn doctor_listing_entry(state: &AppState, doctor: &models::medical::User) -> Result<Value, RestApiError> {
    let profile = state.store.doctor_profile(doctor.id)?;
    let specialization_name = match &profile {
        Some(p) => state.store.department(p.specialization_id)?.map(|d| d.name),
        None => None,
    };
    Ok(json!({
        "id": doctor.id,
        "username": doctor.username,
        "approve": doctor.approved,
        "blocked": doctor.blocked,
        "specialization_id": profile.as_ref().map(|p| p.specialization_id),
        "specialization_name": specialization_name,
        "experience": profile.as_ref().and_then(|p| p.experience),
        "availability": profile.as_ref().map(|p| p.availability.to_map()),
    }))
}

/// Handler for GET /admin/doctors.
pub async fn admin_doctors_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let mut listing = Vec::new();
    for doctor in state.store.users_by_role(Role::Doctor)? {
        listing.push(doctor_listing_entry(&state, &doctor)?);
    }
    Ok(Json(Value::Array(listing)))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub specialization_id: Option<u64>,
    pub experience: Option<u32>,
    pub availability: Option<Map<String, Value>>,
    pub approve: Option<bool>,
}

/// Handler for POST /admin/doctors: creates the user and its profile.
pub async fn admin_create_doctor_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    claims.require_role(Role::Admin)?;

    if payload.username.is_empty() {
        return Err(HmsError::validation("Username required").into());
    }
    let Some(specialization_id) = payload.specialization_id else {
        return Err(HmsError::validation("Specialization required").into());
    };
    if state.store.department(specialization_id)?.is_none() {
        return Err(HmsError::validation("Invalid specialization ID").into());
    }
    if state.store.user_by_username(&payload.username)?.is_some() {
        return Err(HmsError::conflict("Username already exists").into());
    }
    let availability = match &payload.availability {
        Some(map) => AvailabilityCalendar::from_map(map)?,
        None => AvailabilityCalendar::default(),
    };

    let user = state.store.create_user(NewUser {
        username: payload.username,
        password: payload
            .password
            .unwrap_or_else(|| DEFAULT_DOCTOR_PASSWORD.to_string()),
        role: Role::Doctor,
        approved: payload.approve.unwrap_or(false),
    })?;
    state.store.put_doctor_profile(&DoctorProfile {
        user_id: user.id,
        specialization_id,
        experience: payload.experience,
        availability,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Doctor created successfully" })),
    ))
}

fn doctor_or_error(state: &AppState, user_id: u64) -> Result<models::medical::User, RestApiError> {
    let Some(user) = state.store.user_by_id(user_id)? else {
        return Err(HmsError::not_found("User not found").into());
    };
    if user.role != Role::Doctor {
        return Err(HmsError::validation("User is not a doctor").into());
    }
    Ok(user)
}

/// Handler for GET /admin/doctors/{user_id}.
pub async fn admin_doctor_detail_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(user_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let user = doctor_or_error(&state, user_id)?;
    let profile = state.store.doctor_profile(user.id)?.map(|p| {
        json!({
            "user_id": p.user_id,
            "specialization_id": p.specialization_id,
            "experience": p.experience,
            "availability": p.availability.to_map(),
        })
    });
    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "approve": user.approved,
        "blocked": user.blocked,
        "profile": profile,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub approve: Option<bool>,
    pub blocked: Option<bool>,
}

/// Handler for PUT /admin/doctors/{user_id}: approval and blocked flags.
pub async fn admin_update_doctor_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(user_id): Path<u64>,
    Json(payload): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let mut user = doctor_or_error(&state, user_id)?;
    if let Some(approve) = payload.approve {
        user.approved = approve;
    }
    if let Some(blocked) = payload.blocked {
        user.blocked = blocked;
    }
    state.store.update_user(&user)?;
    Ok(Json(json!({ "message": "updated" })))
}

/// Handler for DELETE /admin/doctors/{user_id}: removes profile and user.
pub async fn admin_delete_doctor_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(user_id): Path<u64>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let user = doctor_or_error(&state, user_id)?;
    state.store.delete_user(user.id)?;
    Ok(Json(json!({ "message": "deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct DoctorProfileUpsertRequest {
    pub dept_id: Option<u64>,
    pub experience: Option<u32>,
    pub availability: Option<Map<String, Value>>,
}

/// Handler for POST /admin/doctors/{user_id}/profile: merge-style upsert.
/// Fields present in the request overwrite, absent fields are kept.
pub async fn admin_doctor_profile_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(user_id): Path<u64>,
    Json(payload): Json<DoctorProfileUpsertRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let user = doctor_or_error(&state, user_id)?;

    let availability = match &payload.availability {
        Some(map) => Some(AvailabilityCalendar::from_map(map)?),
        None => None,
    };
    let profile = match state.store.doctor_profile(user.id)? {
        Some(mut profile) => {
            if let Some(dept_id) = payload.dept_id {
                profile.specialization_id = dept_id;
            }
            if let Some(experience) = payload.experience {
                profile.experience = Some(experience);
            }
            if let Some(availability) = availability {
                profile.availability = availability;
            }
            profile
        }
        None => {
            let Some(dept_id) = payload.dept_id else {
                return Err(HmsError::validation("Specialization required").into());
            };
            DoctorProfile {
                user_id: user.id,
                specialization_id: dept_id,
                experience: payload.experience,
                availability: availability.unwrap_or_default(),
            }
        }
    };
    state.store.put_doctor_profile(&profile)?;
    Ok(Json(json!({ "message": "Doctor profile saved successfully" })))
}

/// Handler for GET /admin/patients.
pub async fn admin_patients_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let patients: Vec<Value> = state
        .store
        .users_by_role(Role::Patient)?
        .into_iter()
        .map(|p| json!({ "id": p.id, "username": p.username }))
        .collect();
    Ok(Json(Value::Array(patients)))
}

/// Handler for GET /admin/appointments: full listing, newest first.
pub async fn admin_appointments_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let listing: Vec<Value> = state
        .store
        .all_appointments()?
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "patient_id": a.patient_id,
                "doctor_id": a.doctor_id,
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
pub struct BlockActionRequest {
    #[serde(default)]
    pub action: String,
}

/// Handler for POST /admin/block_user/{user_id}.
pub async fn admin_block_user_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(user_id): Path<u64>,
    Json(payload): Json<BlockActionRequest>,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let Some(mut user) = state.store.user_by_id(user_id)? else {
        return Err(HmsError::not_found("User not found").into());
    };
    match payload.action.as_str() {
        "block" => user.blocked = true,
        "unblock" => user.blocked = false,
        "approve" => user.approved = true,
        "reject" => user.approved = false,
        _ => return Err(HmsError::validation("invalid action").into()),
    }
    state.store.update_user(&user)?;
    Ok(Json(json!({ "message": "done" })))
}

/// Handler for POST /admin/departments.
pub async fn admin_create_department_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(payload): Json<NewDepartment>,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    claims.require_role(Role::Admin)?;
    let department = state.store.create_department(payload)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Department created successfully",
            "id": department.id,
        })),
    ))
}

/// Handler for GET /admin/export/{doctor_id}: spawns the CSV export job and
/// answers immediately with its task id.
pub async fn admin_export_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(doctor_id): Path<u64>,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    claims.require_role(Role::Admin)?;
    let store = state.store.clone();
    let reports_dir = state.reports_dir.clone();
    let task_id = state
        .jobs
        .spawn("doctor_export", move || {
            reports::export_doctor_appointments(&store, &reports_dir, doctor_id)
        })
        .await;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": format!("Export started for professional ID {}.", doctor_id),
            "task_id": task_id,
        })),
    ))
}

/// Handler for GET /admin/reports/list.
pub async fn admin_reports_list_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<Value>, RestApiError> {
    claims.require_role(Role::Admin)?;
    let files = reports::list_reports(&state.reports_dir)?;
    Ok(Json(json!({ "downloads": files })))
}

/// Handler for GET /admin/reports/download/{filename}.
pub async fn admin_download_report_handler(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Path(filename): Path<String>,
) -> Result<Response, RestApiError> {
    claims.require_role(Role::Admin)?;
    serve_report(&state.reports_dir, &filename)
}
