// rest_api/src/handlers/auth.rs

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use models::medical::Login;
use security::AuthClaims;

use crate::{AppState, RestApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

/// Handler for the /register endpoint. Only patients self-register;
/// doctors are created by an admin.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, RestApiError> {
    let role = payload.role.unwrap_or_else(|| "patient".to_string());
    let user =
        security::register_patient(&state.store, &payload.username, &payload.password, &role)?;
    info!(username = %user.username, "registered new patient");
    Ok(Json(json!({
        "category": "success",
        "message": "registered",
    })))
}

/// Handler for the /login endpoint.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<Login>,
) -> Result<Json<Value>, RestApiError> {
    let token = security::login_user(&state.store, &state.tokens, &payload)?;
    Ok(Json(json!({ "access_token": token })))
}

/// Handler for the /get-claims endpoint: echoes the decoded token payload.
pub async fn get_claims_handler(
    AuthClaims(claims): AuthClaims,
) -> Result<(StatusCode, Json<Value>), RestApiError> {
    Ok((StatusCode::OK, Json(json!({ "claims": claims }))))
}
