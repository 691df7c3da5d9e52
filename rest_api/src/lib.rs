// rest_api/src/lib.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use models::errors::HmsError;
use notifications::Mailer;
use reports::JobTracker;
use security::TokenAuthority;
use storage::HospitalStore;

pub mod config;
pub mod handlers;

pub use config::{load_server_config, ServerConfig};

// Define the REST API error enum
#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Domain(#[from] HmsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

// Implement IntoResponse for RestApiError to convert it into an HTTP response
impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RestApiError::Domain(e) => {
                let status = match &e {
                    HmsError::Validation(_) | HmsError::Conflict(_) => StatusCode::BAD_REQUEST,
                    // Role mismatch answers 401 here, same as a bad token.
                    HmsError::Auth(_) | HmsError::Forbidden(_) => StatusCode::UNAUTHORIZED,
                    HmsError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            RestApiError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("IO error: {}", e)),
            RestApiError::SerdeJson(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        };

        let body = Json(json!({
            "status": "error",
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HospitalStore>,
    pub tokens: TokenAuthority,
    pub mailer: Arc<dyn Mailer>,
    pub jobs: Arc<JobTracker>,
    pub reports_dir: PathBuf,
}

impl FromRef<AppState> for TokenAuthority {
    fn from_ref(state: &AppState) -> TokenAuthority {
        state.tokens.clone()
    }
}

// Handler for the /health endpoint
async fn health_check_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "message": "HMS REST API is healthy" })),
    )
}

// Handler for the /version endpoint
async fn version_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "version": env!("CARGO_PKG_VERSION"), "api_level": 1 })),
    )
}

/// Builds the full route table over the shared state.
pub fn router(state: AppState) -> Router {
    use handlers::{admin, auth, doctor, patient};

    Router::new()
        .route("/health", get(health_check_handler))
        .route("/version", get(version_handler))
        // auth
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/get-claims", get(auth::get_claims_handler))
        // admin
        .route("/admin/login", post(admin::admin_login_handler))
        .route("/admin/dashboard", get(admin::admin_dashboard_handler))
        .route(
            "/admin/doctors",
            get(admin::admin_doctors_handler).post(admin::admin_create_doctor_handler),
        )
        .route(
            "/admin/doctors/:user_id",
            get(admin::admin_doctor_detail_handler)
                .put(admin::admin_update_doctor_handler)
                .delete(admin::admin_delete_doctor_handler),
        )
        .route(
            "/admin/doctors/:user_id/profile",
            post(admin::admin_doctor_profile_handler),
        )
        .route("/admin/patients", get(admin::admin_patients_handler))
        .route("/admin/appointments", get(admin::admin_appointments_handler))
        .route(
            "/admin/block_user/:user_id",
            post(admin::admin_block_user_handler),
        )
        .route(
            "/admin/departments",
            post(admin::admin_create_department_handler),
        )
        .route("/admin/export/:doctor_id", get(admin::admin_export_handler))
        .route("/admin/reports/list", get(admin::admin_reports_list_handler))
        .route(
            "/admin/reports/download/:filename",
            get(admin::admin_download_report_handler),
        )
        // doctor
        .route(
            "/doctor/profile",
            get(doctor::doctor_profile_get_handler).post(doctor::doctor_profile_post_handler),
        )
        .route(
            "/doctor/availability",
            get(doctor::doctor_availability_get_handler)
                .post(doctor::doctor_availability_post_handler),
        )
        .route("/doctor/appointments", get(doctor::doctor_appointments_handler))
        .route(
            "/doctor/appointments/:appointment_id/complete",
            post(doctor::doctor_complete_appointment_handler),
        )
        .route(
            "/doctor/:doctor_id/availability",
            get(doctor::public_doctor_availability_handler),
        )
        .route(
            "/doctor/:doctor_id/appointments",
            get(doctor::public_doctor_appointments_handler),
        )
        // patient
        .route("/appointments/book", post(patient::book_appointment_handler))
        .route(
            "/patient/profile",
            get(patient::patient_profile_get_handler).post(patient::patient_profile_post_handler),
        )
        .route("/patient/dashboard", get(patient::patient_dashboard_handler))
        .route(
            "/patient/appointments",
            get(patient::patient_appointments_handler),
        )
        .route(
            "/patient/appointments/:appointment_id/cancel",
            post(patient::patient_cancel_appointment_handler),
        )
        .route("/patient/treatments", get(patient::patient_treatments_handler))
        .route(
            "/patient/export_treatments",
            get(patient::patient_export_treatments_handler),
        )
        .route("/departments", get(patient::departments_handler))
        .route("/departments/:dept_id", get(patient::department_detail_handler))
        .route(
            "/reports/download/:filename",
            get(patient::reports_download_handler),
        )
        .with_state(state)
}

// Main function to start the REST API server
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), anyhow::Error> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = router(state).layer(cors);

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal.");
        })
        .await
        .context("REST API server failed to start or run")?;

    info!("REST API server stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use models::medical::{AvailabilityCalendar, DoctorProfile, NewUser, Role};
    use notifications::LogMailer;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state(dir: &TempDir) -> AppState {
        let store = Arc::new(HospitalStore::open(dir.path().join("db")).unwrap());
        store.seed_admin().unwrap();
        AppState {
            store,
            tokens: TokenAuthority::new("router-test-secret-at-least-32-bytes", 3600),
            mailer: Arc::new(LogMailer),
            jobs: Arc::new(JobTracker::new()),
            reports_dir: dir.path().join("reports"),
        }
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn add_doctor(state: &AppState, username: &str) -> u64 {
        state
            .store
            .create_user(NewUser {
                username: username.into(),
                password: "docpw".into(),
                role: Role::Doctor,
                approved: true,
            })
            .unwrap()
            .id
    }

    async fn login(state: &AppState, username: &str, password: &str) -> String {
        let (status, body) = send(
            state,
            "POST",
            "/login",
            None,
            Some(json!({"username": username, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn should_register_login_and_book_once() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");

        let (status, _) = send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1", "role": "patient"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = login(&state, "a@x.com", "pw1").await;
        let booking = json!({"doctor_id": doctor_id, "date": "2025-01-10", "time": "11:00 AM"});

        let (status, _) = send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(booking.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(booking),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Slot already booked");
    }

    #[tokio::test]
    async fn should_reject_duplicate_registration_and_bad_role() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let payload = json!({"username": "a@x.com", "password": "pw1", "role": "patient"});

        let (status, _) = send(&state, "POST", "/register", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, "POST", "/register", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "d@x.com", "password": "pw", "role": "doctor"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_reject_malformed_booking_input() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");
        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let token = login(&state, "a@x.com", "pw1").await;

        let (status, _) = send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(json!({"doctor_id": doctor_id, "date": "10/01/2025", "time": "11:00 AM"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(json!({"doctor_id": doctor_id, "date": "2025-01-10", "time": "16:30"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(json!({"doctor_id": doctor_id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing data");
    }

    #[tokio::test]
    async fn should_gate_protected_routes_by_role() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let patient_token = login(&state, "a@x.com", "pw1").await;

        // Missing token.
        let (status, _) = send(&state, "GET", "/admin/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        // Wrong role answers 401 as well.
        let (status, _) =
            send(&state, "GET", "/admin/dashboard", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send(&state, "GET", "/doctor/appointments", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Garbage token.
        let (status, _) = send(&state, "GET", "/patient/profile", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Admin reaches its dashboard.
        let (status, body) = send(
            &state,
            "POST",
            "/admin/login",
            None,
            Some(json!({"username": storage::DEFAULT_ADMIN_USERNAME,
                        "password": storage::DEFAULT_ADMIN_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin_token = body["access_token"].as_str().unwrap().to_string();
        let (status, body) =
            send(&state, "GET", "/admin/dashboard", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_patients"], 1);
    }

    #[tokio::test]
    async fn should_complete_appointment_and_record_treatment() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");
        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let patient_token = login(&state, "a@x.com", "pw1").await;
        send(
            &state,
            "POST",
            "/appointments/book",
            Some(&patient_token),
            Some(json!({"doctor_id": doctor_id, "date": "2025-01-10", "time": "11:00 AM"})),
        )
        .await;
        let appointment = &state.store.appointments_for_doctor(doctor_id).unwrap()[0];
        let uri = format!("/doctor/appointments/{}/complete", appointment.id);
        let payload = json!({"diagnosis": "flu", "prescription": "rest", "notes": ""});

        // A patient cannot complete.
        let (status, _) = send(&state, "POST", &uri, Some(&patient_token), Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let doctor_token = login(&state, "doc@x.com", "docpw").await;
        let (status, _) = send(&state, "POST", &uri, Some(&doctor_token), Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);

        let stored = state.store.appointment(appointment.id).unwrap().unwrap();
        assert_eq!(stored.status.to_string(), "Completed");
        let treatment = state
            .store
            .treatment_for_appointment(appointment.id)
            .unwrap()
            .unwrap();
        assert_eq!(treatment.diagnosis, "flu");

        // Completing again fails and leaves the single treatment in place.
        let (status, _) = send(&state, "POST", &uri, Some(&doctor_token), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_cancel_only_booked_appointments() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");
        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let token = login(&state, "a@x.com", "pw1").await;
        send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(json!({"doctor_id": doctor_id, "date": "2025-01-10", "time": "11:00 AM"})),
        )
        .await;
        let appointment_id = state.store.appointments_for_doctor(doctor_id).unwrap()[0].id;
        let uri = format!("/patient/appointments/{}/cancel", appointment_id);

        let (status, _) = send(&state, "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&state, "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Only booked appointments can be cancelled");

        // A doctor cannot cancel at all.
        let doctor_token = login(&state, "doc@x.com", "docpw").await;
        let (status, _) = send(&state, "POST", &uri, Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn should_list_open_slots_minus_booked() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");
        let calendar = AvailabilityCalendar::from_map(
            json!({"2025-01-10": true, "2025-01-11": true, "2025-01-12": false})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        state
            .store
            .put_doctor_profile(&DoctorProfile {
                user_id: doctor_id,
                specialization_id: 1,
                experience: Some(5),
                availability: calendar,
            })
            .unwrap();

        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let token = login(&state, "a@x.com", "pw1").await;
        send(
            &state,
            "POST",
            "/appointments/book",
            Some(&token),
            Some(json!({"doctor_id": doctor_id, "date": "2025-01-10", "time": "11:00 AM"})),
        )
        .await;

        let uri = format!("/doctor/{}/availability", doctor_id);
        let (status, body) = send(&state, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let days = body["availability"].as_array().unwrap();
        // Closed day dropped.
        assert_eq!(days.len(), 2);
        assert_eq!(days[0]["date"], "2025-01-10");
        let slots = days[0]["slots"].as_array().unwrap();
        assert_eq!(slots.len(), 11);
        assert!(!slots.contains(&json!("11:00 AM")));
        assert_eq!(days[1]["slots"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn should_validate_doctor_calendar_at_write_time() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        add_doctor(&state, "doc@x.com");
        let doctor_token = login(&state, "doc@x.com", "docpw").await;

        let (status, body) = send(
            &state,
            "POST",
            "/doctor/profile",
            Some(&doctor_token),
            Some(json!({"specialization_id": 1, "availability": {"not-a-date": true}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Invalid availability date"));
    }

    #[tokio::test]
    async fn should_round_trip_doctor_profile() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        add_doctor(&state, "doc@x.com");
        let token = login(&state, "doc@x.com", "docpw").await;

        let availability = json!({"2025-01-10": true, "2025-01-11": false});
        let (status, _) = send(
            &state,
            "POST",
            "/doctor/profile",
            Some(&token),
            Some(json!({"specialization_id": 4, "experience": 9, "availability": availability})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", "/doctor/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["specialization_id"], 4);
        assert_eq!(body["experience"], 9);
        assert_eq!(body["availability"], availability);
    }

    #[tokio::test]
    async fn should_run_export_job_and_serve_report() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let doctor_id = add_doctor(&state, "doc@x.com");
        let (_, body) = send(
            &state,
            "POST",
            "/admin/login",
            None,
            Some(json!({"username": storage::DEFAULT_ADMIN_USERNAME,
                        "password": storage::DEFAULT_ADMIN_PASSWORD})),
        )
        .await;
        let admin_token = body["access_token"].as_str().unwrap().to_string();

        let uri = format!("/admin/export/{}", doctor_id);
        let (status, body) = send(&state, "GET", &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let task_id: Uuid = body["task_id"].as_str().unwrap().parse().unwrap();

        for _ in 0..100 {
            if state.jobs.is_finished(&task_id).await == Some(true) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let (status, body) =
            send(&state, "GET", "/admin/reports/list", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let downloads = body["downloads"].as_array().unwrap();
        let filename = format!("doctor_{}_appointments.csv", doctor_id);
        assert!(downloads.contains(&json!(filename)));

        let uri = format!("/admin/reports/download/{}", filename);
        let (status, _) = send(&state, "GET", &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);

        // Traversal-shaped names are rejected.
        let (status, _) = send(
            &state,
            "GET",
            "/admin/reports/download/..%2Fsecrets.csv",
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_echo_typed_claims() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        send(
            &state,
            "POST",
            "/register",
            None,
            Some(json!({"username": "a@x.com", "password": "pw1"})),
        )
        .await;
        let token = login(&state, "a@x.com", "pw1").await;
        let (status, body) = send(&state, "GET", "/get-claims", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["claims"]["sub"], "a@x.com");
        assert_eq!(body["claims"]["role"], "patient");
        assert_eq!(body["claims"]["redirect"], "patient_profile");
    }
}
