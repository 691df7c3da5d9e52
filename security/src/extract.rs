// security/src/extract.rs
//! Bearer-token extractor for axum handlers.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::{Claims, TokenAuthority};

/// Decoded claims of the request's bearer token. Extraction fails with 401
/// when the header is missing, malformed, or the token does not validate.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub Claims);

#[derive(Debug)]
pub struct AuthRejection(String);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "message": self.0,
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
    TokenAuthority: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .ok_or_else(|| AuthRejection("Missing or invalid token".to_string()))?;

        let authority = TokenAuthority::from_ref(state);
        let claims = authority
            .validate(token)
            .map_err(|e| AuthRejection(e.to_string()))?;
        Ok(AuthClaims(claims))
    }
}
