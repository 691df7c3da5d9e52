// security/src/lib.rs
//! Credential checks, JWT issue/validation and role gating.
//!
//! Tokens are stateless and self-contained: the payload is the typed
//! [`Claims`] struct (user id, role, client-routing hint), not a free-form
//! map. There is no server-side session store.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use models::errors::{HmsError, HmsResult};
use models::medical::{Login, NewUser, Role, User};
use storage::HospitalStore;

pub mod extract;

pub use extract::AuthClaims;

/// Where the client should land after login, derived from whether a profile
/// already exists for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectHint {
    PatientProfile,
    PatientDashboard,
    DoctorProfile,
    DoctorDashboard,
    AdminDashboard,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: u64,
    pub role: Role,
    pub redirect: Option<RedirectHint>,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Gate for role-restricted operations. Role mismatch answers 401, same
    /// as a missing token.
    pub fn require_role(&self, required: Role) -> HmsResult<()> {
        if self.role == required {
            Ok(())
        } else {
            Err(HmsError::forbidden(format!("{} only", required.label())))
        }
    }
}

/// Issues and validates signed tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        TokenAuthority {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user: &User, redirect: Option<RedirectHint>) -> HmsResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| HmsError::Internal(format!("System time error: {}", e)))?
            .as_secs();
        let claims = Claims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            redirect,
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| HmsError::Internal(format!("Failed to encode JWT: {}", e)))
    }

    pub fn validate(&self, token: &str) -> HmsResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| HmsError::auth("Invalid or expired token"))
    }
}

/// Self-service registration. Only patients may register themselves;
/// doctors are created by an admin.
pub fn register_patient(
    store: &HospitalStore,
    username: &str,
    password: &str,
    role: &str,
) -> HmsResult<User> {
    let role = role.trim().to_lowercase();
    if username.is_empty() || password.is_empty() || role != "patient" {
        return Err(HmsError::validation(
            "username & password required; role must be 'patient'",
        ));
    }
    // Patients are auto-approved.
    store.create_user(NewUser {
        username: username.to_string(),
        password: password.to_string(),
        role: Role::Patient,
        approved: true,
    })
}

fn check_credentials(store: &HospitalStore, login: &Login) -> HmsResult<User> {
    if login.username.is_empty() || login.password.is_empty() {
        return Err(HmsError::validation("username & password required"));
    }
    // Uniform message for unknown user and bad password.
    let user = store
        .user_by_username(&login.username)?
        .ok_or_else(|| HmsError::auth("Bad username or password"))?;
    let ok = User::verify_password(&login.password, &user.password_hash)
        .map_err(|e| HmsError::Internal(format!("Password verification failed: {}", e)))?;
    if !ok {
        return Err(HmsError::auth("Bad username or password"));
    }
    Ok(user)
}

fn redirect_for(store: &HospitalStore, user: &User) -> HmsResult<Option<RedirectHint>> {
    let hint = match user.role {
        Role::Patient => {
            if store.patient_profile(user.id)?.is_none() {
                RedirectHint::PatientProfile
            } else {
                RedirectHint::PatientDashboard
            }
        }
        Role::Doctor => {
            if store.doctor_profile(user.id)?.is_none() {
                RedirectHint::DoctorProfile
            } else {
                RedirectHint::DoctorDashboard
            }
        }
        Role::Admin => RedirectHint::AdminDashboard,
    };
    Ok(Some(hint))
}

/// Logs a user in. Returns a signed token on success.
pub fn login_user(
    store: &HospitalStore,
    authority: &TokenAuthority,
    login: &Login,
) -> HmsResult<String> {
    let user = check_credentials(store, login)?;
    if user.blocked {
        return Err(HmsError::auth("Account blocked"));
    }
    // Doctor accounts require admin approval to be active.
    if user.role == Role::Doctor && !user.approved {
        return Err(HmsError::auth("Your doctor account is not approved yet."));
    }
    let redirect = redirect_for(store, &user)?;
    authority.issue(&user, redirect)
}

/// Admin console login. Same checks, restricted to admin accounts.
pub fn admin_login(
    store: &HospitalStore,
    authority: &TokenAuthority,
    login: &Login,
) -> HmsResult<String> {
    let user = check_credentials(store, login)?;
    if user.role != Role::Admin {
        return Err(HmsError::auth("Bad username or password"));
    }
    authority.issue(&user, Some(RedirectHint::AdminDashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::medical::PatientProfile;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, HospitalStore) {
        let dir = TempDir::new().unwrap();
        let store = HospitalStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn authority() -> TokenAuthority {
        TokenAuthority::new("test-secret-key-at-least-32-bytes!!", 3600)
    }

    #[test]
    fn should_round_trip_claims() {
        let (_dir, store) = open_store();
        let user = register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        let authority = authority();
        let token = authority
            .issue(&user, Some(RedirectHint::PatientProfile))
            .unwrap();
        let claims = authority.validate(&token).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, Role::Patient);
        assert_eq!(claims.redirect, Some(RedirectHint::PatientProfile));
    }

    #[test]
    fn should_reject_tampered_token() {
        let (_dir, store) = open_store();
        let user = register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        let token = authority().issue(&user, None).unwrap();
        let other = TokenAuthority::new("another-secret-key-entirely-here!!", 3600);
        assert!(matches!(
            other.validate(&token).unwrap_err(),
            HmsError::Auth(_)
        ));
    }

    #[test]
    fn should_restrict_self_registration_to_patients() {
        let (_dir, store) = open_store();
        assert!(register_patient(&store, "d@x.com", "pw1", "doctor").is_err());
        assert!(register_patient(&store, "", "pw1", "patient").is_err());
        assert!(register_patient(&store, "a@x.com", "", "patient").is_err());
        assert!(register_patient(&store, "a@x.com", "pw1", "patient").is_ok());
    }

    #[test]
    fn should_use_uniform_bad_credentials_message() {
        let (_dir, store) = open_store();
        register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        let authority = authority();

        let unknown = login_user(
            &store,
            &authority,
            &Login {
                username: "ghost@x.com".into(),
                password: "pw1".into(),
            },
        )
        .unwrap_err();
        let wrong_pw = login_user(
            &store,
            &authority,
            &Login {
                username: "a@x.com".into(),
                password: "nope".into(),
            },
        )
        .unwrap_err();
        assert_eq!(unknown.to_string(), wrong_pw.to_string());
    }

    #[test]
    fn should_block_unapproved_doctor_login() {
        let (_dir, store) = open_store();
        let doctor = store
            .create_user(NewUser {
                username: "doc@x.com".into(),
                password: "pw1".into(),
                role: Role::Doctor,
                approved: false,
            })
            .unwrap();
        let err = login_user(
            &store,
            &authority(),
            &Login {
                username: doctor.username.clone(),
                password: "pw1".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not approved"));
    }

    #[test]
    fn should_block_blocked_account() {
        let (_dir, store) = open_store();
        let mut user = register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        user.blocked = true;
        store.update_user(&user).unwrap();
        let err = login_user(
            &store,
            &authority(),
            &Login {
                username: "a@x.com".into(),
                password: "pw1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Account blocked");
    }

    #[test]
    fn should_switch_redirect_once_profile_exists() {
        let (_dir, store) = open_store();
        let user = register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        let authority = authority();

        let login = Login {
            username: "a@x.com".into(),
            password: "pw1".into(),
        };
        let token = login_user(&store, &authority, &login).unwrap();
        let claims = authority.validate(&token).unwrap();
        assert_eq!(claims.redirect, Some(RedirectHint::PatientProfile));

        store
            .put_patient_profile(&PatientProfile::new(user.id))
            .unwrap();
        let token = login_user(&store, &authority, &login).unwrap();
        let claims = authority.validate(&token).unwrap();
        assert_eq!(claims.redirect, Some(RedirectHint::PatientDashboard));
    }

    #[test]
    fn should_gate_roles() {
        let (_dir, store) = open_store();
        let user = register_patient(&store, "a@x.com", "pw1", "patient").unwrap();
        let authority = authority();
        let token = authority.issue(&user, None).unwrap();
        let claims = authority.validate(&token).unwrap();
        assert!(claims.require_role(Role::Patient).is_ok());
        let err = claims.require_role(Role::Admin).unwrap_err();
        assert_eq!(err.to_string(), "Admin only");
    }
}
