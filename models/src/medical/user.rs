// models/src/medical/user.rs

use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::medical::role::Role;

// --- DTO for account creation ---
// Temporarily holds the plaintext password for hashing; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub approved: bool,
}

// --- Stored user record ---
// Carries the password hash, never the plaintext password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub approved: bool,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Hashes a plaintext password.
    pub fn hash_password(password: &str) -> Result<String, BcryptError> {
        hash(password, DEFAULT_COST)
    }

    /// Verifies a plaintext password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
        verify(password, hash)
    }

    /// Creates a stored `User` from a `NewUser` DTO, hashing the password.
    /// The id is assigned by the storage layer.
    pub fn from_new_user(id: u64, new_user: NewUser) -> Result<Self, BcryptError> {
        let password_hash = Self::hash_password(&new_user.password)?;
        Ok(User {
            id,
            username: new_user.username,
            password_hash,
            role: new_user.role,
            approved: new_user.approved,
            blocked: false,
            created_at: Utc::now(),
        })
    }

    /// Whether the account name can receive mail. Patient and doctor
    /// usernames double as notification addresses when they contain '@'.
    pub fn has_mail_address(&self) -> bool {
        self.username.contains('@')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String, // Plaintext password for the login attempt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_hash_and_verify_password() {
        let hashed = User::hash_password("pw1").unwrap();
        assert_ne!(hashed, "pw1");
        assert!(User::verify_password("pw1", &hashed).unwrap());
        assert!(!User::verify_password("wrong", &hashed).unwrap());
    }

    #[test]
    fn should_build_user_from_new_user() {
        let user = User::from_new_user(
            7,
            NewUser {
                username: "a@x.com".into(),
                password: "pw1".into(),
                role: Role::Patient,
                approved: true,
            },
        )
        .unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, Role::Patient);
        assert!(user.approved);
        assert!(!user.blocked);
        assert!(User::verify_password("pw1", &user.password_hash).unwrap());
    }

    #[test]
    fn should_detect_mail_shaped_username() {
        let mut user = User::from_new_user(
            1,
            NewUser {
                username: "a@x.com".into(),
                password: "pw".into(),
                role: Role::Patient,
                approved: true,
            },
        )
        .unwrap();
        assert!(user.has_mail_address());
        user.username = "plainname".into();
        assert!(!user.has_mail_address());
    }
}
