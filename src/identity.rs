//! Identity collaborator: sign-up, sign-in, and profile updates.
//!
//! The picker only needs the fact that someone is signed in. This module
//! provides that fact through the `IdentityProvider` trait and a local
//! SQLite-backed implementation with PBKDF2-SHA256 password hashes.

use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::db::DatabaseError;

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const PBKDF2_ITERATIONS: u32 = 600_000;
const HASH_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

/// Authentication failures. Display strings are shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please fill in all fields")]
    MissingFields,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("This email is already registered. Please sign in instead.")]
    EmailAlreadyInUse,
    #[error("No account found with this email.")]
    UserNotFound,
    #[error("Incorrect password.")]
    WrongPassword,
    #[error("Username cannot be empty")]
    EmptyUsername,
    #[error("Please sign in to access this page.")]
    NotSignedIn,
    #[error("Identity store error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Internal lock error")]
    LockPoisoned,
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(DatabaseError::Sqlite(err))
    }
}

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    /// Display name; may be empty for accounts created without one.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Display name, else the local part of the email.
    pub fn username(&self) -> String {
        let name = self.display_name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Uppercase first character of the username, for the avatar.
    pub fn initial(&self) -> String {
        self.username()
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }

    /// `"January 2026"`.
    pub fn member_since(&self) -> String {
        self.created_at.format("%B %Y").to_string()
    }

    pub fn view(&self) -> ProfileView {
        ProfileView {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username(),
            initial: self.initial(),
            member_since: self.member_since(),
        }
    }
}

/// Profile card data for the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub initial: String,
    pub member_since: String,
}

/// Sign-up form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Field checks that run before the provider is contacted.
    pub fn validate(&self) -> Result<(), AuthError> {
        let username = self.username.trim();
        let email = self.email.trim();
        let password = self.password.trim();
        let confirm = self.confirm_password.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Sign-in form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(())
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

// ═══════════════════════════════════════════
// Session tokens
// ═══════════════════════════════════════════

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Only this digest is kept server-side.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

// ═══════════════════════════════════════════
// IdentityProvider
// ═══════════════════════════════════════════

pub trait IdentityProvider: Send + Sync {
    fn sign_up(&self, email: &str, password: &str, username: &str)
        -> Result<UserProfile, AuthError>;

    fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError>;

    fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, AuthError>;

    fn update_display_name(&self, user_id: &str, name: &str) -> Result<UserProfile, AuthError>;
}

/// Accounts in the local SQLite database.
pub struct LocalIdentityProvider {
    conn: Mutex<Connection>,
    iterations: u32,
}

impl LocalIdentityProvider {
    pub fn new(conn: Connection) -> Self {
        Self::with_iterations(conn, PBKDF2_ITERATIONS)
    }

    /// Lower iteration counts keep tests fast. Never below 1.
    pub fn with_iterations(conn: Connection, iterations: u32) -> Self {
        Self {
            conn: Mutex::new(conn),
            iterations: iterations.max(1),
        }
    }

    fn hash(&self, password: &str, salt: &[u8]) -> [u8; HASH_LENGTH] {
        let mut out = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut out);
        out
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AuthError> {
        self.conn.lock().map_err(|_| AuthError::LockPoisoned)
    }
}

fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let created: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at,
    })
}

impl IdentityProvider for LocalIdentityProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<UserProfile, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        let salt = generate_salt();
        let hash = self.hash(password, &salt);
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: username.trim().to_string(),
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM accounts WHERE email = ?1",
            params![profile.email],
            |row| row.get(0),
        )?;
        if exists {
            return Err(AuthError::EmailAlreadyInUse);
        }

        conn.execute(
            "INSERT INTO accounts (id, email, username, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.id,
                profile.email,
                profile.display_name,
                hash.to_vec(),
                salt.to_vec(),
                profile.created_at.to_rfc3339(),
            ],
        )?;

        tracing::info!(user_id = %profile.id, "Account created");
        Ok(profile)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT id, email, username, created_at, password_hash, salt
                 FROM accounts WHERE email = ?1",
                params![email.trim()],
                |row| {
                    let profile = row_to_profile(row)?;
                    let hash: Vec<u8> = row.get(4)?;
                    let salt: Vec<u8> = row.get(5)?;
                    Ok((profile, hash, salt))
                },
            )
            .optional()?;
        drop(conn);

        let (profile, stored_hash, salt) = found.ok_or(AuthError::UserNotFound)?;
        let candidate = self.hash(password, &salt);
        if !bool::from(candidate.as_slice().ct_eq(stored_hash.as_slice())) {
            tracing::debug!(user_id = %profile.id, "Sign-in rejected");
            return Err(AuthError::WrongPassword);
        }

        tracing::info!(user_id = %profile.id, "Signed in");
        Ok(profile)
    }

    fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, AuthError> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                "SELECT id, email, username, created_at FROM accounts WHERE id = ?1",
                params![user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn update_display_name(&self, user_id: &str, name: &str) -> Result<UserProfile, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        {
            let conn = self.lock()?;
            let updated = conn.execute(
                "UPDATE accounts SET username = ?1 WHERE id = ?2",
                params![name, user_id],
            )?;
            if updated == 0 {
                return Err(AuthError::UserNotFound);
            }
        }
        self.find_user(user_id)?.ok_or(AuthError::UserNotFound)
    }
}
