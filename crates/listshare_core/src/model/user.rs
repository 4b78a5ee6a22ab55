//! User records and email/name validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UserId = Uuid;

const MAX_EMAIL_CHARS: usize = 254;
const MAX_NAME_CHARS: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

/// Registered account in the device-local user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Always stored normalized (trimmed, lowercase).
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub name: String,
    pub created_at: i64,
}

/// Public part of a user, safe to hand to UI and export documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    InvalidEmail(String),
    EmptyName,
    NameTooLong { max_chars: usize },
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::EmptyName => write!(f, "name must not be blank"),
            Self::NameTooLong { max_chars } => {
                write!(f, "name must be at most {max_chars} characters")
            }
        }
    }
}

impl Error for UserValidationError {}

/// Trims and lowercases an email without validating it.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns whether `email` is syntactically acceptable after normalization.
pub fn is_valid_email(email: &str) -> bool {
    let normalized = normalize_email(email);
    normalized.chars().count() <= MAX_EMAIL_CHARS && EMAIL_RE.is_match(&normalized)
}

/// Normalizes and validates an email address.
pub fn validate_email(email: &str) -> Result<String, UserValidationError> {
    if is_valid_email(email) {
        Ok(normalize_email(email))
    } else {
        Err(UserValidationError::InvalidEmail(email.trim().to_string()))
    }
}

/// Trims and validates a display name.
pub fn validate_name(name: &str) -> Result<String, UserValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(UserValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(UserValidationError::NameTooLong {
            max_chars: MAX_NAME_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
