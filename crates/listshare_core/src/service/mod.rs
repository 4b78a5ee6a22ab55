//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.
//! - Classify every failure into one `ErrorKind` for result envelopes.

pub mod auth_service;
pub mod cache;
pub mod list_service;
pub mod password;
pub mod token;

/// Coarse failure class surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape, length, or a rule violation; nothing was written.
    Validation,
    NotFound,
    /// Authenticated but not allowed to perform this action.
    Permission,
    /// Credentials rejected, locked out, or session invalid.
    Authentication,
    Storage,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Authentication => "authentication",
            Self::Storage => "storage",
            Self::Unknown => "unknown",
        }
    }
}
