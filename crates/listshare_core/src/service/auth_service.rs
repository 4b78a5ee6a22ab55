//! Authentication use-case service.
//!
//! # Responsibility
//! - Register users in the device-local directory.
//! - Verify credentials, issue signed session tokens, persist the session.
//! - Lock an email out after repeated failed logins.
//!
//! # Invariants
//! - A locked email is rejected before its password is checked.
//! - A lock lasts `lockout_window_ms` from the failure that triggered it;
//!   when it lapses the failure history for that email starts over.
//! - Failure history is process-local and keyed by normalized email.
//! - Persisted sessions are re-verified on restore; expired or forged
//!   tokens are removed.

use crate::clock::Clock;
use crate::config::AuthPolicy;
use crate::model::user::{
    normalize_email, validate_email, validate_name, User, UserId, UserSummary,
    UserValidationError,
};
use crate::repo::user_repo::{KvUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::password::{hash_password, verify_password, PasswordError};
use crate::service::token::{issue_token, verify_token, TokenClaims, TokenError};
use crate::service::ErrorKind;
use crate::storage::{load_json, save_json, KvStore, StorageError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

const SESSION_TOKEN_KEY: &str = "session_token";
const SESSION_USER_KEY: &str = "session_user";

#[derive(Debug)]
pub enum AuthError {
    Validation(UserValidationError),
    PasswordTooShort { min_chars: usize },
    EmailTaken(String),
    InvalidCredentials,
    LockedOut { retry_after_ms: i64 },
    UserNotFound(UserId),
    Token(TokenError),
    Password(PasswordError),
    Storage(StorageError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::PasswordTooShort { .. } | Self::EmailTaken(_) => {
                ErrorKind::Validation
            }
            Self::InvalidCredentials | Self::LockedOut { .. } | Self::Token(_) => {
                ErrorKind::Authentication
            }
            Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Password(_) => ErrorKind::Unknown,
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PasswordTooShort { min_chars } => {
                write!(f, "password must be at least {min_chars} characters")
            }
            Self::EmailTaken(email) => write!(f, "an account already exists for {email}"),
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::LockedOut { retry_after_ms } => write!(
                f,
                "too many failed attempts; try again in {} minute(s)",
                (retry_after_ms + 59_999) / 60_000
            ),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Token(err) => write!(f, "{err}"),
            Self::Password(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Token(err) => Some(err),
            Self::Password(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for AuthError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for AuthError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<PasswordError> for AuthError {
    fn from(value: PasswordError) -> Self {
        Self::Password(value)
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Storage(err) => Self::Storage(err),
            RepoError::DuplicateEmail(email) => Self::EmailTaken(email),
            RepoError::UserNotFound(id) => Self::UserNotFound(id),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// An authenticated session as handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: UserSummary,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Default)]
struct AttemptRecord {
    failures: Vec<i64>,
    locked_until: Option<i64>,
}

/// Per-email failed-login bookkeeping.
#[derive(Debug)]
pub struct LoginAttemptTracker {
    max_failures: usize,
    window_ms: i64,
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl LoginAttemptTracker {
    pub fn new(max_failures: usize, window_ms: i64) -> Self {
        Self {
            max_failures,
            window_ms,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Remaining lock time for `email`, or `None` when attempts are allowed.
    pub fn locked_for(&self, email: &str, now_ms: i64) -> Option<i64> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let locked_until = records.get(email)?.locked_until;
        match locked_until {
            Some(until) if now_ms < until => Some(until - now_ms),
            Some(_) => {
                records.remove(email);
                None
            }
            None => None,
        }
    }

    /// Records a failure; returns the lock duration when this failure locks.
    pub fn record_failure(&self, email: &str, now_ms: i64) -> Option<i64> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(email.to_string()).or_default();
        let window_start = now_ms - self.window_ms;
        record.failures.retain(|at| *at > window_start);
        record.failures.push(now_ms);
        if record.failures.len() >= self.max_failures {
            record.locked_until = Some(now_ms + self.window_ms);
            return Some(self.window_ms);
        }
        None
    }

    pub fn clear(&self, email: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(email);
    }
}

/// Authentication service over the shared key-value store.
pub struct AuthService<S: KvStore + Clone> {
    store: S,
    users: KvUserRepository<S>,
    attempts: LoginAttemptTracker,
    clock: Arc<dyn Clock>,
    policy: AuthPolicy,
}

impl<S: KvStore + Clone> AuthService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: AuthPolicy) -> Self {
        Self {
            users: KvUserRepository::new(store.clone()),
            store,
            attempts: LoginAttemptTracker::new(
                policy.max_failed_attempts,
                policy.lockout_window_ms,
            ),
            clock,
            policy,
        }
    }

    /// Creates an account; the email must not be registered yet.
    pub fn register(&self, request: &RegisterRequest) -> AuthResult<UserSummary> {
        let email = validate_email(&request.email)?;
        let name = validate_name(&request.name)?;
        if request.password.chars().count() < self.policy.min_password_chars {
            return Err(AuthError::PasswordTooShort {
                min_chars: self.policy.min_password_chars,
            });
        }
        if self.users.find_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&request.password)?,
            name,
            created_at: self.clock.now_ms(),
        };
        self.users.create_user(&user)?;
        info!("event=auth_register module=auth status=ok user_id={}", user.id);
        Ok(UserSummary::from(&user))
    }

    /// Verifies credentials and persists a fresh session.
    pub fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email);
        let now = self.clock.now_ms();

        if let Some(retry_after_ms) = self.attempts.locked_for(&email, now) {
            warn!("event=auth_login module=auth status=rejected error_code=locked_out");
            return Err(AuthError::LockedOut { retry_after_ms });
        }

        let user = match self.users.find_by_email(&email)? {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                let locked = self.attempts.record_failure(&email, now);
                warn!(
                    "event=auth_login module=auth status=rejected error_code=invalid_credentials locked={}",
                    locked.is_some()
                );
                return Err(match locked {
                    Some(retry_after_ms) => AuthError::LockedOut { retry_after_ms },
                    None => AuthError::InvalidCredentials,
                });
            }
        };

        self.attempts.clear(&email);
        let session = self.start_session(&user, now)?;
        info!("event=auth_login module=auth status=ok user_id={}", user.id);
        Ok(session)
    }

    /// Removes the persisted session. Idempotent.
    pub fn logout(&self) -> AuthResult<()> {
        self.store.remove(SESSION_TOKEN_KEY)?;
        self.store.remove(SESSION_USER_KEY)?;
        info!("event=auth_logout module=auth status=ok");
        Ok(())
    }

    /// Loads and re-verifies the persisted session.
    ///
    /// Returns `Ok(None)` when there is no session or it is no longer valid;
    /// invalid sessions are cleared from storage.
    pub fn restore_session(&self) -> AuthResult<Option<Session>> {
        let Some(token) = load_json::<String, _>(&self.store, SESSION_TOKEN_KEY)? else {
            return Ok(None);
        };
        let claims = match self.verify_token(&token) {
            Ok(claims) => claims,
            Err(AuthError::Token(err)) => {
                info!("event=auth_restore module=auth status=dropped reason={err}");
                self.logout()?;
                return Ok(None);
            }
            Err(other) => return Err(other),
        };
        let Some(user) = self.users.get_user(claims.sub)? else {
            self.logout()?;
            return Ok(None);
        };
        let summary = UserSummary::from(&user);
        save_json(&self.store, SESSION_USER_KEY, &summary)?;
        Ok(Some(Session {
            user: summary,
            token,
            expires_at: claims.exp,
        }))
    }

    /// Checks signature and expiry of a session token.
    pub fn verify_token(&self, token: &str) -> AuthResult<TokenClaims> {
        Ok(verify_token(
            &self.policy.session_secret,
            token,
            self.clock.now_ms(),
        )?)
    }

    /// Resolves the user a valid token belongs to.
    pub fn authenticate(&self, token: &str) -> AuthResult<UserSummary> {
        let claims = self.verify_token(token)?;
        let user = self
            .users
            .get_user(claims.sub)?
            .ok_or(AuthError::UserNotFound(claims.sub))?;
        Ok(UserSummary::from(&user))
    }

    /// Updates display name and/or email.
    ///
    /// Lists shared with the old email are not rewritten; the owner has to
    /// share them again with the new address. Callers holding a
    /// `ListService` must call `ListService::invalidate_user` afterwards.
    pub fn update_profile(
        &self,
        user_id: UserId,
        request: &UpdateProfileRequest,
    ) -> AuthResult<UserSummary> {
        let name = request.name.as_deref().map(validate_name).transpose()?;
        let email = request.email.as_deref().map(validate_email).transpose()?;

        let mut user = self
            .users
            .get_user(user_id)?
            .ok_or(AuthError::UserNotFound(user_id))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email {
            user.email = email;
        }
        self.users.update_user(&user)?;

        let summary = UserSummary::from(&user);
        if let Some(current) = load_json::<UserSummary, _>(&self.store, SESSION_USER_KEY)? {
            if current.id == user_id {
                save_json(&self.store, SESSION_USER_KEY, &summary)?;
            }
        }
        info!("event=auth_profile_update module=auth status=ok user_id={user_id}");
        Ok(summary)
    }

    pub fn get_user(&self, user_id: UserId) -> AuthResult<Option<UserSummary>> {
        Ok(self.users.get_user(user_id)?.as_ref().map(UserSummary::from))
    }

    pub fn find_user_by_email(&self, email: &str) -> AuthResult<Option<UserSummary>> {
        Ok(self.users.find_by_email(email)?.as_ref().map(UserSummary::from))
    }

    fn start_session(&self, user: &User, now: i64) -> AuthResult<Session> {
        let token = issue_token(
            &self.policy.session_secret,
            user.id,
            now,
            self.policy.token_ttl_ms,
        );
        let summary = UserSummary::from(user);
        save_json(&self.store, SESSION_TOKEN_KEY, &token)?;
        save_json(&self.store, SESSION_USER_KEY, &summary)?;
        Ok(Session {
            user: summary,
            token,
            expires_at: now.saturating_add(self.policy.token_ttl_ms),
        })
    }
}
