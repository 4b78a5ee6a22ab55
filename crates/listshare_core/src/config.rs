//! Runtime configuration for the core services.
//!
//! # Responsibility
//! - Hold list limits, cache policy, auth policy and storage location.
//! - Apply `LISTSHARE_*` environment overrides on top of defaults.
//!
//! # Invariants
//! - Defaults match the product limits (50 lists, 100 tasks, 10 shares).
//! - A session secret is always present; when none is configured a random
//!   one is generated per process, so persisted sessions do not survive a
//!   restart.

use rand::RngCore;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "LISTSHARE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "LISTSHARE_LOG_LEVEL";
pub const ENV_CACHE_TTL_SECS: &str = "LISTSHARE_CACHE_TTL_SECS";
pub const ENV_SESSION_SECRET: &str = "LISTSHARE_SESSION_SECRET";
pub const ENV_SEED_EXAMPLES: &str = "LISTSHARE_SEED_EXAMPLES";

const DEFAULT_DB_FILE_NAME: &str = "listshare.sqlite3";
const MIN_SESSION_SECRET_BYTES: usize = 16;

/// Hard ceilings enforced by the list service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub max_lists_per_user: usize,
    pub max_tasks_per_list: usize,
    pub max_shared_with: usize,
    pub max_title_chars: usize,
    pub max_task_text_chars: usize,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            max_lists_per_user: 50,
            max_tasks_per_list: 100,
            max_shared_with: 10,
            max_title_chars: 100,
            max_task_text_chars: 200,
        }
    }
}

/// Credential and session policy.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    pub max_failed_attempts: usize,
    pub lockout_window_ms: i64,
    pub token_ttl_ms: i64,
    pub min_password_chars: usize,
    pub session_secret: Vec<u8>,
}

impl std::fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPolicy")
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_window_ms", &self.lockout_window_ms)
            .field("token_ttl_ms", &self.token_ttl_ms)
            .field("min_password_chars", &self.min_password_chars)
            .field("session_secret", &"<redacted>")
            .finish()
    }
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_window_ms: 15 * 60 * 1000,
            token_ttl_ms: 24 * 60 * 60 * 1000,
            min_password_chars: 6,
            session_secret: random_secret(),
        }
    }
}

/// Top-level configuration shared by services and the FFI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: Option<String>,
    pub limits: ListLimits,
    /// `None` disables the list view cache.
    pub cache_ttl_ms: Option<i64>,
    pub auth: AuthPolicy,
    /// Seeds two example lists on a user's first-ever load.
    pub seed_example_lists: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: None,
            limits: ListLimits::default(),
            cache_ttl_ms: Some(5 * 60 * 1000),
            auth: AuthPolicy::default(),
            seed_example_lists: false,
        }
    }
}

impl CoreConfig {
    /// Builds a config from defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from defaults plus overrides resolved by `lookup`.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        config.log_level = read(ENV_LOG_LEVEL);

        if let Some(raw) = read(ENV_CACHE_TTL_SECS) {
            let secs: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_CACHE_TTL_SECS,
                value: raw.clone(),
            })?;
            config.cache_ttl_ms = match secs {
                0 => None,
                secs if secs > 0 => Some(secs.saturating_mul(1000)),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_CACHE_TTL_SECS,
                        value: raw,
                    })
                }
            };
        }

        if let Some(secret) = read(ENV_SESSION_SECRET) {
            if secret.len() < MIN_SESSION_SECRET_BYTES {
                return Err(ConfigError::SecretTooShort {
                    min_bytes: MIN_SESSION_SECRET_BYTES,
                });
            }
            config.auth.session_secret = secret.into_bytes();
        }

        if let Some(raw) = read(ENV_SEED_EXAMPLES) {
            config.seed_example_lists = parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: ENV_SEED_EXAMPLES,
                value: raw,
            })?;
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { name: &'static str, value: String },
    SecretTooShort { min_bytes: usize },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, value } => {
                write!(f, "invalid value `{value}` for {name}")
            }
            Self::SecretTooShort { min_bytes } => {
                write!(f, "{ENV_SESSION_SECRET} must be at least {min_bytes} bytes")
            }
        }
    }
}

impl Error for ConfigError {}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0_u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_CACHE_TTL_SECS, ENV_SEED_EXAMPLES};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_product_limits() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.limits.max_lists_per_user, 50);
        assert_eq!(config.limits.max_tasks_per_list, 100);
        assert_eq!(config.limits.max_shared_with, 10);
        assert_eq!(config.auth.max_failed_attempts, 5);
        assert_eq!(config.auth.lockout_window_ms, 900_000);
        assert!(!config.seed_example_lists);
    }

    #[test]
    fn zero_cache_ttl_disables_cache() {
        let config = CoreConfig::from_lookup(lookup(&[(ENV_CACHE_TTL_SECS, "0")])).unwrap();
        assert_eq!(config.cache_ttl_ms, None);
    }

    #[test]
    fn rejects_bad_values() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_SEED_EXAMPLES, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = CoreConfig::from_lookup(lookup(&[("LISTSHARE_SESSION_SECRET", "short")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SecretTooShort { .. }));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = CoreConfig::default();
        assert!(format!("{:?}", config.auth).contains("<redacted>"));
    }
}
