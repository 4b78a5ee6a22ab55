//! Core domain logic for ListShare, a shared task-list app.
//! Every invariant about lists, sharing and sessions lives here; the FFI and
//! CLI crates only translate.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod state;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthPolicy, ConfigError, CoreConfig, ListLimits};
pub use logging::{default_log_level, init_logging, init_logging_with_config, logging_status};
pub use model::filter::{ListFilter, SortKey, SortOrder};
pub use model::list::{ListId, ListStatistics, ListWithStats, Task, TaskId, TaskList};
pub use model::user::{User, UserId, UserSummary};
pub use service::auth_service::{AuthError, AuthService, Session};
pub use service::list_service::{ListService, ListServiceError};
pub use service::ErrorKind;
pub use storage::{KvStore, MemoryKvStore, SqliteKvStore, StorageError};

/// Health check for bridge wiring.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
