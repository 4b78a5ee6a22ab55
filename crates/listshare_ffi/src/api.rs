//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose list, task and account use cases to Dart via FRB.
//! - Translate core results into one flat response envelope.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - `data` is always a JSON document in the camelCase wire shape.
//! - List calls authenticate the caller from the session token first.

use listshare_core::model::filter::ListFilter;
use listshare_core::service::auth_service::{RegisterRequest, UpdateProfileRequest};
use listshare_core::service::list_service::{
    AddTaskRequest, CreateListRequest, ShareListRequest, UpdateListRequest, UpdateTaskRequest,
};
use listshare_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    init_logging_with_config, ping as ping_inner,
    AuthError, AuthService, Clock, CoreConfig, ErrorKind, ListService, ListServiceError,
    SqliteKvStore, SystemClock, UserSummary,
};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

type SharedStore = Arc<SqliteKvStore>;

static CORE: Mutex<Option<Arc<AppCore>>> = Mutex::new(None);

struct AppCore {
    lists: ListService<SharedStore>,
    auth: AuthService<SharedStore>,
}

impl AppCore {
    fn open(config: &CoreConfig) -> Result<Self, Failure> {
        let store: SharedStore = Arc::new(
            SqliteKvStore::open(&config.db_path)
                .map_err(|err| Failure::new(ErrorKind::Storage, err.to_string()))?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            lists: ListService::new(store.clone(), clock.clone(), config),
            auth: AuthService::new(store, clock, config.auth.clone()),
        })
    }
}

/// Flat result envelope shared by every use-case call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub success: bool,
    /// JSON payload on success.
    pub data: Option<String>,
    /// Error category (`validation|not_found|permission|authentication|storage|unknown`).
    pub error: Option<String>,
    /// Human-readable error message.
    pub message: Option<String>,
}

impl ApiResponse {
    fn ok(data: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    fn failed(failure: Failure) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(failure.kind.as_str().to_string()),
            message: Some(failure.message),
        }
    }
}

struct Failure {
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ListServiceError> for Failure {
    fn from(err: ListServiceError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<AuthError> for Failure {
    fn from(err: AuthError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
/// A blank `level` falls back to `LISTSHARE_LOG_LEVEL`, then the build
/// default. Repeating the call with the same setup is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let result = if level.trim().is_empty() {
        match CoreConfig::from_env() {
            Ok(config) => init_logging_with_config(&config, log_dir.as_str()),
            Err(err) => return err.to_string(),
        }
    } else {
        init_logging_inner(level.as_str(), log_dir.as_str())
    };
    match result {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Opens the store at `db_path` (or the configured default) and replaces
/// any previously opened core.
///
/// # FFI contract
/// - Optional: other calls open the environment-configured store lazily.
/// - Drops cached views and login throttling state of the previous core.
#[flutter_rust_bridge::frb(sync)]
pub fn core_open(db_path: Option<String>) -> ApiResponse {
    respond((|| {
        let mut config = load_config()?;
        if let Some(path) = db_path.map(|raw| raw.trim().to_string()) {
            if !path.is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }
        let core = Arc::new(AppCore::open(&config)?);
        *CORE.lock().unwrap_or_else(PoisonError::into_inner) = Some(core);
        info!("event=core_open module=ffi status=ok");
        Ok(config.db_path.display().to_string())
    })())
}

#[flutter_rust_bridge::frb(sync)]
pub fn auth_register(email: String, password: String, name: String) -> ApiResponse {
    respond(with_core(|core| {
        Ok(core.auth.register(&RegisterRequest {
            email,
            password,
            name,
        })?)
    }))
}

/// Signs in and persists the session; `data` is the session JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_login(email: String, password: String) -> ApiResponse {
    respond(with_core(|core| Ok(core.auth.login(&email, &password)?)))
}

#[flutter_rust_bridge::frb(sync)]
pub fn auth_logout() -> ApiResponse {
    respond(with_core(|core| Ok(core.auth.logout()?)))
}

/// `data` is the restored session JSON, or `null` when signed out or expired.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_restore_session() -> ApiResponse {
    respond(with_core(|core| Ok(core.auth.restore_session()?)))
}

/// Updates the caller's name and/or email.
///
/// Cached list views embed viewer identity, so they are all dropped.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_update_profile(
    token: String,
    name: Option<String>,
    email: Option<String>,
) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let updated = core
            .auth
            .update_profile(user.id, &UpdateProfileRequest { name, email })?;
        core.lists.invalidate_user(user.id);
        Ok(updated)
    }))
}

/// Loads the caller's lists. `filter_json` is an optional `ListFilter`
/// document; missing fields take their defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_load(token: String, filter_json: Option<String>) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let filter = parse_filter(filter_json.as_deref())?;
        Ok(core.lists.load_user_lists(user.id, &filter)?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_get(token: String, list_id: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core.lists.get_list(user.id, list_id)?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_create(token: String, title: String, initial_tasks: Vec<String>) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        Ok(core.lists.create_list(
            user.id,
            &CreateListRequest {
                title,
                initial_tasks,
            },
        )?)
    }))
}

/// Renames a list and/or replaces its collaborator set.
#[flutter_rust_bridge::frb(sync)]
pub fn list_update(
    token: String,
    list_id: String,
    title: Option<String>,
    shared_with: Option<Vec<String>>,
) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core.lists.update_list(
            user.id,
            list_id,
            &UpdateListRequest { title, shared_with },
        )?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_delete(token: String, list_id: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core.lists.delete_list(user.id, list_id)?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_share(token: String, list_id: String, user_email: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core
            .lists
            .share_list(user.id, &ShareListRequest { list_id, user_email })?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_unshare(token: String, list_id: String, user_email: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core.lists.unshare_list(user.id, list_id, &user_email)?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_add(token: String, list_id: String, text: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        Ok(core
            .lists
            .add_task(user.id, &AddTaskRequest { list_id, text })?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_update(
    token: String,
    list_id: String,
    task_id: String,
    text: Option<String>,
    completed: Option<bool>,
) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        let task_id = parse_id("task id", &task_id)?;
        Ok(core.lists.update_task(
            user.id,
            list_id,
            task_id,
            &UpdateTaskRequest { text, completed },
        )?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(token: String, list_id: String, task_id: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        let task_id = parse_id("task id", &task_id)?;
        Ok(core.lists.delete_task(user.id, list_id, task_id)?)
    }))
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle(token: String, list_id: String, task_id: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        let list_id = parse_id("list id", &list_id)?;
        let task_id = parse_id("task id", &task_id)?;
        Ok(core.lists.toggle_task(user.id, list_id, task_id)?)
    }))
}

/// `data` is the backup document `{version, exportedAt, user, lists}`.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_export(token: String) -> ApiResponse {
    respond(with_user(&token, |core, user| {
        Ok(core.lists.export_lists(user.id)?)
    }))
}

fn respond<T: Serialize>(result: Result<T, Failure>) -> ApiResponse {
    match result.and_then(|value| {
        serde_json::to_string(&value)
            .map_err(|err| Failure::new(ErrorKind::Unknown, format!("encode failed: {err}")))
    }) {
        Ok(data) => ApiResponse::ok(data),
        Err(failure) => {
            if matches!(failure.kind, ErrorKind::Storage | ErrorKind::Unknown) {
                warn!(
                    "event=ffi_call module=ffi status=error error_code={}",
                    failure.kind.as_str()
                );
            }
            ApiResponse::failed(failure)
        }
    }
}

fn load_config() -> Result<CoreConfig, Failure> {
    CoreConfig::from_env().map_err(|err| Failure::new(ErrorKind::Validation, err.to_string()))
}

fn current_core() -> Result<Arc<AppCore>, Failure> {
    let mut slot = CORE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(core) = slot.as_ref() {
        return Ok(core.clone());
    }
    let core = Arc::new(AppCore::open(&load_config()?)?);
    *slot = Some(core.clone());
    Ok(core)
}

fn with_core<T>(f: impl FnOnce(&AppCore) -> Result<T, Failure>) -> Result<T, Failure> {
    let core = current_core()?;
    f(&core)
}

fn with_user<T>(
    token: &str,
    f: impl FnOnce(&AppCore, UserSummary) -> Result<T, Failure>,
) -> Result<T, Failure> {
    with_core(|core| {
        let user = core.auth.authenticate(token)?;
        f(core, user)
    })
}

fn parse_id(label: &str, raw: &str) -> Result<Uuid, Failure> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Failure::new(ErrorKind::Validation, format!("invalid {label}: `{raw}`")))
}

fn parse_filter(raw: Option<&str>) -> Result<ListFilter, Failure> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(json) => serde_json::from_str(json)
            .map_err(|err| Failure::new(ErrorKind::Validation, format!("invalid filter: {err}"))),
        None => Ok(ListFilter::default()),
    }
}
