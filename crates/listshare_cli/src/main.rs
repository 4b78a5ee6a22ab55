//! CLI smoke entry point.
//!
//! - No arguments: print linkage and schema info.
//! - `export <db_path> <email>`: print that user's backup document.

use listshare_core::db::migrations::latest_version;
use listshare_core::{AuthService, CoreConfig, ListService, SqliteKvStore, SystemClock};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("listshare_core ping={}", listshare_core::ping());
            println!("listshare_core version={}", listshare_core::core_version());
            println!("listshare_core schema_version={}", latest_version());
            ExitCode::SUCCESS
        }
        [command, db_path, email] if command == "export" => match export(db_path, email) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("export failed: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: listshare_cli [export <db_path> <email>]");
            ExitCode::from(2)
        }
    }
}

fn export(db_path: &str, email: &str) -> Result<String, String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    let store = Arc::new(SqliteKvStore::open(db_path).map_err(|err| err.to_string())?);
    let clock = Arc::new(SystemClock);

    let auth = AuthService::new(store.clone(), clock.clone(), config.auth.clone());
    let user = auth
        .find_user_by_email(email)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("no user registered as `{email}`"))?;

    let lists = ListService::new(store, clock, &config);
    let export = lists.export_lists(user.id).map_err(|err| err.to_string())?;
    serde_json::to_string_pretty(&export).map_err(|err| err.to_string())
}
