//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//! - `ASSETS_DIR`: Override the static assets directory (default: "public")
//!
//! This allows running several isolated instances side by side:
//! ```bash
//! DATA_DIR=data/test/a PORT=3001 cargo run
//! DATA_DIR=data/test/b PORT=3002 cargo run
//! ```

use std::env;
use std::sync::OnceLock;

/// Lazily initialized data directory from DATA_DIR env var
static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Lazily initialized assets directory from ASSETS_DIR env var
static ASSETS_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// Directory served under `/assets` (GOV.UK Frontend build output)
pub fn assets_dir() -> &'static str {
    ASSETS_DIR_VALUE
        .get_or_init(|| env::var("ASSETS_DIR").unwrap_or_else(|_| "public".to_string()))
}

/// Default SQLite session database path
pub fn session_db_path() -> String {
    format!("{}/sessions.db", data_dir())
}

/// Optional config file location
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Tests ====================
