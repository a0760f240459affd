//! Runtime configuration from the environment.
//!
//! `.env` is loaded by the binary before [`AppConfig::from_env`] runs. Every
//! setting has a default; a value that does not parse is logged and replaced
//! by that default.
//!
//! | Variable                     | Default  |
//! |------------------------------|----------|
//! | `TABMATCH_PORT`              | 3000     |
//! | `TABMATCH_PREVIEW_ROWS`      | 20       |
//! | `TABMATCH_MAX_UPLOAD_BYTES`  | 50 MiB   |
//! | `TABMATCH_LOG_LEVEL`         | info     |

use std::str::FromStr;

use crate::logging::{log_warning, LogLevel};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PREVIEW_ROWS: usize = 20;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Rows returned by the preview endpoint when the request gives no limit.
    pub preview_rows: usize,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log_level: LogLevel::Info,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: setting(&lookup, "TABMATCH_PORT", defaults.port),
            preview_rows: setting(&lookup, "TABMATCH_PREVIEW_ROWS", defaults.preview_rows),
            max_upload_bytes: setting(&lookup, "TABMATCH_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            log_level: setting(&lookup, "TABMATCH_LOG_LEVEL", defaults.log_level),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn setting<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log_warning(format!("Ignoring invalid {key}={raw:?}, using default"));
                default
            }
        },
    }
}
