//! Application settings.
//!
//! Settings are read once at startup from an optional TOML file, then
//! overridden by environment variables (a `.env` file is honoured through
//! `dotenvy` in `main`). The resulting [`AppConfig`] is passed by reference to
//! whatever needs it; nothing reads settings from global state.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "lendbook.toml";

/// Process-wide settings, constructed once in `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `SeaORM` connection string
    pub database_url: String,
    /// Address the HTTP API listens on
    pub bind_addr: String,
    /// Whether `POST /register` may create collector accounts
    pub allow_self_registration: bool,
    /// Page size used when a list request gives no `limit`
    pub default_page_size: u64,
    /// Upper bound on any requested `limit`
    pub max_page_size: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://lendbook.sqlite?mode=rwc".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            allow_self_registration: false,
            default_page_size: 100,
            max_page_size: 1000,
        }
    }
}

impl AppConfig {
    /// Applies `DATABASE_URL`, `BIND_ADDR` and `ALLOW_SELF_REGISTRATION`
    /// overrides using the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(flag) = lookup("ALLOW_SELF_REGISTRATION") {
            self.allow_self_registration = flag.parse().map_err(|_| Error::Config {
                message: format!("ALLOW_SELF_REGISTRATION must be true or false, got {flag:?}"),
            })?;
        }
        Ok(())
    }

    /// Clamps a requested page size to the configured bounds.
    #[must_use]
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {path_ref:?}: {e}"),
    })
}

/// Builds the application configuration: the file named by `LENDBOOK_CONFIG`
/// (or `lendbook.toml` if present), then environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("LENDBOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        tracing::info!("No config file at {}, using defaults", path);
        AppConfig::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}
