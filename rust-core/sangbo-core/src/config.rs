//! # Configuration
//!
//! Application settings loaded from a TOML file. Every field has a default,
//! so an empty file (or no file) yields a runnable configuration.
//!
//! ```toml
//! name = "sangbo"
//! env = "production"
//!
//! [server]
//! address = "0.0.0.0:8080"
//!
//! [log]
//! level = "info"
//! json = true
//!
//! [databases.default]
//! url = "sqlite://storage/app.db"
//! ```
//!
//! `SANGBO_ADDRESS` and `SANGBO_ENV` override the file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name
    pub name: String,
    /// Environment label ("local", "production", ...)
    pub env: String,
    /// File cache directory
    pub cache_path: PathBuf,
    /// Directory [`crate::AppContext::store_upload`] writes into
    pub upload_path: PathBuf,
    /// Logging settings
    pub log: LogConfig,
    /// HTTP server settings
    pub server: ServerSettings,
    /// Admin token and CSRF settings
    pub security: SecurityConfig,
    /// Named database connections
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "sangbo".to_string(),
            env: "local".to_string(),
            cache_path: PathBuf::from("storage/cache"),
            upload_path: PathBuf::from("storage/uploads"),
            log: LogConfig::default(),
            server: ServerSettings::default(),
            security: SecurityConfig::default(),
            databases: BTreeMap::new(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for daily log files; `None` logs to stdout only
    pub path: Option<PathBuf>,
    /// Default level filter, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("storage/logs")),
            level: "info".to_string(),
            json: false,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to (e.g., "127.0.0.1:8000")
    pub address: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_timeout_secs: u64,
    /// HTTP/1 keep-alive
    pub keep_alive: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
            max_body_size: 10 * 1024 * 1024,
            shutdown_timeout_secs: 30,
            keep_alive: true,
        }
    }
}

impl ServerSettings {
    /// Shutdown drain timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Admin token and CSRF settings
///
/// Unset values fall back to presence-only checks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HS256 secret verifying `x-admin-token` as a JWT
    pub jwt_secret: Option<String>,
    /// Exact value required in `x-csrf-token`
    pub csrf_token: Option<String>,
}

/// One database connection
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; the scheme selects the driver
    pub url: String,
    /// Maximum pool size
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl AppConfig {
    /// Load from a TOML file, apply environment overrides and validate
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, does not parse,
    /// or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text without environment overrides
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on a syntax or type error.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    /// Apply `SANGBO_ADDRESS` / `SANGBO_ENV` as read by `lookup`
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(address) = lookup("SANGBO_ADDRESS").filter(|v| !v.is_empty()) {
            self.server.address = address;
        }
        if let Some(env) = lookup("SANGBO_ENV").filter(|v| !v.is_empty()) {
            self.env = env;
        }
    }

    /// Semantic checks that TOML types cannot express
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config {
                message: "name must not be empty".to_string(),
            });
        }
        if self.server.max_body_size == 0 {
            return Err(Error::Config {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        if let Some((name, _)) = self.databases.iter().find(|(_, db)| db.url.is_empty()) {
            return Err(Error::Config {
                message: format!("databases.{name}.url must not be empty"),
            });
        }
        Ok(())
    }

    /// Whether the environment label is "production"
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.name, "sangbo");
        assert_eq!(config.server.address, "127.0.0.1:8000");
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.log.level, "info");
        assert!(config.databases.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            name = "demo"
            env = "production"

            [server]
            address = "0.0.0.0:9000"

            [log]
            json = true

            [security]
            jwt_secret = "s3cret"

            [databases.default]
            url = "sqlite::memory:"
            max_connections = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "demo");
        assert!(config.is_production());
        assert_eq!(config.server.address, "0.0.0.0:9000");
        assert!(config.server.keep_alive);
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.databases["default"].max_connections, Some(4));
        assert_eq!(config.security.jwt_secret.as_deref(), Some("s3cret"));
        assert!(config.security.csrf_token.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "SANGBO_ADDRESS" => Some("0.0.0.0:1234".to_string()),
            "SANGBO_ENV" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.server.address, "0.0.0.0:1234");
        assert_eq!(config.env, "local");
    }

    #[test]
    fn test_validation_failures() {
        let config = AppConfig::from_toml_str("name = \"  \"").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        let config = AppConfig::from_toml_str("[server]\nmax_body_size = 0").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[databases.main]\nurl = \"\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_type_error_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml_str("name = 5"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "name = \"from-file\"").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().name, "from-file");
        assert!(AppConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
