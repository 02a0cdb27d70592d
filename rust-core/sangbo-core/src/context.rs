//! # Application Context
//!
//! Shared resources built once at startup and handed to controllers behind
//! an `Arc`: configuration, file cache and named database pools.

use crate::cache::FileCache;
use crate::config::AppConfig;
use crate::database::DatabasePool;
use crate::error::{Error, Result};
use crate::helper::{self, DEFAULT_UPLOAD_EXTENSIONS};
use crate::request::UploadedFile;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Startup-built, read-only application resources
#[derive(Debug, Clone)]
pub struct AppContext {
    config: AppConfig,
    cache: FileCache,
    databases: BTreeMap<String, DatabasePool>,
}

impl AppContext {
    /// Open the cache and connect every configured database
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the cache directory is unusable and
    /// `Error::Database` / `Error::Config` if a database cannot be connected.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        let cache = FileCache::new(&config.cache_path)?;

        let mut databases = BTreeMap::new();
        for (name, db) in &config.databases {
            let pool = DatabasePool::connect(db).await?;
            info!(database = %name, "Database ready");
            databases.insert(name.clone(), pool);
        }

        Ok(Self {
            config,
            cache,
            databases,
        })
    }

    /// Build a context from parts already at hand
    #[must_use]
    pub const fn from_parts(
        config: AppConfig,
        cache: FileCache,
        databases: BTreeMap<String, DatabasePool>,
    ) -> Self {
        Self {
            config,
            cache,
            databases,
        }
    }

    /// Application configuration
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// File cache
    #[must_use]
    pub const fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// A named database pool
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if no pool with that name was configured.
    pub fn database(&self, name: &str) -> Result<&DatabasePool> {
        self.databases.get(name).ok_or_else(|| Error::Database {
            message: format!("database '{name}' is not configured"),
        })
    }

    /// Store an uploaded file under the configured `upload_path`
    ///
    /// # Errors
    ///
    /// Returns `Error::Upload` for a disallowed extension or a failed write.
    pub fn store_upload(&self, file: &UploadedFile) -> Result<PathBuf> {
        helper::store_upload(file, &self.config.upload_path, DEFAULT_UPLOAD_EXTENSIONS)
    }

    /// Close every pool
    pub async fn shutdown(&self) {
        for pool in self.databases.values() {
            pool.close().await;
        }
    }
}
