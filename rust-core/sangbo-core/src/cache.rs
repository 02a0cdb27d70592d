//! # File Cache
//!
//! Key/value cache persisted as one JSON file per key.
//!
//! Each file is named by the SHA-256 of its key and holds
//! `{"expire": <unix secs>, "value": <json>}`. Writes land in a temporary
//! file first and are renamed into place, so readers never see a torn entry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const EXTENSION: &str = "cache.json";

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    expire: i64,
    value: Value,
}

/// Cache rooted at a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| cache_error(&dir, &e))?;
        Ok(Self { dir })
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{digest}.{EXTENSION}"))
    }

    /// Store `value` under `key` for `ttl`
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the entry cannot be written.
    pub fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let entry = Entry {
            expire: chrono::Utc::now().timestamp().saturating_add(ttl),
            value: value.clone(),
        };
        let body = serde_json::to_vec(&entry)?;

        let target = self.file(key);
        let tmp = self.dir.join(format!(".{:016x}.tmp", fastrand::u64(..)));
        fs::write(&tmp, body).map_err(|e| cache_error(&tmp, &e))?;
        fs::rename(&tmp, &target).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            cache_error(&target, &e)
        })?;

        debug!(key = %key, ttl_secs = ttl, "Cache entry stored");
        Ok(())
    }

    /// Read a live entry
    ///
    /// Expired or unreadable entries are removed and reported as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let file = self.file(key);
        let bytes = match fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key = %key, "Cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<Entry>(&bytes) {
            Ok(entry) if entry.expire >= chrono::Utc::now().timestamp() => Some(entry.value),
            Ok(_) => {
                debug!(key = %key, "Cache entry expired");
                let _ = fs::remove_file(&file);
                None
            }
            Err(e) => {
                warn!(key = %key, "Corrupt cache entry removed: {}", e);
                let _ = fs::remove_file(&file);
                None
            }
        }
    }

    /// Read an entry or fall back to `default`
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Remove an entry; removing an absent key succeeds
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if an existing file cannot be removed.
    pub fn delete(&self, key: &str) -> Result<()> {
        let file = self.file(key);
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_error(&file, &e)),
        }
    }

    /// Remove every entry in the directory
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the directory cannot be listed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir).map_err(|e| cache_error(&self.dir, &e))? {
            let path = entry?.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(EXTENSION));
            if is_entry && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "Cache cleared");
        Ok(removed)
    }
}

fn cache_error(path: &Path, err: &std::io::Error) -> Error {
    Error::Cache {
        message: format!("{}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> (tempfile::TempDir, FileCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_set_get() {
        let (_dir, cache) = cache();
        cache.set("user:1", &json!({"name": "a"}), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("user:1"), Some(json!({"name": "a"})));
        assert_eq!(cache.get("user:2"), None);
    }

    #[test]
    fn test_file_named_by_digest() {
        let (_dir, cache) = cache();
        cache.set("k", &json!(1), Duration::from_secs(60)).unwrap();
        let names: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        let expected = format!("{}.{EXTENSION}", hex::encode(Sha256::digest(b"k")));
        assert_eq!(names, vec![expected]);
    }

    #[test]
    fn test_expired_entry_removed() {
        let (_dir, cache) = cache();
        let entry = Entry {
            expire: chrono::Utc::now().timestamp() - 10,
            value: json!("old"),
        };
        fs::write(cache.file("stale"), serde_json::to_vec(&entry).unwrap()).unwrap();

        assert_eq!(cache.get("stale"), None);
        assert!(!cache.file("stale").exists());
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let (_dir, cache) = cache();
        fs::write(cache.file("bad"), b"not json").unwrap();
        assert_eq!(cache.get_or("bad", json!("fallback")), json!("fallback"));
        assert!(!cache.file("bad").exists());
    }

    #[test]
    fn test_overwrite_and_delete() {
        let (_dir, cache) = cache();
        cache.set("k", &json!(1), Duration::from_secs(60)).unwrap();
        cache.set("k", &json!(2), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k"), Some(json!(2)));

        cache.delete("k").unwrap();
        cache.delete("k").unwrap();
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_clear() {
        let (_dir, cache) = cache();
        for i in 0..3 {
            cache.set(&format!("k{i}"), &json!(i), Duration::from_secs(60)).unwrap();
        }
        fs::write(cache.dir().join("keep.txt"), b"x").unwrap();

        assert_eq!(cache.clear().unwrap(), 3);
        assert!(cache.dir().join("keep.txt").exists());
    }
}
