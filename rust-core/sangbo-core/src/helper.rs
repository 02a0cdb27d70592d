//! Small utilities shared by controllers.

use crate::error::{Error, Result};
use crate::request::UploadedFile;
use chrono::{Local, TimeZone};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Extensions accepted by [`store_upload`] when no list is given
pub const DEFAULT_UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf"];

/// Default [`format_datetime`] layout
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Random alphanumeric string of `len` characters
#[must_use]
pub fn random_string(len: usize) -> String {
    (0..len)
        .map(|_| char::from(ALPHANUMERIC[fastrand::usize(..ALPHANUMERIC.len())]))
        .collect()
}

/// `sha256(sha256(password) + salt)` as lowercase hex
#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    let inner = hex::encode(Sha256::digest(password.as_bytes()));
    hex::encode(Sha256::digest(format!("{inner}{salt}").as_bytes()))
}

/// Check a password against a [`hash_password`] digest
#[must_use]
pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    hash_password(password, salt).eq_ignore_ascii_case(hash)
}

/// Format a unix timestamp (now when `None`) in local time
///
/// Out-of-range timestamps format as an empty string.
#[must_use]
pub fn format_datetime(timestamp: Option<i64>, format: &str) -> String {
    let moment = match timestamp {
        Some(ts) => Local.timestamp_opt(ts, 0).single(),
        None => Some(Local::now()),
    };
    moment.map(|m| m.format(format).to_string()).unwrap_or_default()
}

/// Write an uploaded file into `dir` under a unique name
///
/// The extension must be in `allowed` (case-insensitive). Returns the
/// stored path.
///
/// # Errors
///
/// Returns `Error::Upload` for a rejected extension or a failed write.
pub fn store_upload(file: &UploadedFile, dir: &Path, allowed: &[&str]) -> Result<PathBuf> {
    let ext = file
        .extension()
        .filter(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .ok_or_else(|| Error::Upload {
            message: format!("file type not allowed: {}", file.file_name),
        })?;

    fs::create_dir_all(dir).map_err(|e| Error::Upload {
        message: format!("{}: {e}", dir.display()),
    })?;

    let name = format!(
        "upload_{}_{}.{ext}",
        chrono::Utc::now().timestamp_micros(),
        random_string(8)
    );
    let dest = dir.join(name);
    fs::write(&dest, &file.bytes).map_err(|e| Error::Upload {
        message: format!("{}: {e}", dest.display()),
    })?;

    info!(field = %file.field, path = %dest.display(), size = file.bytes.len(), "Upload stored");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string() {
        let s = random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(random_string(32), s);
        assert!(random_string(0).is_empty());
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("secret", "salt");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("secret", "salt"));
        assert_ne!(hash, hash_password("secret", "pepper"));
        assert!(verify_password("secret", "salt", &hash.to_uppercase()));
        assert!(!verify_password("guess", "salt", &hash));
    }

    #[test]
    fn test_format_datetime() {
        let formatted = format_datetime(Some(0), "%Y");
        assert!(formatted == "1970" || formatted == "1969");
        assert_eq!(format_datetime(None, DATETIME_FORMAT).len(), 19);
        assert_eq!(format_datetime(Some(i64::MAX), DATETIME_FORMAT), "");
    }

    #[test]
    fn test_store_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::new("avatar", "Me.PNG", b"png-bytes".to_vec());

        let path =
            store_upload(&file, &dir.path().join("uploads"), DEFAULT_UPLOAD_EXTENSIONS).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"png-bytes");
        assert!(path.extension().is_some_and(|e| e == "png"));
    }

    #[test]
    fn test_store_upload_rejects_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["run.exe", "noext"] {
            let file = UploadedFile::new("f", name, b"x".to_vec());
            let err = store_upload(&file, dir.path(), DEFAULT_UPLOAD_EXTENSIONS).unwrap_err();
            assert!(matches!(err, Error::Upload { .. }));
            assert_eq!(err.http_status(), 422);
        }
    }
}
