//! On-disk cache for OAuth credentials.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;

/// Tokens expiring within this many seconds are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

const CACHE_FILE: &str = "gemini_credentials.json";

/// Cached OAuth credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token used to obtain a fresh access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When `access_token` stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl StoredCredentials {
    /// Returns true if the access token is expired, or will be within
    /// [`EXPIRY_SKEW_SECS`], at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    /// Returns true if the access token is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Returns `$HOME/.commitsmith/gemini_credentials.json`.
pub fn default_cache_path() -> Result<PathBuf, AuthError> {
    let home_dir = dirs::home_dir().ok_or(AuthError::NoHomeDir)?;
    Ok(home_dir.join(".commitsmith").join(CACHE_FILE))
}

/// Reads cached credentials.
///
/// A missing, unreadable or corrupt cache yields `None`.
pub fn load_credentials(path: &Path) -> Option<StoredCredentials> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cached OAuth credentials");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read OAuth credential cache");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt OAuth credential cache");
            None
        }
    }
}

/// Writes credentials atomically: a temp file in the same directory is
/// renamed over `path`.
pub fn save_credentials(path: &Path, credentials: &StoredCredentials) -> Result<(), AuthError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, credentials)?;
    file.write_all(b"\n")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.persist(path).map_err(|e| AuthError::Io(e.error))?;
    debug!(path = %path.display(), "Saved OAuth credentials");
    Ok(())
}

/// Writes credentials, logging instead of failing.
pub fn save_credentials_best_effort(path: &Path, credentials: &StoredCredentials) {
    if let Err(e) = save_credentials(path, credentials) {
        warn!(path = %path.display(), error = %e, "Failed to cache OAuth credentials");
    }
}

/// Deletes the cache. Returns false if there was nothing to delete.
pub fn remove_credentials(path: &Path) -> Result<bool, AuthError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn credentials(expires_at: DateTime<Utc>) -> StoredCredentials {
        StoredCredentials {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CACHE_FILE);
        let creds = credentials(Utc::now());

        save_credentials(&path, &creds).unwrap();
        assert_eq!(load_credentials(&path), Some(creds));
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_credentials(&dir.path().join(CACHE_FILE)), None);
    }

    #[test]
    fn corrupt_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load_credentials(&path), None);
    }

    #[test]
    fn overwrite_replaces_previous_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        save_credentials(&path, &credentials(Utc::now())).unwrap();

        let mut newer = credentials(Utc::now() + Duration::hours(1));
        newer.access_token = "newer".to_string();
        save_credentials(&path, &newer).unwrap();

        assert_eq!(load_credentials(&path).unwrap().access_token, "newer");
    }

    #[test]
    fn best_effort_save_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // parent is a regular file, so the write cannot succeed
        save_credentials_best_effort(&blocker.join(CACHE_FILE), &credentials(Utc::now()));
        assert!(save_credentials(&blocker.join(CACHE_FILE), &credentials(Utc::now())).is_err());
    }

    #[test]
    fn expiry_honours_skew() {
        let now = Utc::now();
        assert!(credentials(now + Duration::seconds(30)).is_expired_at(now));
        assert!(credentials(now - Duration::seconds(1)).is_expired_at(now));
        assert!(!credentials(now + Duration::seconds(120)).is_expired_at(now));
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        assert!(!remove_credentials(&path).unwrap());
        save_credentials(&path, &credentials(Utc::now())).unwrap();
        assert!(remove_credentials(&path).unwrap());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn cache_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        save_credentials(&path, &credentials(Utc::now())).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
