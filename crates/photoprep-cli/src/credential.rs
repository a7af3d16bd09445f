//! Session credential storage.
//!
//! Stores the session cookie in `<PHOTOPREP_HOME>/session.json` with
//! restricted permissions (0600). Tokens are never logged or displayed in
//! full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use photoprep_core::config::paths;
use serde::{Deserialize, Serialize};

/// Persisted session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    /// User the token was issued to (informational).
    #[serde(default)]
    pub user_id: Option<String>,
    /// Unix timestamp (seconds) of the login.
    #[serde(default)]
    pub saved_at: u64,
}

impl StoredCredential {
    pub fn new(token: String, user_id: Option<String>) -> Self {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            token,
            user_id,
            saved_at,
        }
    }
}

pub fn credential_path() -> PathBuf {
    paths::credential_path()
}

/// Loads the stored credential, if any.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load() -> Result<Option<StoredCredential>> {
    load_from(&credential_path())
}

/// Saves the credential with restricted permissions (0600).
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save(credential: &StoredCredential) -> Result<()> {
    save_to(&credential_path(), credential)
}

/// Removes the stored credential. Returns whether one existed.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear() -> Result<bool> {
    clear_at(&credential_path())
}

fn load_from(path: &Path) -> Result<Option<StoredCredential>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session from {}", path.display()))?;
    let credential: StoredCredential = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse session from {}", path.display()))?;

    Ok((!credential.token.trim().is_empty()).then_some(credential))
}

fn save_to(path: &Path, credential: &StoredCredential) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let contents =
        serde_json::to_string_pretty(credential).context("Failed to serialize session")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    Ok(())
}

fn clear_at(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}
