use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShleepyError;
use crate::traits::Clock;

/// Signed-in user, passed explicitly to every call that needs an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= clock.now_utc())
    }
}

/// Keeps the session between CLI invocations as a JSON file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/shleepy/session.json`, or the working directory when the
    /// platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shleepy")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        let session = serde_json::from_str(&raw).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    /// Load a session that is present and not expired.
    pub fn require(&self, clock: &dyn Clock) -> Result<Session> {
        let session = self.load()?.ok_or(ShleepyError::NotSignedIn)?;
        if session.is_expired(clock) {
            return Err(ShleepyError::SessionExpired.into());
        }
        Ok(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let raw = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        let mut file = session_file_options()
            .open(&self.path)
            .with_context(|| format!("Failed to open session file {}", self.path.display()))?;
        restrict_to_owner(&file)?;
        file.write_all(raw.as_bytes())
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        tracing::debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Owner-only on unix.
fn session_file_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Tightens a file left behind with wider permissions.
#[cfg(unix)]
fn restrict_to_owner(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .context("Failed to restrict session file permissions")
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &fs::File) -> Result<()> {
    Ok(())
}
