use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SESSION_FILE: &str = "session.json";

/// Refresh this long before the token actually expires
const REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: String,
    pub expires_in_secs: i64,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.expires_in_secs)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    /// Check if the session will expire soon and should be renewed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at() - Duration::seconds(REFRESH_BUFFER_SECS)
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_minutes().max(0)
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load a saved session; returns false when none exists or it expired.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        if data.is_expired() {
            debug!(email = %data.email, "Saved session expired");
            return Ok(false);
        }
        self.data = Some(data);
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(data)?)
                .context("Failed to write session file")?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Bearer token, if the session is still valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.access_token.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.email.as_str())
    }

    pub fn is_valid(&self) -> bool {
        self.token().is_some()
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(age_secs: i64, expires_in_secs: i64) -> SessionData {
        SessionData {
            access_token: "token".to_string(),
            refresh_token: None,
            user_id: "u1".to_string(),
            email: "director@example.org".to_string(),
            expires_in_secs,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_expiry_and_refresh() {
        let fresh = data(0, 3600);
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());
        assert!(fresh.minutes_until_expiry() >= 59);

        let ageing = data(3400, 3600);
        assert!(!ageing.is_expired());
        assert!(ageing.needs_refresh());

        let old = data(3700, 3600);
        assert!(old.is_expired());
        assert_eq!(old.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(data(0, 3600));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.token(), Some("token"));
        assert_eq!(reloaded.email(), Some("director@example.org"));

        reloaded.clear().unwrap();
        assert!(!Session::new(dir.path().to_path_buf()).load().unwrap());
    }

    #[test]
    fn test_expired_session_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(data(7200, 3600));
        session.save().unwrap();
        assert!(!session.is_valid());

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(!reloaded.load().unwrap());
        assert!(reloaded.data.is_none());
    }
}
