//! Application configuration.
//!
//! Stored at `~/.config/conservatory/config.json`. A few settings can be
//! overridden from the environment (a `.env` file is loaded by the binary
//! first); the email API key is only ever read from the environment.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::contracts::GeneratorOptions;
use crate::payments::TEMPLATE_IMAGE_BUCKET;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "conservatory";

const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND_URL: &str = "CONSERVATORY_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "CONSERVATORY_ANON_KEY";
pub const ENV_EMAIL_API_KEY: &str = "CONSERVATORY_EMAIL_API_KEY";
pub const ENV_EMAIL_FROM: &str = "CONSERVATORY_EMAIL_FROM";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub email_api_url: Option<String>,
    pub email_from: Option<String>,
    pub director_name: Option<String>,
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub escape_template_values: bool,
    pub last_email: Option<String>,
    #[serde(skip)]
    pub email_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_BACKEND_URL) {
            self.backend_url = Some(v);
        }
        if let Some(v) = get(ENV_ANON_KEY) {
            self.anon_key = Some(v);
        }
        if let Some(v) = get(ENV_EMAIL_API_KEY) {
            self.email_api_key = Some(v);
        }
        if let Some(v) = get(ENV_EMAIL_FROM) {
            self.email_from = Some(v);
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn require_backend(&self) -> Result<(&str, &str)> {
        let url = self
            .backend_url
            .as_deref()
            .ok_or_else(|| anyhow!("Backend URL is not configured (set {})", ENV_BACKEND_URL))?;
        let key = self
            .anon_key
            .as_deref()
            .ok_or_else(|| anyhow!("Backend key is not configured (set {})", ENV_ANON_KEY))?;
        Ok((url, key))
    }

    pub fn storage_bucket(&self) -> &str {
        self.storage_bucket.as_deref().unwrap_or(TEMPLATE_IMAGE_BUCKET)
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            director_name: self.director_name.clone(),
            escape_values: self.escape_template_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_bucket(), "template-images");
        assert!(config.require_backend().is_err());
    }

    #[test]
    fn test_save_and_load_skips_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            backend_url: Some("https://db.example.org".into()),
            anon_key: Some("anon".into()),
            director_name: Some("Dr. Robert Schumann".into()),
            escape_template_values: true,
            email_api_key: Some("secret".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains("secret"));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.email_api_key, None);
        assert_eq!(loaded.require_backend().unwrap(), ("https://db.example.org", "anon"));
        let options = loaded.generator_options();
        assert!(options.escape_values);
        assert_eq!(options.director_name.as_deref(), Some("Dr. Robert Schumann"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BACKEND_URL, "https://override.example.org"),
            (ENV_EMAIL_API_KEY, "re_123"),
            (ENV_EMAIL_FROM, "  "),
        ]
        .into_iter()
        .collect();
        let config = Config {
            backend_url: Some("https://file.example.org".into()),
            email_from: Some("office@example.org".into()),
            ..Default::default()
        }
        .with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend_url.as_deref(), Some("https://override.example.org"));
        assert_eq!(config.email_api_key.as_deref(), Some("re_123"));
        assert_eq!(config.email_from.as_deref(), Some("office@example.org"));
    }
}
