//! Local snapshot of the last dashboard, so the terminal UI has something
//! to show before the first refresh completes.
//!
//! Snapshots are JSON files in the cache directory, each wrapped with the
//! time it was written, and are considered stale after 60 minutes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::dashboard::DashboardSummary;

const CACHE_STALE_MINUTES: i64 = 60;

const DASHBOARD: &str = "dashboard";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;
        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        debug!(name = name, "Cache written");
        Ok(())
    }

    pub fn load_dashboard(&self) -> Result<Option<CachedData<DashboardSummary>>> {
        self.load(DASHBOARD)
    }

    pub fn save_dashboard(&self, summary: &DashboardSummary) -> Result<()> {
        self.save(DASHBOARD, summary)
    }

    /// Remove every snapshot; used on logout.
    pub fn clear(&self) -> Result<()> {
        let path = self.cache_path(DASHBOARD);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{summarize, DashboardData};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_age_display() {
        let mut cached = CachedData::new(1);
        assert_eq!(cached.age_display(), "just now");
        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");
        cached.cached_at = Utc::now() - Duration::hours(30);
        assert_eq!(cached.age_display(), "1d ago");
        cached.cached_at = Utc::now() + Duration::minutes(5);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_is_stale() {
        let mut cached = CachedData::new(1);
        assert!(!cached.is_stale());
        cached.cached_at = Utc::now() - Duration::minutes(61);
        assert!(cached.is_stale());
    }

    #[test]
    fn test_dashboard_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().join("nested")).unwrap();
        assert!(cache.load_dashboard().unwrap().is_none());

        let summary = summarize(
            &DashboardData::default(),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        );
        cache.save_dashboard(&summary).unwrap();
        let loaded = cache.load_dashboard().unwrap().unwrap();
        assert_eq!(loaded.data, summary);

        cache.clear().unwrap();
        assert!(cache.load_dashboard().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dashboard.json"), "{not json").unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        assert!(cache.load_dashboard().is_err());
    }
}
