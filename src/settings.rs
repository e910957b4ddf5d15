//! Settings module
//!
//! Settings are read from a JSON file. Every field has a default, so an
//! empty object (or no file at all) yields a working configuration.

use crate::metadata_retrieval::TVMAZE_URL;
use crate::show::ShowRecord;
use crate::staleness::RefreshPolicy;
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file
    #[error("Failed to read settings file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings file is not valid JSON or has unexpected fields
    #[error("Failed to parse settings file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A timezone name could not be resolved
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Failed to determine the platform cache directory
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,
}

/// Tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shows seeded from the settings; they take precedence over cached data
    pub shows: IndexMap<String, ShowRecord>,
    /// Directory containing the cache file
    pub cache_path: Option<PathBuf>,
    /// Name of the cache file
    pub cache_file: String,
    /// File listing the names of the shows to track
    pub show_file: Option<PathBuf>,
    /// Base for relative paths
    pub path_prefix: Option<PathBuf>,

    /// Refresh active shows every x days
    pub update_interval: i64,
    /// Refresh shows on hiatus every x days (never if unset)
    pub update_interval_hiatus: Option<i64>,
    /// Refresh ended shows every x days (never if unset)
    pub update_interval_inactive: Option<i64>,
    /// Refresh when an episode aired at least x days after the last refresh
    pub update_interval_aired: Option<i64>,
    /// Days to wait before retrying a show whose refreshes kept failing
    pub update_interval_error: i64,

    /// Timezone for shows without one
    pub timezone_default: String,

    /// Initial backoff in seconds after a dropped connection
    pub update_retry_delay: f64,
    /// Maximum number of attempts per refresh
    pub update_retry_num: u32,
    /// Whether failed refreshes are retried at all
    pub update_retry: bool,

    /// Address of the TVMaze API
    pub tvmaze_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shows: IndexMap::new(),
            cache_path: None,
            cache_file: "sallie.tmp.json".to_string(),
            show_file: None,
            path_prefix: None,
            update_interval: 7,
            update_interval_hiatus: None,
            update_interval_inactive: None,
            update_interval_aired: None,
            update_interval_error: 10,
            timezone_default: "US/Pacific".to_string(),
            update_retry_delay: 2.0,
            update_retry_num: 3,
            update_retry: true,
            tvmaze_url: TVMAZE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| SettingsError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Prepends the path prefix to relative paths
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.path_prefix {
            Some(prefix) if path.is_relative() => prefix.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Full path of the cache file
    pub fn cache_file_path(&self) -> PathBuf {
        match &self.cache_path {
            Some(dir) => self.resolve_path(dir).join(&self.cache_file),
            None => self.resolve_path(Path::new(&self.cache_file)),
        }
    }

    /// Full path of the show-name list file, if configured
    pub fn show_file_path(&self) -> Option<PathBuf> {
        self.show_file.as_deref().map(|p| self.resolve_path(p))
    }

    /// Points the cache at the platform cache directory unless set
    pub fn use_platform_cache_dir(&mut self) -> Result<(), SettingsError> {
        if self.cache_path.is_none() {
            let proj_dirs = directories::ProjectDirs::from("de", "the01", "sallie")
                .ok_or(SettingsError::CacheDirectoryNotFound)?;
            self.cache_path = Some(proj_dirs.cache_dir().to_path_buf());
        }
        Ok(())
    }

    /// Timezone applied to shows that have none
    pub fn default_timezone(&self) -> Result<Tz, SettingsError> {
        parse_timezone(&self.timezone_default)
    }

    /// Refresh intervals and retry behaviour
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: self.update_interval,
            interval_hiatus: self.update_interval_hiatus,
            interval_inactive: self.update_interval_inactive,
            interval_aired: self.update_interval_aired,
            interval_error: self.update_interval_error,
            max_retries: self.update_retry_num,
            should_retry: self.update_retry,
            retry_delay: Duration::try_from_secs_f64(self.update_retry_delay).unwrap_or_default(),
        }
    }
}

/// Resolves an IANA timezone name (e.g. "Europe/Berlin")
pub fn parse_timezone(name: &str) -> Result<Tz, SettingsError> {
    name.parse::<Tz>()
        .map_err(|_| SettingsError::UnknownTimezone(name.to_string()))
}
