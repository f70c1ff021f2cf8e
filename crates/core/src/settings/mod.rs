//! Runtime settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::returns::{
    ReturnWindow, DEFAULT_DAYS_AFTER_SERVICE, DEFAULT_WINDOW_DAYS_AFTER, DEFAULT_WINDOW_DAYS_BEFORE,
};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DATABASE_FILE_NAME: &str = "clientsync.db";

pub const ENV_API_URL: &str = "CLIENTSYNC_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "CLIENTSYNC_TIMEOUT_SECS";
pub const ENV_WINDOW_DAYS_BEFORE: &str = "CLIENTSYNC_WINDOW_DAYS_BEFORE";
pub const ENV_WINDOW_DAYS_AFTER: &str = "CLIENTSYNC_WINDOW_DAYS_AFTER";
pub const ENV_DAYS_AFTER_SERVICE: &str = "CLIENTSYNC_DAYS_AFTER_SERVICE";
pub const ENV_DATA_DIR: &str = "CLIENTSYNC_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub return_window: ReturnWindow,
    pub data_dir: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            return_window: ReturnWindow::default(),
            data_dir: PathBuf::from("."),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = get(ENV_API_URL)
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = parse_number::<u64>(ENV_TIMEOUT_SECS, get(ENV_TIMEOUT_SECS))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(format!("{} must be positive", ENV_TIMEOUT_SECS)));
        }

        let days_before = parse_number::<i64>(ENV_WINDOW_DAYS_BEFORE, get(ENV_WINDOW_DAYS_BEFORE))?
            .unwrap_or(DEFAULT_WINDOW_DAYS_BEFORE);
        let days_after = parse_number::<i64>(ENV_WINDOW_DAYS_AFTER, get(ENV_WINDOW_DAYS_AFTER))?
            .unwrap_or(DEFAULT_WINDOW_DAYS_AFTER);
        let days_after_service =
            parse_number::<i64>(ENV_DAYS_AFTER_SERVICE, get(ENV_DAYS_AFTER_SERVICE))?
                .unwrap_or(DEFAULT_DAYS_AFTER_SERVICE);

        let start_offset_days = days_before.checked_neg().ok_or_else(|| {
            Error::Config(format!("{} is out of range: {}", ENV_WINDOW_DAYS_BEFORE, days_before))
        })?;
        let return_window = ReturnWindow::new(start_offset_days, days_after, days_after_service);
        if return_window.start_offset_days > return_window.end_offset_days {
            return Err(Error::Config(format!(
                "Return window is empty: starts {} days from today but ends {} days from today",
                return_window.start_offset_days, return_window.end_offset_days
            )));
        }

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            return_window,
            data_dir: get(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| Error::Config(format!("{} must be a whole number, got '{}'", key, v)))
        })
        .transpose()
}
