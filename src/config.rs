use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::SessionStore;
use crate::topology::{PathResolver, DEFAULT_PATH_SEPARATOR};

pub const DEFAULT_ALARM_FILE: &str = "alarm_format.csv";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_MAX_SESSION_AGE_DAYS: u64 = 7;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Settings of the tool, read from a JSON file. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per session.
    pub upload_folder: PathBuf,
    /// Name of the table file inside a session directory.
    pub alarm_file: String,
    /// Separator between the levels of an alarm source identifier.
    pub path_separator: char,
    /// Sessions untouched for longer than this are removed by `clean`.
    pub max_session_age_days: u64,
    /// Seed for shuffling group ids. Derived from the uploaded data when unset.
    pub group_seed: Option<u64>,
    /// chrono format used to write `First`, also tried first when parsing.
    pub time_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            upload_folder: default_upload_folder(),
            alarm_file: DEFAULT_ALARM_FILE.to_string(),
            path_separator: DEFAULT_PATH_SEPARATOR,
            max_session_age_days: DEFAULT_MAX_SESSION_AGE_DAYS,
            group_seed: None,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl Config {
    /// Read the config from `path`. A file that doesn't exist gives the default config.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.try_exists()? {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }
        tracing::info!(path = %path.display(), "reading config");
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        let config: Config = serde_json::from_reader(file)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.path_separator)
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(&self.upload_folder, &self.alarm_file, &self.time_format)
    }

    pub fn max_session_age(&self) -> Duration {
        Duration::from_secs(self.max_session_age_days * SECONDS_PER_DAY)
    }
}

pub fn default_config_path() -> PathBuf {
    data_folder().join("config.json")
}

fn default_upload_folder() -> PathBuf {
    data_folder().join("uploads")
}

fn data_folder() -> PathBuf {
    directories::ProjectDirs::from("org", "alarmtopo", "alarmtopo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".alarmtopo"))
}
