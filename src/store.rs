//! Flat file persistence of session tables.
//!
//! Every session owns one directory under the upload folder with a single CSV file holding
//! the whole alarm table. Tables are always read and written whole.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingest::{table_from_raw, RawTable};
use crate::types::{
    classification_to_text, format_time_point, AlarmTable, CANONICAL_COLUMNS, CONFIRMED_FLAG,
    STORED_TIME_FORMAT,
};

/// Identifier handed to the client when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> SessionId {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        SessionId::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|e| Error::schema("client_id", e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    alarm_file: String,
    time_format: String,
}

impl SessionStore {
    pub fn new(
        root: impl Into<PathBuf>,
        alarm_file: impl Into<String>,
        time_format: impl Into<String>,
    ) -> SessionStore {
        SessionStore {
            root: root.into(),
            alarm_file: alarm_file.into(),
            time_format: time_format.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn session_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    pub fn table_path(&self, session: SessionId) -> PathBuf {
        self.session_dir(session).join(&self.alarm_file)
    }

    /// Create the directory of a new session.
    pub fn create(&self) -> Result<SessionId> {
        let session = SessionId::new();
        let dir = self.session_dir(session);
        std::fs::create_dir_all(&dir).map_err(|e| Error::persistence(&dir, e))?;
        tracing::info!(%session, "created session");
        Ok(session)
    }

    pub fn load_table(&self, session: SessionId) -> Result<AlarmTable> {
        let path = self.table_path(session);
        tracing::debug!(%session, path = %path.display(), "reading session table");
        let raw = RawTable::from_path(&path)?;
        table_from_raw(&raw, &self.time_format)
    }

    pub fn save_table(&self, session: SessionId, table: &AlarmTable) -> Result<()> {
        let path = self.table_path(session);
        tracing::debug!(%session, path = %path.display(), rows = table.len(), "writing session table");

        // First write the table to a temporary file, then move it over the old one
        let write_path = self.session_dir(session).join(temporary_file_name(&self.alarm_file));
        let written = write_table(&write_path, table).and_then(|()| {
            std::fs::rename(&write_path, &path).map_err(|e| Error::persistence(&path, e))
        });
        if written.is_err() && write_path.exists() {
            if let Err(e) = std::fs::remove_file(&write_path) {
                tracing::warn!(
                    path = %write_path.display(),
                    error = %e,
                    "failed to remove temporary table"
                );
            }
        }

        written
    }

    /// Copy the session table into `destination` as `verified_alarm_<unix seconds>.csv`.
    pub fn export(&self, session: SessionId, destination: &Path) -> Result<PathBuf> {
        let source = self.table_path(session);
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let target = destination.join(format!("verified_alarm_{timestamp}.csv"));
        std::fs::create_dir_all(destination).map_err(|e| Error::persistence(destination, e))?;
        std::fs::copy(&source, &target).map_err(|e| Error::persistence(&source, e))?;
        tracing::info!(%session, path = %target.display(), "exported session table");
        Ok(target)
    }

    /// Remove session directories that weren't modified for longer than `max_age`.
    /// Returns the names of the removed directories.
    pub fn clean(&self, max_age: Duration) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        if !self.root.try_exists().map_err(|e| Error::persistence(&self.root, e))? {
            return Ok(removed);
        }

        let now = SystemTime::now();
        let entries = std::fs::read_dir(&self.root).map_err(|e| Error::persistence(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::persistence(&self.root, e))?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| Error::persistence(&path, e))?;
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata.modified().map_err(|e| Error::persistence(&path, e))?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age > max_age {
                std::fs::remove_dir_all(&path).map_err(|e| Error::persistence(&path, e))?;
                tracing::info!(path = %path.display(), age_secs = age.as_secs(), "removed expired session");
                removed.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        removed.sort();
        Ok(removed)
    }
}

fn temporary_file_name(alarm_file: &str) -> String {
    let random_number: u64 = rand::random();
    format!(".{alarm_file}.{random_number}.tmp")
}

/// Write the table as CSV, canonical columns first, then the extra columns.
pub fn write_table(path: &Path, table: &AlarmTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::persistence(path, e))?;

    let headers = CANONICAL_COLUMNS
        .iter()
        .copied()
        .chain(table.extra_columns.iter().map(String::as_str));
    writer
        .write_record(headers)
        .map_err(|e| Error::persistence(path, e))?;

    for alarm in &table.alarms {
        let mut record = vec![
            alarm.index.to_string(),
            alarm.alarm_source.clone(),
            format_time_point(alarm.first, STORED_TIME_FORMAT),
            classification_to_text(alarm.rca_result).to_string(),
            classification_to_text(alarm.rca_result_edited).to_string(),
            alarm.group_id.clone(),
            alarm.group_id_edited.clone().unwrap_or_default(),
            if alarm.confirmed {
                CONFIRMED_FLAG.to_string()
            } else {
                String::new()
            },
        ];
        for column in &table.extra_columns {
            record.push(alarm.extra.get(column).cloned().unwrap_or_default());
        }
        writer
            .write_record(&record)
            .map_err(|e| Error::persistence(path, e))?;
    }

    writer.flush().map_err(|e| Error::persistence(path, e))?;
    Ok(())
}
