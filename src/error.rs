use std::path::PathBuf;

use crate::types::GroupId;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the grouping engine and its table store.
///
/// An alarm source that can't be resolved into a topology path is not an error,
/// it resolves to an empty path instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input table is missing a required column or carries a value that can't be parsed.
    /// The whole input is rejected.
    #[error("schema error in `{field}`: {reason}")]
    Schema { field: String, reason: String },

    /// The referenced group id doesn't exist in the current batch.
    #[error("group `{0}` not found in the current batch")]
    GroupNotFound(GroupId),

    /// Reading or writing a table failed. Never retried.
    #[error("persistence failure at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: PersistenceFailure,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceFailure {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<PersistenceFailure>) -> Error {
        Error::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}
