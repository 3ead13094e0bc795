// 🚨 Source Errors - What can go wrong while reading the two price series
//
// DataUnavailable / InvalidSeries abort the run.
// DataCorrupt is per-date and gets downgraded to "no data" by the comparator.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    /// Primary series missing, unreadable or unparsable
    #[error("Primary series unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    /// Snapshot file exists but could not be read or parsed
    #[error("Snapshot corrupt at {path}: {reason}")]
    DataCorrupt { path: PathBuf, reason: String },

    /// Primary series parsed but breaks the ordering contract
    #[error("Invalid primary series: {0}")]
    InvalidSeries(String),
}

impl SourceError {
    /// Fatal errors abort the run, everything else is recovered per date
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::DataCorrupt { .. })
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
