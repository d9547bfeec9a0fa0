//! Log aggregation
//!
//! Turns a fail2ban log into per-`(jail, ip)` ban counts, most frequent
//! first.

pub mod native;
pub mod script;

pub use native::NativeAggregator;
pub use script::ScriptAggregator;

use crate::models::BanRecord;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading the ban log
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unable to find or open the log file {path:?}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Aggregation failed: {0}")]
    Aggregation(String),
}

/// Capability producing ranked ban counts from a log
pub trait LogAggregator {
    /// Count bans per `(jail, ip)` in the log at `source`, most frequent first
    fn aggregate(&self, source: &Path) -> Result<Vec<BanRecord>, SourceError>;
}

/// Open the log for reading, mapping failure to `SourceError::Unavailable`
pub fn open_source(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Unavailable {
        path: path.to_path_buf(),
        source,
    })
}
