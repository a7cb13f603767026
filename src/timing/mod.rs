//! Timing statistics: a YAML document of elapsed seconds and the stopwatch
//! guards that feed it.

mod stopwatch;
mod store;

pub use stopwatch::{DEFAULT_TIMESTAT_NAME, TimeStat, measure};
pub use store::TimingStore;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while reading or updating the timing document.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TimingError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the existing document is not valid YAML.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a key on the path holds a scalar instead of a mapping.
    #[error("invalid timing document {path}: {message}")]
    InvalidStructure {
        /// Path of the document.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when every `_00`..`_99` suffix of a key is taken.
    #[error("no free suffix left for {key} in {path}")]
    SuffixesExhausted {
        /// Path of the document.
        path: Utf8PathBuf,
        /// Key without suffix.
        key: String,
    },
    /// Raised when the key path is empty.
    #[error("timing key path must not be empty")]
    EmptyPath,
}

#[cfg(test)]
mod tests;
