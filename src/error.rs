//! Error types for the measurement harness.
//!
//! Two classes of failure abort the whole run: configuration failures (a file
//! the harness needs cannot be opened or written) and read failures against the
//! target file. A benchmark whose apparatus failed cannot be trusted, so neither
//! is retried. Advisory failures never surface here; hints are best-effort.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal harness failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A file required by the harness could not be opened or written.
    #[error("Error opening file \"{}\": {source}", path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read or seek against the target file failed.
    #[error("Error reading file \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The target cannot be opened for direct I/O on this filesystem.
    ///
    /// Unlike the other variants this only disqualifies the direct-I/O
    /// experiments; the caller may skip them and carry on.
    #[error("Error opening file \"{}\" with O_DIRECT: {source}", path.display())]
    DirectIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An experiment definition violates a structural constraint.
    #[error("Invalid experiment configuration: {0}")]
    InvalidConfig(String),
}

impl HarnessError {
    pub fn configuration(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Configuration {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

impl HarnessError {
    /// Whether the run can continue past this error by skipping one experiment.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::DirectIo { .. })
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
