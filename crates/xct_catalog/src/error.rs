//! Error types for container operations.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing containers.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index is truncated or malformed, or an entry points past the end of
    /// the data file. Only the named container is affected.
    #[error("Corrupt container '{path}': {reason}")]
    Corrupt { path: Utf8PathBuf, reason: String },

    /// A compressed payload could not be inflated.
    #[error("Decompression failed for '{path}': {source}")]
    Decompression {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A compressed extension is shared by several plain extensions.
    #[error("Ambiguous extension in '{0}': cannot tell which plain file it stands for")]
    AmbiguousExtension(String),

    /// The container has no entry for the requested path.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
