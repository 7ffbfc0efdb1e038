//! Error types for sourcing, patching and write-back.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. Errors from the container, codec and patch crates convert
//! via `From`, as do `std::io::Error`, `serde_json::Error` and TOML errors.

use camino::Utf8PathBuf;
use thiserror::Error;
use xct_asset::AssetKind;
use xct_catalog::VirtualPath;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a customization run.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (ledger, binary patch descriptors).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse the settings file.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Container or virtual path error.
    #[error(transparent)]
    Catalog(#[from] xct_catalog::Error),

    /// Asset decode or encode error.
    #[error(transparent)]
    Asset(#[from] xct_asset::Error),

    /// Text or binary patch error.
    #[error(transparent)]
    Patch(#[from] xct_patch::Error),

    /// No layer supplies the requested path. Most callers treat this as optional.
    #[error("Source not found: {0}")]
    SourceMissing(VirtualPath),

    /// A typed accessor was used on an asset of another kind.
    #[error("Asset '{path}' is {found}, expected {expected}")]
    WrongAssetKind {
        path: VirtualPath,
        expected: AssetKind,
        found: AssetKind,
    },

    /// The configured game directory does not exist.
    #[error("Invalid game directory: {0}")]
    InvalidGameDir(Utf8PathBuf),

    /// A file under a patch directory has a non-UTF-8 path.
    #[error("Non-UTF-8 path: {0}")]
    NonUtf8Path(String),

    /// Directory traversal failed.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Whether this error is a text or binary patch mismatch.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Error::Patch(xct_patch::Error::Mismatch { .. })
                | Error::Patch(xct_patch::Error::ReferenceMismatch { .. })
        )
    }
}
