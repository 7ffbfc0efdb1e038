//! Error types for patch generation and replay.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, generating or applying patches.
#[derive(Error, Debug)]
pub enum Error {
    /// A text patch deletion did not match the target text. The target is left
    /// untouched.
    #[error(
        "Patch mismatch in hunk {hunk} at line {line}: expected {expected:?}, found {found:?}"
    )]
    Mismatch {
        hunk: usize,
        line: usize,
        expected: String,
        found: Option<String>,
    },

    /// A text patch file could not be parsed.
    #[error("Malformed patch at line {line}: {reason}")]
    MalformedPatch { line: usize, reason: String },

    /// Markup could not be tokenized for canonicalization.
    #[error("Malformed markup at byte {offset}: {reason}")]
    MalformedMarkup { offset: usize, reason: String },

    /// Binary patch reference and replacement differ in length.
    #[error("Replacement length {replacement} differs from reference length {reference}")]
    LengthMismatch { reference: usize, replacement: usize },

    /// Binary patch with nothing to verify.
    #[error("Binary patch has an empty reference")]
    EmptyReference,

    /// Binary patch range lies outside the artifact.
    #[error("Range {offset}+{len} exceeds artifact size {size}")]
    OutOfRange { offset: u64, len: usize, size: usize },

    /// Bytes at the patch offset differ from the reference.
    #[error("Reference mismatch in '{artifact}' at offset {offset}: expected {expected}, found {found}")]
    ReferenceMismatch {
        artifact: String,
        offset: u64,
        expected: String,
        found: String,
    },

    /// Invalid hex in a binary patch descriptor.
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Failed to parse a binary patch descriptor file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
