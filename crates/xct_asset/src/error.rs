//! Error types for asset decoding and encoding.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, mutating or encoding an asset.
#[derive(Error, Debug)]
pub enum Error {
    /// The path's extension does not map to any asset kind.
    #[error("Unsupported asset kind: {0}")]
    UnsupportedKind(String),

    /// No schema is registered for a table identity.
    #[error("No table schema registered for '{0}'")]
    SchemaMissing(String),

    /// A markup file declares an encoding this crate cannot handle.
    #[error("Unsupported text encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Bytes are not valid in the detected encoding.
    #[error("Failed to decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    /// Text contains a character the asset's encoding cannot represent.
    #[error("Character {ch:?} cannot be encoded as {encoding}")]
    Unencodable { encoding: String, ch: char },

    /// A row has no field with the given schema name.
    #[error("Table '{table}' has no field '{field}' in this row")]
    UnknownField { table: String, field: String },

    /// A raw field position lies outside the row.
    #[error("Field index {index} out of range for row of width {width}")]
    FieldOutOfRange { index: usize, width: usize },

    /// Path handling failed (for example an ambiguous compressed extension).
    #[error(transparent)]
    Path(#[from] xct_catalog::Error),
}
