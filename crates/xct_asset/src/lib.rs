//! Typed decoding and encoding of game assets.
//!
//! Raw bytes, wherever they were sourced from, are decoded into one of three
//! shapes selected by file extension:
//!
//! - **Table** (`.txt`): semicolon-delimited rows with schema-named fields.
//! - **Markup** (`.xml`): verbatim text plus its detected encoding.
//! - **Binary** (`.obj`, `.bob`, ...): an opaque byte buffer.
//!
//! Every shape encodes back to bytes so that an unmodified asset round-trips
//! byte for byte (tables lose only their comment lines).
//!
//! # Example
//!
//! ```
//! use xct_asset::{Asset, SchemaRegistry};
//! use xct_catalog::VirtualPath;
//!
//! let schemas = SchemaRegistry::builtin();
//! let bytes = b"1;0;\n".to_vec();
//! let asset = Asset::decode(&VirtualPath::new("types/TLaser.txt"), bytes, &schemas).unwrap();
//! assert_eq!(asset.encode().unwrap(), b"1;0;\n");
//! ```

pub mod asset;
pub mod encoding;
pub mod error;
pub mod markup;
pub mod schema;
pub mod table;

pub use asset::{Asset, AssetKind, BinaryAsset, KIND_EXTENSIONS};
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use markup::MarkupAsset;
pub use schema::{FieldLayout, SchemaRegistry, TableSchema};
pub use table::{Row, TableAsset};
