//! The closed set of asset shapes and extension-driven dispatch.

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::markup::MarkupAsset;
use crate::schema::SchemaRegistry;
use crate::table::TableAsset;
use std::fmt;
use xct_catalog::VirtualPath;

/// Shape of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Table,
    Markup,
    Binary,
}

/// Plain extension -> asset kind.
pub const KIND_EXTENSIONS: &[(&str, AssetKind)] = &[
    ("txt", AssetKind::Table),
    ("xml", AssetKind::Markup),
    ("obj", AssetKind::Binary),
    ("bob", AssetKind::Binary),
    ("bod", AssetKind::Binary),
    ("bin", AssetKind::Binary),
];

impl AssetKind {
    /// Classify a path by its plain extension.
    ///
    /// Compressed extensions are mapped to their plain form first, so an
    /// ambiguous compressed extension surfaces as a path error.
    pub fn from_path(path: &VirtualPath) -> Result<Self> {
        let plain = path.plain_variant()?;
        let ext = plain.extension().unwrap_or_default();
        KIND_EXTENSIONS
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| Error::UnsupportedKind(path.to_string()))
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Table => f.write_str("table"),
            AssetKind::Markup => f.write_str("markup"),
            AssetKind::Binary => f.write_str("binary"),
        }
    }
}

/// Opaque bytes, such as compiled script bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryAsset {
    pub bytes: Vec<u8>,
}

/// A decoded asset.
#[derive(Debug, Clone)]
pub enum Asset {
    Table(TableAsset),
    Markup(MarkupAsset),
    Binary(BinaryAsset),
}

impl Asset {
    /// Decode `bytes` according to the kind implied by `path`.
    pub fn decode(path: &VirtualPath, bytes: Vec<u8>, schemas: &SchemaRegistry) -> Result<Self> {
        let asset = match AssetKind::from_path(path)? {
            AssetKind::Table => {
                let identity = path.plain_variant()?.file_stem().to_ascii_lowercase();
                Asset::Table(TableAsset::decode(&identity, &bytes, schemas)?)
            }
            AssetKind::Markup => Asset::Markup(MarkupAsset::decode(&bytes, path.as_str())?),
            AssetKind::Binary => Asset::Binary(BinaryAsset { bytes }),
        };
        tracing::trace!("Decoded {} as {}", path, asset.kind());
        Ok(asset)
    }

    /// Encode back to file bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Asset::Table(table) => table.encode(),
            Asset::Markup(markup) => markup.encode(),
            Asset::Binary(binary) => Ok(binary.bytes.clone()),
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Table(_) => AssetKind::Table,
            Asset::Markup(_) => AssetKind::Markup,
            Asset::Binary(_) => AssetKind::Binary,
        }
    }

    /// Line-oriented text view used by text patches. `None` for binary assets.
    pub fn patch_text(&self) -> Option<String> {
        match self {
            Asset::Table(table) => Some(table.to_text()),
            Asset::Markup(markup) => Some(markup.text.clone()),
            Asset::Binary(_) => None,
        }
    }

    /// Replace the text of a table or markup asset, keeping its encoding.
    ///
    /// Tables are re-parsed with their schema. Returns `false` for binary assets.
    pub fn replace_text(&mut self, text: &str) -> bool {
        match self {
            Asset::Table(table) => {
                let schema = table.schema().clone();
                *table = TableAsset::from_text(schema, text, table.encoding());
                true
            }
            Asset::Markup(markup) => {
                markup.text = text.to_string();
                true
            }
            Asset::Binary(_) => false,
        }
    }

    pub fn as_table(&self) -> Option<&TableAsset> {
        match self {
            Asset::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableAsset> {
        match self {
            Asset::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_markup_mut(&mut self) -> Option<&mut MarkupAsset> {
        match self {
            Asset::Markup(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn as_binary_mut(&mut self) -> Option<&mut BinaryAsset> {
        match self {
            Asset::Binary(binary) => Some(binary),
            _ => None,
        }
    }

    /// Text encoding of a text asset.
    pub fn encoding(&self) -> Option<TextEncoding> {
        match self {
            Asset::Table(table) => Some(table.encoding()),
            Asset::Markup(markup) => Some(markup.encoding()),
            Asset::Binary(_) => None,
        }
    }
}
