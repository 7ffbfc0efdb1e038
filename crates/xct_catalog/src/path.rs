//! Layer-independent virtual paths.
//!
//! A [`VirtualPath`] names an asset the same way regardless of whether it is
//! supplied by the override folder, a loose installed file, or a container
//! entry. Comparison and hashing use the ASCII-lowercased form, so
//! `Types/TShips.txt` and `types/tships.txt` are the same asset.
//!
//! Several plain extensions have a compressed counterpart (see
//! [`COMPRESSED_EXTENSIONS`]). Because `txt` and `xml` share `pck`, a request
//! made with the `pck` extension cannot be mapped back to a single plain file
//! and is rejected with [`Error::AmbiguousExtension`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Plain extension -> compressed extension.
pub const COMPRESSED_EXTENSIONS: &[(&str, &str)] =
    &[("txt", "pck"), ("xml", "pck"), ("bob", "pbb"), ("bod", "pbd")];

/// Logical, slash-separated asset identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VirtualPath {
    path: String,
    key: String,
}

impl VirtualPath {
    /// Normalize `path`: backslashes become `/`, empty and leading segments are dropped.
    pub fn new(path: &str) -> Self {
        let path = path
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let key = path.to_ascii_lowercase();
        Self { path, key }
    }

    /// The normalized path with its original casing.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Case-insensitive lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lowercased extension of the final segment, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        let idx = name.rfind('.')?;
        let ext = &self.key[self.key.len() - (name.len() - idx - 1)..];
        (!ext.is_empty()).then_some(ext)
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Final segment without its extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Replace (or add) the extension of the final segment.
    pub fn with_extension(&self, ext: &str) -> Self {
        let name = self.file_name();
        let base_len = self.path.len() - name.len();
        let stem = match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        };
        Self::new(&format!("{}{}.{}", &self.path[..base_len], stem, ext))
    }

    /// Whether the path's extension is one of the compressed forms.
    pub fn is_compressed(&self) -> bool {
        self.extension()
            .is_some_and(|ext| COMPRESSED_EXTENSIONS.iter().any(|(_, c)| *c == ext))
    }

    /// The compressed counterpart of a plain path, if its kind has one.
    pub fn compressed_variant(&self) -> Option<Self> {
        let ext = self.extension()?;
        COMPRESSED_EXTENSIONS
            .iter()
            .find(|(plain, _)| *plain == ext)
            .map(|(_, compressed)| self.with_extension(compressed))
    }

    /// Map a path to its plain form.
    ///
    /// Plain paths are returned unchanged. Compressed paths are mapped back when
    /// exactly one plain extension shares their compressed extension.
    pub fn plain_variant(&self) -> Result<Self> {
        let Some(ext) = self.extension() else {
            return Ok(self.clone());
        };
        let candidates: Vec<&str> = COMPRESSED_EXTENSIONS
            .iter()
            .filter(|(_, compressed)| *compressed == ext)
            .map(|(plain, _)| *plain)
            .collect();
        match candidates.as_slice() {
            [] => Ok(self.clone()),
            [plain] => Ok(self.with_extension(plain)),
            _ => Err(Error::AmbiguousExtension(self.path.clone())),
        }
    }

    /// The (compressed, plain) lookup order for this path.
    ///
    /// The compressed form is listed first because it outranks the plain form
    /// within one layer.
    pub fn lookup_variants(&self) -> Result<Vec<Self>> {
        let plain = self.plain_variant()?;
        let mut variants = Vec::with_capacity(2);
        if let Some(compressed) = plain.compressed_variant() {
            variants.push(compressed);
        }
        variants.push(plain);
        Ok(variants)
    }
}

impl PartialEq for VirtualPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for VirtualPath {}

impl Hash for VirtualPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for VirtualPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VirtualPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VirtualPath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<VirtualPath> for String {
    fn from(p: VirtualPath) -> Self {
        p.path
    }
}
