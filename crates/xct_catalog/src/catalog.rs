//! Paired index/data container reader.
//!
//! A container is two files: a text index (`NN.cat`) and a data blob
//! (`NN.dat`). The first non-empty line of the index names the data file,
//! relative to the index's directory. Every following non-empty line is an
//! entry of the form `<virtual path> <size>`; entry payloads are stored back to
//! back in the data file, so offsets are the running sum of earlier sizes.
//!
//! ```text
//! 01.dat
//! types/TShips.pck 2231
//! types/TLaser.txt 812
//! L/!init.obj 96
//! ```
//!
//! [`Catalog::open`] only parses the index. The data file is touched by
//! [`Catalog::read`], once per read, through a short-lived handle.

use crate::compression::inflate;
use crate::error::{Error, Result};
use crate::path::VirtualPath;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// One entry of a container index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Path as listed in the index.
    pub path: VirtualPath,
    /// Byte offset into the data file.
    pub offset: u64,
    /// Stored (possibly compressed) size in bytes.
    pub size: u64,
    /// Whether the payload is DEFLATE-compressed.
    pub compressed: bool,
}

/// A parsed container index, bound to its data file.
#[derive(Debug)]
pub struct Catalog {
    index_path: Utf8PathBuf,
    data_path: Utf8PathBuf,
    entries: Vec<CatalogEntry>,
    /// Lowercased path -> position in `entries`. Later listings win.
    lookup: HashMap<String, usize>,
}

impl Catalog {
    /// Parse the index at `index_path` without opening the data file.
    pub fn open(index_path: &Utf8Path) -> Result<Self> {
        let bytes = std::fs::read(index_path.as_std_path())?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
        };
        Self::parse(index_path, &text)
    }

    /// Parse index text as if it were read from `index_path`.
    pub fn parse(index_path: &Utf8Path, text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let data_name = lines
            .next()
            .ok_or_else(|| Error::corrupt(index_path, "index is empty"))?
            .trim();
        let data_path = index_path
            .parent()
            .map(|dir| dir.join(data_name))
            .unwrap_or_else(|| Utf8PathBuf::from(data_name));

        let mut entries = Vec::new();
        let mut lookup = HashMap::new();
        let mut offset = 0u64;

        for (line_no, line) in lines.enumerate() {
            let (name, size) = line.rsplit_once(char::is_whitespace).ok_or_else(|| {
                Error::corrupt(
                    index_path,
                    format!("entry {} has no size: '{}'", line_no + 1, line),
                )
            })?;
            let size: u64 = size.trim().parse().map_err(|_| {
                Error::corrupt(
                    index_path,
                    format!("entry {} has an invalid size: '{}'", line_no + 1, line),
                )
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::corrupt(
                    index_path,
                    format!("entry {} has no path", line_no + 1),
                ));
            }

            let path = VirtualPath::new(name);
            let entry = CatalogEntry {
                compressed: path.is_compressed(),
                path,
                offset,
                size,
            };
            offset = offset.checked_add(size).ok_or_else(|| {
                Error::corrupt(index_path, "cumulative entry size overflows")
            })?;

            lookup.insert(entry.path.key().to_string(), entries.len());
            entries.push(entry);
        }

        tracing::debug!(
            "Parsed container index {} entries={} data={}",
            index_path,
            entries.len(),
            data_path
        );

        Ok(Self {
            index_path: index_path.to_path_buf(),
            data_path,
            entries,
            lookup,
        })
    }

    /// Path of the index file.
    pub fn index_path(&self) -> &Utf8Path {
        &self.index_path
    }

    /// Path of the data file.
    pub fn data_path(&self) -> &Utf8Path {
        &self.data_path
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Case-insensitive entry lookup.
    pub fn get(&self, path: &VirtualPath) -> Option<&CatalogEntry> {
        self.lookup.get(path.key()).map(|&idx| &self.entries[idx])
    }

    /// Read the stored bytes of `entry` without inflating.
    pub fn read_raw(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        let mut file = File::open(self.data_path.as_std_path())?;
        let data_len = file.metadata()?.len();

        let in_bounds = matches!(entry.offset.checked_add(entry.size), Some(end) if end <= data_len);
        if !in_bounds {
            return Err(Error::corrupt(
                &self.index_path,
                format!(
                    "entry '{}' range {}+{} exceeds data file length {}",
                    entry.path, entry.offset, entry.size, data_len
                ),
            ));
        }

        let size = usize::try_from(entry.size).map_err(|_| {
            Error::corrupt(&self.index_path, format!("entry '{}' is too large", entry.path))
        })?;
        let mut buf = vec![0u8; size];
        file.seek(SeekFrom::Start(entry.offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read an entry's bytes, inflating compressed entries.
    pub fn read(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        let raw = self.read_raw(entry)?;
        if entry.compressed {
            inflate(&raw, entry.path.as_str())
        } else {
            Ok(raw)
        }
    }

    /// Look up and read a path in one step.
    pub fn read_path(&self, path: &VirtualPath) -> Result<Vec<u8>> {
        let entry = self
            .get(path)
            .ok_or_else(|| Error::EntryNotFound(path.to_string()))?;
        self.read(entry)
    }

    /// Extract every entry below `out_dir`.
    ///
    /// Compressed entries are inflated and written under their plain name when
    /// that name is unambiguous; otherwise they are written as stored.
    pub fn extract_all(&self, out_dir: &Utf8Path) -> Result<usize> {
        let mut written = 0;
        for entry in &self.entries {
            let (target, bytes) = match entry.path.plain_variant() {
                Ok(plain) if entry.compressed => (plain, self.read(entry)?),
                _ => (entry.path.clone(), self.read_raw(entry)?),
            };

            let out_path = out_dir.join(target.as_str());
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent.as_std_path())?;
            }
            std::fs::write(out_path.as_std_path(), &bytes)?;
            written += 1;
        }

        tracing::info!(
            "Extracted {} entries from {} to {}",
            written,
            self.index_path,
            out_dir
        );
        Ok(written)
    }
}
