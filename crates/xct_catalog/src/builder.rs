//! Container writer.

use crate::compression::deflate;
use crate::error::Result;
use crate::path::VirtualPath;
use camino::Utf8Path;
use std::io::Write;

/// Builds an index/data container pair.
///
/// Entries whose extension is a compressed form (`.pck`, `.pbb`, `.pbd`) are
/// given plain bytes and compressed on write. Entries are stored in insertion
/// order.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<(VirtualPath, Vec<u8>)>,
}

impl CatalogBuilder {
    /// Add an entry. `data` is the uncompressed payload.
    pub fn with_entry(mut self, path: &str, data: Vec<u8>) -> Self {
        self.add_entry(path, data);
        self
    }

    /// Add an entry in place.
    pub fn add_entry(&mut self, path: &str, data: Vec<u8>) {
        self.entries.push((VirtualPath::new(path), data));
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `index_path` and its sibling data file (`.dat` extension).
    pub fn build(&self, index_path: &Utf8Path) -> Result<()> {
        let data_path = index_path.with_extension("dat");
        let data_name = data_path.file_name().unwrap_or("data.dat");

        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let mut index = String::new();
        index.push_str(data_name);
        index.push('\n');

        let mut data = std::io::BufWriter::new(std::fs::File::create(data_path.as_std_path())?);
        for (path, bytes) in &self.entries {
            let stored = if path.is_compressed() {
                deflate(bytes)?
            } else {
                bytes.clone()
            };
            data.write_all(&stored)?;
            index.push_str(&format!("{} {}\n", path.as_str(), stored.len()));
        }
        data.flush()?;

        std::fs::write(index_path.as_std_path(), index)?;

        tracing::info!(
            "Wrote container index={} data={} entries={}",
            index_path,
            data_path,
            self.entries.len()
        );
        Ok(())
    }
}
