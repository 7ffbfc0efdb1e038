//! Reader and writer for paired index/data game archive containers.
//!
//! A game installation ships its assets inside numbered containers
//! (`01.cat`/`01.dat`, `02.cat`/`02.dat`, ...). This crate parses the index,
//! reads individual entries on demand, and inflates compressed entries. It
//! also provides the [`VirtualPath`] type shared by the rest of the toolkit.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use xct_catalog::{Catalog, VirtualPath};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::open(Utf8Path::new("C:/Games/X3/addon/03.cat"))?;
//! let bytes = catalog.read_path(&VirtualPath::new("types/TShips.pck"))?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod catalog;
pub mod compression;
pub mod error;
pub mod path;

pub use builder::CatalogBuilder;
pub use catalog::{Catalog, CatalogEntry};
pub use compression::{deflate, inflate};
pub use error::{Error, Result};
pub use path::VirtualPath;
