//! Layered asset sourcing and tracked write-back for game customization.
//!
//! This crate ties the container reader, the asset codec and the patch engines
//! into a run pipeline:
//!
//! - **Layered sourcing**: an override folder, loose files and archive
//!   containers are searched in a fixed precedence order.
//! - **Memoized assets**: each virtual path is decoded once per run and
//!   mutated in place by caller logic and patches.
//! - **Tracked write-back**: outputs are recorded in a ledger so the next run
//!   starts from the originals and a clean can undo everything.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use xct_overlay::{Session, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(Utf8Path::new("xct.toml"))?;
//! let mut session = Session::new(settings)?
//!     .with_progress(|progress| {
//!         println!("{:?} {}/{}", progress.stage, progress.current, progress.total);
//!     });
//!
//! let bullets = session.table_mut("types/TBullets.txt")?;
//! for row in bullets.data_rows_mut() {
//!     if let Some(damage) = row.get_parsed::<u32>("hull_damage") {
//!         row.set("hull_damage", (damage * 2).to_string())?;
//!     }
//! }
//!
//! let report = session.apply_patch_dir(Utf8Path::new("patches"))?;
//! println!("{} patches applied, {} failed", report.applied.len(), report.failed.len());
//!
//! let result = session.write_all()?;
//! println!("Wrote {} files", result.written.len());
//! # Ok(())
//! # }
//! ```

pub mod container_set;
pub mod error;
pub mod ledger;
pub mod locator;
pub mod session;
pub mod settings;
pub mod utils;

// Re-export main types
pub use container_set::{Container, ContainerGroup, ContainerSet};
pub use error::{Error, Result};
pub use ledger::{CleanReport, Ledger, LedgerEntry, RestoreOutcome};
pub use locator::{Locator, SourceOrigin, SourceRecord};
pub use session::{
    read_binary_patches, BinaryPatchReport, PatchReport, Session, WriteProgress, WriteReport,
    WriteStage,
};
pub use settings::{BackupPolicy, Settings};
