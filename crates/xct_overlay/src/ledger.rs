//! Provenance ledger of files produced by previous runs.
//!
//! Every file the write-back pass creates is recorded together with the backup
//! it displaced (if any) and a content hash of what was written. The ledger is
//! persisted as JSON inside the output directory and serves two purposes on
//! later runs:
//!
//! - The locator skips loose files we produced, so a run always starts from
//!   the same originals no matter how many times it is repeated.
//! - [`Ledger::clean`] removes everything we produced and moves displaced
//!   files back, leaving the installation as if the tool had never run.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "/games/x3/addon/types/TShips.txt": {
//!       "backup": "/games/x3/addon/types/TShips.txt.xct_backup",
//!       "contentHash": 1234567890
//!     }
//!   }
//! }
//! ```
//!
//! An entry with no `contentHash` marks a path we vacated without writing
//! anything there, such as a compressed sibling of a produced plain file.

use crate::error::Result;
use crate::utils::file_content_hash;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LEDGER_VERSION: u32 = 1;

/// One produced (or vacated) output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Where the file previously at this path was moved.
    pub backup: Option<Utf8PathBuf>,
    /// xxHash3 of the written content; `None` for a vacated path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<Utf8PathBuf, LedgerEntry>,
}

/// What happened to one entry during a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The produced file was removed and any backup moved back.
    Restored,
    /// The file changed since we wrote it; left alone and kept in the ledger.
    SkippedModified,
}

/// Summary of [`Ledger::clean`].
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Output paths that were removed or restored.
    pub restored: Vec<Utf8PathBuf>,
    /// Backups moved back into place.
    pub backups_restored: Vec<Utf8PathBuf>,
    /// Output paths skipped because they were edited after we wrote them.
    pub skipped: Vec<Utf8PathBuf>,
}

/// Record of outputs produced by this tool.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: Utf8PathBuf,
    entries: BTreeMap<Utf8PathBuf, LedgerEntry>,
}

impl Ledger {
    /// An empty ledger that will be saved to `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the ledger at `path`, or start empty if the file doesn't exist.
    ///
    /// A ledger written with another format version is treated as empty.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let mut ledger = Self::new(path);
        if !path.as_std_path().exists() {
            return Ok(ledger);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let file: LedgerFile = serde_json::from_str(&contents)?;
        if file.version != LEDGER_VERSION {
            tracing::warn!(
                "Ignoring ledger path={} version={} (expected {})",
                path,
                file.version,
                LEDGER_VERSION
            );
            return Ok(ledger);
        }
        ledger.entries = file.entries;
        tracing::debug!("Loaded ledger path={} entries={}", path, ledger.entries.len());
        Ok(ledger)
    }

    /// Persist the ledger. An empty ledger removes the file instead.
    pub fn save(&self) -> Result<()> {
        if self.entries.is_empty() {
            if self.path.as_std_path().exists() {
                std::fs::remove_file(self.path.as_std_path())?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        let file = LedgerFile {
            version: LEDGER_VERSION,
            entries: self.entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(self.path.as_std_path(), contents)?;
        Ok(())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Record a produced file.
    pub fn record(&mut self, output: &Utf8Path, backup: Option<Utf8PathBuf>, content_hash: u64) {
        tracing::trace!("Ledger record output={} backup={:?}", output, backup);
        self.entries.insert(
            output.to_path_buf(),
            LedgerEntry {
                backup,
                content_hash: Some(content_hash),
            },
        );
    }

    /// Record a path we emptied by moving its file to `backup`.
    pub fn record_vacated(&mut self, output: &Utf8Path, backup: Utf8PathBuf) {
        tracing::trace!("Ledger vacated output={} backup={}", output, backup);
        self.entries.insert(
            output.to_path_buf(),
            LedgerEntry {
                backup: Some(backup),
                content_hash: None,
            },
        );
    }

    /// Whether a previous run produced or vacated `path`.
    pub fn was_produced_by_us(&self, path: &Utf8Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&LedgerEntry> {
        self.entries.get(path)
    }

    /// Recorded backup for `path`, if any.
    pub fn backup_for(&self, path: &Utf8Path) -> Option<&Utf8Path> {
        self.entries.get(path).and_then(|e| e.backup.as_deref())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Utf8Path, &LedgerEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_path(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undo one entry: delete what we wrote and move the backup back.
    ///
    /// A produced file whose hash no longer matches is left in place and its
    /// entry kept. A missing entry counts as restored.
    pub fn restore(&mut self, output: &Utf8Path) -> Result<RestoreOutcome> {
        let Some(entry) = self.entries.get(output).cloned() else {
            return Ok(RestoreOutcome::Restored);
        };

        if let Some(expected) = entry.content_hash {
            match file_content_hash(output)? {
                Some(actual) if actual != expected => {
                    tracing::warn!(
                        "Skipping restore of externally modified file path={}",
                        output
                    );
                    return Ok(RestoreOutcome::SkippedModified);
                }
                Some(_) => std::fs::remove_file(output.as_std_path())?,
                None => tracing::debug!("Produced file already gone path={}", output),
            }
        }

        if let Some(backup) = &entry.backup {
            if backup.as_std_path().exists() {
                std::fs::rename(backup.as_std_path(), output.as_std_path())?;
                tracing::debug!("Restored backup {} -> {}", backup, output);
            } else {
                tracing::warn!("Backup missing backup={} output={}", backup, output);
            }
        }

        self.entries.remove(output);
        Ok(RestoreOutcome::Restored)
    }

    /// Restore every entry and persist what remains.
    ///
    /// The ledger is saved even when a restore fails part way.
    pub fn clean(&mut self) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let outputs: Vec<Utf8PathBuf> = self.entries.keys().cloned().collect();

        for output in outputs {
            let backup = self.backup_for(&output).map(Utf8Path::to_path_buf);
            let outcome = match self.restore(&output) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Entries restored so far must not be undone twice.
                    tracing::error!("Clean failed at {}, saving ledger: {}", output, e);
                    if let Err(save_err) = self.save() {
                        tracing::error!("Failed to save ledger {}: {}", self.path, save_err);
                    }
                    return Err(e);
                }
            };
            match outcome {
                RestoreOutcome::Restored => {
                    if let Some(backup) = backup {
                        if output.as_std_path().exists() {
                            report.backups_restored.push(backup);
                        }
                    }
                    report.restored.push(output);
                }
                RestoreOutcome::SkippedModified => report.skipped.push(output),
            }
        }

        self.save()?;
        tracing::info!(
            "Clean complete restored={} skipped={}",
            report.restored.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::content_hash;

    fn setup() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_load_nonexistent() {
        let (_dir, root) = setup();
        let ledger = Ledger::load(&root.join("ledger.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_load_invalid_json() {
        let (_dir, root) = setup();
        let path = root.join("ledger.json");
        std::fs::write(&path, b"{ invalid json }").unwrap();
        assert!(Ledger::load(&path).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, root) = setup();
        let path = root.join("ledger.json");
        let mut ledger = Ledger::new(&path);
        ledger.record(&root.join("a.txt"), Some(root.join("a.txt.bak")), 42);
        ledger.record(&root.join("b.txt"), None, 7);
        ledger.save().unwrap();

        let loaded = Ledger::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.was_produced_by_us(&root.join("a.txt")));
        assert_eq!(
            loaded.backup_for(&root.join("a.txt")),
            Some(root.join("a.txt.bak").as_path())
        );
        assert_eq!(loaded.get(&root.join("b.txt")).unwrap().content_hash, Some(7));
    }

    #[test]
    fn test_serialization_format() {
        let (_dir, root) = setup();
        let path = root.join("ledger.json");
        let mut ledger = Ledger::new(&path);
        ledger.record(Utf8Path::new("/out/a.txt"), None, 1);
        ledger.save().unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"version\": 1"));
        assert!(json.contains("\"/out/a.txt\""));
        assert!(json.contains("\"contentHash\": 1"));
    }

    #[test]
    fn test_other_version_ignored() {
        let (_dir, root) = setup();
        let path = root.join("ledger.json");
        std::fs::write(&path, r#"{"version": 99, "entries": {"/x": {"backup": null}}}"#).unwrap();
        assert!(Ledger::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_clean_restores_backup_and_removes_output() {
        let (_dir, root) = setup();
        let produced = root.join("types/TShips.txt");
        let backup = root.join("types/TShips.txt.bak");
        let fresh = root.join("types/TLaser.txt");
        std::fs::create_dir_all(root.join("types")).unwrap();
        std::fs::write(&produced, b"ours").unwrap();
        std::fs::write(&backup, b"original").unwrap();
        std::fs::write(&fresh, b"new").unwrap();

        let path = root.join("ledger.json");
        let mut ledger = Ledger::new(&path);
        ledger.record(&produced, Some(backup.clone()), content_hash(b"ours"));
        ledger.record(&fresh, None, content_hash(b"new"));
        ledger.save().unwrap();

        let report = ledger.clean().unwrap();
        assert_eq!(report.restored.len(), 2);
        assert_eq!(report.backups_restored, vec![backup.clone()]);
        assert_eq!(std::fs::read(&produced).unwrap(), b"original");
        assert!(!backup.as_std_path().exists());
        assert!(!fresh.as_std_path().exists());
        assert!(!path.as_std_path().exists());
    }

    #[test]
    fn test_clean_skips_modified_output() {
        let (_dir, root) = setup();
        let produced = root.join("a.txt");
        std::fs::write(&produced, b"edited by hand").unwrap();

        let mut ledger = Ledger::new(root.join("ledger.json"));
        ledger.record(&produced, None, content_hash(b"ours"));

        let report = ledger.clean().unwrap();
        assert_eq!(report.skipped, vec![produced.clone()]);
        assert!(produced.as_std_path().exists());
        assert!(ledger.was_produced_by_us(&produced));
    }

    #[test]
    fn test_clean_failure_saves_progress() {
        let (_dir, root) = setup();
        let produced = root.join("a.txt");
        let backup = root.join("b.txt.bak");
        std::fs::write(&produced, b"ours").unwrap();
        std::fs::write(&backup, b"original").unwrap();

        let path = root.join("ledger.json");
        let mut ledger = Ledger::new(&path);
        ledger.record(&produced, None, content_hash(b"ours"));
        // The backup cannot move back: its directory is gone.
        ledger.record_vacated(&root.join("missing/b.txt"), backup.clone());
        ledger.save().unwrap();

        assert!(ledger.clean().is_err());
        assert!(!produced.as_std_path().exists());

        let saved = Ledger::load(&path).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved.was_produced_by_us(&produced));
        assert!(saved.was_produced_by_us(&root.join("missing/b.txt")));
    }

    #[test]
    fn test_restore_vacated_path() {
        let (_dir, root) = setup();
        let vacated = root.join("a.pck");
        let backup = root.join("a.pck.bak");
        std::fs::write(&backup, b"packed").unwrap();

        let mut ledger = Ledger::new(root.join("ledger.json"));
        ledger.record_vacated(&vacated, backup.clone());
        assert_eq!(ledger.restore(&vacated).unwrap(), RestoreOutcome::Restored);
        assert_eq!(std::fs::read(&vacated).unwrap(), b"packed");
        assert!(ledger.is_empty());
    }
}
