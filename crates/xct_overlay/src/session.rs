//! The run context.
//!
//! A [`Session`] owns everything one customization run needs: settings, the
//! locator, the ledger from the previous run, the table schema registry and
//! the cache of decoded assets. Nothing is process-global, so independent
//! sessions (and tests) never interfere.
//!
//! # Run Algorithm
//!
//! 1. [`Session::new`] validates settings, loads the ledger and discovers
//!    containers.
//! 2. Callers load assets by virtual path. The first load of a path resolves
//!    it through the [`Locator`] and decodes it; later loads return the same
//!    cached asset, so mutations accumulate in call order.
//! 3. Text and binary patches are applied to cached assets. A failed patch
//!    leaves its target untouched and is reported; siblings proceed.
//! 4. [`Session::write_all`] encodes every cached asset. Assets that encode
//!    the same as when they were loaded are skipped. Changed ones are written
//!    atomically into the output directory, displacing any file we did not
//!    produce to a backup. Outputs of the previous run that were not produced
//!    again are restored. The ledger is saved last, and also when a file
//!    operation fails part way.

use crate::error::{Error, Result};
use crate::ledger::{CleanReport, Ledger, RestoreOutcome};
use crate::locator::{Locator, SourceOrigin, SourceRecord};
use crate::settings::Settings;
use crate::utils::{content_hash, find_case_insensitive, write_atomic};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use xct_asset::{Asset, AssetKind, BinaryAsset, MarkupAsset, SchemaRegistry, TableAsset};
use xct_catalog::VirtualPath;
use xct_patch::{canonicalize_markup, header_len_for, BinaryPatch, CanonicalOptions, DiffPatch};

/// Suffix of text patch files in a patch directory.
pub const PATCH_SUFFIX: &str = ".patch";

/// Progress information emitted during [`Session::write_all`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteProgress {
    pub stage: WriteStage,
    /// Virtual path or output file currently being handled.
    pub current_file: Option<String>,
    /// 1-based index within the stage.
    pub current: u32,
    pub total: u32,
}

/// Stages of the write-back pass, emitted in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteStage {
    /// Encoding and writing cached assets.
    Writing,
    /// Restoring previous-run outputs that were not produced again.
    Restoring,
    Complete,
}

/// Summary returned by [`Session::write_all`].
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files written this run.
    pub written: Vec<Utf8PathBuf>,
    /// Cached assets whose encoding did not change since they were loaded.
    pub unchanged: Vec<VirtualPath>,
    /// Backups created for displaced files.
    pub backups: Vec<Utf8PathBuf>,
    /// Previous-run outputs restored because they were not produced again.
    pub restored: Vec<Utf8PathBuf>,
    /// Previous-run outputs left alone because they were edited externally.
    pub skipped: Vec<Utf8PathBuf>,
    pub elapsed: Duration,
}

/// Summary returned by [`Session::apply_patch_dir`].
#[derive(Debug, Default)]
pub struct PatchReport {
    pub applied: Vec<VirtualPath>,
    pub failed: Vec<(VirtualPath, Error)>,
}

/// Summary returned by [`Session::apply_binary_patches`].
#[derive(Debug, Default)]
pub struct BinaryPatchReport {
    /// Artifact and offset of every applied substitution.
    pub applied: Vec<(VirtualPath, u64)>,
    pub failed: Vec<(BinaryPatch, Error)>,
}

impl BinaryPatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

type ProgressCallback = Arc<dyn Fn(WriteProgress) + Send + Sync>;

struct CachedAsset {
    asset: Asset,
    origin: SourceOrigin,
    /// xxHash3 of the asset's encoding as loaded.
    source_hash: u64,
}

/// Context for one customization run.
pub struct Session {
    settings: Settings,
    locator: Locator,
    ledger: Ledger,
    schemas: SchemaRegistry,
    canonical: CanonicalOptions,
    cache: BTreeMap<VirtualPath, CachedAsset>,
    required: Vec<VirtualPath>,
    progress_callback: Option<ProgressCallback>,
}

impl Session {
    /// Validate `settings`, load the ledger and discover containers.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let ledger = Ledger::load(&settings.ledger_path())?;
        let locator = Locator::new(&settings)?;

        tracing::info!("Session ready");
        tracing::info!("Game dir: {}", settings.game_dir);
        tracing::info!("Output dir: {}", settings.output_root());
        tracing::info!("Ledger entries: {}", ledger.len());

        Ok(Self {
            settings,
            locator,
            ledger,
            schemas: SchemaRegistry::builtin(),
            canonical: CanonicalOptions::default(),
            cache: BTreeMap::new(),
            required: Vec::new(),
            progress_callback: None,
        })
    }

    /// Register a progress callback for [`write_all`](Self::write_all).
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(WriteProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Options used for canonical text patches.
    pub fn with_canonical_options(mut self, options: CanonicalOptions) -> Self {
        self.canonical = options;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Register additional table schemas.
    pub fn schemas_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schemas
    }

    /// Paths registered through [`require`](Self::require).
    pub fn required(&self) -> &[VirtualPath] {
        &self.required
    }

    /// Check that every path resolves to a source.
    ///
    /// Fails with [`Error::SourceMissing`] naming the first path that doesn't.
    pub fn require<I, P>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<VirtualPath>,
    {
        for path in paths {
            let key = path.into().plain_variant()?;
            if !self.cache.contains_key(&key) && self.locate(&key)?.is_none() {
                return Err(Error::SourceMissing(key));
            }
            if !self.required.contains(&key) {
                self.required.push(key);
            }
        }
        Ok(())
    }

    /// Resolve a path through the locator without touching the cache.
    pub fn locate(&self, path: &VirtualPath) -> Result<Option<SourceRecord>> {
        self.locator.locate(path, &self.ledger)
    }

    /// Load and cache an asset, failing with [`Error::SourceMissing`] if absent.
    pub fn load(&mut self, path: impl Into<VirtualPath>) -> Result<&mut Asset> {
        let path = path.into();
        match self.try_load(path.clone())? {
            Some(asset) => Ok(asset),
            None => Err(Error::SourceMissing(path)),
        }
    }

    /// Load and cache an asset, returning `None` if no source exists.
    pub fn try_load(&mut self, path: impl Into<VirtualPath>) -> Result<Option<&mut Asset>> {
        let key = path.into().plain_variant()?;

        if !self.cache.contains_key(&key) {
            let Some(source) = self.locate(&key)? else {
                return Ok(None);
            };
            let asset = Asset::decode(&key, source.bytes, &self.schemas)?;
            let source_hash = content_hash(&asset.encode()?);
            tracing::debug!("Loaded {} as {} from {:?}", key, asset.kind(), source.origin);
            self.cache.insert(
                key.clone(),
                CachedAsset {
                    asset,
                    origin: source.origin,
                    source_hash,
                },
            );
        }

        Ok(self.cache.get_mut(&key).map(|cached| &mut cached.asset))
    }

    pub fn is_loaded(&self, path: &VirtualPath) -> bool {
        path.plain_variant()
            .is_ok_and(|key| self.cache.contains_key(&key))
    }

    /// Where a cached asset was sourced from.
    pub fn origin_of(&self, path: &VirtualPath) -> Option<&SourceOrigin> {
        let key = path.plain_variant().ok()?;
        self.cache.get(&key).map(|cached| &cached.origin)
    }

    /// Drop a cached asset. It will neither be written nor reused.
    pub fn discard(&mut self, path: impl Into<VirtualPath>) -> bool {
        match path.into().plain_variant() {
            Ok(key) => self.cache.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    pub fn table_mut(&mut self, path: impl Into<VirtualPath>) -> Result<&mut TableAsset> {
        let path = path.into();
        let asset = self.load(path.clone())?;
        let found = asset.kind();
        asset.as_table_mut().ok_or(Error::WrongAssetKind {
            path,
            expected: AssetKind::Table,
            found,
        })
    }

    pub fn markup_mut(&mut self, path: impl Into<VirtualPath>) -> Result<&mut MarkupAsset> {
        let path = path.into();
        let asset = self.load(path.clone())?;
        let found = asset.kind();
        asset.as_markup_mut().ok_or(Error::WrongAssetKind {
            path,
            expected: AssetKind::Markup,
            found,
        })
    }

    pub fn binary_mut(&mut self, path: impl Into<VirtualPath>) -> Result<&mut BinaryAsset> {
        let path = path.into();
        let asset = self.load(path.clone())?;
        let found = asset.kind();
        asset.as_binary_mut().ok_or(Error::WrongAssetKind {
            path,
            expected: AssetKind::Binary,
            found,
        })
    }

    /// Replay a text patch onto a cached table or markup asset.
    ///
    /// On mismatch the asset is left exactly as it was.
    pub fn apply_text_patch(&mut self, path: impl Into<VirtualPath>, patch: &DiffPatch) -> Result<()> {
        let path = path.into();
        let options = self.canonical.clone();
        let asset = self.load(path.clone())?;

        let Some(mut text) = asset.patch_text() else {
            return Err(Error::WrongAssetKind {
                path,
                expected: AssetKind::Table,
                found: asset.kind(),
            });
        };
        if patch.canonical {
            text = canonicalize_markup(&text, &options)?;
        }

        let patched = patch.replay(&text).inspect_err(|e| {
            tracing::warn!("Text patch rejected path={}: {}", path, e);
        })?;
        asset.replace_text(&patched);
        tracing::info!("Applied text patch path={} hunks={}", path, patch.hunks.len());
        Ok(())
    }

    /// Apply every `*.patch` file below `dir`.
    ///
    /// A file `types/TLaser.txt.patch` targets `types/TLaser.txt`. Files are
    /// applied in path order and failures are collected rather than returned.
    pub fn apply_patch_dir(&mut self, dir: &Utf8Path) -> Result<PatchReport> {
        let mut report = PatchReport::default();

        for entry in walkdir::WalkDir::new(dir.as_std_path()).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(|p| Error::NonUtf8Path(p.display().to_string()))?;
            let Ok(rel) = file.strip_prefix(dir) else {
                continue;
            };
            let Some(target) = rel.as_str().strip_suffix(PATCH_SUFFIX) else {
                continue;
            };
            let target = VirtualPath::new(target);

            let result = std::fs::read_to_string(file.as_std_path())
                .map_err(Error::from)
                .and_then(|text| Ok(DiffPatch::parse(&text)?))
                .and_then(|patch| self.apply_text_patch(target.clone(), &patch));
            match result {
                Ok(()) => report.applied.push(target),
                Err(e) => {
                    tracing::warn!("Patch file failed file={}: {}", file, e);
                    report.failed.push((target, e));
                }
            }
        }

        tracing::info!(
            "Patch directory applied dir={} applied={} failed={}",
            dir,
            report.applied.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Diff `modified` against the original source of `path`.
    ///
    /// The original is resolved fresh through the locator, so edits made to the
    /// cached asset this run do not leak into the patch base.
    pub fn generate_text_patch(
        &self,
        path: impl Into<VirtualPath>,
        modified: &str,
        canonicalize: bool,
    ) -> Result<DiffPatch> {
        let key = path.into().plain_variant()?;
        let source = self
            .locate(&key)?
            .ok_or_else(|| Error::SourceMissing(key.clone()))?;
        let original = Asset::decode(&key, source.bytes, &self.schemas)?;

        let expected = if canonicalize {
            AssetKind::Markup
        } else {
            AssetKind::Table
        };
        let text = match (&original, canonicalize) {
            (Asset::Markup(markup), _) => markup.text.clone(),
            (Asset::Table(table), false) => table.to_text(),
            _ => {
                return Err(Error::WrongAssetKind {
                    path: key,
                    expected,
                    found: original.kind(),
                })
            }
        };

        let patch = if canonicalize {
            DiffPatch::generate_canonical(&text, modified, &self.canonical)?
        } else {
            DiffPatch::generate(&text, modified)
        };
        Ok(patch.with_target(key.as_str()))
    }

    /// Apply offset-verified substitutions. Each one succeeds or fails alone.
    pub fn apply_binary_patches(&mut self, patches: &[BinaryPatch]) -> BinaryPatchReport {
        let mut report = BinaryPatchReport::default();

        for patch in patches {
            let artifact = VirtualPath::new(&patch.artifact);
            let header_len = header_len_for(&patch.artifact);
            let result = self
                .binary_mut(artifact.clone())
                .and_then(|binary| Ok(patch.apply(&mut binary.bytes, header_len)?));
            match result {
                Ok(()) => report.applied.push((artifact, patch.offset)),
                Err(e) => {
                    tracing::warn!(
                        "Binary patch rejected artifact={} offset={}: {}",
                        patch.artifact,
                        patch.offset,
                        e
                    );
                    report.failed.push((patch.clone(), e));
                }
            }
        }

        tracing::info!(
            "Binary patches applied={} failed={}",
            report.applied.len(),
            report.failed.len()
        );
        report
    }

    /// Encode and write every changed asset, then persist the ledger.
    ///
    /// Every asset is encoded before anything touches the disk, so an asset
    /// that cannot be encoded fails the run with no file changed. If a file
    /// operation fails part way, the ledger is still saved with whatever was
    /// done so a later clean can undo it.
    pub fn write_all(&mut self) -> Result<WriteReport> {
        let start_time = Instant::now();
        let mut report = WriteReport::default();

        tracing::info!(
            "Writing {} cached assets to {}",
            self.cache.len(),
            self.settings.output_root()
        );

        let total = self.cache.len() as u32;
        let mut changed = Vec::new();
        for (idx, (path, cached)) in self.cache.iter().enumerate() {
            self.emit_progress(WriteProgress {
                stage: WriteStage::Writing,
                current_file: Some(path.to_string()),
                current: (idx + 1) as u32,
                total,
            });

            let bytes = cached.asset.encode()?;
            let hash = content_hash(&bytes);
            if hash == cached.source_hash {
                tracing::debug!("Unchanged, not writing path={}", path);
                report.unchanged.push(path.clone());
                continue;
            }
            changed.push((path.clone(), bytes, hash));
        }

        if let Err(e) = self.write_changed(changed, &mut report) {
            tracing::error!("Write-back failed, saving ledger: {}", e);
            if let Err(save_err) = self.ledger.save() {
                tracing::error!("Failed to save ledger {}: {}", self.ledger.path(), save_err);
            }
            return Err(e);
        }
        self.ledger.save()?;

        report.elapsed = start_time.elapsed();
        self.emit_progress(WriteProgress {
            stage: WriteStage::Complete,
            current_file: None,
            current: total,
            total,
        });
        tracing::info!(
            "Write complete written={} unchanged={} restored={} elapsed={:?}",
            report.written.len(),
            report.unchanged.len(),
            report.restored.len(),
            report.elapsed
        );
        Ok(report)
    }

    /// Write encoded assets and restore stale outputs, recording each step in
    /// the ledger as soon as it happens.
    fn write_changed(
        &mut self,
        changed: Vec<(VirtualPath, Vec<u8>, u64)>,
        report: &mut WriteReport,
    ) -> Result<()> {
        let output_root = self.settings.output_root();
        let previous: Vec<Utf8PathBuf> =
            self.ledger.entries().map(|(path, _)| path.to_path_buf()).collect();
        let mut touched: HashSet<Utf8PathBuf> = HashSet::new();

        for (path, bytes, hash) in changed {
            // A compressed sibling at the output location would shadow the plain file.
            if let Some(compressed) = path.compressed_variant() {
                let sibling = output_path(&output_root, &compressed)?;
                if !self.ledger.was_produced_by_us(&sibling) && sibling.as_std_path().exists() {
                    let backup = displace(&self.settings, &sibling)?;
                    self.ledger.record_vacated(&sibling, backup.clone());
                    report.backups.push(backup);
                }
                if self.ledger.was_produced_by_us(&sibling) {
                    touched.insert(sibling);
                }
            }

            let output = output_path(&output_root, &path)?;
            let backup = if self.ledger.was_produced_by_us(&output) {
                self.ledger.backup_for(&output).map(Utf8Path::to_path_buf)
            } else if output.as_std_path().exists() {
                let backup = displace(&self.settings, &output)?;
                self.ledger.record_vacated(&output, backup.clone());
                report.backups.push(backup.clone());
                Some(backup)
            } else {
                None
            };

            write_atomic(&output, &bytes)?;
            tracing::info!("Wrote {} bytes={} backup={:?}", output, bytes.len(), backup);
            self.ledger.record(&output, backup, hash);
            touched.insert(output.clone());
            report.written.push(output);
        }

        let stale: Vec<Utf8PathBuf> = previous
            .into_iter()
            .filter(|output| !touched.contains(output))
            .collect();
        let stale_total = stale.len() as u32;
        for (idx, output) in stale.into_iter().enumerate() {
            self.emit_progress(WriteProgress {
                stage: WriteStage::Restoring,
                current_file: Some(output.to_string()),
                current: (idx + 1) as u32,
                total: stale_total,
            });
            match self.ledger.restore(&output)? {
                RestoreOutcome::Restored => {
                    tracing::info!("Restored previous output {}", output);
                    report.restored.push(output);
                }
                RestoreOutcome::SkippedModified => report.skipped.push(output),
            }
        }
        Ok(())
    }

    /// Undo every output recorded in the ledger.
    ///
    /// The asset cache is cleared since its sources may have moved.
    pub fn clean(&mut self) -> Result<CleanReport> {
        self.cache.clear();
        self.ledger.clean()
    }

    fn emit_progress(&self, progress: WriteProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// Where `path` lands under the output root, reusing the spelling of a file
/// already there.
fn output_path(output_root: &Utf8Path, path: &VirtualPath) -> Result<Utf8PathBuf> {
    Ok(find_case_insensitive(output_root, path.as_str())?
        .unwrap_or_else(|| output_root.join(path.as_str())))
}

/// Move a file we did not produce to its backup location.
///
/// A leftover backup from an earlier, interrupted run is replaced.
fn displace(settings: &Settings, file: &Utf8Path) -> Result<Utf8PathBuf> {
    let backup = settings.backup_path_for(file);
    if backup.as_std_path().exists() {
        tracing::warn!("Replacing stale backup {}", backup);
        std::fs::remove_file(backup.as_std_path())?;
    }
    std::fs::rename(file.as_std_path(), backup.as_std_path())?;
    tracing::debug!("Displaced {} -> {}", file, backup);
    Ok(backup)
}

/// Read a JSON array of binary patch descriptors from a file.
pub fn read_binary_patches(path: &Utf8Path) -> Result<Vec<BinaryPatch>> {
    let json = std::fs::read_to_string(path.as_std_path())?;
    Ok(xct_patch::load_descriptors(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use xct_catalog::CatalogBuilder;

    const TLASER: &str = "2;0;\nA;10;20;B;\n";

    fn setup() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let game = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        CatalogBuilder::default()
            .with_entry("types/TLaser.txt", TLASER.as_bytes().to_vec())
            .with_entry("t/0001-L044.xml", b"<language id=\"44\">\n</language>\n".to_vec())
            .with_entry("L/!init.obj", vec![0, 1, 2, 3, 4, 5, 6, 7, 0xAA, 0xBB, 0xCC])
            .build(&game.join("01.cat"))
            .unwrap();
        (dir, game)
    }

    #[test]
    fn test_new_rejects_missing_game_dir() {
        let err = Session::new(Settings::new("/definitely/not/here"));
        assert!(matches!(err, Err(Error::InvalidGameDir(_))));
    }

    #[test]
    fn test_load_is_memoized() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();

        session.load("t/0001-L044.xml").unwrap();
        session
            .markup_mut("T/0001-l044.XML")
            .unwrap()
            .text
            .push_str("<!-- edited -->\n");

        let markup = session.markup_mut("t/0001-L044.xml").unwrap();
        assert!(markup.text.ends_with("<!-- edited -->\n"));
        assert!(matches!(
            session.origin_of(&VirtualPath::new("t/0001-L044.xml")),
            Some(SourceOrigin::Catalog(_))
        ));
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();

        assert!(session.try_load("types/TShips.txt").unwrap().is_none());
        assert!(matches!(
            session.load("types/TShips.txt"),
            Err(Error::SourceMissing(_))
        ));
        assert!(matches!(
            session.table_mut("L/!init.obj"),
            Err(Error::WrongAssetKind {
                expected: AssetKind::Table,
                found: AssetKind::Binary,
                ..
            })
        ));
    }

    #[test]
    fn test_require_names_first_missing() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();
        session.require(["types/TLaser.txt"]).unwrap();
        match session.require(["L/!init.obj", "types/TShips.txt", "types/TBullets.txt"]) {
            Err(Error::SourceMissing(path)) => assert_eq!(path.as_str(), "types/TShips.txt"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(session.required().len(), 2);
    }

    #[test]
    fn test_text_patch_mismatch_leaves_asset() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();

        let good = session
            .generate_text_patch("types/TLaser.txt", "2;0;\nA;15;20;B;\n", false)
            .unwrap();
        let bad = DiffPatch::generate("2;0;\nX;1;\n", "2;0;\nY;1;\n");

        let err = session.apply_text_patch("types/TLaser.txt", &bad).unwrap_err();
        assert!(err.is_mismatch());
        assert_eq!(session.table_mut("types/TLaser.txt").unwrap().to_text(), TLASER);

        session.apply_text_patch("types/TLaser.txt", &good).unwrap();
        assert_eq!(
            session.table_mut("types/TLaser.txt").unwrap().to_text(),
            "2;0;\nA;15;20;B;\n"
        );
    }

    #[test]
    fn test_generate_uses_fresh_source() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();
        session
            .markup_mut("t/0001-L044.xml")
            .unwrap()
            .text
            .push_str("<!-- edited -->\n");

        let patch = session
            .generate_text_patch(
                "t/0001-L044.xml",
                "<language id=\"44\">\n<t id=\"1\">Hi</t>\n</language>\n",
                false,
            )
            .unwrap();
        assert_eq!(patch.target.as_deref(), Some("t/0001-L044.xml"));
        assert_eq!(patch.hunks.len(), 1);
        assert!(patch.hunks[0].deletions.is_empty());
    }

    #[test]
    fn test_canonical_patch_on_markup() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();
        let patch = session
            .generate_text_patch(
                "t/0001-L044.xml",
                "<language id=\"44\" editor:x=\"1\"><page id=\"2\"/></language>",
                true,
            )
            .unwrap();
        assert!(patch.canonical);

        session.apply_text_patch("t/0001-L044.xml", &patch).unwrap();
        assert_eq!(
            session.markup_mut("t/0001-L044.xml").unwrap().text,
            "<language id=\"44\">\n  <page id=\"2\"/>\n</language>\n"
        );

        assert!(matches!(
            session.generate_text_patch("types/TLaser.txt", TLASER, true),
            Err(Error::WrongAssetKind { .. })
        ));
    }

    #[test]
    fn test_canonical_patch_keeps_string_text() {
        let (_dir, game) = setup();
        let original = "<language id=\"44\">\n  <page id=\"1\">\n    <t id=\"1\"> Laser</t>\n    <t id=\"2\">Twin</t>\n  </page>\n</language>\n";
        CatalogBuilder::default()
            .with_entry("t/0003-L044.xml", original.as_bytes().to_vec())
            .build(&game.join("02.cat"))
            .unwrap();

        let mut session = Session::new(Settings::new(&game)).unwrap();
        let patch = session
            .generate_text_patch(
                "t/0003-L044.xml",
                "<language id=\"44\"><page id=\"1\">\n<t id=\"1\"> Laser</t>\n<t id=\"2\">Twin Laser</t>\n</page></language>",
                true,
            )
            .unwrap();
        assert_eq!(patch.hunks.len(), 1);

        session.apply_text_patch("t/0003-L044.xml", &patch).unwrap();
        assert_eq!(
            session.markup_mut("t/0003-L044.xml").unwrap().text,
            original.replace(">Twin<", ">Twin Laser<")
        );
    }

    #[test]
    fn test_unencodable_asset_writes_nothing() {
        let (_dir, game) = setup();
        CatalogBuilder::default()
            .with_entry(
                "t/0002-L049.xml",
                b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<language id=\"49\">\n</language>\n"
                    .to_vec(),
            )
            .build(&game.join("02.cat"))
            .unwrap();

        let mut session = Session::new(Settings::new(&game)).unwrap();
        session.binary_mut("L/!init.obj").unwrap().bytes[8] = 0x7F;
        session
            .markup_mut("t/0002-L049.xml")
            .unwrap()
            .text
            .push_str("<!-- \u{20ac} -->\n");

        assert!(matches!(session.write_all(), Err(Error::Asset(_))));
        assert!(!game.join("addon/L/!init.obj").as_std_path().exists());
        assert!(!game.join("addon/xct_ledger.json").as_std_path().exists());
    }

    #[test]
    fn test_failed_write_keeps_ledger() {
        let (_dir, game) = setup();
        std::fs::create_dir_all(game.join("addon/L")).unwrap();
        let user_obj = vec![9u8, 9, 9, 9, 9, 9, 9, 9, 1, 2, 3];
        let obj = game.join("addon/L/!init.obj");
        std::fs::write(&obj, &user_obj).unwrap();
        // A plain file where the table's output directory would go.
        std::fs::write(game.join("addon/types"), b"not a directory").unwrap();

        let mut session = Session::new(Settings::new(&game)).unwrap();
        session.binary_mut("L/!init.obj").unwrap().bytes[8] = 0x7F;
        let patch = session
            .generate_text_patch("types/TLaser.txt", "2;0;\nA;15;20;B;\n", false)
            .unwrap();
        session.apply_text_patch("types/TLaser.txt", &patch).unwrap();

        assert!(session.write_all().is_err());
        let ledger = Ledger::load(&game.join("addon/xct_ledger.json")).unwrap();
        assert!(ledger.was_produced_by_us(&obj));
        assert_eq!(
            ledger.backup_for(&obj),
            Some(game.join("addon/L/!init.obj.xct_backup").as_path())
        );

        let mut again = Session::new(Settings::new(&game)).unwrap();
        again.clean().unwrap();
        assert_eq!(std::fs::read(&obj).unwrap(), user_obj);
        assert!(!game.join("addon/xct_ledger.json").as_std_path().exists());
    }

    #[test]
    fn test_binary_patches_independent() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();
        let patches = vec![
            BinaryPatch::from_hex("L/!init.obj", 0, "aa", "11").unwrap(),
            BinaryPatch::from_hex("L/!init.obj", 1, "ff", "22").unwrap(),
            BinaryPatch::from_hex("L/missing.obj", 0, "00", "00").unwrap(),
        ];
        let report = session.apply_binary_patches(&patches);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].1.is_mismatch());
        assert!(matches!(report.failed[1].1, Error::SourceMissing(_)));
        assert_eq!(
            session.binary_mut("L/!init.obj").unwrap().bytes[8..],
            [0x11, 0xBB, 0xCC]
        );
    }

    #[test]
    fn test_progress_events() {
        let (_dir, game) = setup();
        let events: Arc<Mutex<Vec<WriteStage>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut session = Session::new(Settings::new(&game))
            .unwrap()
            .with_progress(move |p| sink.lock().unwrap().push(p.stage));

        session.table_mut("types/TLaser.txt").unwrap();
        session.write_all().unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![WriteStage::Writing, WriteStage::Complete]
        );
    }

    #[test]
    fn test_discard_drops_changes() {
        let (_dir, game) = setup();
        let mut session = Session::new(Settings::new(&game)).unwrap();
        session.binary_mut("L/!init.obj").unwrap().bytes[8] = 0;
        assert!(session.discard("L/!init.obj"));
        assert!(!session.is_loaded(&VirtualPath::new("L/!init.obj")));

        let report = session.write_all().unwrap();
        assert!(report.written.is_empty());
    }
}
