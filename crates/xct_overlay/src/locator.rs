//! Layered source resolution.
//!
//! A virtual path is searched in this order, stopping at the first hit:
//!
//! 1. The override folder.
//! 2. Loose files under each loose root (output, add-on, game). A loose file
//!    the ledger says we produced is never used; its displaced backup is read
//!    instead when one exists.
//! 3. Containers, add-on before base, newest first.
//!
//! Within each location the compressed variant outranks the plain one. A
//! source that exists but is empty counts as absent and ends the search.
//! File names under the override and loose roots match regardless of ASCII
//! case, like the containers do.

use crate::container_set::ContainerSet;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::settings::{BackupPolicy, Settings};
use crate::utils::{find_case_insensitive, read_if_exists};
use camino::{Utf8Path, Utf8PathBuf};
use xct_catalog::{inflate, VirtualPath};

/// Where resolved bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Override(Utf8PathBuf),
    Loose(Utf8PathBuf),
    /// A displaced original of a loose file.
    Backup(Utf8PathBuf),
    /// A container, identified by its index file.
    Catalog(Utf8PathBuf),
}

/// Resolved bytes for a virtual path.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// The variant that was found (compressed or plain).
    pub path: VirtualPath,
    pub origin: SourceOrigin,
    /// Plain bytes, already inflated for compressed variants.
    pub bytes: Vec<u8>,
}

/// Searches the override folder, loose roots and containers for a path.
#[derive(Debug)]
pub struct Locator {
    override_root: Option<Utf8PathBuf>,
    loose_roots: Vec<Utf8PathBuf>,
    containers: ContainerSet,
    backup_suffix: String,
    backup_policy: BackupPolicy,
}

impl Locator {
    /// Build a locator for `settings`, discovering its containers.
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self::with_containers(settings, ContainerSet::discover(settings)?))
    }

    pub fn with_containers(settings: &Settings, containers: ContainerSet) -> Self {
        Self {
            override_root: settings.override_root(),
            loose_roots: settings.loose_roots(),
            containers,
            backup_suffix: settings.backup_suffix.clone(),
            backup_policy: settings.backup_policy,
        }
    }

    pub fn containers(&self) -> &ContainerSet {
        &self.containers
    }

    /// Resolve `path`, returning `None` if no layer supplies non-empty bytes.
    pub fn locate(&self, path: &VirtualPath, ledger: &Ledger) -> Result<Option<SourceRecord>> {
        let variants = path.lookup_variants()?;

        if let Some(root) = &self.override_root {
            for variant in &variants {
                let Some(file) = find_case_insensitive(root, variant.as_str())? else {
                    continue;
                };
                if let Some(bytes) = read_if_exists(&file)? {
                    return finish(variant, SourceOrigin::Override(file), bytes);
                }
            }
        }

        for root in &self.loose_roots {
            for variant in &variants {
                let file = find_case_insensitive(root, variant.as_str())?
                    .unwrap_or_else(|| root.join(variant.as_str()));
                if let Some((origin, bytes)) = self.read_loose(&file, ledger)? {
                    return finish(variant, origin, bytes);
                }
            }
        }

        for container in self.containers.containers() {
            let catalog = &container.catalog;
            for variant in &variants {
                let Some(entry) = catalog.get(variant) else {
                    continue;
                };
                match catalog.read(entry) {
                    Ok(bytes) => {
                        let origin = SourceOrigin::Catalog(catalog.index_path().to_path_buf());
                        return Ok(non_empty(variant, origin, bytes));
                    }
                    Err(e) => tracing::warn!(
                        "Skipping unreadable entry path={} index={}: {}",
                        variant,
                        catalog.index_path(),
                        e
                    ),
                }
            }
        }

        tracing::debug!("No source for {}", path);
        Ok(None)
    }

    /// Read the loose file at `file`, honoring the ledger and backup policy.
    fn read_loose(
        &self,
        file: &Utf8Path,
        ledger: &Ledger,
    ) -> Result<Option<(SourceOrigin, Vec<u8>)>> {
        let backup = match ledger.backup_for(file) {
            Some(recorded) => recorded.to_path_buf(),
            None => Utf8PathBuf::from(format!("{}{}", file, self.backup_suffix)),
        };

        if ledger.was_produced_by_us(file) {
            return Ok(read_if_exists(&backup)?.map(|bytes| (SourceOrigin::Backup(backup), bytes)));
        }

        if self.backup_policy == BackupPolicy::PreferBackup {
            if let Some(bytes) = read_if_exists(&backup)? {
                return Ok(Some((SourceOrigin::Backup(backup), bytes)));
            }
        }

        Ok(read_if_exists(file)?.map(|bytes| (SourceOrigin::Loose(file.to_path_buf()), bytes)))
    }
}

/// Inflate file bytes of a compressed variant and apply the empty rule.
fn finish(
    variant: &VirtualPath,
    origin: SourceOrigin,
    bytes: Vec<u8>,
) -> Result<Option<SourceRecord>> {
    let bytes = if variant.is_compressed() && !bytes.is_empty() {
        inflate(&bytes, variant.as_str())?
    } else {
        bytes
    };
    Ok(non_empty(variant, origin, bytes))
}

fn non_empty(variant: &VirtualPath, origin: SourceOrigin, bytes: Vec<u8>) -> Option<SourceRecord> {
    if bytes.is_empty() {
        tracing::debug!("Empty source treated as absent path={} origin={:?}", variant, origin);
        return None;
    }
    tracing::trace!("Resolved {} from {:?}", variant, origin);
    Some(SourceRecord {
        path: variant.clone(),
        origin,
        bytes,
    })
}
