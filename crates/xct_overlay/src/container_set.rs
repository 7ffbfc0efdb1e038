//! Discovery and ordering of archive containers.
//!
//! Containers are `NN.cat` index files sitting directly in the add-on
//! directory and the game directory. Higher numbers are newer and outrank
//! lower ones; every add-on container outranks every base container.
//!
//! A container whose index fails to parse is logged and left out. Other
//! containers are unaffected.

use crate::error::Result;
use crate::settings::Settings;
use camino::{Utf8Path, Utf8PathBuf};
use std::cmp::Ordering;
use xct_catalog::{Catalog, CatalogEntry, VirtualPath};

/// Which installation group a container belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerGroup {
    Addon,
    Base,
}

/// An opened container and its group.
#[derive(Debug)]
pub struct Container {
    pub group: ContainerGroup,
    pub catalog: Catalog,
}

/// All readable containers in search order.
#[derive(Debug, Default)]
pub struct ContainerSet {
    containers: Vec<Container>,
}

impl ContainerSet {
    /// Discover add-on then base containers for `settings`.
    pub fn discover(settings: &Settings) -> Result<Self> {
        let addon_root = settings.addon_root();
        let mut set = Self::default();
        set.extend_from_dir(&addon_root, ContainerGroup::Addon)?;
        if addon_root != settings.game_dir {
            set.extend_from_dir(&settings.game_dir, ContainerGroup::Base)?;
        }

        tracing::info!(
            "Container set built: {} containers ({} add-on)",
            set.containers.len(),
            set.containers
                .iter()
                .filter(|c| c.group == ContainerGroup::Addon)
                .count()
        );
        Ok(set)
    }

    /// Open every `.cat` directly inside `dir`, newest first, and append them.
    ///
    /// A missing directory contributes nothing.
    pub fn extend_from_dir(&mut self, dir: &Utf8Path, group: ContainerGroup) -> Result<()> {
        for index_path in list_indexes(dir)? {
            match Catalog::open(&index_path) {
                Ok(catalog) => {
                    tracing::debug!(
                        "Opened container index={} entries={} group={:?}",
                        index_path,
                        catalog.entries().len(),
                        group
                    );
                    self.containers.push(Container { group, catalog });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable container index={}: {}", index_path, e);
                }
            }
        }
        Ok(())
    }

    /// Append an already opened catalog at the lowest precedence.
    pub fn push(&mut self, group: ContainerGroup, catalog: Catalog) {
        self.containers.push(Container { group, catalog });
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// The highest-precedence container holding `path`.
    pub fn find(&self, path: &VirtualPath) -> Option<(&Catalog, &CatalogEntry)> {
        self.containers
            .iter()
            .find_map(|c| c.catalog.get(path).map(|entry| (&c.catalog, entry)))
    }
}

/// `.cat` files directly inside `dir`, newest first.
fn list_indexes(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    if !dir.as_std_path().is_dir() {
        tracing::debug!("Container directory not found: {}", dir);
        return Ok(Vec::new());
    }

    let mut indexes = Vec::new();
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(p) => p,
            Err(p) => {
                tracing::warn!("Skipping non-UTF-8 path: {}", p.display());
                continue;
            }
        };
        let is_index = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cat"));
        if is_index && path.as_std_path().is_file() {
            indexes.push(path);
        }
    }

    indexes.sort_by(|a, b| newest_first(a.file_stem().unwrap_or(""), b.file_stem().unwrap_or("")));
    Ok(indexes)
}

/// Numeric stems descending, then non-numeric stems by name descending.
fn newest_first(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => b.cmp(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xct_catalog::CatalogBuilder;

    #[test]
    fn test_newest_first_ordering() {
        let mut stems = vec!["01", "10", "misc", "02", "alpha", "9"];
        stems.sort_by(|a, b| newest_first(a, b));
        assert_eq!(stems, vec!["10", "9", "02", "01", "misc", "alpha"]);
    }

    #[test]
    fn test_discover_orders_addon_before_base() {
        let dir = tempfile::tempdir().unwrap();
        let game = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let addon = game.join("addon");
        std::fs::create_dir_all(&addon).unwrap();

        for (root, name) in [(&game, "01"), (&game, "02"), (&addon, "01"), (&addon, "03")] {
            CatalogBuilder::default()
                .with_entry("types/TShips.txt", format!("{}/{}", root, name).into_bytes())
                .build(&root.join(format!("{}.cat", name)))
                .unwrap();
        }
        std::fs::write(game.join("readme.txt"), b"not a container").unwrap();

        let set = ContainerSet::discover(&Settings::new(&game)).unwrap();
        let order: Vec<(ContainerGroup, String)> = set
            .containers()
            .iter()
            .map(|c| {
                (
                    c.group,
                    c.catalog.index_path().file_name().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (ContainerGroup::Addon, "03.cat".to_string()),
                (ContainerGroup::Addon, "01.cat".to_string()),
                (ContainerGroup::Base, "02.cat".to_string()),
                (ContainerGroup::Base, "01.cat".to_string()),
            ]
        );

        let (catalog, _) = set.find(&VirtualPath::new("TYPES/tships.txt")).unwrap();
        assert_eq!(catalog.index_path(), addon.join("03.cat").as_path());
    }

    #[test]
    fn test_corrupt_container_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let game = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        CatalogBuilder::default()
            .with_entry("a.txt", b"ok".to_vec())
            .build(&game.join("01.cat"))
            .unwrap();
        std::fs::write(game.join("02.cat"), b"02.dat\na.txt notanumber\n").unwrap();

        let set = ContainerSet::discover(&Settings::new(&game)).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.find(&VirtualPath::new("a.txt")).is_some());
    }
}
