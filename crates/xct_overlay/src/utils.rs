//! Content hashing and file helpers shared by the ledger and the write-back pass.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// xxHash3 of a byte buffer.
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// xxHash3 of a file's contents, or `None` if the file does not exist.
pub fn file_content_hash(path: &Utf8Path) -> Result<Option<u64>> {
    match std::fs::read(path.as_std_path()) {
        Ok(bytes) => Ok(Some(content_hash(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a file, returning `None` if it does not exist.
pub fn read_if_exists(path: &Utf8Path) -> Result<Option<Vec<u8>>> {
    if !path.as_std_path().is_file() {
        return Ok(None);
    }
    Ok(Some(std::fs::read(path.as_std_path())?))
}

/// Find `rel` under `root`, matching each path segment without regard to
/// ASCII case. The exact spelling is tried first.
pub fn find_case_insensitive(root: &Utf8Path, rel: &str) -> Result<Option<Utf8PathBuf>> {
    let exact = root.join(rel);
    if exact.as_std_path().exists() {
        return Ok(Some(exact));
    }

    let mut current = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        let direct = current.join(segment);
        if direct.as_std_path().exists() {
            current = direct;
            continue;
        }
        if !current.as_std_path().is_dir() {
            return Ok(None);
        }

        let mut found = None;
        for entry in std::fs::read_dir(current.as_std_path())? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| n.eq_ignore_ascii_case(segment)) {
                found = Utf8PathBuf::from_path_buf(entry.path()).ok();
                break;
            }
        }
        match found {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
///
/// Readers never observe a half-written file. Parent directories are created.
pub fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent.as_std_path())?;
    }
    let temp = format!("{}.xct_tmp", path);
    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&temp, path.as_std_path()) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn test_write_atomic_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let path = root.join("nested/dir/file.txt");

        assert_eq!(file_content_hash(&path).unwrap(), None);
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();

        assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"two");
        assert_eq!(file_content_hash(&path).unwrap(), Some(content_hash(b"two")));
        assert!(!root.join("nested/dir/file.txt.xct_tmp").as_std_path().exists());
    }

    #[test]
    fn test_find_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("Types").as_std_path()).unwrap();
        std::fs::write(root.join("Types/TLaser.txt").as_std_path(), b"x").unwrap();

        assert_eq!(
            find_case_insensitive(root, "types/tlaser.TXT").unwrap(),
            Some(root.join("Types/TLaser.txt"))
        );
        assert_eq!(
            find_case_insensitive(root, "Types/TLaser.txt").unwrap(),
            Some(root.join("Types/TLaser.txt"))
        );
        assert_eq!(find_case_insensitive(root, "types/TShips.txt").unwrap(), None);
        assert_eq!(find_case_insensitive(root, "maps/x.txt").unwrap(), None);
    }
}
