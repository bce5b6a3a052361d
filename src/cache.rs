// src/cache.rs
//
// Flat-file cache helpers shared by the fetch and parse stages.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("cache"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Sibling path a write is staged in before being renamed over `path`.
pub fn part_path(path: &Path) -> PathBuf {
    sibling(path, ".part")
}

/// Sibling holding the config fingerprint `path` was built under.
pub fn fingerprint_path(path: &Path) -> PathBuf {
    sibling(path, ".sha256")
}

/// Replace `path` with `bytes` so readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let staged = part_path(path);
    fs::write(&staged, bytes)?;
    fs::rename(&staged, path)
}

pub async fn write_atomic_async(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let staged = part_path(path);
    tokio::fs::write(&staged, bytes).await?;
    tokio::fs::rename(&staged, path).await
}

pub fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn part_path_is_a_sibling() {
        let p = Path::new("/tmp/cache/linux-od.json");
        assert_eq!(part_path(p), PathBuf::from("/tmp/cache/linux-od.json.part"));
        assert_eq!(
            fingerprint_path(Path::new("parsed.json")),
            PathBuf::from("parsed.json.sha256")
        );
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_part_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("a.json");

        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn async_write_matches_sync_write() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("b.json");

        write_atomic_async(&path, b"{}").await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!part_path(&path).exists());
    }
}
