// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAGIC_BYTES: [u8; 3] = [b'S', b'I', b'L'];

/// File extension of persisted silos.
pub const SILO_EXT: &str = "xb";

/// Atomically rewrites a file.
pub fn rewrite_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // NOTE: Nothing we can do
    #[allow(clippy::expect_used)]
    let folder = path.parent().expect("should have a parent");

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path)?;

    #[cfg(not(target_os = "windows"))]
    {
        let file = std::fs::File::open(path)?;
        file.sync_all()?;
        fsync_directory(folder)?;
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(_path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}

/// Removes a file that may be open in a concurrent reader.
///
/// The file is first renamed to `<name>.<6-hex>.old` and the renamed file
/// unlinked, so a reader holding the old name never observes a half-deleted
/// file. If the rename fails (another process may have removed the file
/// already), the original name is unlinked directly.
pub fn remove_file_safe(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let mut old_path = path.as_os_str().to_os_string();
    old_path.push(format!(".{}.old", random_suffix()));
    let old_path: std::path::PathBuf = old_path.into();

    if let Err(e) = std::fs::rename(path, &old_path) {
        log::debug!("could not rename stale file {path:?}: {e}, unlinking directly");
        return std::fs::remove_file(path);
    }

    std::fs::remove_file(&old_path)
}

/// 6 hex chars derived from the current time, good enough to keep
/// concurrently renamed stale files from colliding.
pub fn random_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let h = xxhash_rust::xxh3::xxh3_64(&nanos.to_le_bytes());
    format!("{:06x}", h & 0xFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    #[test]
    fn atomic_rewrite() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let path = dir.path().join("test.txt");
        {
            let mut file = std::fs::File::create(&path)?;
            write!(file, "asdasdasdasdasd")?;
        }

        rewrite_atomic(&path, b"newcontent")?;

        let content = std::fs::read_to_string(&path)?;
        assert_eq!("newcontent", content);

        Ok(())
    }

    #[test]
    fn remove_safe() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let path = dir.path().join("a.xb");
        std::fs::write(&path, b"x")?;

        remove_file_safe(&path)?;
        assert!(!path.exists());

        // Removing a missing file is not an error
        remove_file_safe(&path)?;

        Ok(())
    }
}
