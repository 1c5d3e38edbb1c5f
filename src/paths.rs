// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::file::SILO_EXT;
use crate::section::CacheScope;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Files untouched for this long are removed by [`CacheLocations::prune_old`].
const PRUNE_AGE: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const DEFAULT_SYSTEM_ROOT: &str = "/var/cache/catalog-cache";
const CACHE_SUBDIR: &str = "catalog-cache";

/// Computes and maintains the on-disk locations of section files
///
/// System-scope files live directly under the system root, user-scope
/// files under `<user_root>/user/`. All files of one locale share the
/// `<locale>-<encoded-key>.xb` naming scheme.
#[derive(Clone, Debug)]
pub(crate) struct CacheLocations {
    pub system_root: PathBuf,
    pub user_root: PathBuf,

    /// Callers that override the default roots own those directories;
    /// pruning then refuses to run so it cannot eat their data.
    pub overridden: bool,
}

impl Default for CacheLocations {
    fn default() -> Self {
        let user_root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_SUBDIR);

        Self {
            system_root: DEFAULT_SYSTEM_ROOT.into(),
            user_root,
            overridden: false,
        }
    }
}

impl CacheLocations {
    pub fn with_roots(system_root: PathBuf, user_root: PathBuf) -> Self {
        Self {
            system_root,
            user_root,
            overridden: true,
        }
    }

    fn scope_dir(&self, scope: CacheScope) -> PathBuf {
        match scope {
            CacheScope::System => self.system_root.clone(),
            CacheScope::User => self.user_root.join("user"),
        }
    }

    /// Path of the section file for a (scope, locale, key) tuple.
    pub fn section_path(&self, scope: CacheScope, locale: &str, user_key: &str) -> PathBuf {
        self.scope_dir(scope)
            .join(format!("{locale}-{}.{SILO_EXT}", encoded_key(user_key)))
    }

    /// Creates the directory for a scope and probes that it is writable.
    pub fn ensure_writable(&self, scope: CacheScope) -> crate::Result<PathBuf> {
        let dir = self.scope_dir(scope);

        let probe = std::fs::create_dir_all(&dir)
            .and_then(|()| tempfile::NamedTempFile::new_in(&dir).map(|_| ()));

        match probe {
            Ok(()) => Ok(dir),
            Err(e) => {
                log::debug!("cache directory {dir:?} not writable: {e}");
                Err(crate::Error::Permissions(dir))
            }
        }
    }

    /// Finds the most recently written copy of a section file across the
    /// two roots. Ties go to the user copy.
    pub fn newest_variant(&self, locale: &str, user_key: &str) -> Option<(CacheScope, PathBuf)> {
        let candidates = [
            (
                CacheScope::User,
                self.section_path(CacheScope::User, locale, user_key),
            ),
            (
                CacheScope::System,
                self.section_path(CacheScope::System, locale, user_key),
            ),
        ];

        let mut best: Option<(CacheScope, PathBuf, SystemTime)> = None;

        for (scope, path) in candidates {
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };

            let Ok(mtime) = meta.modified() else {
                continue;
            };

            let newer = best.as_ref().is_none_or(|(_, _, t)| mtime > *t);

            if newer {
                best = Some((scope, path, mtime));
            }
        }

        best.map(|(scope, path, _)| (scope, path))
    }

    /// Removes cache files not accessed for 90 days, one subdirectory
    /// deep, then removes emptied subdirectories. No-op when the default
    /// roots were overridden.
    pub fn prune_old(&self) -> crate::Result<()> {
        if self.overridden {
            log::debug!("cache locations were overridden, skipping prune");
            return Ok(());
        }

        let root = &self.user_root;

        if !root.exists() {
            return Ok(());
        }

        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                prune_dir(&path)?;

                if std::fs::read_dir(&path)?.next().is_none() {
                    if let Err(e) = std::fs::remove_dir(&path) {
                        log::warn!("could not remove empty cache directory {path:?}: {e}");
                    }
                }
            } else {
                prune_file(&path);
            }
        }

        Ok(())
    }
}

fn prune_dir(dir: &Path) -> crate::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() {
            prune_file(&path);
        }
    }

    Ok(())
}

fn prune_file(path: &Path) {
    let is_cache_file = path
        .extension()
        .is_some_and(|ext| ext == SILO_EXT || ext == "cache");

    if !is_cache_file {
        return;
    }

    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };

    if !meta.is_file() {
        return;
    }

    let Ok(accessed) = meta.accessed() else {
        return;
    };

    let age = SystemTime::now()
        .duration_since(accessed)
        .unwrap_or_default();

    if age < PRUNE_AGE {
        return;
    }

    log::debug!("pruning cache file {path:?}, last accessed {age:?} ago");

    if let Err(e) = crate::file::remove_file_safe(path) {
        log::warn!("could not prune cache file {path:?}: {e}");
    }
}

/// Keys are embedded in file names; anything containing a path separator
/// is replaced by a content-addressed hex digest.
pub(crate) fn encoded_key(user_key: &str) -> String {
    if !user_key.contains(['/', '\\']) {
        return user_key.into();
    }

    format!(
        "{:032x}",
        xxhash_rust::xxh3::xxh3_128(user_key.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn locations(dir: &Path) -> CacheLocations {
        CacheLocations::with_roots(dir.join("system"), dir.join("user"))
    }

    #[test]
    fn plain_keys_stay_readable() {
        assert_eq!("os-catalog", encoded_key("os-catalog"));
    }

    #[test]
    fn path_keys_are_digested() {
        let digest = encoded_key("/usr/share/metainfo");

        assert_eq!(32, digest.len());
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));

        // content-addressed: stable across calls
        assert_eq!(digest, encoded_key("/usr/share/metainfo"));
        assert_ne!(digest, encoded_key("/usr/share/swcatalog"));
    }

    #[test]
    fn section_path_shape() {
        let dir = tempfile::tempdir().expect("should create tempdir");
        let locations = locations(dir.path());

        assert_eq!(
            dir.path().join("system").join("en-os-catalog.xb"),
            locations.section_path(CacheScope::System, "en", "os-catalog"),
        );

        assert_eq!(
            dir.path().join("user").join("user").join("en-extra.xb"),
            locations.section_path(CacheScope::User, "en", "extra"),
        );
    }

    #[test]
    fn newest_variant_single_copy() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let locations = locations(dir.path());

        assert_eq!(None, locations.newest_variant("en", "k"));

        let sys = locations.section_path(CacheScope::System, "en", "k");
        std::fs::create_dir_all(sys.parent().expect("should have parent"))?;
        std::fs::write(&sys, b"x")?;

        assert_eq!(
            Some((CacheScope::System, sys.clone())),
            locations.newest_variant("en", "k"),
        );

        Ok(())
    }

    #[test]
    fn newest_variant_prefers_newer() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let locations = locations(dir.path());

        let sys = locations.section_path(CacheScope::System, "en", "k");
        let user = locations.section_path(CacheScope::User, "en", "k");

        std::fs::create_dir_all(sys.parent().expect("should have parent"))?;
        std::fs::create_dir_all(user.parent().expect("should have parent"))?;

        std::fs::write(&sys, b"old")?;
        std::thread::sleep(std::time::Duration::from_millis(50));
        std::fs::write(&user, b"new")?;

        assert_eq!(
            Some((CacheScope::User, user.clone())),
            locations.newest_variant("en", "k"),
        );

        Ok(())
    }

    #[test]
    fn prune_skips_overridden_roots() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let locations = locations(dir.path());

        let file = dir.path().join("user").join("en-k.xb");
        std::fs::create_dir_all(file.parent().expect("should have parent"))?;
        std::fs::write(&file, b"x")?;

        locations.prune_old()?;

        // overridden roots are caller-owned, nothing may be deleted
        assert!(file.exists());

        Ok(())
    }
}
