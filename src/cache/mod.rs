// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub(crate) mod inner;
mod search;

use crate::component::{Component, ComponentKind, DataId, LaunchableKind, ProvidedKind};
use crate::file::remove_file_safe;
use crate::paths::CacheLocations;
use crate::refine::Refine;
use crate::section::{make_section_key, CacheScope, FormatStyle, Section};
use crate::silo::Silo;
use inner::{CacheInner, EXTENDS_QUERY};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cache keys claimed by the distribution tooling. Callers writing
/// ordinary sections must pick other names; the privileged writer marks
/// its sections as OS data and may use them.
const RESERVED_KEYS: [&str; 3] = ["os-catalog", "os-metainfo", "flatpak"];

/// Internal user key of the volatile masking section.
const MASK_KEY: &str = "mask";

/// Cache configuration builder
#[derive(Clone, Debug)]
pub struct Config {
    locale: String,
    roots: Option<(PathBuf, PathBuf)>,
    prefer_os_metainfo: bool,
    resolve_addons: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "C".into(),
            roots: None,
            prefer_os_metainfo: false,
            resolve_addons: true,
        }
    }
}

impl Config {
    /// Initializes a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locale tag partitioning all persisted section files.
    #[must_use]
    pub fn locale(mut self, locale: &str) -> Self {
        self.locale = locale.into();
        self
    }

    /// Overrides the cache roots.
    ///
    /// Overridden roots are treated as caller-owned: `prune_old`
    /// becomes a no-op so it cannot destroy foreign data.
    #[must_use]
    pub fn locations<P: Into<PathBuf>>(mut self, system_root: P, user_root: P) -> Self {
        self.roots = Some((system_root.into(), user_root.into()));
        self
    }

    /// If true, OS metainfo sections are not suppressed by OS collection
    /// sections carrying the same component ID.
    #[must_use]
    pub fn prefer_os_metainfo(mut self, prefer: bool) -> Self {
        self.prefer_os_metainfo = prefer;
        self
    }

    /// If true, addons are attached to their extended component on
    /// deserialization.
    #[must_use]
    pub fn auto_resolve_addons(mut self, resolve: bool) -> Self {
        self.resolve_addons = resolve;
        self
    }

    /// Creates the cache. No I/O happens until the first section is
    /// written or loaded.
    #[must_use]
    pub fn open(self) -> Cache {
        let locations = match self.roots {
            Some((system, user)) => CacheLocations::with_roots(system, user),
            None => CacheLocations::default(),
        };

        Cache {
            inner: RwLock::new(CacheInner {
                sections: Vec::new(),
                masked: FxHashMap::default(),
                locale: self.locale,
                locations,
                prefer_os_metainfo: self.prefer_os_metainfo,
                resolve_addons: self.resolve_addons,
            }),
        }
    }
}

/// Section-partitioned, on-disk metadata cache for software catalogs
///
/// Callers feed parsed components in once per section; the cache compiles
/// a binary index per section, persists it atomically, and answers
/// structured and full-text queries from the compiled form. A single
/// reader-writer lock makes concurrent queries safe against section
/// rebuilds: readers always see either the old or the new section, never
/// a partial one.
pub struct Cache {
    inner: RwLock<CacheInner>,
}

impl std::fmt::Display for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();

        for section in &inner.sections {
            writeln!(f, "{:?} | # = {}", section, section.component_count())?;
        }

        write!(f, "tombstones = {}", inner.masked.len())
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        // The mask is volatile; its temp file dies with the cache
        let Ok(inner) = self.inner.read() else {
            return;
        };

        for section in inner.sections.iter().filter(|s| s.is_mask) {
            if let Err(e) = remove_file_safe(&section.fname) {
                log::warn!("could not remove mask file {:?}: {e}", section.fname);
            }
        }
    }
}

impl Cache {
    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().expect("lock is poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().expect("lock is poisoned")
    }

    /// Replaces the locale used for subsequent path generation.
    ///
    /// Existing sections are untouched; their keys keep the locale they
    /// were created under.
    pub fn set_locale(&self, locale: &str) {
        self.write().locale = locale.into();
    }

    /// Overrides the cache roots, see [`Config::locations`].
    pub fn set_locations<P: Into<PathBuf>>(&self, system_root: P, user_root: P) {
        self.write().locations = CacheLocations::with_roots(system_root.into(), user_root.into());
    }

    /// See [`Config::prefer_os_metainfo`].
    pub fn set_prefer_os_metainfo(&self, prefer: bool) {
        self.write().prefer_os_metainfo = prefer;
    }

    /// See [`Config::auto_resolve_addons`].
    pub fn set_auto_resolve_addons(&self, resolve: bool) {
        self.write().resolve_addons = resolve;
    }

    /// Drops all sections and tombstones. Settings survive.
    pub fn clear(&self) {
        let mut inner = self.write();

        for section in inner.sections.iter().filter(|s| s.is_mask) {
            if let Err(e) = remove_file_safe(&section.fname) {
                log::warn!("could not remove mask file {:?}: {e}", section.fname);
            }
        }

        inner.sections.clear();
        inner.masked.clear();
    }

    /// Amount of registered sections, mask included.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.read().sections.len()
    }

    /// Returns `true` if no section is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().sections.is_empty()
    }

    /// Removes cache files not accessed for 90 days.
    ///
    /// No-op when the default cache roots were overridden.
    pub fn prune_old(&self) -> crate::Result<()> {
        self.read().locations.prune_old()
    }

    /// Builds, persists and registers a section from parsed components,
    /// replacing any prior section with the same key.
    pub fn set_contents(
        &self,
        scope: CacheScope,
        style: FormatStyle,
        is_os_data: bool,
        components: &[Component],
        user_key: &str,
        refine: Option<Arc<dyn Refine>>,
    ) -> crate::Result<()> {
        check_user_key(user_key, is_os_data)?;

        let mut inner = self.write();
        let inner = &mut *inner;

        let key = make_section_key(scope, &inner.locale, user_key);

        inner.locations.ensure_writable(scope)?;

        let silo = crate::serializer::compile_components(components.iter(), refine.as_ref());
        let fname = inner.locations.section_path(scope, &inner.locale, user_key);

        silo.save_to_file(&fname)?;

        log::debug!(
            "registered section {key} with {} components at {fname:?}",
            components.len(),
        );

        replace_section(
            inner,
            Section {
                key,
                scope,
                style,
                is_os_data,
                is_mask: false,
                silo,
                fname,
                refine,
            },
        );

        Ok(())
    }

    /// Registers the most recent persisted section for a key, looking at
    /// both cache roots.
    ///
    /// Returns `true` ("outdated") if no usable file exists; the section
    /// is then not registered and the caller is expected to rebuild via
    /// [`Cache::set_contents`].
    pub fn load_section_for_key(
        &self,
        scope: CacheScope,
        style: FormatStyle,
        is_os_data: bool,
        user_key: &str,
        refine: Option<Arc<dyn Refine>>,
    ) -> crate::Result<bool> {
        check_user_key(user_key, is_os_data)?;

        let mut inner = self.write();
        let inner = &mut *inner;

        let Some((_, path)) = inner.locations.newest_variant(&inner.locale, user_key) else {
            return Ok(true);
        };

        let silo = match Silo::load_from_file(&path) {
            Ok(silo) => silo,
            Err(e) => {
                log::warn!("could not load cached section from {path:?}: {e}");
                return Ok(true);
            }
        };

        replace_section(
            inner,
            Section {
                key: make_section_key(scope, &inner.locale, user_key),
                scope,
                style,
                is_os_data,
                is_mask: false,
                silo,
                fname: path,
                refine,
            },
        );

        Ok(false)
    }

    /// Registers the cached section built from a source path (e.g. a
    /// metainfo directory), if one exists.
    ///
    /// The source path doubles as the cache key; its scope is inferred
    /// from the path prefix (anything under the home directory is
    /// user-scope). Returns `true` ("outdated") if there is no usable
    /// cache file, or if the source changed after the cache was written;
    /// in the latter case the stale section is still registered so
    /// queries keep working until the caller rebuilds.
    pub fn load_section_for_path(
        &self,
        source_path: &Path,
        refine: Option<Arc<dyn Refine>>,
    ) -> crate::Result<bool> {
        let mut inner = self.write();
        let inner = &mut *inner;

        let user_key = source_path.to_string_lossy();

        let scope = if dirs::home_dir().is_some_and(|home| source_path.starts_with(&home)) {
            CacheScope::User
        } else {
            CacheScope::System
        };

        let fname = inner.locations.section_path(scope, &inner.locale, &user_key);

        let Ok(cache_meta) = std::fs::metadata(&fname) else {
            return Ok(true);
        };

        let silo = match Silo::load_from_file(&fname) {
            Ok(silo) => silo,
            Err(e) => {
                log::warn!("could not load cached section from {fname:?}: {e}");
                return Ok(true);
            }
        };

        let outdated = match (std::fs::metadata(source_path), cache_meta.modified()) {
            (Ok(source_meta), Ok(cache_mtime)) => {
                source_meta.modified().is_ok_and(|src| src > cache_mtime)
            }
            // Source vanished or timestamps unavailable: force a rebuild
            _ => true,
        };

        replace_section(
            inner,
            Section {
                key: make_section_key(scope, &inner.locale, &user_key),
                scope,
                style: FormatStyle::Metainfo,
                is_os_data: false,
                is_mask: false,
                silo,
                fname,
                refine,
            },
        );

        Ok(outdated)
    }

    /// Hides all copies of a data ID from subsequent queries.
    pub fn mask_by_data_id(&self, data_id: DataId) {
        self.write().masked.insert(data_id, true);
    }

    /// Overlays curated components over whatever queries would otherwise
    /// return.
    ///
    /// Components already in the mask are carried over unless they were
    /// tombstoned since; the new components are appended. The mask
    /// section is volatile: it lives in the runtime directory and is
    /// always queried last, so it has the final word.
    pub fn add_masking_components(&self, components: &[Component]) -> crate::Result<()> {
        let mut inner = self.write();
        let inner = &mut *inner;

        let mut carry_over: Vec<Component> = Vec::new();

        if let Some(pos) = inner.sections.iter().position(|s| s.is_mask) {
            let old = inner.sections.remove(pos);

            // NotFound here means the previous mask was empty
            if let Ok(nodes) = old.silo.query("components/component", &[]) {
                for node in nodes {
                    let component = crate::serializer::node_to_component(&old.silo, node);
                    let data_id = component.data_id();

                    if inner.masked.get(&data_id) == Some(&true) {
                        continue;
                    }

                    inner.masked.insert(data_id, false);
                    carry_over.push(component);
                }
            }

            if let Err(e) = remove_file_safe(&old.fname) {
                log::warn!("could not remove previous mask file {:?}: {e}", old.fname);
            }
        }

        for component in components {
            inner.masked.insert(component.data_id(), false);
            carry_over.push(component.clone());
        }

        // Masked components carry caller-curated data; refinement stays off
        let silo = crate::serializer::compile_components(carry_over.iter(), None);

        let fname = mask_path();

        if let Some(parent) = fname.parent() {
            std::fs::create_dir_all(parent)?;
        }

        silo.save_to_file(&fname)?;

        inner.sections.push(Section {
            key: make_section_key(CacheScope::User, &inner.locale, MASK_KEY),
            scope: CacheScope::User,
            style: FormatStyle::Collection,
            is_os_data: false,
            is_mask: true,
            silo,
            fname,
            refine: None,
        });
        inner.sections.sort_by(|a, b| a.query_order(b));

        Ok(())
    }

    /// All components of all sections, deduplicated by data ID.
    pub fn get_components_all(&self) -> crate::Result<Vec<Component>> {
        let inner = self.read();
        inner.run_query("components/component", &[], inner.resolve_addons)
    }

    /// Components with the given ID, compared case-insensitively.
    ///
    /// Falls back to components *providing* that ID when no component
    /// carries it directly.
    pub fn get_components_by_id(&self, id: &str) -> crate::Result<Vec<Component>> {
        let inner = self.read();

        let direct = inner.run_query(
            "components/component/id[lower-case(text())=?]/..",
            &[&id.to_ascii_lowercase()],
            inner.resolve_addons,
        )?;

        if !direct.is_empty() {
            return Ok(direct);
        }

        inner.run_query(
            "components/component/provides/id[text()=?]/../..",
            &[id],
            inner.resolve_addons,
        )
    }

    /// Components extending the given component ID.
    pub fn get_components_by_extends(&self, id: &str) -> crate::Result<Vec<Component>> {
        let inner = self.read();
        inner.run_query(EXTENDS_QUERY, &[id], inner.resolve_addons)
    }

    /// Components of one type.
    pub fn get_components_by_kind(&self, kind: ComponentKind) -> crate::Result<Vec<Component>> {
        let inner = self.read();
        inner.run_query(
            "components/component[@type=?]",
            &[kind.as_str()],
            inner.resolve_addons,
        )
    }

    /// Components providing an item of the given kind.
    pub fn get_components_by_provided_item(
        &self,
        kind: ProvidedKind,
        item: &str,
    ) -> crate::Result<Vec<Component>> {
        let expr = match kind.type_attr() {
            Some(type_attr) => format!(
                "components/component/provides/{}[text()=?][@type='{type_attr}']/../..",
                kind.element_name(),
            ),
            None => format!(
                "components/component/provides/{}[text()=?]/../..",
                kind.element_name(),
            ),
        };

        let inner = self.read();
        inner.run_query(&expr, &[item], inner.resolve_addons)
    }

    /// Components carrying *all* of the given categories.
    pub fn get_components_by_categories(
        &self,
        categories: &[&str],
    ) -> crate::Result<Vec<Component>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        // AND over N categories: chain back down into the categories
        // block once per further category
        let mut expr = String::from("components/component/categories/category[text()=?]");

        for _ in 1..categories.len() {
            expr.push_str("/../category[text()=?]");
        }

        expr.push_str("/../..");

        let inner = self.read();
        inner.run_query(&expr, categories, inner.resolve_addons)
    }

    /// Components launchable via the given entry point.
    pub fn get_components_by_launchable(
        &self,
        kind: LaunchableKind,
        entry: &str,
    ) -> crate::Result<Vec<Component>> {
        let expr = format!(
            "components/component/launchable[@type='{}'][text()=?]/..",
            kind.as_str(),
        );

        let inner = self.read();
        inner.run_query(&expr, &[entry], inner.resolve_addons)
    }
}

fn check_user_key(user_key: &str, is_os_data: bool) -> crate::Result<()> {
    if user_key.is_empty() {
        return Err(crate::Error::BadValue("empty cache key".into()));
    }

    if !is_os_data && RESERVED_KEYS.contains(&user_key) {
        return Err(crate::Error::BadValue(format!(
            "cache key {user_key:?} is reserved",
        )));
    }

    Ok(())
}

/// Swaps a section in for any prior one with the same key and restores
/// query order.
fn replace_section(inner: &mut CacheInner, section: Section) {
    if let Some(pos) = inner
        .sections
        .iter()
        .position(|s| !s.is_mask && s.key == section.key)
    {
        let old = inner.sections.remove(pos);

        // Same key means same path unless the roots changed in between;
        // never delete the file just written
        if old.fname != section.fname {
            if let Err(e) = remove_file_safe(&old.fname) {
                log::warn!("could not remove stale section file {:?}: {e}", old.fname);
            }
        }
    }

    inner.sections.push(section);
    inner.sections.sort_by(|a, b| a.query_order(b));
}

fn mask_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!(
            "catalog-cache-mask-{}.{}",
            crate::file::random_suffix(),
            crate::file::SILO_EXT,
        ))
}
