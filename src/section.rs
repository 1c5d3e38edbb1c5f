// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::refine::Refine;
use crate::silo::Silo;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

/// Which cache root a section's file lives under
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CacheScope {
    /// Shared cache, typically read-only for unprivileged callers
    System,

    /// Per-user cache, always writable
    User,
}

impl CacheScope {
    /// Canonical scope string, used in section keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// Which flavor of metadata a section was built from
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FormatStyle {
    /// Distributor-aggregated catalog data, authoritative
    Collection,

    /// Upstream per-component metainfo, fill-in only
    Metainfo,
}

/// One logical group of components, backed by one silo and one file
pub(crate) struct Section {
    /// Internal composite key `<scope>:<locale>-<user_key>`, unique among
    /// non-mask sections.
    pub key: String,

    pub scope: CacheScope,
    pub style: FormatStyle,

    /// Marks operating-system vendor data; only meaningful for
    /// system-scope sections.
    pub is_os_data: bool,

    /// Marks the volatile masking overlay, always queried last.
    pub is_mask: bool,

    pub silo: Silo,

    /// Persisted silo path; for the mask a runtime temp path.
    pub fname: PathBuf,

    pub refine: Option<Arc<dyn Refine>>,
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Section({}, {:?}/{:?}{}{})",
            self.key,
            self.style,
            self.scope,
            if self.is_os_data { ", os" } else { "" },
            if self.is_mask { ", mask" } else { "" },
        )
    }
}

impl Section {
    /// Amount of components indexed in this section.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.silo.children(self.silo.root()).len()
    }

    /// Query-time ordering: sections earlier in the order are considered
    /// first, later sections override on data-ID collision. Ascending:
    /// non-mask before mask, Collection before Metainfo, System before
    /// User, then case-insensitive key.
    pub fn query_order(&self, other: &Self) -> Ordering {
        (self.is_mask)
            .cmp(&other.is_mask)
            .then_with(|| {
                (self.style == FormatStyle::Metainfo).cmp(&(other.style == FormatStyle::Metainfo))
            })
            .then_with(|| (self.scope == CacheScope::User).cmp(&(other.scope == CacheScope::User)))
            .then_with(|| {
                let a = self.key.bytes().map(|b| b.to_ascii_lowercase());
                let b = other.key.bytes().map(|b| b.to_ascii_lowercase());
                a.cmp(b)
            })
    }
}

/// Internal section key for a (scope, locale, user key) tuple.
#[must_use]
pub(crate) fn make_section_key(scope: CacheScope, locale: &str, user_key: &str) -> String {
    format!("{}:{locale}-{user_key}", scope.as_str())
}
