// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::component::{BundleKind, ComponentScope};

/// Composite identifier of one concrete copy of a component.
///
/// Two sections may carry the same component `id` (e.g. a distro package
/// and a Flatpak of the same application); their data IDs differ, so both
/// survive query deduplication. Unset origin/branch are stored as `*`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DataId {
    /// Component scope
    pub scope: ComponentScope,
    /// How this copy is shipped
    pub bundle: BundleKind,
    /// Metadata origin, `*` if unset
    pub origin: String,
    /// Component ID
    pub id: String,
    /// Branch, `*` if unset
    pub branch: String,
}

impl DataId {
    /// Assembles a data ID, substituting `*` for unset parts.
    #[must_use]
    pub fn new(
        scope: ComponentScope,
        bundle: BundleKind,
        origin: Option<&str>,
        id: &str,
        branch: Option<&str>,
    ) -> Self {
        Self {
            scope,
            bundle,
            origin: origin.filter(|s| !s.is_empty()).unwrap_or("*").into(),
            id: id.into(),
            branch: branch.filter(|s| !s.is_empty()).unwrap_or("*").into(),
        }
    }
}

impl std::fmt::Display for DataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.scope.as_str(),
            self.bundle.as_str(),
            self.origin,
            self.id,
            self.branch,
        )
    }
}

impl std::str::FromStr for DataId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('/').collect::<Vec<_>>();

        let [scope, bundle, origin, id, branch] = parts.as_slice() else {
            return Err(());
        };

        Ok(Self {
            scope: ComponentScope::parse(scope),
            bundle: BundleKind::parse(bundle),
            origin: (*origin).into(),
            id: (*id).into(),
            branch: (*branch).into(),
        })
    }
}
