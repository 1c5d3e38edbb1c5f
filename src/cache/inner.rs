// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::component::{Component, DataId, OriginKind};
use crate::paths::CacheLocations;
use crate::refine::RefinePhase;
use crate::section::{FormatStyle, Section};
use crate::silo::{NodeId, QueryError, Silo};
use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) const EXTENDS_QUERY: &str = "components/component/extends[text()=?]/..";

/// Everything the cache's reader-writer lock guards
pub(crate) struct CacheInner {
    /// Sections in query order; queried front to back, later sections
    /// override earlier ones on data-ID collision.
    pub sections: Vec<Section>,

    /// Tombstone set: `true` hides the data ID everywhere, `false` marks
    /// components already accounted for by the masking overlay.
    pub masked: FxHashMap<DataId, bool>,

    pub locale: String,
    pub locations: CacheLocations,
    pub prefer_os_metainfo: bool,
    pub resolve_addons: bool,
}

/// Merge map of one query run, keyed by data ID
///
/// Preserves first-insertion order; replacing an entry keeps its slot,
/// so later sections override content without reshuffling results.
#[derive(Default)]
pub(crate) struct MergeState {
    components: Vec<Component>,
    index: FxHashMap<DataId, usize>,

    /// Component IDs already seen in OS vendor sections, lowercased.
    /// Used to let OS collection data suppress OS metainfo duplicates.
    known_os_ids: FxHashSet<String>,
}

impl MergeState {
    fn insert(&mut self, component: Component) {
        let data_id = component.data_id();

        if let Some(pos) = self.index.get(&data_id) {
            self.components[*pos] = component;
        } else {
            self.index.insert(data_id, self.components.len());
            self.components.push(component);
        }
    }

    pub fn into_components(self) -> Vec<Component> {
        self.components
    }
}

impl CacheInner {
    /// Runs one expression over all sections in order, merging matches.
    ///
    /// Per-section `NotFound` and `InvalidArgument` are absorbed: an
    /// individual silo may lawfully omit paths or strings the expression
    /// names. Anything else aborts the query.
    pub fn run_query(
        &self,
        expr: &str,
        bindings: &[&str],
        resolve_addons: bool,
    ) -> crate::Result<Vec<Component>> {
        let mut state = MergeState::default();

        for section in &self.sections {
            let prepared = match section.silo.prepare(expr) {
                Ok(prepared) => prepared,
                Err(QueryError::NotFound | QueryError::InvalidArgument(_)) => continue,
            };

            let nodes = match section.silo.run(&prepared, bindings) {
                Ok(nodes) => nodes,
                Err(QueryError::NotFound | QueryError::InvalidArgument(_)) => continue,
            };

            for node in nodes {
                self.collect_node(section, node, None, resolve_addons, &mut state)?;
            }
        }

        Ok(state.into_components())
    }

    /// Post-processes one matching node and merges it into the result.
    ///
    /// Applies, in order: OS-metainfo precedence, deserialization with
    /// refinement, tombstones, OS-ID bookkeeping, addon resolution.
    pub fn collect_node(
        &self,
        section: &Section,
        node: NodeId,
        score: Option<u16>,
        resolve_addons: bool,
        state: &mut MergeState,
    ) -> crate::Result<()> {
        let id_lower = component_id_of(&section.silo, node).to_ascii_lowercase();

        // Collection data wins over OS metainfo for the same component ID,
        // unless the caller prefers metainfo
        if section.is_os_data
            && section.style == FormatStyle::Metainfo
            && !self.prefer_os_metainfo
            && state.known_os_ids.contains(&id_lower)
        {
            return Ok(());
        }

        let mut component = crate::serializer::node_to_component(&section.silo, node);

        component.origin_kind = match section.style {
            FormatStyle::Collection => OriginKind::Collection,
            FormatStyle::Metainfo => OriginKind::Metainfo,
        };

        if !section.is_mask {
            if let Some(refine) = &section.refine {
                refine.refine(&mut component, RefinePhase::Deserialize);
            }

            if self.masked.get(&component.data_id()) == Some(&true) {
                return Ok(());
            }
        }

        if section.is_os_data {
            state.known_os_ids.insert(id_lower);
        }

        if resolve_addons && !component.is_addon() {
            // One level only: resolved addons do not resolve their own
            component.addons = self.run_query(EXTENDS_QUERY, &[&component.id], false)?;
        }

        if let Some(score) = score {
            component.sort_score = score;
        }

        state.insert(component);

        Ok(())
    }
}

/// Reads the `id` child of a component node without deserializing.
fn component_id_of(silo: &Silo, node: NodeId) -> String {
    silo.children(node)
        .iter()
        .find(|child| silo.name(**child) == "id")
        .and_then(|child| silo.text(*child))
        .unwrap_or_default()
        .into()
}
