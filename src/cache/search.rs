// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::cache::inner::MergeState;
use crate::cache::Cache;
use crate::component::{stem, Component, TokenMatch};
use crate::silo::QueryError;

/// Weighted sub-queries of the full-text search, relative to a component
/// node. The flag says whether the bound term is matched against folded
/// tokens (and must be folded itself) or against verbatim text.
const SEARCH_QUERIES: [(TokenMatch, &str, bool); 7] = [
    (TokenMatch::Mediatype, "provides/mediatype[text()=?]", false),
    (TokenMatch::Pkgname, "pkgname[text()~=?]", true),
    (TokenMatch::Summary, "summary[text()~=?]", true),
    (TokenMatch::Name, "name[text()~=?]", true),
    (TokenMatch::Description, "_asi_tokens/t[text()=?]", true),
    (TokenMatch::Id, "id[lower-case(text())=?]", false),
    (TokenMatch::Origin, "_asi_origin[text()~=?]", true),
];

impl Cache {
    /// Weighted full-text search across all sections.
    ///
    /// Every term must match a component in at least one field; the
    /// component's score is the bitwise OR of all matched field weights
    /// (see [`TokenMatch`]). With `sort`, results come back by
    /// descending score, stable on ties.
    pub fn search(&self, terms: &[&str], sort: bool) -> crate::Result<Vec<Component>> {
        let terms = terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .map(|term| (stem(&term), term))
            .collect::<Vec<_>>();

        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.read();
        let mut state = MergeState::default();

        for section in &inner.sections {
            let all_components = match section.silo.prepare("components/component") {
                Ok(prepared) => prepared,
                Err(QueryError::NotFound | QueryError::InvalidArgument(_)) => continue,
            };

            // Fields a silo does not mention cannot match; skip their queries
            let subqueries = SEARCH_QUERIES
                .iter()
                .filter_map(|(source, expr, folded)| {
                    section
                        .silo
                        .prepare(expr)
                        .ok()
                        .map(|prepared| (source.bits(), prepared, *folded))
                })
                .collect::<Vec<_>>();

            if subqueries.is_empty() {
                continue;
            }

            let nodes = match section.silo.run(&all_components, &[]) {
                Ok(nodes) => nodes,
                Err(QueryError::NotFound | QueryError::InvalidArgument(_)) => continue,
            };

            'nodes: for node in nodes {
                let mut score = 0u16;

                for (folded_term, raw_term) in &terms {
                    let mut term_score = 0u16;

                    for (weight, prepared, folded) in &subqueries {
                        let term = if *folded { folded_term } else { raw_term };

                        let hit = section
                            .silo
                            .run_scoped(node, prepared, &[term.as_str()])
                            .is_ok_and(|hits| !hits.is_empty());

                        if hit {
                            term_score |= weight;
                        }
                    }

                    // All terms must match somewhere
                    if term_score == 0 {
                        continue 'nodes;
                    }

                    score |= term_score;
                }

                inner.collect_node(section, node, Some(score), inner.resolve_addons, &mut state)?;
            }
        }

        let mut results = state.into_components();

        if sort {
            results.sort_by(|a, b| b.sort_score.cmp(&a.sort_score));
        }

        Ok(results)
    }
}
