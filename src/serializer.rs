// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Converts between [`Component`] values and silo node trees
//!
//! The serialized shape under `components/component` is what every query
//! expression in the crate runs against; search tokens are attached here.
//! Tokens for the unbounded description/keyword set are stored as
//! `_asi_tokens/t` child elements, which sidesteps the per-node token cap
//! of the compiled format.

use crate::component::{
    Component, ComponentKind, ComponentScope, BundleKind, Launchable, LaunchableKind, Provided,
    ProvidedKind, TokenMatch, Url, UrlKind,
};
use crate::refine::{Refine, RefinePhase};
use crate::silo::{BuilderNode, NodeId, Silo};
use std::sync::Arc;

/// Compiles a silo for a list of components.
///
/// Each component is refined (serialize phase) on a private copy first,
/// so callers keep ownership of what they passed in.
pub(crate) fn compile_components<'a>(
    components: impl IntoIterator<Item = &'a Component>,
    refine: Option<&Arc<dyn Refine>>,
) -> Silo {
    let mut root = BuilderNode::new("components");

    for component in components {
        if let Some(refine) = refine {
            let mut copy = component.clone();
            refine.refine(&mut copy, RefinePhase::Serialize);
            root.add_child(component_to_node(&copy));
        } else {
            root.add_child(component_to_node(component));
        }
    }

    Silo::compile(&root)
}

pub(crate) fn component_to_node(c: &Component) -> BuilderNode {
    let mut node = BuilderNode::new("component");

    node.set_attr("type", c.kind.as_str());
    node.set_attr("scope", c.scope.as_str());

    if let Some(branch) = &c.branch {
        node.set_attr("branch", branch.clone());
    }

    if c.bundle_kind != BundleKind::Package {
        node.set_attr("bundle", c.bundle_kind.as_str());
    }

    node.add_child(BuilderNode::with_text("id", &c.id));

    for (i, pkgname) in c.pkgnames.iter().enumerate() {
        let mut child = BuilderNode::with_text("pkgname", pkgname);

        if i == 0 {
            for token in c.tokens_for(TokenMatch::Pkgname) {
                child.add_token(token);
            }
        }

        node.add_child(child);
    }

    if let Some(name) = &c.name {
        let mut child = BuilderNode::with_text("name", name);

        for token in c.tokens_for(TokenMatch::Name) {
            child.add_token(token);
        }

        node.add_child(child);
    }

    if let Some(summary) = &c.summary {
        let mut child = BuilderNode::with_text("summary", summary);

        for token in c.tokens_for(TokenMatch::Summary) {
            child.add_token(token);
        }

        node.add_child(child);
    }

    if let Some(description) = &c.description {
        node.add_child(BuilderNode::with_text("description", description));
    }

    if !c.keywords.is_empty() {
        let mut keywords = BuilderNode::new("keywords");

        for keyword in &c.keywords {
            keywords.add_child(BuilderNode::with_text("keyword", keyword));
        }

        node.add_child(keywords);
    }

    for url in &c.urls {
        let mut child = BuilderNode::with_text("url", &url.url);
        child.set_attr("type", url.kind.as_str());
        node.add_child(child);
    }

    if !c.categories.is_empty() {
        let mut categories = BuilderNode::new("categories");

        for category in &c.categories {
            categories.add_child(BuilderNode::with_text("category", category));
        }

        node.add_child(categories);
    }

    for extends in &c.extends {
        node.add_child(BuilderNode::with_text("extends", extends));
    }

    if !c.provides.is_empty() {
        let mut provides = BuilderNode::new("provides");

        for block in &c.provides {
            for item in &block.items {
                let mut child = BuilderNode::with_text(block.kind.element_name(), item);

                if let Some(type_attr) = block.kind.type_attr() {
                    child.set_attr("type", type_attr);
                }

                provides.add_child(child);
            }
        }

        node.add_child(provides);
    }

    for launchable in &c.launchables {
        for entry in &launchable.entries {
            let mut child = BuilderNode::with_text("launchable", entry);
            child.set_attr("type", launchable.kind.as_str());
            node.add_child(child);
        }
    }

    if let Some(origin) = &c.origin {
        let mut child = BuilderNode::with_text("_asi_origin", origin);

        for token in c.tokens_for(TokenMatch::Origin) {
            child.add_token(token);
        }

        node.add_child(child);
    }

    let description_tokens = c.tokens_for(TokenMatch::Description);

    if !description_tokens.is_empty() {
        let mut tokens = BuilderNode::new("_asi_tokens");

        for token in description_tokens {
            tokens.add_child(BuilderNode::with_text("t", &token));
        }

        node.add_child(tokens);
    }

    node
}

/// Reconstructs a component from an indexed `component` node.
pub(crate) fn node_to_component(silo: &Silo, node: NodeId) -> Component {
    let kind = ComponentKind::parse(silo.attr(node, "type").unwrap_or_default());

    let mut c = Component::new(kind, "");

    c.scope = ComponentScope::parse(silo.attr(node, "scope").unwrap_or_default());
    c.branch = silo.attr(node, "branch").map(Into::into);
    c.bundle_kind = BundleKind::parse(silo.attr(node, "bundle").unwrap_or("package"));

    for child in silo.children(node) {
        let child = *child;
        let text = silo.text(child).unwrap_or_default();

        match silo.name(child) {
            "id" => c.id = text.into(),
            "pkgname" => c.pkgnames.push(text.into()),
            "name" => c.name = Some(text.into()),
            "summary" => c.summary = Some(text.into()),
            "description" => c.description = Some(text.into()),
            "keywords" => {
                for keyword in silo.children(child) {
                    if let Some(text) = silo.text(*keyword) {
                        c.keywords.push(text.into());
                    }
                }
            }
            "url" => c.urls.push(Url {
                kind: UrlKind::parse(silo.attr(child, "type").unwrap_or_default()),
                url: text.into(),
            }),
            "categories" => {
                for category in silo.children(child) {
                    if let Some(text) = silo.text(*category) {
                        c.categories.push(text.into());
                    }
                }
            }
            "extends" => c.extends.push(text.into()),
            "provides" => {
                for item in silo.children(child) {
                    let Some(kind) = ProvidedKind::from_element(
                        silo.name(*item),
                        silo.attr(*item, "type"),
                    ) else {
                        continue;
                    };

                    let Some(text) = silo.text(*item) else {
                        continue;
                    };

                    push_provided(&mut c.provides, kind, text);
                }
            }
            "launchable" => {
                if let Some(kind) =
                    LaunchableKind::parse(silo.attr(child, "type").unwrap_or_default())
                {
                    push_launchable(&mut c.launchables, kind, text);
                }
            }
            "_asi_origin" => c.origin = Some(text.into()),
            // Derived search data, not part of the component
            "_asi_tokens" => {}
            _ => {}
        }
    }

    c
}

fn push_provided(provides: &mut Vec<Provided>, kind: ProvidedKind, item: &str) {
    if let Some(block) = provides.iter_mut().find(|p| p.kind == kind) {
        block.items.push(item.into());
    } else {
        provides.push(Provided {
            kind,
            items: vec![item.into()],
        });
    }
}

fn push_launchable(launchables: &mut Vec<Launchable>, kind: LaunchableKind, entry: &str) {
    if let Some(block) = launchables.iter_mut().find(|l| l.kind == kind) {
        block.entries.push(entry.into());
    } else {
        launchables.push(Launchable {
            kind,
            entries: vec![entry.into()],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn rich_component() -> Component {
        let mut c = Component::new(ComponentKind::DesktopApplication, "org.example.Photos");
        c.origin = Some("flathub".into());
        c.branch = Some("stable".into());
        c.bundle_kind = BundleKind::Flatpak;
        c.pkgnames = vec!["photos".into(), "photos-data".into()];
        c.name = Some("Photos".into());
        c.summary = Some("Edit RAW photos".into());
        c.description = Some("An editor for raw images.".into());
        c.keywords = vec!["graphics".into()];
        c.urls = vec![Url {
            kind: UrlKind::Homepage,
            url: "https://example.org".into(),
        }];
        c.categories = vec!["Graphics".into(), "Photography".into()];
        c.provides = vec![
            Provided {
                kind: ProvidedKind::Mediatype,
                items: vec!["image/x-canon-cr2".into()],
            },
            Provided {
                kind: ProvidedKind::DbusSystem,
                items: vec!["org.example.Photos.Daemon".into()],
            },
        ];
        c.launchables = vec![Launchable {
            kind: LaunchableKind::DesktopId,
            entries: vec!["org.example.Photos.desktop".into()],
        }];
        c
    }

    #[test]
    fn roundtrip() {
        let c = rich_component();

        let silo = compile_components([&c], None);
        let nodes = silo
            .query("components/component", &[])
            .expect("should query");
        assert_eq!(1, nodes.len());

        let back = node_to_component(&silo, nodes[0]);

        assert_eq!(c.id, back.id);
        assert_eq!(c.kind, back.kind);
        assert_eq!(c.origin, back.origin);
        assert_eq!(c.branch, back.branch);
        assert_eq!(c.bundle_kind, back.bundle_kind);
        assert_eq!(c.pkgnames, back.pkgnames);
        assert_eq!(c.name, back.name);
        assert_eq!(c.summary, back.summary);
        assert_eq!(c.description, back.description);
        assert_eq!(c.keywords, back.keywords);
        assert_eq!(c.urls, back.urls);
        assert_eq!(c.categories, back.categories);
        assert_eq!(c.provides, back.provides);
        assert_eq!(c.launchables, back.launchables);
        assert_eq!(c.data_id(), back.data_id());
    }

    #[test]
    fn summary_node_carries_tokens() {
        let c = rich_component();
        let silo = compile_components([&c], None);

        let hits = silo
            .query("components/component/summary[text()~=?]/..", &["photo"])
            .expect("should query");

        assert_eq!(1, hits.len());

        // node tokens are plural-folded, the raw word form is not stored
        let miss = silo
            .query("components/component/summary[text()~=?]/..", &["photos"])
            .expect("should query");
        assert!(miss.is_empty());
    }

    #[test]
    fn description_tokens_are_children() {
        let c = rich_component();
        let silo = compile_components([&c], None);

        let hits = silo
            .query("components/component/_asi_tokens/t[text()=?]/../..", &["editor"])
            .expect("should query");

        assert_eq!(1, hits.len());
    }

    #[test]
    fn dbus_provides_are_typed() {
        let c = rich_component();
        let silo = compile_components([&c], None);

        let hits = silo
            .query(
                "components/component/provides/dbus[text()=?][@type='system']/../..",
                &["org.example.Photos.Daemon"],
            )
            .expect("should query");
        assert_eq!(1, hits.len());

        // no user-bus service declared, and 'user' is not even interned
        let miss = silo.query(
            "components/component/provides/dbus[text()=?][@type='user']/../..",
            &["org.example.Photos.Daemon"],
        );
        assert!(miss.is_err() || miss.is_ok_and(|h| h.is_empty()));
    }

    #[test]
    fn refine_applies_to_copy_only() {
        struct AddKeyword;

        impl Refine for AddKeyword {
            fn refine(&self, component: &mut Component, phase: RefinePhase) {
                if phase == RefinePhase::Serialize {
                    component.keywords.push("refined".into());
                }
            }
        }

        let c = rich_component();
        let refine: Arc<dyn Refine> = Arc::new(AddKeyword);

        let silo = compile_components([&c], Some(&refine));

        let nodes = silo
            .query("components/component", &[])
            .expect("should query");
        let back = node_to_component(&silo, nodes[0]);

        assert!(back.keywords.contains(&"refined".to_string()));
        // the caller's component is untouched
        assert!(!c.keywords.contains(&"refined".to_string()));
    }
}
