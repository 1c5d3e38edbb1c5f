// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod builder;
pub mod query;
mod reader;
mod writer;

pub use builder::BuilderNode;
pub use query::{PreparedQuery, QueryError};

use crate::coding::{Decode, Encode};
use query::{ParsedQuery, PreparedPred, PreparedStep, StepKind, TextOperand, ValueRef};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use std::sync::Arc;

/// Index into a silo's interned string table
pub type StrId = u32;

/// Index into a silo's node arena
pub type NodeId = u32;

/// Hard cap of the compiled format: tokens directly attached to a node.
///
/// Unbounded token sets are stored as child elements instead.
pub const MAX_NODE_TOKENS: usize = 32;

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) name: StrId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) text: Option<StrId>,
    pub(crate) tail: Option<StrId>,

    /// Attribute pairs, sorted by attribute name bytes.
    pub(crate) attrs: Box<[(StrId, StrId)]>,

    /// Node-attached search tokens, at most [`MAX_NODE_TOKENS`].
    pub(crate) tokens: Box<[StrId]>,

    /// Children in document order.
    pub(crate) children: Vec<NodeId>,
}

/// Compiled, immutable binary index of one cache section
///
/// A silo is a frozen tree of elements with interned strings, attributes
/// and per-node token lists. It is built once from a [`BuilderNode`] tree,
/// persisted as a single checksummed file, and queried with the small
/// path expression language in [`query`].
pub struct Silo {
    pub(crate) strings: Vec<Arc<str>>,
    pub(crate) lookup: FxHashMap<Arc<str>, StrId>,
    pub(crate) nodes: Vec<Node>,
}

impl std::fmt::Debug for Silo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Silo(nodes={}, strings={})",
            self.nodes.len(),
            self.strings.len(),
        )
    }
}

struct Interner {
    strings: Vec<Arc<str>>,
    lookup: FxHashMap<Arc<str>, StrId>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> StrId {
        if let Some(id) = self.lookup.get(s) {
            return *id;
        }

        // NOTE: Node and string counts are bounded by u32 on the wire
        #[allow(clippy::cast_possible_truncation)]
        let id = self.strings.len() as StrId;

        let s: Arc<str> = s.into();
        self.strings.push(s.clone());
        self.lookup.insert(s, id);

        id
    }
}

impl Silo {
    /// Compiles a builder tree into an immutable silo.
    #[must_use]
    pub fn compile(root: &BuilderNode) -> Self {
        let mut interner = Interner {
            strings: Vec::new(),
            lookup: FxHashMap::default(),
        };
        let mut nodes = Vec::new();

        Self::compile_node(root, None, &mut interner, &mut nodes);

        Self {
            strings: interner.strings,
            lookup: interner.lookup,
            nodes,
        }
    }

    fn compile_node(
        builder: &BuilderNode,
        parent: Option<NodeId>,
        interner: &mut Interner,
        nodes: &mut Vec<Node>,
    ) {
        let mut attrs = builder
            .attrs()
            .iter()
            .map(|(n, v)| (interner.intern(n), interner.intern(v)))
            .collect::<Vec<_>>();

        // Sorted attribute table, an invariant of the compiled format
        attrs.sort_by(|a, b| interner.strings[a.0 as usize].cmp(&interner.strings[b.0 as usize]));

        let tokens = builder
            .tokens()
            .iter()
            .take(MAX_NODE_TOKENS)
            .map(|t| interner.intern(t))
            .collect::<Box<[_]>>();

        // NOTE: Node and string counts are bounded by u32 on the wire
        #[allow(clippy::cast_possible_truncation)]
        let id = nodes.len() as NodeId;

        nodes.push(Node {
            name: interner.intern(builder.name()),
            parent,
            text: builder.text().map(|t| interner.intern(t)),
            tail: builder.tail().map(|t| interner.intern(t)),
            attrs: attrs.into_boxed_slice(),
            tokens,
            children: Vec::with_capacity(builder.children().len()),
        });

        if let Some(parent) = parent {
            nodes[parent as usize].children.push(id);
        }

        for child in builder.children() {
            Self::compile_node(child, Some(id), interner, nodes);
        }
    }

    /// The document root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        0
    }

    /// Amount of nodes in the silo, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Element name of a node.
    #[must_use]
    pub fn name(&self, node: NodeId) -> &str {
        &self.strings[self.nodes[node as usize].name as usize]
    }

    /// Text content of a node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node as usize]
            .text
            .map(|id| &*self.strings[id as usize])
    }

    /// Tail text of a node.
    #[must_use]
    pub fn tail(&self, node: NodeId) -> Option<&str> {
        self.nodes[node as usize]
            .tail
            .map(|id| &*self.strings[id as usize])
    }

    /// Attribute value of a node.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        let name = *self.lookup.get(name)?;

        self.nodes[node as usize]
            .attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| &*self.strings[*v as usize])
    }

    /// Children of a node in document order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node as usize].children
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node as usize].parent
    }

    /// Search tokens attached to a node.
    #[must_use]
    pub fn tokens(&self, node: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.nodes[node as usize]
            .tokens
            .iter()
            .map(|id| &*self.strings[*id as usize])
    }

    pub(crate) fn lookup_str(&self, s: &str) -> Option<StrId> {
        self.lookup.get(s).copied()
    }

    /// Saves the silo to a file, atomically.
    pub fn save_to_file(&self, path: &Path) -> crate::Result<()> {
        log::trace!("Writing silo with {} nodes to {path:?}", self.nodes.len());

        let bytes = self.encode_into_vec()?;
        crate::file::rewrite_atomic(path, &bytes)?;

        Ok(())
    }

    /// Loads a silo from a file, verifying version and checksum.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut cursor = std::io::Cursor::new(bytes);
        Ok(Self::decode_from(&mut cursor)?)
    }

    /// Parses and binds an expression against this silo.
    ///
    /// Fails with [`QueryError::NotFound`] if an element name or literal
    /// of the expression is not interned here (no node can match), and
    /// with [`QueryError::InvalidArgument`] on malformed expressions.
    pub fn prepare(&self, expr: &str) -> Result<PreparedQuery, QueryError> {
        let parsed = ParsedQuery::parse(expr)?;
        parsed.bind(self)
    }

    /// Runs a prepared query from the document root.
    pub fn run(
        &self,
        query: &PreparedQuery,
        bindings: &[&str],
    ) -> Result<Vec<NodeId>, QueryError> {
        self.execute(query, bindings, vec![self.root()])
    }

    /// Runs a prepared query relative to a context node; the first step
    /// matches the node's children.
    pub fn run_scoped(
        &self,
        context: NodeId,
        query: &PreparedQuery,
        bindings: &[&str],
    ) -> Result<Vec<NodeId>, QueryError> {
        self.execute(query, bindings, self.children(context).to_vec())
    }

    /// One-shot convenience: prepare, then run from the root.
    pub fn query(&self, expr: &str, bindings: &[&str]) -> Result<Vec<NodeId>, QueryError> {
        let prepared = self.prepare(expr)?;
        self.run(&prepared, bindings)
    }

    fn execute(
        &self,
        query: &PreparedQuery,
        bindings: &[&str],
        first_candidates: Vec<NodeId>,
    ) -> Result<Vec<NodeId>, QueryError> {
        if bindings.len() != query.binding_count() {
            return Err(QueryError::InvalidArgument("wrong number of bound values"));
        }

        let mut current = Vec::new();

        for (i, step) in query.steps().iter().enumerate() {
            let mut next = Vec::new();

            match step.kind {
                StepKind::Name(name) => {
                    let push_matching = |node: NodeId, out: &mut Vec<NodeId>| {
                        if self.nodes[node as usize].name == name
                            && self.preds_hold(node, &step.preds, bindings)
                        {
                            out.push(node);
                        }
                    };

                    if i == 0 {
                        for node in &first_candidates {
                            push_matching(*node, &mut next);
                        }
                    } else {
                        for node in &current {
                            for child in self.children(*node) {
                                push_matching(*child, &mut next);
                            }
                        }
                    }
                }
                StepKind::Parent => {
                    // Distinct children share parents, so dedup here
                    let mut seen = FxHashSet::default();

                    for node in &current {
                        if let Some(parent) = self.parent(*node) {
                            if seen.insert(parent)
                                && self.preds_hold(parent, &step.preds, bindings)
                            {
                                next.push(parent);
                            }
                        }
                    }
                }
            }

            current = next;

            if current.is_empty() {
                return Ok(current);
            }
        }

        Ok(current)
    }

    fn preds_hold(&self, node: NodeId, preds: &[PreparedPred], bindings: &[&str]) -> bool {
        preds.iter().all(|pred| self.pred_holds(node, pred, bindings))
    }

    fn pred_holds(&self, node: NodeId, pred: &PreparedPred, bindings: &[&str]) -> bool {
        let data = &self.nodes[node as usize];

        match pred {
            PreparedPred::TextEq(value) => match self.resolve(value, bindings) {
                Some(id) => data.text == Some(id),
                None => false,
            },
            PreparedPred::TextEqLower(operand) => {
                let Some(text) = data.text else {
                    return false;
                };

                let target = match operand {
                    TextOperand::Literal(s) => s.as_str(),
                    TextOperand::Bound(i) => bindings[*i],
                };

                lower_eq(&self.strings[text as usize], target)
            }
            PreparedPred::TokenMatch(value) => match self.resolve(value, bindings) {
                Some(id) => data.tokens.contains(&id),
                None => false,
            },
            PreparedPred::AttrEq { name, value } => match self.resolve(value, bindings) {
                Some(id) => data.attrs.iter().any(|(n, v)| n == name && *v == id),
                None => false,
            },
        }
    }

    /// Resolves an operand to an interned string ID; a bound value that
    /// was never interned cannot match any node.
    fn resolve(&self, value: &ValueRef, bindings: &[&str]) -> Option<StrId> {
        match value {
            ValueRef::Interned(id) => Some(*id),
            ValueRef::Bound(i) => self.lookup_str(bindings[*i]),
        }
    }

    pub(crate) fn bind_step(&self, step: &query::Step) -> Result<PreparedStep, QueryError> {
        let kind = match &step.kind {
            query::RawStepKind::Name(name) => {
                StepKind::Name(self.lookup_str(name).ok_or(QueryError::NotFound)?)
            }
            query::RawStepKind::Parent => StepKind::Parent,
        };

        let preds = step
            .preds
            .iter()
            .map(|pred| self.bind_pred(pred))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PreparedStep { kind, preds })
    }

    fn bind_pred(&self, pred: &query::Pred) -> Result<PreparedPred, QueryError> {
        use query::{Operand, Pred};

        let bind_value = |operand: &Operand| -> Result<ValueRef, QueryError> {
            match operand {
                Operand::Literal(s) => self
                    .lookup_str(s)
                    .map(ValueRef::Interned)
                    .ok_or(QueryError::NotFound),
                Operand::Bound(i) => Ok(ValueRef::Bound(*i)),
            }
        };

        Ok(match pred {
            Pred::TextEq(op) => PreparedPred::TextEq(bind_value(op)?),
            Pred::TextEqLower(op) => PreparedPred::TextEqLower(match op {
                Operand::Literal(s) => TextOperand::Literal(s.clone()),
                Operand::Bound(i) => TextOperand::Bound(*i),
            }),
            Pred::TokenMatch(op) => PreparedPred::TokenMatch(bind_value(op)?),
            Pred::AttrEq { name, value } => PreparedPred::AttrEq {
                name: self.lookup_str(name).ok_or(QueryError::NotFound)?,
                value: bind_value(value)?,
            },
        })
    }
}

/// `lowercase(text) == target`, without allocating.
fn lower_eq(text: &str, target: &str) -> bool {
    text.len() == target.len()
        && text
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .eq(target.bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample() -> Silo {
        let mut root = BuilderNode::new("components");

        let mut c1 = BuilderNode::new("component");
        c1.set_attr("type", "desktop-application");
        c1.add_child(BuilderNode::with_text("id", "org.example.Photos"));
        let mut summary = BuilderNode::with_text("summary", "Edit photos");
        summary.add_token("edit");
        summary.add_token("photos");
        c1.add_child(summary);
        root.add_child(c1);

        let mut c2 = BuilderNode::new("component");
        c2.set_attr("type", "generic");
        c2.add_child(BuilderNode::with_text("id", "org.example.Music"));
        root.add_child(c2);

        Silo::compile(&root)
    }

    #[test]
    fn compile_shape() {
        let silo = sample();

        assert_eq!("components", silo.name(silo.root()));
        assert_eq!(2, silo.children(silo.root()).len());

        let c1 = silo.children(silo.root())[0];
        assert_eq!(Some("desktop-application"), silo.attr(c1, "type"));
        assert_eq!(None, silo.attr(c1, "nope"));
    }

    #[test]
    fn query_all() -> crate::Result<()> {
        let silo = sample();
        let hits = silo.query("components/component", &[])?;
        assert_eq!(2, hits.len());
        Ok(())
    }

    #[test]
    fn query_by_text_binding() -> crate::Result<()> {
        let silo = sample();

        let hits = silo.query(
            "components/component/id[text()=?]/..",
            &["org.example.Music"],
        )?;

        assert_eq!(1, hits.len());
        assert_eq!(Some("generic"), silo.attr(hits[0], "type"));

        Ok(())
    }

    #[test]
    fn query_lowercase_text() -> crate::Result<()> {
        let silo = sample();

        let hits = silo.query(
            "components/component/id[lower-case(text())=?]/..",
            &["org.example.photos"],
        )?;
        assert_eq!(1, hits.len());

        // strict: target must already be lowercase
        let miss = silo.query(
            "components/component/id[lower-case(text())=?]/..",
            &["org.example.Photos"],
        )?;
        assert!(miss.is_empty());

        Ok(())
    }

    #[test]
    fn query_token_match() -> crate::Result<()> {
        let silo = sample();

        let hits = silo.query("components/component/summary[text()~=?]/..", &["photos"])?;
        assert_eq!(1, hits.len());

        let miss = silo.query("components/component/summary[text()~=?]/..", &["music"])?;
        assert!(miss.is_empty());

        Ok(())
    }

    #[test]
    fn query_attr_literal_and_bound() -> crate::Result<()> {
        let silo = sample();

        let hits = silo.query("components/component[@type='generic']", &[])?;
        assert_eq!(1, hits.len());

        let hits = silo.query("components/component[@type=?]", &["desktop-application"])?;
        assert_eq!(1, hits.len());

        Ok(())
    }

    #[test]
    fn query_unknown_element_is_not_found() {
        let silo = sample();

        assert_eq!(
            Err(QueryError::NotFound),
            silo.query("components/bogus", &[]),
        );
    }

    #[test]
    fn query_unknown_binding_is_empty() -> crate::Result<()> {
        let silo = sample();

        let hits = silo.query("components/component/id[text()=?]/..", &["nope"])?;
        assert!(hits.is_empty());

        Ok(())
    }

    #[test]
    fn query_binding_count_checked() {
        let silo = sample();

        assert!(matches!(
            silo.query("components/component/id[text()=?]/..", &[]),
            Err(QueryError::InvalidArgument(_)),
        ));
    }

    #[test]
    fn scoped_query() -> crate::Result<()> {
        let silo = sample();

        let component = silo.query("components/component", &[])?[0];
        let prepared = silo.prepare("summary[text()~=?]")?;

        assert_eq!(1, silo.run_scoped(component, &prepared, &["edit"])?.len());
        assert!(silo.run_scoped(component, &prepared, &["nope"])?.is_empty());

        Ok(())
    }
}
