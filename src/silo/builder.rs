// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::silo::MAX_NODE_TOKENS;

/// Mutable node tree fed to [`crate::silo::Silo::compile`]
///
/// Freely growable; compiling interns all strings and freezes the shape.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BuilderNode {
    name: String,
    text: Option<String>,
    tail: Option<String>,
    attrs: Vec<(String, String)>,
    tokens: Vec<String>,
    children: Vec<BuilderNode>,
}

impl BuilderNode {
    /// An empty element with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Element with text content, the most common shape by far.
    #[must_use]
    pub fn with_text(name: &str, text: &str) -> Self {
        let mut node = Self::new(name);
        node.set_text(text);
        node
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Tail text.
    #[must_use]
    pub fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    /// Attribute pairs in insertion order.
    #[must_use]
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Attached search tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[BuilderNode] {
        &self.children
    }

    /// Sets the text content.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Sets the tail text.
    pub fn set_tail(&mut self, tail: impl Into<String>) {
        self.tail = Some(tail.into());
    }

    /// Sets an attribute, replacing any previous value of the same name.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();

        if let Some(pair) = self.attrs.iter_mut().find(|(n, _)| n == name) {
            pair.1 = value;
        } else {
            self.attrs.push((name.into(), value));
        }
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attaches a search token to this node.
    ///
    /// The compiled format stores at most [`MAX_NODE_TOKENS`] tokens per
    /// node; extra tokens are silently dropped. Unbounded token sets must
    /// go through child elements instead.
    pub fn add_token(&mut self, token: impl Into<String>) {
        if self.tokens.len() < MAX_NODE_TOKENS {
            self.tokens.push(token.into());
        }
    }

    /// Appends a child element.
    pub fn add_child(&mut self, child: BuilderNode) {
        self.children.push(child);
    }
}
