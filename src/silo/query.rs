// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The silo query expression language
//!
//! Kept deliberately small: path steps with element names, parent
//! navigation via `..`, and four predicate forms:
//!
//! - `[text()=?]`: text equality
//! - `[lower-case(text())=?]`: lowercased text equality
//! - `[text()~=?]`: membership in the node's token list
//! - `[@attr=?]` / `[@attr='literal']`: attribute equality
//!
//! `?` placeholders are positional and resolved by the bound values
//! passed at run time.
//!
//! Parsing is silo-independent; binding resolves element names and
//! literals against one silo's string table, which is also where
//! [`QueryError::NotFound`] originates: a name the silo never interned
//! cannot match any node.

use crate::silo::{Silo, StrId};

/// Error when parsing, binding or running a query
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryError {
    /// An element name or literal of the expression does not occur in
    /// the queried silo
    NotFound,

    /// The expression is malformed, or the bound values do not match
    /// its placeholders
    InvalidArgument(&'static str),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "QueryError: element not found in silo"),
            Self::InvalidArgument(msg) => write!(f, "QueryError: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

#[derive(Clone, Debug)]
pub(crate) enum Operand {
    Literal(String),
    Bound(usize),
}

#[derive(Clone, Debug)]
pub(crate) enum Pred {
    TextEq(Operand),
    TextEqLower(Operand),
    TokenMatch(Operand),
    AttrEq { name: String, value: Operand },
}

#[derive(Clone, Debug)]
pub(crate) enum RawStepKind {
    Name(String),
    Parent,
}

#[derive(Clone, Debug)]
pub(crate) struct Step {
    pub(crate) kind: RawStepKind,
    pub(crate) preds: Vec<Pred>,
}

/// A parsed but not yet silo-bound expression
#[derive(Clone, Debug)]
pub(crate) struct ParsedQuery {
    steps: Vec<Step>,
    binding_count: usize,
}

impl ParsedQuery {
    pub(crate) fn parse(expr: &str) -> Result<Self, QueryError> {
        let mut steps = Vec::new();
        let mut binding_count = 0;

        for segment in split_steps(expr)? {
            steps.push(parse_step(segment, &mut binding_count)?);
        }

        if steps.is_empty() {
            return Err(QueryError::InvalidArgument("empty expression"));
        }

        if matches!(steps.first().map(|s| &s.kind), Some(RawStepKind::Parent)) {
            return Err(QueryError::InvalidArgument("expression starts with .."));
        }

        Ok(Self {
            steps,
            binding_count,
        })
    }

    /// Resolves names and literals against a silo's string table.
    pub(crate) fn bind(&self, silo: &Silo) -> Result<PreparedQuery, QueryError> {
        let steps = self
            .steps
            .iter()
            .map(|step| silo.bind_step(step))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PreparedQuery {
            steps,
            binding_count: self.binding_count,
        })
    }
}

/// An expression bound to one silo, ready to run
#[derive(Clone, Debug)]
pub struct PreparedQuery {
    pub(crate) steps: Vec<PreparedStep>,
    pub(crate) binding_count: usize,
}

impl PreparedQuery {
    pub(crate) fn steps(&self) -> &[PreparedStep] {
        &self.steps
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.binding_count
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PreparedStep {
    pub(crate) kind: StepKind,
    pub(crate) preds: Vec<PreparedPred>,
}

#[derive(Clone, Debug)]
pub(crate) enum StepKind {
    Name(StrId),
    Parent,
}

#[derive(Clone, Debug)]
pub(crate) enum ValueRef {
    Interned(StrId),
    Bound(usize),
}

#[derive(Clone, Debug)]
pub(crate) enum TextOperand {
    Literal(String),
    Bound(usize),
}

#[derive(Clone, Debug)]
pub(crate) enum PreparedPred {
    TextEq(ValueRef),
    TextEqLower(TextOperand),
    TokenMatch(ValueRef),
    AttrEq { name: StrId, value: ValueRef },
}

/// Splits on `/` outside predicate brackets.
fn split_steps(expr: &str) -> Result<Vec<&str>, QueryError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in expr.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(QueryError::InvalidArgument("unbalanced ]"))?;
            }
            '/' if depth == 0 => {
                segments.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(QueryError::InvalidArgument("unbalanced ["));
    }

    segments.push(&expr[start..]);

    if segments.iter().any(|s| s.is_empty()) {
        return Err(QueryError::InvalidArgument("empty path step"));
    }

    Ok(segments)
}

fn parse_step(segment: &str, binding_count: &mut usize) -> Result<Step, QueryError> {
    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = &segment[..name_end];
    let mut rest = &segment[name_end..];

    let kind = if name == ".." {
        RawStepKind::Parent
    } else {
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(QueryError::InvalidArgument("invalid element name"));
        }

        RawStepKind::Name(name.into())
    };

    let mut preds = Vec::new();

    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(QueryError::InvalidArgument("garbage after predicate"));
        }

        let end = rest
            .find(']')
            .ok_or(QueryError::InvalidArgument("unbalanced ["))?;

        preds.push(parse_pred(&rest[1..end], binding_count)?);
        rest = &rest[end + 1..];
    }

    Ok(Step { kind, preds })
}

fn parse_pred(pred: &str, binding_count: &mut usize) -> Result<Pred, QueryError> {
    if let Some(rest) = pred.strip_prefix('@') {
        let eq = rest
            .find('=')
            .ok_or(QueryError::InvalidArgument("attribute predicate without ="))?;

        let name = &rest[..eq];

        if name.is_empty() {
            return Err(QueryError::InvalidArgument("empty attribute name"));
        }

        return Ok(Pred::AttrEq {
            name: name.into(),
            value: parse_operand(&rest[eq + 1..], binding_count)?,
        });
    }

    if let Some(rest) = pred.strip_prefix("lower-case(text())=") {
        return Ok(Pred::TextEqLower(parse_operand(rest, binding_count)?));
    }

    if let Some(rest) = pred.strip_prefix("text()~=") {
        return Ok(Pred::TokenMatch(parse_operand(rest, binding_count)?));
    }

    if let Some(rest) = pred.strip_prefix("text()=") {
        return Ok(Pred::TextEq(parse_operand(rest, binding_count)?));
    }

    Err(QueryError::InvalidArgument("unknown predicate form"))
}

fn parse_operand(operand: &str, binding_count: &mut usize) -> Result<Operand, QueryError> {
    if operand == "?" {
        let idx = *binding_count;
        *binding_count += 1;
        return Ok(Operand::Bound(idx));
    }

    if operand.len() >= 2 && operand.starts_with('\'') && operand.ends_with('\'') {
        return Ok(Operand::Literal(operand[1..operand.len() - 1].into()));
    }

    Err(QueryError::InvalidArgument("operand must be ? or 'literal'"))
}
