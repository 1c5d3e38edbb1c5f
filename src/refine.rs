// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::component::Component;

/// Whether a component is on its way into or out of a silo
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RefinePhase {
    /// The component is about to be indexed
    Serialize,

    /// The component was just reconstructed from a silo
    Deserialize,
}

/// Caller-supplied per-component transformation
///
/// Invoked for every component that passes through a section's
/// serializer: once before indexing and once after reconstruction, so
/// callers can attach derived or runtime-only data. Stored per section.
///
/// Invoked while the cache holds its internal lock; implementations must
/// not call back into the cache.
pub trait Refine: Send + Sync {
    /// Transforms one component in place.
    fn refine(&self, component: &mut Component, phase: RefinePhase);
}
