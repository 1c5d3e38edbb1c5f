// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A thread-safe, on-disk, section-partitioned metadata cache for
//! software catalogs.
//!
//! ##### About
//!
//! This crate exports a [`Cache`] that stores parsed software component
//! records in per-section compiled binary indices ("silos") and answers
//! structured queries (by ID, category, provided item, launchable,
//! extension relation, kind) and weighted full-text searches without
//! ever reloading the original metadata.
//!
//! Sections group components by origin, scope and format style. They are
//! replaced wholesale, persisted atomically, and queried in a fixed
//! order that makes distributor catalog data authoritative, lets
//! upstream metainfo fill gaps, and gives the volatile masking overlay
//! the final word.
//!
//! The cache does not spawn threads but is built to be called from many:
//! one reader-writer lock guards all sections, so concurrent queries
//! never observe a half-rebuilt section.
//!
//! # Example usage
//!
//! ```
//! use catalog_cache::{Cache, CacheScope, Component, ComponentKind, Config, FormatStyle};
//! #
//! # let dir = tempfile::tempdir()?;
//!
//! let cache = Config::new()
//!     .locale("en")
//!     .locations(dir.path().join("system"), dir.path().join("user"))
//!     .open();
//!
//! let mut photos = Component::new(ComponentKind::DesktopApplication, "org.example.Photos");
//! photos.summary = Some("Edit photos".into());
//!
//! cache.set_contents(
//!     CacheScope::System,
//!     FormatStyle::Collection,
//!     false,
//!     &[photos],
//!     "example-repo",
//!     None,
//! )?;
//!
//! // Full-text search with weighted scoring
//! let hits = cache.search(&["photo"], true)?;
//! assert_eq!(1, hits.len());
//!
//! // Structured lookup, case-insensitive
//! let hits = cache.get_components_by_id("org.example.photos")?;
//! assert_eq!(1, hits.len());
//! #
//! # Ok::<(), catalog_cache::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod cache;

#[doc(hidden)]
pub mod coding;

mod component;
mod error;

#[doc(hidden)]
pub mod file;

mod format_version;
mod paths;
mod refine;
mod section;
mod serializer;

#[doc(hidden)]
pub mod silo;

pub use {
    cache::{Cache, Config},
    coding::{DecodeError, EncodeError},
    component::{
        BundleKind, Component, ComponentKind, ComponentScope, DataId, Launchable, LaunchableKind,
        OriginKind, Provided, ProvidedKind, TokenMatch, Url, UrlKind,
    },
    error::{Error, Result},
    format_version::FormatVersion,
    refine::{Refine, RefinePhase},
    section::{CacheScope, FormatStyle},
    silo::{BuilderNode, QueryError, Silo},
};
