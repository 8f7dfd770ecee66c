//! Filesystem metadata synchronization and query engine.
//!
//! This crate provides the backend-agnostic data model, the
//! predicate/sort/projection/group algebra, and the plugin
//! contract that every source adapter, target store, and
//! enrichment extension is built against. `rbh-tools` (a separate crate
//! in this workspace) wires these pieces into the `rbh-find`/`rbh-sync`/
//! `rbh-gc`/`rbh-info`/`rbh-report` command-line drivers.
//!
//! A typical pipeline reads a source backend's entries
//! ([`source::PosixWalker`] or [`source::parse_event_stream`]), turns
//! each [`fsentry::FSEntry`] into the [`fsevent::FSEvent`]s a target's
//! [`backend::Backend::update`] expects ([`sync::convert`]), optionally
//! resolving deferred enrichment requests along the way
//! ([`enrich::Enricher`]), and persists them into a target backend such
//! as [`target::MemoryTarget`]. [`gc::collect`] later reconciles a
//! target against a live source to reclaim orphaned entries.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod attributes;
pub mod backend;
pub mod container;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod fsentry;
pub mod fsevent;
pub mod gc;
pub mod id;
pub mod iter;
pub mod platform;
pub mod source;
pub mod statx;
pub mod sync;
pub mod target;
pub mod value;

pub use attributes::{Attributes, DeviceId, FileType, StatxMask};
pub use backend::{Backend, BranchRoot, FilterOptions, ReportOptions};
pub use container::Container;
pub use error::{ErrorKind, RbhError, Result};
pub use fsentry::{FSEntry, FSEntryMask};
pub use fsevent::{FSEvent, XattrOp, XattrPatch};
pub use id::{BackendTag, Id};
pub use statx::{StatX, Timestamp};
pub use value::{Value, ValueMap, ValuePair};
