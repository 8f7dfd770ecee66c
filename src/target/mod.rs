//! The target document store: an in-memory [`Backend`](crate::backend::Backend)
//! implementation and a read-only branch view onto it.
//!
//! A target mirrors a source tree's entries as [`Document`]s, one per
//! inode, each carrying zero or more namespace (hard-link) records. The
//! synchronizer ([`crate::sync`]) and [`crate::gc`] drive a target purely
//! through the `Backend` trait; this module supplies the one reference
//! implementation the CLI driver and the test suite use.

pub mod branch;
pub mod document;
pub mod memory;

pub use branch::BranchTarget;
pub use document::{Document, NsEntry};
pub use memory::MemoryTarget;
