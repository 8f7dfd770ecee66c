//! Source adapters: producers of [`FSEvent`](crate::fsevent::FSEvent)
//! streams from a live or recorded filesystem.

#[cfg(feature = "serializable")]
pub mod eventstream;
pub mod mpi;
pub mod posix;

#[cfg(feature = "serializable")]
pub use eventstream::{parse_event_stream, EventStreamError};
pub use mpi::{PartitionedWalk, PartitionPlan};
pub use posix::PosixWalker;
