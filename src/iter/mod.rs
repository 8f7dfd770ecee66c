//! Iterator utilities: lazy, chunkable, constifiable streams
//! over the canonical data model, plus the scratch arena every
//! fsentry/fsevent-producing iterator allocates its borrowed fields from.

pub mod array;
pub mod chain;
pub mod chunkify;
pub mod constify;
pub mod destroy;
pub mod one;
pub mod scratch;

pub use array::{array, Array};
pub use chain::{chain, Chain};
pub use chunkify::{chunkify, Chunk, Chunkify};
pub use constify::{constify, Constify};
pub use destroy::Destroy;
pub use one::{one, One};
pub use scratch::ScratchStack;
