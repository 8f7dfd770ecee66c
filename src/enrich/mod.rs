//! The enricher pipeline: resolves partial fsevents' reserved
//! `rbh-fsevents` enrichment requests against a live filesystem.

pub mod extensions;
pub mod request;

pub use extensions::{LustreExtension, RetentionExtension};
pub use request::{EnrichRequest, Enricher};
