//! Built-in extensions the enricher dispatches reserved-token requests
//! to.
//!
//! Neither extension is wired into an [`ExtensionRegistry`] by default —
//! a caller that wants retention or Lustre handling registers them the
//! same way a third-party extension would.

pub mod lustre;
pub mod retention;

pub use lustre::LustreExtension;
pub use retention::RetentionExtension;
