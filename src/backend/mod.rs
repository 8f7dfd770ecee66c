//! The uniform backend abstraction and plugin/extension loader.
//!
//! A [`Backend`] is a polymorphic handle onto either a source (walked
//! tree, event stream) or a target (document store). Every operation is
//! optional at the type level: advertise support through
//! [`PluginInfo::capabilities`], but [`Backend`] itself declares the
//! full surface with a default "not implemented" body on each method
//! so no implementor has to provide all of them.

pub mod extension;
pub mod memory_rc;
pub mod plugin;
pub mod registry;

pub use extension::{Extension, ExtensionRegistry};
pub use memory_rc::SharedRuntime;
pub use plugin::{Capability, ExtensionKey, PluginInfo, Version, VersionRange};
pub use registry::{PluginRegistry, RegistryError};

use crate::error::Result;
use crate::filter::{Filter, GroupBy, GroupRow, Projection, Sort};
use crate::fsentry::FSEntry;
use crate::fsevent::FSEvent;
use crate::id::Id;
use crate::value::ValueMap;

/// Options accepted by [`Backend::filter`].
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    /// Number of matching entries to skip before the first yielded item.
    pub skip: u64,
    /// Maximum number of entries to yield, if bounded.
    pub limit: Option<u64>,
    /// Sort order to apply before skip/limit.
    pub sort: Sort,
    /// Continue past a per-entry error instead of aborting the whole
    /// query.
    pub skip_on_error: bool,
    /// Emit progress/diagnostic logging while iterating.
    pub verbose: bool,
    /// Hint that the caller will fully drain the iterator exactly once
    /// and the backend need not keep state for re-iteration.
    pub one_shot: bool,
}

/// Which `get_info` fields a backend may report.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct InfoFlags(u32);

impl InfoFlags {
    /// The backend's human-readable name.
    pub const BACKEND_NAME: InfoFlags = InfoFlags(1 << 0);
    /// The id of the backend's root entry.
    pub const ROOT_ID: InfoFlags = InfoFlags(1 << 1);
    /// Total number of entries currently stored.
    pub const ENTRY_COUNT: InfoFlags = InfoFlags(1 << 2);
    /// Free space available to the backend's storage, if meaningful.
    pub const AVAILABLE_SIZE: InfoFlags = InfoFlags(1 << 3);

    /// No flags.
    pub const NONE: InfoFlags = InfoFlags(0);

    /// Whether `self` includes every bit of `other`.
    pub const fn contains(self, other: InfoFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for InfoFlags {
    type Output = InfoFlags;
    fn bitor(self, rhs: InfoFlags) -> InfoFlags {
        InfoFlags(self.0 | rhs.0)
    }
}

/// Options accepted by [`Backend::report`].
#[derive(Clone, Debug, Default)]
pub struct ReportOptions {
    /// Continue past a per-entry error instead of aborting.
    pub skip_on_error: bool,
}

/// Either an id or a filesystem path, the two ways a caller may name a
/// branch root.
#[derive(Clone, Debug)]
pub enum BranchRoot {
    /// Branch at the entry with this id.
    Id(Id),
    /// Branch at the entry reachable by this path from the current root.
    Path(std::path::PathBuf),
}

/// The polymorphic backend handle.
///
/// Every method returns [`crate::error::ErrorKind::Unsupported`] by
/// default; implementors override only the operations their
/// [`PluginInfo::capabilities`] advertise.
pub trait Backend {
    /// This backend's plugin identity.
    fn plugin_info(&self) -> &PluginInfo;

    /// A lazy, filtered, sorted, projected sequence of entries. Failure
    /// is deferred and surfaced from the returned iterator's `next()`
    /// rather than from this call.
    fn filter<'s>(
        &'s self,
        filter: &Filter<'_>,
        options: &FilterOptions,
        projection: &Projection,
    ) -> Result<Box<dyn Iterator<Item = Result<FSEntry<'s>>> + 's>> {
        let _ = (filter, options, projection);
        Err(unsupported("filter"))
    }

    /// Apply a stream of events atomically, one at a time; `UPSERT` is
    /// idempotent on identical input. A `None` item signals flush/commit
    /// rather than
    /// ending the stream — the backend must keep consuming afterward.
    /// Returns the number of events actually applied.
    fn update(&mut self, events: &mut dyn Iterator<Item = Option<FSEvent<'_>>>) -> Result<u64> {
        let _ = events;
        Err(unsupported("update"))
    }

    /// Yield a new backend handle rooted at `root`.
    fn branch(&self, root: BranchRoot) -> Result<Box<dyn Backend>> {
        let _ = root;
        Err(unsupported("branch"))
    }

    /// The entry whose `parent_id` is the size-0 sentinel.
    fn root(&self, projection: &Projection) -> Result<FSEntry<'_>> {
        let _ = projection;
        Err(unsupported("root"))
    }

    /// Introspection: report whichever of `flags` this backend supports,
    /// keyed by a descriptive name (`"backend_name"`, `"root_id"`, ...).
    fn get_info(&self, flags: InfoFlags) -> Result<ValueMap<'static>> {
        let _ = flags;
        Err(unsupported("get_info"))
    }

    /// Aggregate matching entries by `grouping`, yielding one row per
    /// bucket.
    fn report<'s>(
        &'s self,
        filter: &Filter<'_>,
        grouping: &GroupBy,
        options: &ReportOptions,
    ) -> Result<Box<dyn Iterator<Item = Result<GroupRow<'s>>> + 's>> {
        let _ = (filter, grouping, options);
        Err(unsupported("report"))
    }

    /// Record provenance information about a source this backend mirrors
    /// (e.g. the source's backend name and a branch path).
    fn insert_source(&mut self, source: &ValueMap<'_>) -> Result<()> {
        let _ = source;
        Err(unsupported("insert_source"))
    }

    /// Release all held resources. Must be safe to call on a backend
    /// left in a partially-constructed state by a failed constructor.
    fn destroy(&mut self) {}
}

fn unsupported(op: &'static str) -> crate::error::RbhError {
    crate::error::RbhError::new(crate::error::ErrorKind::Unsupported, op.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(PluginInfo);

    impl Backend for Bare {
        fn plugin_info(&self) -> &PluginInfo {
            &self.0
        }
    }

    #[test]
    fn default_methods_report_unsupported() {
        let backend = Bare(PluginInfo {
            name: "bare".to_string(),
            version: Version::new(1, 0, 0),
            capabilities: Capability::NONE,
            info_mask: 0,
        });
        let err = backend.get_info(InfoFlags::NONE).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unsupported);
    }

    #[test]
    fn info_flags_union_and_contains() {
        let flags = InfoFlags::BACKEND_NAME | InfoFlags::ENTRY_COUNT;
        assert!(flags.contains(InfoFlags::BACKEND_NAME));
        assert!(!flags.contains(InfoFlags::ROOT_ID));
    }
}
