//! Filesystem entry snapshots.

use bitflags::bitflags;

use crate::id::Id;
use crate::value::ValueMap;

bitflags! {
    /// Which fields of an [`FSEntry`] are populated. Mirrors the
    /// projection mask a backend was asked to materialize.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
    pub struct FSEntryMask: u32 {
        /// `id` is always present; this bit exists so "ids only" can be
        /// expressed as an all-zero mask elsewhere without ambiguity.
        const ID = 1 << 0;
        /// `parent_id` is present.
        const PARENT_ID = 1 << 1;
        /// `name` is present.
        const NAME = 1 << 2;
        /// `statx` is present.
        const STATX = 1 << 3;
        /// `symlink` target is present.
        const SYMLINK = 1 << 4;
        /// Namespace extended attributes are present.
        const NAMESPACE_XATTRS = 1 << 5;
        /// Inode extended attributes are present.
        const INODE_XATTRS = 1 << 6;
    }
}

/// A snapshot of one filesystem entry: one inode, one name, its xattrs.
///
/// The root of a source tree carries a real `id` but a `parent_id` that
/// is the size-0 sentinel (`Id::root_parent`, see [`crate::id::Id`]): it
/// has an empty name and no namespace link record. Its uniqueness across
/// a run is guaranteed by the walker (rank 0, item 0 only, in the MPI
/// case).
#[derive(Clone, Debug)]
pub struct FSEntry<'a> {
    /// Which fields below are populated.
    pub mask: FSEntryMask,
    /// Content-addressed identifier.
    pub id: Id,
    /// The id of the containing directory, if this entry has a namespace
    /// link.
    pub parent_id: Option<Id>,
    /// The entry's name within `parent_id`, if linked.
    pub name: Option<String>,
    /// Masked stat-like attributes.
    pub statx: Option<crate::statx::StatX>,
    /// Symlink target, if this is a symlink.
    pub symlink: Option<String>,
    /// Namespace (link-scoped) extended attributes.
    pub namespace_xattrs: ValueMap<'a>,
    /// Inode-scoped extended attributes.
    pub inode_xattrs: ValueMap<'a>,
}

impl<'a> FSEntry<'a> {
    /// Build a bare entry carrying only an id (used by ids-only
    /// projections, e.g. garbage-collection scans).
    pub fn id_only(id: Id) -> Self {
        Self {
            mask: FSEntryMask::ID,
            id,
            parent_id: None,
            name: None,
            statx: None,
            symlink: None,
            namespace_xattrs: ValueMap::new(),
            inode_xattrs: ValueMap::new(),
        }
    }

    /// True when this is the root of its source tree: its `parent_id` is
    /// the size-0 sentinel.
    pub fn is_root(&self) -> bool {
        self.parent_id.as_ref().is_some_and(Id::is_root_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BackendTag;

    #[test]
    fn id_only_entry_has_minimal_mask() {
        let e = FSEntry::id_only(Id::new(BackendTag::Posix, vec![1]));
        assert_eq!(e.mask, FSEntryMask::ID);
        assert!(e.name.is_none());
    }

    #[test]
    fn root_detection() {
        let mut root = FSEntry::id_only(Id::new(BackendTag::Posix, vec![0xAA]));
        root.parent_id = Some(Id::root_parent(BackendTag::Posix));
        assert!(root.is_root());
    }
}
