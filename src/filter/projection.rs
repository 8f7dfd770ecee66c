//! Field projection.

use crate::attributes::StatxMask;
use crate::fsentry::FSEntryMask;

/// Which xattr keys of a map to include in a projection.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum XattrKeys {
    /// Include none.
    #[default]
    None,
    /// Include every key present.
    All,
    /// Include only the named keys.
    Named(Vec<String>),
}

impl XattrKeys {
    /// True when this selection includes no keys at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, XattrKeys::None)
            || matches!(self, XattrKeys::Named(keys) if keys.is_empty())
    }
}

/// An inclusive field mask, statx sub-mask, and xattr key sets. An empty [`FSEntryMask`] means "ids only", used by
/// garbage-collection scans ([`crate::gc`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
    /// Top-level fsentry fields to include.
    pub mask: FSEntryMask,
    /// When [`mask`](Self::mask) includes [`FSEntryMask::STATX`], which
    /// statx sub-fields to include.
    pub statx_mask: StatxMask,
    /// Namespace xattr keys to include.
    pub namespace_xattrs: XattrKeys,
    /// Inode xattr keys to include.
    pub inode_xattrs: XattrKeys,
}

impl Projection {
    /// The "ids only" projection used by garbage-collection scans.
    pub fn ids_only() -> Self {
        Self::default()
    }

    /// Every field, fully expanded statx mask, all xattrs.
    pub fn everything() -> Self {
        Self {
            mask: FSEntryMask::all(),
            statx_mask: StatxMask::all(),
            namespace_xattrs: XattrKeys::All,
            inode_xattrs: XattrKeys::All,
        }
    }

    /// Apply this projection to an entry, clearing anything the
    /// projection does not request. Used by the in-memory target's
    /// `filter` implementation and by tests.
    pub fn apply<'a>(&self, entry: &crate::fsentry::FSEntry<'a>) -> crate::fsentry::FSEntry<'a> {
        let mut out = crate::fsentry::FSEntry::id_only(entry.id.clone());
        out.mask = FSEntryMask::ID;
        if self.mask.contains(FSEntryMask::PARENT_ID) {
            out.parent_id = entry.parent_id.clone();
            out.mask |= FSEntryMask::PARENT_ID;
        }
        if self.mask.contains(FSEntryMask::NAME) {
            out.name = entry.name.clone();
            out.mask |= FSEntryMask::NAME;
        }
        if self.mask.contains(FSEntryMask::SYMLINK) {
            out.symlink = entry.symlink.clone();
            out.mask |= FSEntryMask::SYMLINK;
        }
        if self.mask.contains(FSEntryMask::STATX) {
            if let Some(statx) = &entry.statx {
                out.statx = Some(statx.project(self.statx_mask));
                out.mask |= FSEntryMask::STATX;
            }
        }
        if self.mask.contains(FSEntryMask::NAMESPACE_XATTRS) && !self.namespace_xattrs.is_empty() {
            out.namespace_xattrs = select_xattrs(&entry.namespace_xattrs, &self.namespace_xattrs);
            out.mask |= FSEntryMask::NAMESPACE_XATTRS;
        }
        if self.mask.contains(FSEntryMask::INODE_XATTRS) && !self.inode_xattrs.is_empty() {
            out.inode_xattrs = select_xattrs(&entry.inode_xattrs, &self.inode_xattrs);
            out.mask |= FSEntryMask::INODE_XATTRS;
        }
        out
    }
}

fn select_xattrs<'a>(
    map: &crate::value::ValueMap<'a>,
    keys: &XattrKeys,
) -> crate::value::ValueMap<'a> {
    match keys {
        XattrKeys::None => crate::value::ValueMap::new(),
        XattrKeys::All => map.clone(),
        XattrKeys::Named(names) => map
            .iter()
            .filter(|pair| names.iter().any(|n| n == pair.key.as_ref()))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{BackendTag, Id};

    #[test]
    fn ids_only_projection_keeps_nothing_else() {
        let mut entry = crate::fsentry::FSEntry::id_only(Id::new(BackendTag::Posix, vec![1]));
        entry.name = Some("x".to_string());
        let projected = Projection::ids_only().apply(&entry);
        assert_eq!(projected.mask, FSEntryMask::ID);
        assert!(projected.name.is_none());
    }

    #[test]
    fn everything_projection_keeps_name() {
        let mut entry = crate::fsentry::FSEntry::id_only(Id::new(BackendTag::Posix, vec![1]));
        entry.name = Some("x".to_string());
        entry.mask = FSEntryMask::ID | FSEntryMask::NAME;
        let projected = Projection::everything().apply(&entry);
        assert_eq!(projected.name.as_deref(), Some("x"));
    }
}
