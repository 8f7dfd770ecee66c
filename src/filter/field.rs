//! Field references.

use crate::attributes::StatxMask;

/// A reference to one field of an [`FSEntry`](crate::fsentry::FSEntry),
/// used as the left-hand side of a comparison, as a sort key, or as a
/// group-by bucket key.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    /// The entry's id.
    Id,
    /// The entry's parent id.
    ParentId,
    /// The entry's name.
    Name,
    /// The symlink target.
    Symlink,
    /// One bit of the statx mask (exactly one field of `StatX`).
    Statx(StatxMask),
    /// A namespace xattr, or all of them when `key` is `None`.
    NamespaceXattr(Option<String>),
    /// An inode xattr, or all of them when `key` is `None`.
    InodeXattr(Option<String>),
}

impl Field {
    /// A dotted path naming this field the way the mongo plugin does.
    pub fn document_path(&self) -> String {
        match self {
            Field::Id => "_id".to_string(),
            Field::ParentId => "ns.parent".to_string(),
            Field::Name => "ns.name".to_string(),
            Field::Symlink => "symlink".to_string(),
            Field::Statx(mask) => format!("statx.{}", statx_subpath(*mask)),
            Field::NamespaceXattr(Some(key)) => format!("ns.xattrs.{key}"),
            Field::NamespaceXattr(None) => "ns.xattrs".to_string(),
            Field::InodeXattr(Some(key)) => format!("xattrs.{key}"),
            Field::InodeXattr(None) => "xattrs".to_string(),
        }
    }

    /// Whether this field is one that only makes sense once a namespace
    /// (`ns` array element) has been unwound.
    pub fn is_namespace_scoped(&self) -> bool {
        matches!(
            self,
            Field::ParentId | Field::Name | Field::NamespaceXattr(_)
        )
    }
}

fn statx_subpath(mask: StatxMask) -> &'static str {
    match mask {
        StatxMask::TYPE => "type",
        StatxMask::MODE => "mode",
        StatxMask::NLINK => "nlink",
        StatxMask::UID => "uid",
        StatxMask::GID => "gid",
        StatxMask::SIZE => "size",
        StatxMask::BLOCKS => "blocks",
        StatxMask::INO => "ino",
        StatxMask::BLKSIZE => "blksize",
        StatxMask::ATIME => "atime",
        StatxMask::BTIME => "btime",
        StatxMask::CTIME => "ctime",
        StatxMask::MTIME => "mtime",
        StatxMask::ATTRIBUTES => "attributes",
        StatxMask::DEV => "dev",
        StatxMask::RDEV => "rdev",
        StatxMask::MNT_ID => "mnt_id",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statx_field_paths_match_mongo_plugin_naming() {
        assert_eq!(Field::Statx(StatxMask::SIZE).document_path(), "statx.size");
        assert_eq!(
            Field::Statx(StatxMask::ATTRIBUTES).document_path(),
            "statx.attributes"
        );
    }

    #[test]
    fn namespace_scoping() {
        assert!(Field::Name.is_namespace_scoped());
        assert!(!Field::Symlink.is_namespace_scoped());
    }
}
