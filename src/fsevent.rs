//! Change events.
//!
//! An `FSEvent` is transient: produced by a source, consumed by a target
//! after enrichment. Xattr payloads carry their op (`set` / `unset` /
//! `increment`) per value.

use crate::id::Id;
use crate::statx::StatX;

/// One entry of a partial xattr map: `set`, `unset`, or `increment` a
/// single value.
#[derive(Clone, Debug, PartialEq)]
pub enum XattrOp<'a> {
    /// Set the xattr to this value.
    Set(crate::value::Value<'a>),
    /// Remove the xattr entirely.
    Unset,
    /// Add this (integer) value to the xattr's current value, creating it
    /// at that value if absent.
    Increment(i64),
}

/// A partial xattr map: each entry is independently set/unset/incremented
/// rather than replacing the whole map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XattrPatch<'a> {
    entries: Vec<(String, XattrOp<'a>)>,
}

impl<'a> XattrPatch<'a> {
    /// An empty patch.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// True when there is nothing to apply: callers (notably the target
    /// store's write path) must omit empty `$set`/`$unset`/`$inc`
    /// sub-documents rather than emit them.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one key's operation to the patch.
    pub fn push(&mut self, key: impl Into<String>, op: XattrOp<'a>) {
        self.entries.push((key.into(), op));
    }

    /// Iterate the `(key, op)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &XattrOp<'a>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Where a namespace-scoped xattr patch applies: the `(parent_id, name)`
/// pair identifying one hard link of an inode.
#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceRef {
    /// The containing directory's id.
    pub parent_id: Id,
    /// The link's name within that directory.
    pub name: String,
}

/// A mutation record.
#[derive(Clone, Debug, PartialEq)]
pub enum FSEvent<'a> {
    /// Set inode fields; create the entry if absent.
    Upsert {
        /// The affected inode.
        id: Id,
        /// Stat-like attributes to set, if any.
        statx: Option<StatX>,
        /// Symlink target to set, if any.
        symlink: Option<String>,
        /// Inode xattr patch to apply, if any.
        inode_xattrs: Option<XattrPatch<'a>>,
    },
    /// Add a namespace entry for `(parent_id, name)` pointing at `id`.
    Link {
        /// The target inode.
        id: Id,
        /// The containing directory.
        parent_id: Id,
        /// The link's name.
        name: String,
        /// Namespace xattrs to set on this specific link, if any.
        namespace_xattrs: Option<XattrPatch<'a>>,
    },
    /// Remove the namespace entry for `(parent_id, name)` pointing at
    /// `id`. Emitted paired with a [`FSEvent::Link`] to retract a prior
    /// name for the same inode.
    Unlink {
        /// The target inode.
        id: Id,
        /// The containing directory.
        parent_id: Id,
        /// The link's name.
        name: String,
    },
    /// Remove the entry entirely.
    Delete {
        /// The inode to remove.
        id: Id,
    },
    /// Set/unset inode xattrs, or namespace xattrs when `namespace` is
    /// present.
    Xattr {
        /// The affected inode.
        id: Id,
        /// The patch to apply.
        xattrs: XattrPatch<'a>,
        /// When present, the patch targets this specific namespace link
        /// rather than the inode itself.
        namespace: Option<NamespaceRef>,
    },
}

impl FSEvent<'_> {
    /// The id this event concerns, regardless of kind.
    pub fn id(&self) -> &Id {
        match self {
            FSEvent::Upsert { id, .. }
            | FSEvent::Link { id, .. }
            | FSEvent::Unlink { id, .. }
            | FSEvent::Delete { id }
            | FSEvent::Xattr { id, .. } => id,
        }
    }

    /// A short tag naming the event kind, used in log messages and in the
    /// `type` field of the YAML wire format.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FSEvent::Upsert { .. } => "upsert",
            FSEvent::Link { .. } => "link",
            FSEvent::Unlink { .. } => "unlink",
            FSEvent::Delete { .. } => "delete",
            FSEvent::Xattr { .. } => "xattr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BackendTag;
    use crate::value::Value;

    #[test]
    fn xattr_patch_empty_by_default() {
        let patch: XattrPatch<'_> = XattrPatch::new();
        assert!(patch.is_empty());
    }

    #[test]
    fn xattr_patch_tracks_ops() {
        let mut patch = XattrPatch::new();
        patch.push("user.foo", XattrOp::Set(Value::Int64(1)));
        patch.push("user.bar", XattrOp::Unset);
        assert_eq!(patch.iter().count(), 2);
    }

    #[test]
    fn event_id_accessor_covers_every_kind() {
        let id = Id::new(BackendTag::Posix, vec![1]);
        let events = vec![
            FSEvent::Upsert {
                id: id.clone(),
                statx: None,
                symlink: None,
                inode_xattrs: None,
            },
            FSEvent::Delete { id: id.clone() },
        ];
        for e in events {
            assert_eq!(e.id(), &id);
        }
    }
}
