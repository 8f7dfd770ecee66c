//! The stored document shape: one inode record plus its namespace links.
//!
//! A `Document` owns everything it holds (`'static`) since it outlives any
//! one `update()` call's borrowed event stream; values arriving through a
//! borrowed [`FSEvent`](crate::fsevent::FSEvent) are deep-copied in via
//! [`to_owned_value`]/[`to_owned_map`] before being stored.

use std::borrow::Cow;

use crate::container::Container;
use crate::fsentry::{FSEntry, FSEntryMask};
use crate::fsevent::{XattrOp, XattrPatch};
use crate::id::Id;
use crate::statx::StatX;
use crate::value::{RegexValue, Value, ValueMap, ValuePair};

/// One namespace (hard-link) record: the `(parent_id, name)` pair plus the
/// xattrs scoped to that specific link.
#[derive(Clone, Debug, PartialEq)]
pub struct NsEntry {
    /// The containing directory's id.
    pub parent_id: Id,
    /// The link's name within that directory.
    pub name: String,
    /// Xattrs scoped to this link rather than the inode.
    pub xattrs: ValueMap<'static>,
}

/// One stored inode: its attributes, its namespace links, and its
/// inode-scoped xattrs.
#[derive(Clone, Debug)]
pub struct Document {
    /// This document's id, duplicated from the map key for convenience.
    pub id: Id,
    /// Every name this inode is currently linked under. Empty for an
    /// orphaned inode that was upserted but never (or no longer) linked.
    pub ns: Vec<NsEntry>,
    /// Stat-like attributes, absent until the first `UPSERT` carrying any.
    pub statx: Option<StatX>,
    /// Symlink target, if any.
    pub symlink: Option<String>,
    /// Inode-scoped xattrs.
    pub xattrs: ValueMap<'static>,
}

impl Document {
    /// A freshly-upserted document with no attributes, links, or xattrs
    /// yet.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            ns: Vec::new(),
            statx: None,
            symlink: None,
            xattrs: ValueMap::new(),
        }
    }

    /// Project this document into an [`FSEntry`] as the read path would:
    /// unwound against one specific namespace link, or as a bare
    /// inode-only candidate when `ns` is `None`.
    pub fn to_fsentry(&self, ns: Option<&NsEntry>) -> FSEntry<'static> {
        let mut entry = FSEntry::id_only(self.id.clone());
        if let Some(statx) = self.statx {
            entry.statx = Some(statx);
            entry.mask |= FSEntryMask::STATX;
        }
        if let Some(symlink) = &self.symlink {
            entry.symlink = Some(symlink.clone());
            entry.mask |= FSEntryMask::SYMLINK;
        }
        if !self.xattrs.is_empty() {
            entry.inode_xattrs = self.xattrs.clone();
            entry.mask |= FSEntryMask::INODE_XATTRS;
        }
        if let Some(ns) = ns {
            entry.parent_id = Some(ns.parent_id.clone());
            entry.name = Some(ns.name.clone());
            entry.mask |= FSEntryMask::PARENT_ID | FSEntryMask::NAME;
            if !ns.xattrs.is_empty() {
                entry.namespace_xattrs = ns.xattrs.clone();
                entry.mask |= FSEntryMask::NAMESPACE_XATTRS;
            }
        }
        entry
    }
}

/// Deep-copy a borrowed [`Value`] into one that owns its data, so it can
/// outlive the iterator that produced it.
pub fn to_owned_value(value: &Value<'_>) -> Value<'static> {
    match value {
        Value::Bool(v) => Value::Bool(*v),
        Value::Int32(v) => Value::Int32(*v),
        Value::UInt32(v) => Value::UInt32(*v),
        Value::Int64(v) => Value::Int64(*v),
        Value::UInt64(v) => Value::UInt64(*v),
        Value::String(s) => Value::String(Cow::Owned(s.to_string())),
        Value::Binary(bytes) => Value::Binary(Container::from(bytes.to_vec())),
        Value::Regex(regex) => Value::Regex(RegexValue {
            pattern: Container::from(regex.pattern.to_vec()),
            options: regex.options,
        }),
        Value::Sequence(items) => Value::Sequence(items.iter().map(to_owned_value).collect()),
        Value::Map(map) => Value::Map(to_owned_map(map)),
    }
}

/// Deep-copy a borrowed [`ValueMap`] into one that owns its data.
pub fn to_owned_map(map: &ValueMap<'_>) -> ValueMap<'static> {
    map.iter()
        .map(|pair| ValuePair {
            key: Cow::Owned(pair.key.to_string()),
            value: to_owned_value(&pair.value),
        })
        .collect()
}

/// Apply a write-path xattr patch to a stored map: `Set` writes an owned
/// copy of the value, `Unset` removes the key, `Increment` adds to (or
/// creates) the key's integer value.
pub fn apply_xattr_patch(map: &mut ValueMap<'static>, patch: &XattrPatch<'_>) {
    for (key, op) in patch.iter() {
        match op {
            XattrOp::Set(value) => {
                map.insert(key.to_string(), to_owned_value(value));
            }
            XattrOp::Unset => {
                map.remove(key);
            }
            XattrOp::Increment(delta) => {
                let current = match map.get(key) {
                    Some(Value::Int64(v)) => *v,
                    Some(Value::Int32(v)) => i64::from(*v),
                    Some(Value::UInt64(v)) => *v as i64,
                    Some(Value::UInt32(v)) => i64::from(*v),
                    _ => 0,
                };
                map.insert(key.to_string(), Value::Int64(current + delta));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BackendTag;

    fn id(n: u8) -> Id {
        Id::new(BackendTag::Posix, vec![n])
    }

    #[test]
    fn to_fsentry_without_ns_carries_no_namespace_fields() {
        let mut doc = Document::new(id(1));
        doc.statx = Some(StatX::empty());
        let entry = doc.to_fsentry(None);
        assert!(entry.parent_id.is_none());
        assert!(!entry.mask.contains(FSEntryMask::NAME));
        assert!(entry.mask.contains(FSEntryMask::STATX));
    }

    #[test]
    fn to_fsentry_with_ns_carries_parent_and_name() {
        let doc = Document::new(id(1));
        let ns = NsEntry {
            parent_id: id(0),
            name: "child".to_string(),
            xattrs: ValueMap::new(),
        };
        let entry = doc.to_fsentry(Some(&ns));
        assert_eq!(entry.name.as_deref(), Some("child"));
        assert_eq!(entry.parent_id, Some(id(0)));
    }

    #[test]
    fn increment_creates_then_accumulates() {
        let mut map = ValueMap::new();
        let mut patch = XattrPatch::new();
        patch.push("nb_children", XattrOp::Increment(1));
        apply_xattr_patch(&mut map, &patch);
        apply_xattr_patch(&mut map, &patch);
        assert_eq!(map.get("nb_children"), Some(&Value::Int64(2)));
    }

    #[test]
    fn unset_removes_key() {
        let mut map = ValueMap::new();
        map.insert("user.tag", Value::Bool(true));
        let mut patch = XattrPatch::new();
        patch.push("user.tag", XattrOp::Unset);
        apply_xattr_patch(&mut map, &patch);
        assert!(map.get("user.tag").is_none());
    }
}
