//! FSEntry → FSEvent conversion: turns a
//! source's entry dump into the event stream a target backend's
//! [`Backend::update`](crate::backend::Backend::update) consumes.
//!
//! Per entry, up to two events are produced, in order: an `UPSERT`
//! carrying whichever of statx / symlink / inode xattrs the projection
//! populated, then a `LINK` for `(parent_id, name)` if both are
//! present. Either step is skipped outright when it would carry no
//! information at all.
//!
//! A synchronizer could instead emit an UPSERT followed by a separate
//! inode-xattr XATTR event, or a namespace XATTR without an
//! accompanying LINK; those forms trade a pipeline step for lower
//! correctness on a `filter` that runs between the two events. This
//! converter always folds xattrs into the UPSERT/LINK that already
//! carries the entry's id instead, the lower-write-amplification form.
//! See `DESIGN.md` for the full reasoning.

use crate::fsentry::{FSEntry, FSEntryMask};
use crate::fsevent::{FSEvent, XattrOp, XattrPatch};
use crate::value::ValueMap;

/// Convert one [`FSEntry`] into its constituent [`FSEvent`]s.
///
/// The returned iterator must be drained before the entry it was built
/// from is dropped.
pub fn convert<'e>(entry: &'e FSEntry<'e>) -> Convert<'e> {
    Convert {
        entry,
        stage: Stage::Upsert,
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Upsert,
    Link,
    Done,
}

/// The small streaming state machine driving [`convert`].
pub struct Convert<'e> {
    entry: &'e FSEntry<'e>,
    stage: Stage,
}

impl<'e> Iterator for Convert<'e> {
    type Item = FSEvent<'e>;

    fn next(&mut self) -> Option<FSEvent<'e>> {
        loop {
            match self.stage {
                Stage::Upsert => {
                    self.stage = Stage::Link;
                    if let Some(event) = self.build_upsert() {
                        return Some(event);
                    }
                }
                Stage::Link => {
                    self.stage = Stage::Done;
                    if let Some(event) = self.build_link() {
                        return Some(event);
                    }
                }
                Stage::Done => return None,
            }
        }
    }
}

impl<'e> Convert<'e> {
    fn build_upsert(&self) -> Option<FSEvent<'e>> {
        let entry = self.entry;
        let statx = entry
            .mask
            .contains(FSEntryMask::STATX)
            .then(|| entry.statx)
            .flatten();
        let symlink = entry
            .mask
            .contains(FSEntryMask::SYMLINK)
            .then(|| entry.symlink.clone())
            .flatten();
        let inode_xattrs = (entry.mask.contains(FSEntryMask::INODE_XATTRS)
            && !entry.inode_xattrs.is_empty())
        .then(|| patch_from_map(&entry.inode_xattrs));

        if statx.is_none() && symlink.is_none() && inode_xattrs.is_none() {
            return None;
        }

        Some(FSEvent::Upsert {
            id: entry.id.clone(),
            statx,
            symlink,
            inode_xattrs,
        })
    }

    fn build_link(&self) -> Option<FSEvent<'e>> {
        let entry = self.entry;
        let parent_id = entry.parent_id.clone()?;
        let name = entry.name.clone()?;
        let namespace_xattrs = (entry.mask.contains(FSEntryMask::NAMESPACE_XATTRS)
            && !entry.namespace_xattrs.is_empty())
        .then(|| patch_from_map(&entry.namespace_xattrs));

        Some(FSEvent::Link {
            id: entry.id.clone(),
            parent_id,
            name,
            namespace_xattrs,
        })
    }
}

fn patch_from_map<'e>(map: &ValueMap<'e>) -> XattrPatch<'e> {
    let mut patch = XattrPatch::new();
    for pair in map.iter() {
        patch.push(pair.key.to_string(), XattrOp::Set(pair.value.clone()));
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{BackendTag, Id};
    use crate::statx::StatX;
    use crate::value::{Value, ValuePair};

    fn id(n: u8) -> Id {
        Id::new(BackendTag::Posix, vec![n])
    }

    #[test]
    fn bare_id_only_entry_produces_nothing() {
        let entry = FSEntry::id_only(id(1));
        assert_eq!(convert(&entry).count(), 0);
    }

    #[test]
    fn upsert_precedes_link_when_both_present() {
        let mut entry = FSEntry::id_only(id(1));
        entry.mask |= FSEntryMask::STATX | FSEntryMask::PARENT_ID | FSEntryMask::NAME;
        entry.statx = Some(StatX::empty());
        entry.parent_id = Some(id(0));
        entry.name = Some("child".to_string());

        let events: Vec<_> = convert(&entry).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FSEvent::Upsert { .. }));
        assert!(matches!(events[1], FSEvent::Link { .. }));
    }

    #[test]
    fn inode_xattrs_ride_along_on_the_upsert_not_a_separate_event() {
        let mut entry = FSEntry::id_only(id(1));
        entry.mask |= FSEntryMask::INODE_XATTRS;
        entry.inode_xattrs = ValueMap::from_pairs(vec![ValuePair {
            key: "user.tag".into(),
            value: Value::String("x".into()),
        }]);

        let events: Vec<_> = convert(&entry).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FSEvent::Upsert { inode_xattrs, .. } => {
                assert!(inode_xattrs.is_some());
            }
            other => panic!("expected Upsert, got {other:?}"),
        }
    }

    #[test]
    fn link_without_parent_or_name_is_skipped() {
        let mut entry = FSEntry::id_only(id(1));
        entry.mask |= FSEntryMask::STATX;
        entry.statx = Some(StatX::empty());
        let events: Vec<_> = convert(&entry).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FSEvent::Upsert { .. }));
    }
}
