//! An in-memory target store: the reference `Backend` implementation
//! used by the CLI driver and by tests, backing every document behind a
//! single map any number of [`BranchTarget`](super::branch::BranchTarget)
//! views can share.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{
    registry::builtin_info, Backend, BranchRoot, Capability, FilterOptions, InfoFlags,
    PluginInfo, ReportOptions,
};
use crate::error::{ErrorKind, RbhError, Result};
use crate::filter::{eval, group, Aggregate, Field, Filter, GroupBy, GroupRow, Projection, RangeField};
use crate::fsentry::FSEntry;
use crate::fsevent::{FSEvent, NamespaceRef};
use crate::id::Id;
use crate::value::{Value, ValueMap};

use super::document::{apply_xattr_patch, to_owned_value, Document};
use super::branch::BranchTarget;

/// A document store held entirely in memory, behind a single shared map.
#[derive(Debug)]
pub struct MemoryTarget {
    root_id: Id,
    documents: Arc<RwLock<HashMap<Id, Document>>>,
    info: PluginInfo,
}

impl MemoryTarget {
    /// A fresh, empty store. `root_id` is this store's own identity (not
    /// any synced entry's id); it is reported through
    /// [`Backend::get_info`]'s `ROOT_ID` flag.
    pub fn new(root_id: Id) -> Self {
        let capabilities = Capability::FILTER
            .union(Capability::UPDATE)
            .union(Capability::BRANCH)
            .union(Capability::SYNC);
        Self {
            root_id,
            documents: Arc::new(RwLock::new(HashMap::new())),
            info: builtin_info("memory", capabilities),
        }
    }

    /// Ids of every document with no namespace link at all: inodes that
    /// were upserted but never linked, or whose last link was retracted.
    /// Separate from the normal unwind-based `filter`, which never
    /// surfaces a document with an empty `ns`.
    pub fn orphan_ids(&self) -> Vec<Id> {
        self.documents
            .read()
            .values()
            .filter(|doc| doc.ns.is_empty())
            .map(|doc| doc.id.clone())
            .collect()
    }
}

fn compare_entries(sort: &crate::filter::Sort, a: &FSEntry<'_>, b: &FSEntry<'_>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for key in sort.keys() {
        let lhs = eval::extract(&key.field, a);
        let rhs = eval::extract(&key.field, b);
        let ord = match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => eval::compare_ordered(&lhs, &rhs).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let ord = match key.order {
            crate::filter::SortOrder::Ascending => ord,
            crate::filter::SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

fn apply_event(documents: &mut HashMap<Id, Document>, event: FSEvent<'_>) {
    match event {
        FSEvent::Upsert {
            id,
            statx,
            symlink,
            inode_xattrs,
        } => {
            let doc = documents.entry(id.clone()).or_insert_with(|| Document::new(id));
            if let Some(incoming) = statx {
                doc.statx = Some(match doc.statx {
                    Some(existing) => incoming.merge_preferring_self(&existing),
                    None => incoming,
                });
            }
            if let Some(symlink) = symlink {
                doc.symlink = Some(symlink);
            }
            if let Some(patch) = inode_xattrs {
                apply_xattr_patch(&mut doc.xattrs, &patch);
            }
        }
        FSEvent::Link {
            id,
            parent_id,
            name,
            namespace_xattrs,
        } => {
            let doc = documents
                .entry(id.clone())
                .or_insert_with(|| Document::new(id));
            doc.ns.retain(|ns| !(ns.parent_id == parent_id && ns.name == name));
            let mut xattrs = ValueMap::new();
            if let Some(patch) = &namespace_xattrs {
                apply_xattr_patch(&mut xattrs, patch);
            }
            doc.ns.push(super::document::NsEntry {
                parent_id,
                name,
                xattrs,
            });
        }
        FSEvent::Unlink { id, parent_id, name } => {
            if let Some(doc) = documents.get_mut(&id) {
                doc.ns.retain(|ns| !(ns.parent_id == parent_id && ns.name == name));
            }
        }
        FSEvent::Delete { id } => {
            documents.remove(&id);
        }
        FSEvent::Xattr {
            id,
            xattrs,
            namespace,
        } => {
            if let Some(doc) = documents.get_mut(&id) {
                match namespace {
                    Some(NamespaceRef { parent_id, name }) => {
                        if let Some(ns) = doc
                            .ns
                            .iter_mut()
                            .find(|ns| ns.parent_id == parent_id && ns.name == name)
                        {
                            apply_xattr_patch(&mut ns.xattrs, &xattrs);
                        }
                    }
                    None => apply_xattr_patch(&mut doc.xattrs, &xattrs),
                }
            }
        }
    }
}

fn bucket_index(value: i128, boundaries: &[Value<'static>]) -> Option<usize> {
    let bounds: Vec<i128> = boundaries.iter().filter_map(eval::numeric).collect();
    if bounds.len() < 2 {
        return None;
    }
    (0..bounds.len() - 1).find(|&i| value >= bounds[i] && value < bounds[i + 1])
}

fn bucket_key(range_fields: &[RangeField], entry: &FSEntry<'_>) -> Option<ValueMap<'static>> {
    let mut key = ValueMap::new();
    for range in range_fields {
        let value = eval::extract(&range.field, entry)?;
        let bucketed = if range.boundaries.is_empty() {
            to_owned_value(&value)
        } else {
            let numeric = eval::numeric(&value)?;
            let idx = bucket_index(numeric, &range.boundaries)?;
            to_owned_value(&range.boundaries[idx])
        };
        key.insert(range.field.document_path(), bucketed);
    }
    Some(key)
}

fn accumulate_all(aggregates: &[Aggregate], members: &[FSEntry<'static>]) -> ValueMap<'static> {
    let mut by_field: HashMap<Option<Field>, Vec<Aggregate>> = HashMap::new();
    for aggregate in aggregates {
        by_field
            .entry(aggregate.field.clone())
            .or_default()
            .push(aggregate.clone());
    }

    let mut out = ValueMap::new();
    for (field, aggregates) in by_field {
        let values: Vec<Value<'static>> = match &field {
            Some(field) => members
                .iter()
                .filter_map(|entry| eval::extract(field, entry))
                .map(|value| to_owned_value(&value))
                .collect(),
            None => members.iter().map(|_| Value::Bool(true)).collect(),
        };
        let refs: Vec<&Value<'static>> = values.iter().collect();
        for pair in group::accumulate(&aggregates, &refs).iter() {
            out.insert(pair.key.to_string(), pair.value.clone());
        }
    }
    out
}

impl Backend for MemoryTarget {
    fn plugin_info(&self) -> &PluginInfo {
        &self.info
    }

    fn filter<'s>(
        &'s self,
        filter: &Filter<'_>,
        options: &FilterOptions,
        projection: &Projection,
    ) -> Result<Box<dyn Iterator<Item = Result<FSEntry<'s>>> + 's>> {
        let documents = self.documents.read();
        let mut matched: Vec<FSEntry<'static>> = Vec::new();
        let mut scanned = 0u64;
        for doc in documents.values() {
            for ns in &doc.ns {
                scanned += 1;
                let candidate = doc.to_fsentry(Some(ns));
                if filter.matches(&candidate, None) {
                    matched.push(candidate);
                }
            }
        }
        drop(documents);

        if options.verbose {
            log::debug!("matched {} of {} namespace entries", matched.len(), scanned);
        }

        if options.sort.requires_spill() {
            matched.sort_by(|a, b| compare_entries(&options.sort, a, b));
        }

        let skip = options.skip as usize;
        let skipped = matched.into_iter().skip(skip);
        let limited: Vec<FSEntry<'static>> = match options.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        };

        let projected: Vec<Result<FSEntry<'s>>> =
            limited.into_iter().map(|entry| Ok(projection.apply(&entry))).collect();
        Ok(Box::new(projected.into_iter()))
    }

    fn update(&mut self, events: &mut dyn Iterator<Item = Option<FSEvent<'_>>>) -> Result<u64> {
        let mut applied = 0u64;
        let mut documents = self.documents.write();
        for event in events {
            let Some(event) = event else {
                continue;
            };
            apply_event(&mut documents, event);
            applied += 1;
        }
        Ok(applied)
    }

    fn branch(&self, root: BranchRoot) -> Result<Box<dyn Backend>> {
        match root {
            BranchRoot::Id(id) => Ok(Box::new(BranchTarget::new(self.documents.clone(), id))),
            BranchRoot::Path(_) => Err(RbhError::new(
                ErrorKind::Unsupported,
                "branch: the in-memory store has no path index, only BranchRoot::Id is supported",
            )),
        }
    }

    fn root(&self, projection: &Projection) -> Result<FSEntry<'_>> {
        let documents = self.documents.read();
        for doc in documents.values() {
            if let Some(ns) = doc.ns.iter().find(|ns| ns.parent_id.is_root_parent()) {
                return Ok(projection.apply(&doc.to_fsentry(Some(ns))));
            }
        }
        Err(RbhError::new(ErrorKind::Protocol, "no root entry in target store"))
    }

    fn get_info(&self, flags: InfoFlags) -> Result<ValueMap<'static>> {
        let documents = self.documents.read();
        let mut map = ValueMap::new();
        if flags.contains(InfoFlags::BACKEND_NAME) {
            map.insert("backend_name", Value::String(self.info.name.clone().into()));
        }
        if flags.contains(InfoFlags::ROOT_ID) {
            map.insert(
                "root_id",
                Value::Binary(crate::container::Container::from(self.root_id.as_bytes().to_vec())),
            );
        }
        if flags.contains(InfoFlags::ENTRY_COUNT) {
            map.insert("entry_count", Value::UInt64(documents.len() as u64));
        }
        Ok(map)
    }

    fn report<'s>(
        &'s self,
        filter: &Filter<'_>,
        grouping: &GroupBy,
        _options: &ReportOptions,
    ) -> Result<Box<dyn Iterator<Item = Result<GroupRow<'s>>> + 's>> {
        let documents = self.documents.read();
        let mut candidates: Vec<FSEntry<'static>> = Vec::new();
        for doc in documents.values() {
            for ns in &doc.ns {
                let candidate = doc.to_fsentry(Some(ns));
                if filter.matches(&candidate, None) {
                    candidates.push(candidate);
                }
            }
        }
        drop(documents);

        let mut buckets: Vec<(ValueMap<'static>, Vec<FSEntry<'static>>)> = Vec::new();
        for entry in candidates {
            let Some(key) = bucket_key(&grouping.range_fields, &entry) else {
                continue;
            };
            match buckets.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(entry),
                None => buckets.push((key, vec![entry])),
            }
        }

        let rows: Vec<Result<GroupRow<'static>>> = buckets
            .into_iter()
            .map(|(id, members)| {
                Ok(GroupRow {
                    id,
                    accumulators: accumulate_all(&grouping.aggregates, &members),
                })
            })
            .collect();

        Ok(Box::new(rows.into_iter()))
    }

    fn destroy(&mut self) {
        self.documents.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparand, Op};
    use crate::id::BackendTag;

    fn id(n: u8) -> Id {
        Id::new(BackendTag::TargetStore, vec![n])
    }

    fn linked_target() -> MemoryTarget {
        let mut target = MemoryTarget::new(id(0));
        let mut events = vec![
            Some(FSEvent::Upsert {
                id: id(1),
                statx: None,
                symlink: None,
                inode_xattrs: None,
            }),
            Some(FSEvent::Link {
                id: id(1),
                parent_id: Id::root_parent(BackendTag::TargetStore),
                name: "a".to_string(),
                namespace_xattrs: None,
            }),
        ];
        events.push(None);
        target.update(&mut events.into_iter()).unwrap();
        target
    }

    #[test]
    fn filter_all_returns_linked_entries() {
        let target = linked_target();
        let matches: Vec<_> = target
            .filter(&Filter::All, &FilterOptions::default(), &Projection::everything())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name.as_deref(), Some("a"));
    }

    #[test]
    fn link_replaces_stale_link_for_same_name() {
        let mut target = linked_target();
        let mut events = vec![Some(FSEvent::Link {
            id: id(1),
            parent_id: Id::root_parent(BackendTag::TargetStore),
            name: "a".to_string(),
            namespace_xattrs: None,
        })];
        events.push(None);
        target.update(&mut events.into_iter()).unwrap();
        let matches: Vec<_> = target
            .filter(&Filter::All, &FilterOptions::default(), &Projection::everything())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(matches.len(), 1, "re-linking the same name must not duplicate it");
    }

    #[test]
    fn unlink_then_delete_removes_entry() {
        let mut target = linked_target();
        let mut events = vec![
            Some(FSEvent::Unlink {
                id: id(1),
                parent_id: Id::root_parent(BackendTag::TargetStore),
                name: "a".to_string(),
            }),
            Some(FSEvent::Delete { id: id(1) }),
        ];
        events.push(None);
        target.update(&mut events.into_iter()).unwrap();
        assert_eq!(target.documents.read().len(), 0);
    }

    #[test]
    fn orphan_ids_excludes_linked_entries() {
        let target = linked_target();
        assert!(target.orphan_ids().is_empty());
    }

    #[test]
    fn get_info_reports_requested_flags_only() {
        let target = linked_target();
        let info = target
            .get_info(InfoFlags::ENTRY_COUNT | InfoFlags::BACKEND_NAME)
            .unwrap();
        assert_eq!(info.get("entry_count"), Some(&Value::UInt64(1)));
        assert!(info.get("root_id").is_none());
    }

    #[test]
    fn path_branch_root_is_unsupported() {
        let target = linked_target();
        let err = target.branch(BranchRoot::Path("/x".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn report_groups_by_exact_value_and_counts() {
        let mut target = MemoryTarget::new(id(0));
        let mut events = Vec::new();
        for (n, uid) in [(1u8, 1u32), (2, 1), (3, 2)] {
            events.push(Some(FSEvent::Upsert {
                id: id(n),
                statx: {
                    let mut statx = crate::statx::StatX::empty();
                    statx.mask = crate::attributes::StatxMask::UID;
                    statx.uid = uid;
                    Some(statx)
                },
                symlink: None,
                inode_xattrs: None,
            }));
            events.push(Some(FSEvent::Link {
                id: id(n),
                parent_id: Id::root_parent(BackendTag::TargetStore),
                name: n.to_string(),
                namespace_xattrs: None,
            }));
        }
        events.push(None);
        target.update(&mut events.into_iter()).unwrap();

        let grouping = GroupBy {
            range_fields: vec![RangeField::exact(Field::Statx(crate::attributes::StatxMask::UID))],
            aggregates: vec![Aggregate::count()],
        };
        let rows: Vec<_> = target
            .report(&Filter::All, &grouping, &ReportOptions::default())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        let total: u64 = rows
            .iter()
            .map(|row| match row.accumulators.get("count") {
                Some(Value::UInt64(n)) => *n,
                _ => 0,
            })
            .sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn filter_matches_get_comparand_against_reference_is_unused_by_target() {
        // The in-memory target evaluates every filter with no reference
        // entry; `Comparand::Get` nodes therefore never match here.
        let target = linked_target();
        let filter = Filter::Comparison {
            field: Field::Name,
            op: Op::Equal,
            value: Some(Comparand::Get(Field::Name)),
        };
        let matches: Vec<_> = target
            .filter(&filter, &FilterOptions::default(), &Projection::everything())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn root_returns_entry_linked_under_sentinel_parent() {
        let target = linked_target();
        let root = target.root(&Projection::everything()).unwrap();
        assert_eq!(root.name.as_deref(), Some("a"));
    }

    #[test]
    fn root_errors_when_no_entry_is_linked_under_the_sentinel() {
        let target = MemoryTarget::new(id(0));
        let err = target.root(&Projection::everything()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
