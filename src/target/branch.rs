//! A read-only view onto one subtree of a [`MemoryTarget`](super::memory::MemoryTarget),
//! sharing its backing map rather than copying it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::attributes::FileType;
use crate::backend::{registry::builtin_info, Backend, Capability, FilterOptions, PluginInfo};
use crate::error::{ErrorKind, RbhError, Result};
use crate::filter::{Filter, Projection};
use crate::fsentry::FSEntry;
use crate::id::Id;

use super::document::Document;

/// A handle onto one subtree of a shared in-memory store. `filter` is the
/// only supported operation: `update`/`report`/etc. fall through to the
/// [`Backend`] trait's default "unsupported" bodies.
#[derive(Debug)]
pub struct BranchTarget {
    documents: Arc<RwLock<HashMap<Id, Document>>>,
    root_id: Id,
    info: PluginInfo,
}

impl BranchTarget {
    pub(crate) fn new(documents: Arc<RwLock<HashMap<Id, Document>>>, root_id: Id) -> Self {
        Self {
            documents,
            root_id,
            info: builtin_info("memory-branch", Capability::FILTER),
        }
    }
}

impl Backend for BranchTarget {
    fn plugin_info(&self) -> &PluginInfo {
        &self.info
    }

    fn filter<'s>(
        &'s self,
        filter: &Filter<'_>,
        options: &FilterOptions,
        projection: &Projection,
    ) -> Result<Box<dyn Iterator<Item = Result<FSEntry<'s>>> + 's>> {
        if options.sort.requires_spill() || options.skip != 0 || options.limit.is_some() {
            return Err(RbhError::new(
                ErrorKind::Unsupported,
                "branch filter: skip/limit/sort are not supported on a branch view",
            ));
        }

        let documents = self.documents.read();
        let mut matched: Vec<FSEntry<'static>> = Vec::new();
        let mut visited: HashSet<Id> = HashSet::new();
        visited.insert(self.root_id.clone());

        if let Some(root_doc) = documents.get(&self.root_id) {
            for ns in &root_doc.ns {
                let candidate = root_doc.to_fsentry(Some(ns));
                if filter.matches(&candidate, None) {
                    matched.push(candidate);
                }
            }
        }

        let mut frontier = vec![self.root_id.clone()];
        while let Some(parent) = frontier.pop() {
            for doc in documents.values() {
                if visited.contains(&doc.id) {
                    continue;
                }
                if !doc.ns.iter().any(|ns| ns.parent_id == parent) {
                    continue;
                }
                visited.insert(doc.id.clone());
                for ns in doc.ns.iter().filter(|ns| ns.parent_id == parent) {
                    let candidate = doc.to_fsentry(Some(ns));
                    if filter.matches(&candidate, None) {
                        matched.push(candidate);
                    }
                }
                let is_dir = doc
                    .statx
                    .map(|statx| statx.kind == Some(FileType::Directory))
                    .unwrap_or(false);
                if is_dir {
                    frontier.push(doc.id.clone());
                }
            }
        }
        drop(documents);

        let projected: Vec<Result<FSEntry<'s>>> =
            matched.into_iter().map(|entry| Ok(projection.apply(&entry))).collect();
        Ok(Box::new(projected.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::StatxMask;
    use crate::backend::BranchRoot;
    use crate::fsevent::FSEvent;
    use crate::id::BackendTag;
    use crate::statx::StatX;
    use crate::target::MemoryTarget;

    fn id(n: u8) -> Id {
        Id::new(BackendTag::TargetStore, vec![n])
    }

    fn tree() -> MemoryTarget {
        let mut target = MemoryTarget::new(id(0));
        let mut dir_statx = StatX::empty();
        dir_statx.mask = StatxMask::TYPE;
        dir_statx.kind = Some(FileType::Directory);

        let mut events = vec![
            Some(FSEvent::Upsert {
                id: id(1),
                statx: Some(dir_statx),
                symlink: None,
                inode_xattrs: None,
            }),
            Some(FSEvent::Link {
                id: id(1),
                parent_id: Id::root_parent(BackendTag::TargetStore),
                name: "dir".to_string(),
                namespace_xattrs: None,
            }),
            Some(FSEvent::Upsert {
                id: id(2),
                statx: None,
                symlink: None,
                inode_xattrs: None,
            }),
            Some(FSEvent::Link {
                id: id(2),
                parent_id: id(1),
                name: "child".to_string(),
                namespace_xattrs: None,
            }),
            Some(FSEvent::Upsert {
                id: id(3),
                statx: None,
                symlink: None,
                inode_xattrs: None,
            }),
            Some(FSEvent::Link {
                id: id(3),
                parent_id: Id::root_parent(BackendTag::TargetStore),
                name: "sibling".to_string(),
                namespace_xattrs: None,
            }),
        ];
        events.push(None);
        target.update(&mut events.into_iter()).unwrap();
        target
    }

    #[test]
    fn branch_sees_root_and_descendants_but_not_siblings() {
        let target = tree();
        let branch = target.branch(BranchRoot::Id(id(1))).unwrap();
        let names: Vec<_> = branch
            .filter(&Filter::All, &FilterOptions::default(), &Projection::everything())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names.len(), 2, "the branch root and its one child, not the sibling");
        assert!(names.contains(&Some("dir".to_string())));
        assert!(names.contains(&Some("child".to_string())));
        assert!(!names.contains(&Some("sibling".to_string())));
    }

    #[test]
    fn branch_update_is_unsupported() {
        let target = tree();
        let mut branch = target.branch(BranchRoot::Id(id(1))).unwrap();
        let mut events: Vec<Option<FSEvent<'static>>> = vec![None];
        let err = branch.update(&mut events.into_iter()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
