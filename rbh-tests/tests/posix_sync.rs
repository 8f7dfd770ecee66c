//! Walking a small POSIX tree and syncing it into an in-memory target
//! produces exactly the entries and child counts the source tree has.

use rbh_core::backend::{Backend, FilterOptions};
use rbh_core::filter::{Filter, Projection};
use rbh_core::fsevent::FSEvent;
use rbh_core::id::{BackendTag, Id};
use rbh_core::source::PosixWalker;
use rbh_core::target::MemoryTarget;
use rbh_core::value::Value;

fn sync_tree(root: &std::path::Path) -> MemoryTarget {
    let walker = PosixWalker::new(root, false);
    let mut events: Vec<Option<FSEvent<'static>>> = walker
        .collect::<rbh_core::Result<Vec<_>>>()
        .expect("walk succeeds")
        .into_iter()
        .map(Some)
        .collect();
    events.push(None);

    let mut target = MemoryTarget::new(Id::new(BackendTag::TargetStore, b"root".to_vec()));
    target.update(&mut events.into_iter()).expect("apply events");
    target
}

fn entries(target: &MemoryTarget) -> Vec<rbh_core::fsentry::FSEntry<'static>> {
    target
        .filter(&Filter::All, &FilterOptions::default(), &Projection::everything())
        .unwrap()
        .collect::<rbh_core::Result<Vec<_>>>()
        .unwrap()
}

fn nb_children(entry: &rbh_core::fsentry::FSEntry<'_>) -> Option<u64> {
    match entry.inode_xattrs.get("nb_children") {
        Some(Value::UInt64(n)) => Some(*n),
        _ => None,
    }
}

#[test]
fn three_node_tree_syncs_with_correct_sizes_and_child_counts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a"), vec![0u8; 1024]).unwrap();
    std::fs::create_dir(dir.path().join("b")).unwrap();
    std::fs::write(dir.path().join("b").join("c"), b"").unwrap();

    let target = sync_tree(dir.path());
    let all = entries(&target);

    let non_root: Vec<_> = all.iter().filter(|e| !e.is_root()).collect();
    assert_eq!(non_root.len(), 3, "expected a, b, c");

    let root = all.iter().find(|e| e.is_root()).expect("root present");
    assert_eq!(nb_children(root), Some(2));

    let a = all.iter().find(|e| e.name.as_deref() == Some("a")).unwrap();
    assert_eq!(a.statx.unwrap().size, 1024);

    let b = all.iter().find(|e| e.name.as_deref() == Some("b")).unwrap();
    assert_eq!(nb_children(b), Some(1));

    let c = all.iter().find(|e| e.name.as_deref() == Some("c")).unwrap();
    assert_eq!(c.statx.unwrap().size, 0);
}
