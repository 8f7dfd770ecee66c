//! A dry-run garbage collection pass against a target holding one
//! deleted and two live entries reports exactly the deleted one, in the
//! documented wording, and deletes nothing.

use std::os::fd::AsFd;

use rbh_core::backend::Backend;
use rbh_core::fsevent::{FSEvent, XattrOp, XattrPatch};
use rbh_core::gc::collect;
use rbh_core::id::{BackendTag, Id};
use rbh_core::platform;
use rbh_core::target::MemoryTarget;
use rbh_core::value::Value;

fn handle_id_for(mount: &std::path::Path, name: &str) -> Id {
    let mount_fd = platform::open_mount(mount).unwrap();
    let bytes = platform::name_to_handle(mount_fd.as_fd(), std::path::Path::new(name)).unwrap();
    Id::new(BackendTag::Posix, bytes)
}

#[test]
fn dry_run_reports_the_one_absent_entry_without_deleting_it() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("x"), b"").unwrap();
    std::fs::write(dir.path().join("y"), b"").unwrap();
    std::fs::write(dir.path().join("z"), b"").unwrap();

    let x_id = handle_id_for(dir.path(), "x");
    let y_id = handle_id_for(dir.path(), "y");
    let z_id = handle_id_for(dir.path(), "z");

    std::fs::remove_file(dir.path().join("y")).unwrap();

    let mut target = MemoryTarget::new(Id::new(BackendTag::TargetStore, b"root".to_vec()));
    let mut events = Vec::new();
    for (id, path) in [
        (&x_id, "/path/to/x"),
        (&y_id, "/path/to/Y"),
        (&z_id, "/path/to/z"),
    ] {
        events.push(Some(FSEvent::Upsert {
            id: id.clone(),
            statx: None,
            symlink: None,
            inode_xattrs: None,
        }));
        let mut xattrs = XattrPatch::new();
        xattrs.push("path", XattrOp::Set(Value::String(path.to_string().into())));
        events.push(Some(FSEvent::Link {
            id: id.clone(),
            parent_id: Id::root_parent(BackendTag::TargetStore),
            name: path.to_string(),
            namespace_xattrs: Some(xattrs),
        }));
    }
    events.push(None);
    target.update(&mut events.into_iter()).unwrap();

    let mut out = Vec::new();
    let report = collect(&mut target, dir.path(), None, true, &mut out).unwrap();

    assert_eq!(report.absent_count, 1);
    assert!(report.dry_run);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "'/path/to/Y' needs to be deleted\n1 element total to delete\n"
    );

    let live_ids: Vec<Id> = target
        .filter(
            &rbh_core::filter::Filter::All,
            &Default::default(),
            &rbh_core::filter::Projection::ids_only(),
        )
        .unwrap()
        .collect::<rbh_core::Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert!(live_ids.contains(&y_id), "dry run must not delete the absent entry");
}
