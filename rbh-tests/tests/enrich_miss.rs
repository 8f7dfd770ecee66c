//! Resolving an enrichment request against an id whose inode has since
//! been deleted surfaces a skippable, transient error rather than
//! panicking or silently fabricating data.

use std::os::fd::AsFd;

use rbh_core::attributes::StatxMask;
use rbh_core::backend::plugin::Version;
use rbh_core::enrich::{EnrichRequest, Enricher};
use rbh_core::error::ErrorKind;
use rbh_core::fsentry::FSEntry;
use rbh_core::id::{BackendTag, Id};
use rbh_core::platform;

#[test]
fn resolving_a_deleted_inode_is_reported_as_transient() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vanishing");
    std::fs::write(&path, b"gone soon").unwrap();

    let mount_fd = platform::open_mount(dir.path()).unwrap();
    let handle_bytes =
        platform::name_to_handle(mount_fd.as_fd(), std::path::Path::new("vanishing")).unwrap();
    let id = Id::new(BackendTag::Posix, handle_bytes);

    std::fs::remove_file(&path).unwrap();

    let enricher = Enricher::open(dir.path(), "posix", Version::new(4, 0, 0)).unwrap();
    let entry = FSEntry::id_only(id.clone());

    let err = enricher
        .resolve(&id, &EnrichRequest::Statx(StatxMask::SIZE), &entry)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.is_skippable());
}
