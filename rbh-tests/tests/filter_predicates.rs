//! Parsing a find-style expression and running it through a target's
//! filter returns exactly the entries the expression selects.

use rbh_core::backend::{Backend, FilterOptions};
use rbh_core::filter::Projection;
use rbh_core::fsevent::FSEvent;
use rbh_core::id::{BackendTag, Id};
use rbh_core::source::PosixWalker;
use rbh_core::target::MemoryTarget;

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

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

#[test]
fn size_and_type_expression_selects_only_the_large_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a"), vec![0u8; 1024]).unwrap();
    std::fs::create_dir(dir.path().join("b")).unwrap();
    std::fs::write(dir.path().join("b").join("c"), b"").unwrap();

    let target = sync_tree(dir.path());

    let parsed =
        rbh_tools::parse_expression(&args(&["-size", "+512c", "-and", "-type", "f"])).unwrap();
    let matches: Vec<_> = target
        .filter(&parsed.filter, &FilterOptions::default(), &Projection::everything())
        .unwrap()
        .collect::<rbh_core::Result<Vec<_>>>()
        .unwrap();

    assert_eq!(matches.len(), 1, "only \"a\" is both large and a regular file");
    assert_eq!(matches[0].name.as_deref(), Some("a"));
}
