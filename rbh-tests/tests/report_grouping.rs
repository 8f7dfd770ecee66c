//! Range grouping by a bucketed field and an exact field together,
//! aggregated with `avg`/`count`, against a small synthetic target.

use rbh_core::attributes::StatxMask;
use rbh_core::filter::{Aggregate, Field, Filter, GroupBy, RangeField};
use rbh_core::fsevent::FSEvent;
use rbh_core::id::{BackendTag, Id};
use rbh_core::statx::StatX;
use rbh_core::target::MemoryTarget;
use rbh_core::value::Value;
use rbh_core::Result;

fn id(n: u8) -> Id {
    Id::new(BackendTag::TargetStore, vec![n])
}

fn upsert(n: u8, size: u64, uid: u32) -> FSEvent<'static> {
    let mut statx = StatX::empty();
    statx.mask = StatxMask::SIZE | StatxMask::UID;
    statx.size = size;
    statx.uid = uid;
    FSEvent::Upsert {
        id: id(n),
        statx: Some(statx),
        symlink: None,
        inode_xattrs: None,
    }
}

fn link(n: u8, name: &str) -> FSEvent<'static> {
    FSEvent::Link {
        id: id(n),
        parent_id: Id::root_parent(BackendTag::TargetStore),
        name: name.to_string(),
        namespace_xattrs: None,
    }
}

#[test]
fn report_range_grouping_matches_scenario_five() {
    let mut target = MemoryTarget::new(Id::new(BackendTag::TargetStore, b"root".to_vec()));
    let mut events = vec![
        Some(upsert(1, 0, 1)),
        Some(link(1, "a")),
        Some(upsert(2, 1000, 1)),
        Some(link(2, "b")),
        Some(upsert(3, 2000, 2)),
        Some(link(3, "c")),
    ];
    events.push(None);
    target.update(&mut events.into_iter()).unwrap();

    let grouping = GroupBy {
        range_fields: vec![
            RangeField::buckets(
                Field::Statx(StatxMask::SIZE),
                vec![Value::Int64(0), Value::Int64(1024), Value::Int64(1_048_576)],
            ),
            RangeField::exact(Field::Statx(StatxMask::UID)),
        ],
        aggregates: vec![
            Aggregate::over(rbh_core::filter::Accumulator::Avg, Field::Statx(StatxMask::SIZE)),
            Aggregate::count(),
        ],
    };

    let rows: Vec<_> = target
        .report(&Filter::All, &grouping, &Default::default())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    assert_eq!(rows.len(), 2, "two distinct (size-bucket, uid) keys");

    let small_bucket = rows
        .iter()
        .find(|row| row.id.get("statx.uid") == Some(&Value::UInt32(1)))
        .expect("uid=1 bucket present");
    assert_eq!(small_bucket.accumulators.get("avg"), Some(&Value::Int64(500)));
    assert_eq!(small_bucket.accumulators.get("count"), Some(&Value::UInt64(2)));

    let large_bucket = rows
        .iter()
        .find(|row| row.id.get("statx.uid") == Some(&Value::UInt32(2)))
        .expect("uid=2 bucket present");
    assert_eq!(large_bucket.accumulators.get("avg"), Some(&Value::Int64(2000)));
    assert_eq!(large_bucket.accumulators.get("count"), Some(&Value::UInt64(1)));
}
