//! Garbage collection: reconcile a target store against a live source
//! tree and delete entries the source no longer has.
//!
//! The algorithm never touches the source tree's directory structure
//! directly — it re-resolves each candidate id's kernel file handle
//! against the mount and classifies what it gets back, the same handle
//! round-trip [`crate::source::enrich`]'s on-demand stat resolution uses.

use std::io::Write;
use std::os::fd::AsFd;
use std::path::Path;

use crate::backend::{Backend, FilterOptions};
use crate::error::Result;
use crate::filter::{Comparand, Field, Filter, Op, Projection, XattrKeys};
use crate::fsentry::FSEntryMask;
use crate::fsevent::FSEvent;
use crate::id::Id;
use crate::iter::chunkify;
use crate::platform::{open_mount, probe_liveness, Liveness};
use crate::statx::Timestamp;
use crate::value::Value;

/// Number of `DELETE` events batched into a single [`Backend::update`]
/// call.
pub const DELETE_CHUNK_SIZE: usize = 4096;

/// Outcome of one [`collect`] run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GcReport {
    /// Entries found absent from the source (deleted, or that would have
    /// been deleted in a dry run).
    pub absent_count: u64,
    /// Whether [`collect`] actually deleted them or only reported them.
    pub dry_run: bool,
}

/// Build the candidate-id filter: every entry, or
/// every entry whose `sync_time` namespace xattr predates `threshold`
/// when one is given.
fn candidate_filter(threshold: Option<Timestamp>) -> Filter<'static> {
    match threshold {
        None => Filter::All,
        Some(threshold) => Filter::Comparison {
            field: Field::NamespaceXattr(Some("sync_time".to_string())),
            op: Op::StrictlyLower,
            value: Some(Comparand::Literal(Value::Int64(threshold.sec))),
        },
    }
}

fn candidate_projection(dry_run: bool) -> Projection {
    let mut projection = Projection::ids_only();
    if dry_run {
        projection.mask |= FSEntryMask::NAMESPACE_XATTRS;
        projection.namespace_xattrs = XattrKeys::Named(vec!["path".to_string()]);
    }
    projection
}

/// Reconcile `target` against the live tree mounted at `mount_path`.
/// Candidate ids are drawn from `target`, filtered by an optional
/// `sync_time` threshold, and probed for liveness against the mount by
/// re-opening each id's kernel file handle. Entries no longer reachable
/// are deleted from `target` in chunks of [`DELETE_CHUNK_SIZE`], unless
/// `dry_run` is set, in which case their paths are written to `out`
/// instead.
pub fn collect(
    target: &mut dyn Backend,
    mount_path: &Path,
    sync_time_threshold: Option<Timestamp>,
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<GcReport> {
    let mount_fd = open_mount(mount_path)?;

    let filter = candidate_filter(sync_time_threshold);
    let projection = candidate_projection(dry_run);
    let options = FilterOptions::default();

    let mut absent: Vec<(Id, Option<String>)> = Vec::new();
    for candidate in target.filter(&filter, &options, &projection)? {
        let entry = candidate?;
        let id_bytes = entry.id.as_bytes();
        match probe_liveness(mount_fd.as_fd(), id_bytes) {
            Ok(Liveness::Alive) => continue,
            Ok(Liveness::Absent) => {
                let path = entry
                    .namespace_xattrs
                    .get("path")
                    .and_then(|value| match value {
                        Value::String(s) => Some(s.to_string()),
                        _ => None,
                    });
                absent.push((entry.id.clone(), path));
            }
            Err(err) => return Err(err.into()),
        }
    }

    if dry_run {
        for (_, path) in &absent {
            let shown = path.as_deref().unwrap_or("<unknown>");
            writeln!(out, "'{shown}' needs to be deleted").map_err(write_error)?;
        }
        writeln!(out, "{} element total to delete", absent.len()).map_err(write_error)?;
        return Ok(GcReport {
            absent_count: absent.len() as u64,
            dry_run: true,
        });
    }

    let deletes: Vec<FSEvent<'static>> = absent
        .iter()
        .map(|(id, _)| FSEvent::Delete { id: id.clone() })
        .collect();
    let mut outer = chunkify(deletes.into_iter(), DELETE_CHUNK_SIZE);
    for chunk in &mut outer {
        let mut events: Vec<Option<FSEvent<'static>>> = chunk.map(Some).collect();
        events.push(None);
        target.update(&mut events.drain(..))?;
    }

    Ok(GcReport {
        absent_count: absent.len() as u64,
        dry_run: false,
    })
}

fn write_error(err: std::io::Error) -> crate::error::RbhError {
    crate::error::RbhError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::chunkify;

    #[test]
    fn chunker_splits_ten_thousand_at_4096() {
        let mut outer = chunkify(0..10_000u32, DELETE_CHUNK_SIZE);
        let sizes: Vec<usize> = std::iter::from_fn(|| outer.next().map(|c| c.count())).collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);
    }
}
