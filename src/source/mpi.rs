//! Parallel-filesystem walker.
//!
//! Real deployments link this against a vendor MPI runtime and a
//! parallel-filesystem client library neither of which exist in this
//! ecosystem's crate registry; see `DESIGN.md` for the Open Question
//! this resolves. What's implemented here is the shape every such
//! backend shares: a two-phase plan (distributed list-and-partition,
//! then per-rank local iteration) and the id-assignment rule (root's id
//! is minted on rank 0, item 0 only).

use crate::error::{ErrorKind, RbhError, Result};
use crate::filter::Filter;
use crate::fsevent::FSEvent;
use crate::id::{BackendTag, Id};

/// One worker's share of the distributed walk's file list.
#[derive(Clone, Debug, Default)]
pub struct PartitionPlan {
    /// This rank's index among the walk's participants.
    pub rank: usize,
    /// Total number of participants.
    pub world_size: usize,
    /// Paths (or path-derived ids) assigned to this rank.
    pub entries: Vec<String>,
}

impl PartitionPlan {
    /// Whether this rank owns the walk's root.
    pub fn owns_root(&self) -> bool {
        self.rank == 0
    }

    /// Mint the root id, only valid when [`owns_root`](Self::owns_root)
    /// is true.
    pub fn root_id(&self) -> Option<Id> {
        self.owns_root().then(|| Id::root_parent(BackendTag::Mpi))
    }
}

/// The two-phase distributed walk contract.
///
/// Phase one builds a [`PartitionPlan`] per worker, pruning the file list
/// by `pushdown` before handing it to phase two. Phase two iterates the
/// worker's partition, yielding fsevents. No in-tree implementation calls
/// into an actual MPI runtime; a deployment wires this trait up to its
/// vendor client library as a separate crate.
pub trait PartitionedWalk {
    /// Build this rank's partition, after pushing `pushdown` down into the
    /// distributed listing so pruned entries never cross the wire.
    fn plan(&self, pushdown: &Filter<'_>) -> Result<PartitionPlan>;

    /// Iterate `plan`'s entries, producing this rank's fsevent stream.
    fn walk<'s>(
        &'s self,
        plan: &'s PartitionPlan,
    ) -> Result<Box<dyn Iterator<Item = Result<FSEvent<'s>>> + 's>>;
}

/// A [`PartitionedWalk`] with no backing runtime; every call reports
/// [`ErrorKind::Unsupported`]. Registered so the plugin table always has
/// an entry named `mpi`, even on builds where it cannot run.
#[derive(Default)]
pub struct UnavailableMpiWalk;

impl PartitionedWalk for UnavailableMpiWalk {
    fn plan(&self, _pushdown: &Filter<'_>) -> Result<PartitionPlan> {
        Err(RbhError::new(
            ErrorKind::Unsupported,
            "mpi backend requires a vendor-specific runtime not available in this build",
        ))
    }

    fn walk<'s>(
        &'s self,
        _plan: &'s PartitionPlan,
    ) -> Result<Box<dyn Iterator<Item = Result<FSEvent<'s>>> + 's>> {
        Err(RbhError::new(ErrorKind::Unsupported, "mpi backend unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rank_zero_owns_root() {
        let rank0 = PartitionPlan {
            rank: 0,
            world_size: 4,
            entries: vec![],
        };
        let rank1 = PartitionPlan {
            rank: 1,
            world_size: 4,
            entries: vec![],
        };
        assert!(rank0.root_id().is_some());
        assert!(rank1.root_id().is_none());
    }

    #[test]
    fn unavailable_walker_reports_unsupported() {
        let walker = UnavailableMpiWalk;
        let err = walker.plan(&Filter::All).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
