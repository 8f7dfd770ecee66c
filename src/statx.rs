//! The `StatX` record: a masked superset of POSIX
//! `stat`, timestamps included, so a consumer can tell "field is zero"
//! apart from "field was never populated".

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::attributes::{Attributes, DeviceId, FileType, StatxMask};

/// One timestamp with second/nanosecond resolution, matching `statx`'s
/// `statx_timestamp` layout bit-exactly.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    /// Seconds since the Unix epoch (may be negative).
    pub sec: i64,
    /// Nanoseconds, always in `[0, 999_999_999]`.
    pub nsec: u32,
}

impl Timestamp {
    /// Convert a `SystemTime` to a `(sec, nsec)` pair, saturating at
    /// `i64::MAX`/`i64::MIN` rather than panicking on overflow.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => match i64::try_from(duration.as_secs()) {
                Ok(secs) => Self {
                    sec: secs,
                    nsec: duration.subsec_nanos(),
                },
                Err(_) => Self {
                    sec: i64::MAX,
                    nsec: 999_999_999,
                },
            },
            Err(before_epoch) => {
                let d = before_epoch.duration();
                let secs = d.as_secs();
                let nanos = d.subsec_nanos();
                if (secs, nanos) >= (i64::MAX as u64 + 1, 0) {
                    Self { sec: i64::MIN, nsec: 0 }
                } else if nanos == 0 {
                    Self {
                        sec: -(secs as i64),
                        nsec: 0,
                    }
                } else {
                    Self {
                        sec: -(secs as i64) - 1,
                        nsec: 1_000_000_000 - nanos,
                    }
                }
            }
        }
    }

    /// Convert back into a `SystemTime`.
    pub fn to_system_time(self) -> SystemTime {
        if self.sec >= 0 {
            UNIX_EPOCH + Duration::new(self.sec as u64, self.nsec)
        } else {
            UNIX_EPOCH - Duration::new((-self.sec) as u64, 0) + Duration::new(0, self.nsec)
        }
    }
}

/// A masked superset of POSIX `stat`.
///
/// Every field is meaningful only if the corresponding bit is set in
/// [`mask`](Self::mask): an unmasked field must not be read, and every
/// accessor below documents which mask bit guards it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct StatX {
    /// Which fields below are actually populated.
    pub mask: StatxMask,
    /// Entry kind, valid iff `mask` has [`StatxMask::TYPE`].
    pub kind: Option<FileType>,
    /// Permission bits, valid iff `mask` has [`StatxMask::MODE`].
    pub mode: u16,
    /// Hard link count, valid iff `mask` has [`StatxMask::NLINK`].
    pub nlink: u32,
    /// Owning user id, valid iff `mask` has [`StatxMask::UID`].
    pub uid: u32,
    /// Owning group id, valid iff `mask` has [`StatxMask::GID`].
    pub gid: u32,
    /// Size in bytes, valid iff `mask` has [`StatxMask::SIZE`].
    pub size: u64,
    /// Allocated 512-byte blocks, valid iff `mask` has [`StatxMask::BLOCKS`].
    pub blocks: u64,
    /// Inode number, valid iff `mask` has [`StatxMask::INO`].
    pub ino: u64,
    /// Preferred I/O block size, valid iff `mask` has [`StatxMask::BLKSIZE`].
    pub blksize: u32,
    /// Time of last access, valid iff `mask` has [`StatxMask::ATIME`].
    pub atime: Timestamp,
    /// Time of creation, valid iff `mask` has [`StatxMask::BTIME`].
    pub btime: Timestamp,
    /// Time of last metadata change, valid iff `mask` has [`StatxMask::CTIME`].
    pub ctime: Timestamp,
    /// Time of last content modification, valid iff `mask` has [`StatxMask::MTIME`].
    pub mtime: Timestamp,
    /// File attribute flags, valid iff `mask` has [`StatxMask::ATTRIBUTES`].
    pub attributes: Attributes,
    /// Which attribute bits are meaningful (the kernel reports a mask
    /// alongside the attribute bits themselves).
    pub attributes_mask: Attributes,
    /// Device the entry resides on, valid iff `mask` has [`StatxMask::DEV`].
    pub dev: DeviceId,
    /// Device the entry represents (special files), valid iff `mask` has
    /// [`StatxMask::RDEV`].
    pub rdev: DeviceId,
    /// Mount id, valid iff `mask` has [`StatxMask::MNT_ID`].
    pub mount_id: u64,
}

impl StatX {
    /// An all-absent record (`mask` is empty).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Project this record down to the fields named by `mask`, clearing
    /// any bit not present in both. Used by [`crate::filter::Projection`]
    /// and by the synchronizer.
    pub fn project(&self, mask: StatxMask) -> Self {
        let kept = self.mask & mask;
        let mut out = Self {
            mask: kept,
            ..Self::default()
        };
        if kept.contains(StatxMask::TYPE) {
            out.kind = self.kind;
        }
        if kept.contains(StatxMask::MODE) {
            out.mode = self.mode;
        }
        if kept.contains(StatxMask::NLINK) {
            out.nlink = self.nlink;
        }
        if kept.contains(StatxMask::UID) {
            out.uid = self.uid;
        }
        if kept.contains(StatxMask::GID) {
            out.gid = self.gid;
        }
        if kept.contains(StatxMask::SIZE) {
            out.size = self.size;
        }
        if kept.contains(StatxMask::BLOCKS) {
            out.blocks = self.blocks;
        }
        if kept.contains(StatxMask::INO) {
            out.ino = self.ino;
        }
        if kept.contains(StatxMask::BLKSIZE) {
            out.blksize = self.blksize;
        }
        if kept.contains(StatxMask::ATIME) {
            out.atime = self.atime;
        }
        if kept.contains(StatxMask::BTIME) {
            out.btime = self.btime;
        }
        if kept.contains(StatxMask::CTIME) {
            out.ctime = self.ctime;
        }
        if kept.contains(StatxMask::MTIME) {
            out.mtime = self.mtime;
        }
        if kept.contains(StatxMask::ATTRIBUTES) {
            out.attributes = self.attributes;
            out.attributes_mask = self.attributes_mask;
        }
        if kept.contains(StatxMask::DEV) {
            out.dev = self.dev;
        }
        if kept.contains(StatxMask::RDEV) {
            out.rdev = self.rdev;
        }
        if kept.contains(StatxMask::MNT_ID) {
            out.mount_id = self.mount_id;
        }
        out
    }

    /// Merge `other`'s populated fields on top of `self`'s, preferring
    /// `self`'s value for any field both have populated. Used by the
    /// enricher when it merges a fresh `statx()` call into a request's
    /// already-known fields.
    pub fn merge_preferring_self(&self, other: &StatX) -> StatX {
        let mut merged = *other;
        merged.mask = self.mask | other.mask;
        if self.mask.contains(StatxMask::TYPE) {
            merged.kind = self.kind;
        }
        if self.mask.contains(StatxMask::MODE) {
            merged.mode = self.mode;
        }
        if self.mask.contains(StatxMask::NLINK) {
            merged.nlink = self.nlink;
        }
        if self.mask.contains(StatxMask::UID) {
            merged.uid = self.uid;
        }
        if self.mask.contains(StatxMask::GID) {
            merged.gid = self.gid;
        }
        if self.mask.contains(StatxMask::SIZE) {
            merged.size = self.size;
        }
        if self.mask.contains(StatxMask::BLOCKS) {
            merged.blocks = self.blocks;
        }
        if self.mask.contains(StatxMask::INO) {
            merged.ino = self.ino;
        }
        if self.mask.contains(StatxMask::BLKSIZE) {
            merged.blksize = self.blksize;
        }
        if self.mask.contains(StatxMask::ATIME) {
            merged.atime = self.atime;
        }
        if self.mask.contains(StatxMask::BTIME) {
            merged.btime = self.btime;
        }
        if self.mask.contains(StatxMask::CTIME) {
            merged.ctime = self.ctime;
        }
        if self.mask.contains(StatxMask::MTIME) {
            merged.mtime = self.mtime;
        }
        if self.mask.contains(StatxMask::ATTRIBUTES) {
            merged.attributes = self.attributes;
            merged.attributes_mask = self.attributes_mask;
        }
        if self.mask.contains(StatxMask::DEV) {
            merged.dev = self.dev;
        }
        if self.mask.contains(StatxMask::RDEV) {
            merged.rdev = self.rdev;
        }
        if self.mask.contains(StatxMask::MNT_ID) {
            merged.mount_id = self.mount_id;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_post_epoch() {
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 123_000_000);
        let ts = Timestamp::from_system_time(t);
        assert_eq!(ts.to_system_time(), t);
    }

    #[test]
    fn timestamp_round_trips_pre_epoch() {
        let t = UNIX_EPOCH - Duration::new(100, 0) + Duration::new(0, 500);
        let ts = Timestamp::from_system_time(t);
        assert_eq!(ts.to_system_time(), t);
    }

    #[test]
    fn project_clears_unmasked_fields() {
        let mut full = StatX::empty();
        full.mask = StatxMask::SIZE | StatxMask::UID;
        full.size = 1024;
        full.uid = 42;
        let projected = full.project(StatxMask::SIZE);
        assert_eq!(projected.mask, StatxMask::SIZE);
        assert_eq!(projected.size, 1024);
        assert_eq!(projected.uid, 0);
    }

    #[test]
    fn merge_prefers_self_on_overlap() {
        let mut a = StatX::empty();
        a.mask = StatxMask::SIZE;
        a.size = 10;
        let mut b = StatX::empty();
        b.mask = StatxMask::SIZE | StatxMask::UID;
        b.size = 20;
        b.uid = 7;
        let merged = a.merge_preferring_self(&b);
        assert_eq!(merged.size, 10);
        assert_eq!(merged.uid, 7);
        assert_eq!(merged.mask, StatxMask::SIZE | StatxMask::UID);
    }
}
