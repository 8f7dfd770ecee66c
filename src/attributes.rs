//! File-kind and attribute flag types: small `bitflags!` newtypes, one
//! per concern, rather than a single grab-bag integer.

use bitflags::bitflags;

/// Kind of filesystem entry (the `type` field of a `StatX` record).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// `S_IFIFO`
    NamedPipe,
    /// `S_IFCHR`
    CharDevice,
    /// `S_IFBLK`
    BlockDevice,
    /// `S_IFDIR`
    Directory,
    /// `S_IFREG`
    RegularFile,
    /// `S_IFLNK`
    Symlink,
    /// `S_IFSOCK`
    Socket,
}

impl FileType {
    /// Convert a `std::fs::FileType` into ours.
    pub fn from_std(file_type: std::fs::FileType) -> Option<Self> {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_file() {
            Some(FileType::RegularFile)
        } else if file_type.is_dir() {
            Some(FileType::Directory)
        } else if file_type.is_symlink() {
            Some(FileType::Symlink)
        } else if file_type.is_fifo() {
            Some(FileType::NamedPipe)
        } else if file_type.is_socket() {
            Some(FileType::Socket)
        } else if file_type.is_char_device() {
            Some(FileType::CharDevice)
        } else if file_type.is_block_device() {
            Some(FileType::BlockDevice)
        } else {
            None
        }
    }

    /// The POSIX `S_IF*` mode bits for this kind, for building a `mode_t`.
    pub fn mode_bits(self) -> u32 {
        match self {
            FileType::NamedPipe => libc::S_IFIFO,
            FileType::CharDevice => libc::S_IFCHR,
            FileType::BlockDevice => libc::S_IFBLK,
            FileType::Directory => libc::S_IFDIR,
            FileType::RegularFile => libc::S_IFREG,
            FileType::Symlink => libc::S_IFLNK,
            FileType::Socket => libc::S_IFSOCK,
        }
    }
}

bitflags! {
    /// Which fields of a [`StatX`](crate::statx::StatX) record are
    /// populated. Absent fields must never be silently zeroed in the
    /// target store.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
    pub struct StatxMask: u32 {
        /// `type`
        const TYPE = 1 << 0;
        /// `mode`
        const MODE = 1 << 1;
        /// `nlink`
        const NLINK = 1 << 2;
        /// `uid`
        const UID = 1 << 3;
        /// `gid`
        const GID = 1 << 4;
        /// `size`
        const SIZE = 1 << 5;
        /// `blocks`
        const BLOCKS = 1 << 6;
        /// `ino`
        const INO = 1 << 7;
        /// `blksize`
        const BLKSIZE = 1 << 8;
        /// `atime`
        const ATIME = 1 << 9;
        /// `btime`
        const BTIME = 1 << 10;
        /// `ctime`
        const CTIME = 1 << 11;
        /// `mtime`
        const MTIME = 1 << 12;
        /// `attributes`
        const ATTRIBUTES = 1 << 13;
        /// `dev` (device the entry lives on)
        const DEV = 1 << 14;
        /// `rdev` (device the entry represents, for special files)
        const RDEV = 1 << 15;
        /// `mount_id`
        const MNT_ID = 1 << 16;
    }
}

bitflags! {
    /// `statx` file attribute bits.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
    pub struct Attributes: u64 {
        /// File is compressed by the filesystem.
        const COMPRESSED = 1 << 0;
        /// File cannot be modified, renamed, or deleted.
        const IMMUTABLE = 1 << 1;
        /// File can only be appended to.
        const APPEND = 1 << 2;
        /// File is not a candidate for backup.
        const NODUMP = 1 << 3;
        /// File requires a key to be decrypted for reading.
        const ENCRYPTED = 1 << 4;
        /// Directory is an automount trigger.
        const AUTOMOUNT = 1 << 5;
        /// Root of a mount.
        const MOUNT_ROOT = 1 << 6;
        /// File has fs-verity enabled.
        const VERITY = 1 << 7;
        /// File is in the DAX (cpu direct access) state.
        const DAX = 1 << 8;
    }
}

/// A `(major, minor)` device number pair.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId {
    /// The major device number.
    pub major: u32,
    /// The minor device number.
    pub minor: u32,
}

impl DeviceId {
    /// Decode a raw `dev_t` into major/minor, following glibc's encoding.
    pub fn from_raw(dev: u64) -> Self {
        Self {
            major: unsafe { libc::major(dev) as u32 },
            minor: unsafe { libc::minor(dev) as u32 },
        }
    }

    /// Re-encode into a raw `dev_t`.
    pub fn to_raw(self) -> u64 {
        unsafe { libc::makedev(self.major, self.minor) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_round_trips() {
        let dev = DeviceId {
            major: 8,
            minor: 1,
        };
        assert_eq!(DeviceId::from_raw(dev.to_raw()), dev);
    }

    #[test]
    fn mask_bits_are_disjoint() {
        assert_eq!(StatxMask::TYPE.bits() & StatxMask::MODE.bits(), 0);
    }
}
