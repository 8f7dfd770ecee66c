//! Enrichment requests: resolving a reserved `rbh-fsevents` xattr
//! request against a live filesystem entry reached through its id.
//!
//! An [`Enricher`] owns an open mount fd (the same handle-based
//! indirection [`crate::platform`] uses for garbage collection) and an
//! [`ExtensionRegistry`] for dispatching anything it does not handle
//! itself. Built-in request kinds — `statx`, `symlink`, `xattrs` — are
//! served directly from the open fd; `path`, `lustre` and `retention`
//! are reserved for extensions since they need filesystem-specific or
//! policy-specific logic this crate cannot provide in general.

use std::borrow::Cow;
use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::path::Path;

use crate::attributes::{Attributes, FileType, StatxMask};
use crate::backend::plugin::Version;
use crate::backend::ExtensionRegistry;
use crate::error::{classify_io_error, ErrorKind, RbhError, Result};
use crate::fsentry::FSEntry;
use crate::fsevent::{FSEvent, XattrOp, XattrPatch};
use crate::id::Id;
use crate::platform;
use crate::statx::{StatX, Timestamp};
use crate::value::Value;

/// The reserved enrichment request kinds a partial fsevent may carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrichRequest {
    /// Fill in (a subset of) the entry's statx fields.
    Statx(StatxMask),
    /// Fill in the symlink target.
    Symlink,
    /// Fill in one or more named inode xattrs.
    Xattrs(Vec<String>),
    /// Translate an id into a pathname (Lustre-only: needs `fid2path`).
    Path,
    /// Any other Lustre-specific directive (HSM state, FID, ...).
    Lustre,
    /// Materialize the retention extension's derived fields.
    Retention,
}

impl EnrichRequest {
    /// The reserved extension token a `path`/`lustre`/`retention`
    /// request dispatches to.
    fn extension_token(&self) -> Option<&'static str> {
        match self {
            EnrichRequest::Path => Some("path"),
            EnrichRequest::Lustre => Some("lustre"),
            EnrichRequest::Retention => Some("retention"),
            _ => None,
        }
    }
}

/// Resolves enrichment requests against a mounted filesystem.
pub struct Enricher {
    mount_fd: OwnedFd,
    extensions: ExtensionRegistry,
    super_name: String,
    super_version: Version,
}

impl Enricher {
    /// Open `mount_root` and build an enricher with no extensions
    /// registered yet.
    pub fn open(
        mount_root: &Path,
        super_name: impl Into<String>,
        super_version: Version,
    ) -> io::Result<Self> {
        Ok(Self {
            mount_fd: platform::open_mount(mount_root)?,
            extensions: ExtensionRegistry::new(),
            super_name: super_name.into(),
            super_version,
        })
    }

    /// The extension registry extensions register into before the
    /// enricher resolves any `path`/`lustre`/`retention` request.
    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Resolve `request` for `id`, returning the fsevent that carries
    /// the newly-discovered information. `original` is the partial
    /// entry the request came attached to — extensions may read it
    /// (e.g. to find the raw `user.expires` value already present) and
    /// are handed an owned copy they can freely mutate.
    pub fn resolve(
        &self,
        id: &Id,
        request: &EnrichRequest,
        original: &FSEntry<'static>,
    ) -> Result<FSEvent<'static>> {
        if let Some(token) = request.extension_token() {
            return self.resolve_via_extension(id, token, original);
        }

        let handle = open_entry(self.mount_fd.as_fd(), id)?;
        match request {
            EnrichRequest::Statx(mask) => {
                let statx = read_statx(handle.as_fd(), *mask)?;
                Ok(FSEvent::Upsert {
                    id: id.clone(),
                    statx: Some(statx),
                    symlink: None,
                    inode_xattrs: None,
                })
            }
            EnrichRequest::Symlink => {
                let target = read_symlink(handle.as_fd())?;
                Ok(FSEvent::Upsert {
                    id: id.clone(),
                    statx: None,
                    symlink: Some(target),
                    inode_xattrs: None,
                })
            }
            EnrichRequest::Xattrs(keys) => {
                let mut patch = XattrPatch::new();
                for key in keys {
                    match read_xattr(handle.as_fd(), key)? {
                        Some(value) => patch.push(key.clone(), XattrOp::Set(value)),
                        None => patch.push(key.clone(), XattrOp::Unset),
                    }
                }
                Ok(FSEvent::Xattr {
                    id: id.clone(),
                    xattrs: patch,
                    namespace: None,
                })
            }
            EnrichRequest::Path | EnrichRequest::Lustre | EnrichRequest::Retention => {
                unreachable!("handled by resolve_via_extension above")
            }
        }
    }

    fn resolve_via_extension(
        &self,
        id: &Id,
        token: &str,
        original: &FSEntry<'static>,
    ) -> Result<FSEvent<'static>> {
        let extension = self
            .extensions
            .find_handler(&self.super_name, self.super_version, token)
            .ok_or_else(|| {
                RbhError::new(
                    ErrorKind::Unsupported,
                    format!("no extension claims the {token:?} enrichment request"),
                )
            })?;

        let mut entry = original.clone();
        extension.fill_entry_info(&mut entry)?;

        Ok(FSEvent::Xattr {
            id: id.clone(),
            xattrs: {
                let mut patch = XattrPatch::new();
                for pair in entry.inode_xattrs.iter() {
                    patch.push(pair.key.to_string(), XattrOp::Set(pair.value.clone()));
                }
                patch
            },
            namespace: None,
        })
    }
}

/// Open the filesystem object identified by `id` through the mount,
/// retrying through `O_PATH` on `ELOOP` the same way [`platform`] does.
fn open_entry(mount_fd: BorrowedFd<'_>, id: &Id) -> Result<OwnedFd> {
    platform::open_by_handle(mount_fd, id.as_bytes()).map_err(|err| {
        RbhError::new(classify_io_error(&err), format!("opening entry by handle: {err}"))
            .with_source(err)
    })
}

fn read_statx(fd: BorrowedFd<'_>, mask: StatxMask) -> Result<StatX> {
    let stat = fstat_raw(fd)?;
    let kind = mode_to_file_type(stat.st_mode);

    let mut statx = StatX {
        mask: StatxMask::empty(),
        kind,
        mode: (stat.st_mode & 0o7777) as u16,
        nlink: stat.st_nlink as u32,
        uid: stat.st_uid,
        gid: stat.st_gid,
        size: stat.st_size as u64,
        blocks: stat.st_blocks as u64,
        ino: stat.st_ino,
        blksize: stat.st_blksize as u32,
        atime: Timestamp {
            sec: stat.st_atime,
            nsec: stat.st_atime_nsec as u32,
        },
        btime: Timestamp::default(),
        ctime: Timestamp {
            sec: stat.st_ctime,
            nsec: stat.st_ctime_nsec as u32,
        },
        mtime: Timestamp {
            sec: stat.st_mtime,
            nsec: stat.st_mtime_nsec as u32,
        },
        attributes: Attributes::empty(),
        attributes_mask: Attributes::empty(),
        dev: crate::attributes::DeviceId::from_raw(stat.st_dev),
        rdev: crate::attributes::DeviceId::from_raw(stat.st_rdev),
        mount_id: 0,
    };
    statx.mask = StatxMask::TYPE
        | StatxMask::MODE
        | StatxMask::NLINK
        | StatxMask::UID
        | StatxMask::GID
        | StatxMask::SIZE
        | StatxMask::BLOCKS
        | StatxMask::INO
        | StatxMask::BLKSIZE
        | StatxMask::ATIME
        | StatxMask::CTIME
        | StatxMask::MTIME
        | StatxMask::DEV
        | StatxMask::RDEV;
    Ok(statx.project(mask))
}

fn fstat_raw(fd: BorrowedFd<'_>) -> Result<libc::stat> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::zeroed();
    let ret = unsafe { libc::fstat(fd.as_raw_fd(), stat.as_mut_ptr()) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        return Err(RbhError::new(classify_io_error(&err), format!("fstat: {err}")).with_source(err));
    }
    Ok(unsafe { stat.assume_init() })
}

fn mode_to_file_type(mode: libc::mode_t) -> Option<FileType> {
    match mode as u32 & libc::S_IFMT {
        libc::S_IFIFO => Some(FileType::NamedPipe),
        libc::S_IFCHR => Some(FileType::CharDevice),
        libc::S_IFBLK => Some(FileType::BlockDevice),
        libc::S_IFDIR => Some(FileType::Directory),
        libc::S_IFREG => Some(FileType::RegularFile),
        libc::S_IFLNK => Some(FileType::Symlink),
        libc::S_IFSOCK => Some(FileType::Socket),
        _ => None,
    }
}

/// Maximum symlink target length this crate reads back.
const MAX_SYMLINK_LEN: usize = 64 * 1024;

fn read_symlink(fd: BorrowedFd<'_>) -> Result<String> {
    // The handle-opened fd (possibly `O_PATH`, per the `ELOOP` retry in
    // [`platform::open_by_handle`]) is reachable through its procfs
    // magic symlink regardless of how it was opened; that is what lets
    // us call `readlink` on it at all.
    let proc_path = format!("/proc/self/fd/{}", fd.as_raw_fd());
    let target = std::fs::read_link(&proc_path)
        .map_err(|err| RbhError::new(classify_io_error(&err), format!("readlink: {err}")).with_source(err))?;
    let mut target = target.to_string_lossy().into_owned();
    if target.len() > MAX_SYMLINK_LEN {
        let mut boundary = MAX_SYMLINK_LEN;
        while !target.is_char_boundary(boundary) {
            boundary -= 1;
        }
        target.truncate(boundary);
    }
    Ok(target)
}

const MAX_XATTR_LEN: usize = 64 * 1024;

fn read_xattr(fd: BorrowedFd<'_>, key: &str) -> Result<Option<Value<'static>>> {
    let name = CString::new(key)
        .map_err(|_| RbhError::new(ErrorKind::Validation, format!("xattr key {key:?} contains a NUL byte")))?;
    let mut buf = vec![0u8; MAX_XATTR_LEN];
    let ret = unsafe {
        libc::fgetxattr(
            fd.as_raw_fd(),
            name.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::ENODATA) => Ok(None),
            _ => Err(RbhError::new(classify_io_error(&err), format!("fgetxattr({key:?}): {err}"))
                .with_source(err)),
        };
    }
    buf.truncate(ret as usize);
    Ok(Some(Value::String(Cow::Owned(
        String::from_utf8_lossy(&buf).into_owned(),
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_token_only_covers_reserved_kinds() {
        assert_eq!(EnrichRequest::Path.extension_token(), Some("path"));
        assert_eq!(EnrichRequest::Lustre.extension_token(), Some("lustre"));
        assert_eq!(EnrichRequest::Retention.extension_token(), Some("retention"));
        assert_eq!(EnrichRequest::Symlink.extension_token(), None);
    }

    #[test]
    fn resolving_without_a_registered_extension_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let enricher = Enricher::open(tmp.path(), "posix", Version::new(4, 0, 0)).unwrap();
        let id = Id::new(crate::id::BackendTag::Posix, vec![1, 2, 3]);
        let entry = FSEntry::id_only(id.clone());
        let err = enricher
            .resolve(&id, &EnrichRequest::Retention, &entry)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
