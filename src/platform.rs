//! Kernel file-handle plumbing shared by the POSIX walker, the enricher,
//! and the garbage collector: `name_to_handle_at`
//! mints an [`Id`](crate::id::Id)'s bytes, `open_by_handle_at` resolves
//! them back to a live file descriptor.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

/// A `struct file_handle` wide enough for every handle type Linux
/// filesystems hand out in practice.
const MAX_HANDLE_BYTES: usize = 128;

/// Derive a portable id (kernel file handle plus its type tag) for the
/// entry at `path`, relative to `dir`.
///
/// # Errors
/// Propagates `name_to_handle_at`'s errno, notably `EOPNOTSUPP` when the
/// filesystem does not export file handles.
pub fn name_to_handle(dir: BorrowedFd<'_>, path: &Path) -> io::Result<Vec<u8>> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

    #[repr(C)]
    struct RawHandle {
        handle_bytes: libc::c_uint,
        handle_type: libc::c_int,
        f_handle: [u8; MAX_HANDLE_BYTES],
    }

    let mut raw = RawHandle {
        handle_bytes: MAX_HANDLE_BYTES as libc::c_uint,
        handle_type: 0,
        f_handle: [0u8; MAX_HANDLE_BYTES],
    };
    let mut mount_id: libc::c_int = 0;

    // SAFETY: `raw` is sized to hold any handle Linux currently emits;
    // `name_to_handle_at` writes at most `handle_bytes` into `f_handle`
    // and updates `handle_bytes` with the actual length used.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_name_to_handle_at,
            dir.as_raw_fd(),
            c_path.as_ptr(),
            &mut raw as *mut RawHandle as *mut libc::c_void,
            &mut mount_id as *mut libc::c_int,
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let len = raw.handle_bytes as usize;
    let mut encoded = Vec::with_capacity(len + 4);
    encoded.extend_from_slice(&raw.handle_type.to_le_bytes());
    encoded.extend_from_slice(&raw.f_handle[..len]);
    Ok(encoded)
}

/// The outcome of probing an id's liveness with [`open_by_handle_at`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Liveness {
    /// The inode is reachable.
    Alive,
    /// The inode is gone (`ENOENT`/`ESTALE`).
    Absent,
}

/// Re-open the entry encoded by `id_bytes` (as produced by
/// [`name_to_handle`]) under the mount whose root is `mount_fd`.
///
/// Retries once with `O_PATH` if the first attempt fails with `ELOOP`.
pub fn open_by_handle(mount_fd: BorrowedFd<'_>, id_bytes: &[u8]) -> io::Result<OwnedFd> {
    open_by_handle_with_flags(mount_fd, id_bytes, libc::O_NOFOLLOW | libc::O_CLOEXEC)
        .or_else(|err| {
            if err.raw_os_error() == Some(libc::ELOOP) {
                open_by_handle_with_flags(mount_fd, id_bytes, libc::O_PATH | libc::O_CLOEXEC)
            } else {
                Err(err)
            }
        })
}

/// Like [`open_by_handle`] but classifies `ENOENT`/`ESTALE` as
/// [`Liveness::Absent`] instead of an error.
pub fn probe_liveness(mount_fd: BorrowedFd<'_>, id_bytes: &[u8]) -> io::Result<Liveness> {
    match open_by_handle(mount_fd, id_bytes) {
        Ok(_fd) => Ok(Liveness::Alive),
        Err(err)
            if matches!(err.raw_os_error(), Some(libc::ENOENT) | Some(libc::ESTALE)) =>
        {
            Ok(Liveness::Absent)
        }
        Err(err) => Err(err),
    }
}

fn open_by_handle_with_flags(
    mount_fd: BorrowedFd<'_>,
    id_bytes: &[u8],
    flags: libc::c_int,
) -> io::Result<OwnedFd> {
    if id_bytes.len() < 4 {
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }
    let (type_bytes, f_handle) = id_bytes.split_at(4);
    let handle_type = i32::from_le_bytes(type_bytes.try_into().unwrap());

    #[repr(C)]
    struct RawHandle {
        handle_bytes: libc::c_uint,
        handle_type: libc::c_int,
        f_handle: [u8; MAX_HANDLE_BYTES],
    }
    let mut raw = RawHandle {
        handle_bytes: f_handle.len() as libc::c_uint,
        handle_type,
        f_handle: [0u8; MAX_HANDLE_BYTES],
    };
    raw.f_handle[..f_handle.len()].copy_from_slice(f_handle);

    // SAFETY: `raw` was populated from bytes this module itself produced
    // via `name_to_handle`, or is otherwise caller-verified to be a valid
    // encoding.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_open_by_handle_at,
            mount_fd.as_raw_fd(),
            &mut raw as *mut RawHandle as *mut libc::c_void,
            flags,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: a non-negative return from `open_by_handle_at` is a valid,
    // owned file descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(rc as i32) })
}

/// Open `path` as a mount root suitable for [`name_to_handle`] /
/// [`open_by_handle`]'s `dir`/`mount_fd` argument.
pub fn open_mount(path: &Path) -> io::Result<OwnedFd> {
    open(path, OFlag::O_PATH | OFlag::O_DIRECTORY, Mode::empty()).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_mount_rejects_missing_path() {
        let err = open_mount(Path::new("/does/not/exist/at/all")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
