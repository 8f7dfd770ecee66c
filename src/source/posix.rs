//! The FTS-backed POSIX walker.
//!
//! Depth-first, physical (symlinks are never followed), single-device.
//! Pre-order visits emit an UPSERT (statx + optional symlink target) plus
//! a LINK carrying the entry's `path` namespace xattr; post-order visits
//! of a directory emit an XATTR event setting `nb_children`. Children
//! counters live on an explicit stack pushed on descent and popped on
//! ascent, mirroring how the C walker keeps this on a thread-local stack
//! rather than recursion state.

use std::collections::VecDeque;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use walkdir::{DirEntry, WalkDir};

use crate::attributes::{Attributes, FileType, StatxMask};
use crate::error::{ErrorKind, RbhError, Result};
use crate::fsevent::{FSEvent, XattrOp, XattrPatch};
use crate::id::{BackendTag, Id};
use crate::iter::destroy::Destroy;
use crate::statx::{StatX, Timestamp};
use crate::value::Value;

struct DirFrame {
    id: Id,
    depth: usize,
    nb_children: u64,
}

/// Walks a POSIX directory tree, producing the fsevent stream a
/// synchronizer would feed to a target backend.
pub struct PosixWalker {
    inner: Option<walkdir::IntoIter>,
    root: PathBuf,
    root_id: Option<Id>,
    parent_ids: Vec<(usize, Id)>,
    stack: Vec<DirFrame>,
    pending: VecDeque<Result<FSEvent<'static>>>,
    skip_on_error: bool,
    done: bool,
}

impl PosixWalker {
    /// Walk `root`, never crossing a mount point and never following
    /// symlinks. Entries whose `stat` fails are skipped when
    /// `skip_on_error` is set, otherwise the walk aborts with that entry's
    /// error.
    pub fn new(root: impl Into<PathBuf>, skip_on_error: bool) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .same_file_system(true)
            .into_iter();
        Self {
            inner: Some(inner),
            root,
            root_id: None,
            parent_ids: Vec::new(),
            stack: Vec::new(),
            pending: VecDeque::new(),
            skip_on_error,
            done: false,
        }
    }

    fn parent_id_for(&self, depth: usize) -> Id {
        if depth == 0 {
            Id::root_parent(BackendTag::Posix)
        } else {
            self.parent_ids
                .iter()
                .rev()
                .find(|(d, _)| *d == depth - 1)
                .map(|(_, id)| id.clone())
                .unwrap_or_else(|| Id::root_parent(BackendTag::Posix))
        }
    }

    /// Pop every stack frame whose depth is `>= depth`, emitting the
    /// `nb_children` XATTR event for each as it closes.
    fn close_frames_deeper_than_or_equal(&mut self, depth: usize) {
        while let Some(frame) = self.stack.last() {
            if frame.depth < depth {
                break;
            }
            let frame = self.stack.pop().expect("just peeked");
            let mut patch = XattrPatch::new();
            patch.push("nb_children", XattrOp::Set(Value::UInt64(frame.nb_children)));
            self.pending.push_back(Ok(FSEvent::Xattr {
                id: frame.id,
                xattrs: patch,
                namespace: None,
            }));
            self.parent_ids.retain(|(d, _)| *d != frame.depth);
        }
    }

    fn bump_parent_child_count(&mut self, depth: usize) {
        if let Some(frame) = self
            .stack
            .iter_mut()
            .rev()
            .find(|f| f.depth == depth.saturating_sub(1))
        {
            frame.nb_children += 1;
        }
    }

    fn visit(&mut self, entry: DirEntry) -> std::result::Result<(), RbhError> {
        let depth = entry.depth();
        self.close_frames_deeper_than_or_equal(depth);

        let metadata = entry.metadata().map_err(|e| {
            RbhError::from(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walkdir entry error")
            }))
        })?;

        let is_root = depth == 0;
        let id = if is_root {
            let id = Id::new(BackendTag::Posix, encode_dev_ino(&metadata));
            self.root_id = Some(id.clone());
            id
        } else {
            Id::new(BackendTag::Posix, encode_dev_ino(&metadata))
        };

        let parent_id = self.parent_id_for(depth);
        if !is_root {
            self.bump_parent_child_count(depth);
        }

        let kind = FileType::from_std(metadata.file_type());
        let statx = build_statx(&metadata, kind);
        let symlink = if kind == Some(FileType::Symlink) {
            std::fs::read_link(entry.path()).ok().and_then(|p| {
                p.to_str().map(str::to_string)
            })
        } else {
            None
        };

        self.pending.push_back(Ok(FSEvent::Upsert {
            id: id.clone(),
            statx: Some(statx),
            symlink,
            inode_xattrs: None,
        }));

        let name = if is_root {
            String::new()
        } else {
            entry.file_name().to_string_lossy().into_owned()
        };
        let path = entry.path().to_string_lossy().into_owned();
        let mut namespace_xattrs = XattrPatch::new();
        namespace_xattrs.push("path", XattrOp::Set(Value::String(path.into())));
        self.pending.push_back(Ok(FSEvent::Link {
            id: id.clone(),
            parent_id,
            name,
            namespace_xattrs: Some(namespace_xattrs),
        }));

        if kind == Some(FileType::Directory) {
            self.parent_ids.push((depth, id.clone()));
            self.stack.push(DirFrame {
                id,
                depth,
                nb_children: 0,
            });
        }
        Ok(())
    }

    /// The root's id, once the walk has visited it.
    pub fn root_id(&self) -> Option<&Id> {
        self.root_id.as_ref()
    }
}

fn encode_dev_ino(metadata: &std::fs::Metadata) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&metadata.dev().to_le_bytes());
    bytes.extend_from_slice(&metadata.ino().to_le_bytes());
    bytes
}

fn build_statx(metadata: &std::fs::Metadata, kind: Option<FileType>) -> StatX {
    let mut mask = StatxMask::MODE
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
        | StatxMask::DEV;
    if kind.is_some() {
        mask |= StatxMask::TYPE;
    }
    StatX {
        mask,
        kind,
        mode: (metadata.mode() & 0o7777) as u16,
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        size: metadata.size(),
        blocks: metadata.blocks(),
        ino: metadata.ino(),
        blksize: metadata.blksize() as u32,
        atime: Timestamp::from_system_time(
            metadata.accessed().unwrap_or(std::time::UNIX_EPOCH),
        ),
        btime: Timestamp::default(),
        ctime: Timestamp {
            sec: metadata.ctime(),
            nsec: metadata.ctime_nsec() as u32,
        },
        mtime: Timestamp::from_system_time(
            metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
        ),
        attributes: Attributes::empty(),
        attributes_mask: Attributes::empty(),
        dev: crate::attributes::DeviceId::from_raw(metadata.dev()),
        rdev: crate::attributes::DeviceId::from_raw(metadata.rdev()),
        mount_id: 0,
    }
}

impl Iterator for PosixWalker {
    type Item = Result<FSEvent<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            let Some(inner) = self.inner.as_mut() else {
                self.done = true;
                return None;
            };
            match inner.next() {
                Some(Ok(entry)) => {
                    if let Err(err) = self.visit(entry) {
                        if self.skip_on_error {
                            log::warn!("skipping entry under {:?}: {err}", self.root);
                            continue;
                        }
                        self.done = true;
                        return Some(Err(err));
                    }
                }
                Some(Err(walk_err)) => {
                    let err = RbhError::new(ErrorKind::Transient, walk_err.to_string());
                    if self.skip_on_error {
                        log::warn!("walk error under {:?}: {err}", self.root);
                        continue;
                    }
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.close_frames_deeper_than_or_equal(0);
                    self.done = true;
                    continue;
                }
            }
        }
    }
}

impl Destroy for PosixWalker {
    fn destroy(&mut self) {
        self.inner = None;
        self.pending.clear();
        self.stack.clear();
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_a_small_tree_pre_and_post_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1234").unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b").join("c"), b"").unwrap();

        let walker = PosixWalker::new(dir.path(), false);
        let events: Vec<_> = walker.collect::<Result<Vec<_>>>().unwrap();

        let upserts = events
            .iter()
            .filter(|e| matches!(e, FSEvent::Upsert { .. }))
            .count();
        assert_eq!(upserts, 4); // root, a, b, c

        let root_nb_children = events.iter().find_map(|e| match e {
            FSEvent::Xattr {
                xattrs, ..
            } if xattrs.iter().any(|(k, _)| k == "nb_children") => {
                xattrs.iter().find(|(k, _)| *k == "nb_children").map(|(_, op)| op.clone())
            }
            _ => None,
        });
        assert!(root_nb_children.is_some());
    }

    #[test]
    fn destroy_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();
        let mut walker = PosixWalker::new(dir.path(), false);
        walker.next();
        walker.destroy();
        assert!(walker.next().is_none());
    }
}
