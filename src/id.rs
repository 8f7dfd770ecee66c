//! Content-addressed identifiers.
//!
//! An [`Id`] is an opaque byte string (at most 255 bytes) tagged with the
//! backend that minted it. Two ids compare equal iff both the tag and the
//! bytes match. For POSIX sources the bytes are a kernel file handle
//! (usable with `open_by_handle_at`); for S3 they encode `bucket/object`;
//! for the target store they are backend-assigned opaque bytes.

use std::fmt;

use smallvec::SmallVec;

/// Maximum number of bytes an [`Id`] may carry.
pub const MAX_ID_LEN: usize = 255;

/// The backend that minted an [`Id`], used to disambiguate ids coming from
/// different sources that might otherwise collide byte-for-byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum BackendTag {
    /// A POSIX (or Lustre/local) filesystem, id bytes are a kernel file handle.
    Posix = 0,
    /// A parallel filesystem walked through MPI, id bytes are handle- or
    /// path-derived.
    Mpi = 1,
    /// An S3 bucket, id bytes encode `bucket/object`.
    S3 = 2,
    /// The target document store, id bytes are backend-assigned.
    TargetStore = 3,
}

/// An opaque, content-addressed handle.
///
/// `Id` with zero-length bytes denotes "root's parent": the pseudo-parent
/// of the walker's root entry.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Id {
    tag: BackendTag,
    bytes: SmallVec<[u8; 32]>,
}

impl Id {
    /// Build an id, truncating is never performed: an oversized handle is a
    /// programmer error in the producing backend.
    ///
    /// # Panics
    /// Panics if `bytes.len() > MAX_ID_LEN`.
    pub fn new(tag: BackendTag, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        assert!(bytes.len() <= MAX_ID_LEN, "id exceeds {MAX_ID_LEN} bytes");
        Self {
            tag,
            bytes: SmallVec::from_vec(bytes),
        }
    }

    /// The pseudo-root's parent id: zero-length bytes under the given tag.
    pub fn root_parent(tag: BackendTag) -> Self {
        Self {
            tag,
            bytes: SmallVec::new(),
        }
    }

    /// True when this id is the size-0 sentinel (root's parent).
    pub fn is_root_parent(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The backend tag.
    pub fn tag(&self) -> BackendTag {
        self.tag
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:?}, ", self.tag)?;
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(feature = "serializable")]
impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Id", 2)?;
        s.serialize_field("tag", &(self.tag as u8))?;
        s.serialize_field("bytes", &self.bytes.as_slice())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_parent_is_empty() {
        let id = Id::root_parent(BackendTag::Posix);
        assert!(id.is_root_parent());
    }

    #[test]
    fn equality_requires_matching_tag() {
        let a = Id::new(BackendTag::Posix, vec![1, 2, 3]);
        let b = Id::new(BackendTag::Mpi, vec![1, 2, 3]);
        assert_ne!(a, b);
        let c = Id::new(BackendTag::Posix, vec![1, 2, 3]);
        assert_eq!(a, c);
    }

    #[test]
    #[should_panic]
    fn oversized_id_panics() {
        Id::new(BackendTag::Posix, vec![0u8; MAX_ID_LEN + 1]);
    }
}
