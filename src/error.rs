//! Error taxonomy shared by every backend and pipeline stage.
//!
//! Mirrors the FUSE side's `Errno` convention of classifying failures by
//! kind rather than by call site, widened to six classes: transient
//! source errors, permission errors, filter/validation errors, resource
//! errors, protocol/wire errors from a target store, and end-of-stream.

use std::fmt;
use std::io;

use thiserror::Error;

/// Machine-readable error classification.
///
/// Iterators surface `EndOfStream` as a plain `None` from `next()`; every
/// other variant is returned through the `Result` channel so callers can
/// distinguish "done" from "failed".
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// ESTALE / ENOENT while enriching or probing a live inode: the source
    /// entry disappeared. Per-entry skippable.
    Transient,
    /// EACCES / EPERM. Per-entry skippable.
    Permission,
    /// ENOTSUP / EINVAL from the filter/sort/projection/group parser. Fatal
    /// at parse time.
    Validation,
    /// ENOMEM or similar. Fatal.
    Resource,
    /// A labeled error surfaced by the target store (e.g.
    /// `TransientTransactionError`) that the caller may choose to retry.
    Protocol,
    /// Not a failure: the conventional terminator of an iterator (ENODATA).
    EndOfStream,
    /// A backend, plugin, or extension was asked to do something it does
    /// not support (capability not advertised).
    Unsupported,
}

/// The crate-wide error type.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct RbhError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RbhError {
    /// Build a new error of the given kind with a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error (e.g. the underlying `io::Error`).
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Shorthand for the end-of-stream sentinel.
    pub fn end_of_stream() -> Self {
        Self::new(ErrorKind::EndOfStream, "end of stream")
    }

    /// True when a per-entry iterator should log and continue rather than
    /// abort, given the caller's `skip_on_error` flag.
    pub fn is_skippable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient | ErrorKind::Permission)
    }
}

/// Classify a raw `io::Error` (as produced by a probe syscall) into our
/// taxonomy, following the ESTALE/ENOENT-is-transient convention of the
/// enricher and the garbage collector.
pub fn classify_io_error(err: &io::Error) -> ErrorKind {
    match err.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ESTALE) => ErrorKind::Transient,
        Some(libc::EACCES) | Some(libc::EPERM) => ErrorKind::Permission,
        Some(libc::ENOMEM) => ErrorKind::Resource,
        _ => ErrorKind::Protocol,
    }
}

impl From<io::Error> for RbhError {
    fn from(err: io::Error) -> Self {
        let kind = classify_io_error(&err);
        let message = err.to_string();
        RbhError::new(kind, message).with_source(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RbhError>;

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_classification() {
        let e = io::Error::from_raw_os_error(libc::ESTALE);
        assert_eq!(classify_io_error(&e), ErrorKind::Transient);
        let e = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(classify_io_error(&e), ErrorKind::Permission);
    }

    #[test]
    fn skippable_classes() {
        let e = RbhError::new(ErrorKind::Transient, "gone");
        assert!(e.is_skippable());
        let e = RbhError::new(ErrorKind::Validation, "bad filter");
        assert!(!e.is_skippable());
    }
}
