//! The Lustre extension: FID-based path resolution and HSM-state
//! predicates.
//!
//! There is no vendored `liblustreapi` binding in this dependency stack
//! — building one means linking against a kernel client that is not
//! present outside a real Lustre mount. `LustreExtension` therefore
//! claims the tokens it is responsible for (so `rbh-find` reports a
//! clear "unsupported" error instead of "unknown predicate") but every
//! operation fails with [`ErrorKind::Unsupported`]. See `DESIGN.md` for
//! the Open Question this resolves.

use crate::backend::Extension;
use crate::error::{ErrorKind, RbhError, Result};
use crate::filter::Filter;
use crate::fsentry::FSEntry;
use crate::id::Id;

/// Claims Lustre-specific predicate tokens without a working
/// implementation behind them.
#[derive(Default)]
pub struct LustreExtension;

impl LustreExtension {
    /// A fresh, unconditionally-unsupported Lustre extension.
    pub fn new() -> Self {
        Self
    }

    fn unsupported(op: &'static str) -> RbhError {
        RbhError::new(
            ErrorKind::Unsupported,
            format!("lustre extension: {op} requires a Lustre mount, none available"),
        )
    }
}

impl Extension for LustreExtension {
    fn check_valid_token(&self, token: &str) -> bool {
        matches!(token, "-fid" | "-hsm-state")
    }

    fn build_filter(&self, _token: &str, _argument: &str) -> Result<Filter<'static>> {
        Err(Self::unsupported("build_filter"))
    }

    fn fill_entry_info(&self, _entry: &mut FSEntry<'_>) -> Result<()> {
        Err(Self::unsupported("fill_entry_info"))
    }

    fn delete_entry(&self, _id: &Id) -> Result<()> {
        Err(Self::unsupported("delete_entry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_its_tokens_but_cannot_serve_them() {
        let ext = LustreExtension::new();
        assert!(ext.check_valid_token("-fid"));
        assert!(!ext.check_valid_token("-expired"));
        assert!(ext.build_filter("-fid", "").is_err());
    }
}
