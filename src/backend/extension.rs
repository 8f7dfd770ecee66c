//! Backend extensions.
//!
//! Extensions provide the *common operations* used by the find/report
//! drivers ([`rbh-tools`](../../../rbh-tools)): token validation, filter
//! construction from a CLI predicate, entry-info fill-in, and entry
//! deletion. A concrete instance is e.g. the Lustre extension
//! ([`crate::enrich::extensions::lustre`]) or the retention extension
//! ([`crate::enrich::extensions::retention`]).

use std::collections::HashMap;

use crate::backend::plugin::{ExtensionKey, Version, VersionRange};
use crate::error::Result;
use crate::filter::Filter;
use crate::fsentry::FSEntry;
use crate::id::Id;

/// The common operations an extension contributes.
pub trait Extension: Send + Sync {
    /// Whether `token` (a find-style predicate keyword, e.g. `-lhsm-state`)
    /// is one this extension understands.
    fn check_valid_token(&self, token: &str) -> bool;

    /// Build a filter node from a parsed CLI predicate's token and
    /// argument.
    fn build_filter(&self, token: &str, argument: &str) -> Result<Filter<'static>>;

    /// Fill in any extension-specific fields of `entry` that the backend
    /// itself does not populate (e.g. a Lustre FID string).
    fn fill_entry_info(&self, entry: &mut FSEntry<'_>) -> Result<()>;

    /// Perform any extension-specific cleanup needed before deleting an
    /// entry outright (e.g. releasing a retention hold).
    fn delete_entry(&self, id: &Id) -> Result<()>;
}

/// Holds every extension registered for a process, keyed the way the
/// spec requires, and resolves them against a super-plugin's version.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<ExtensionKey, (VersionRange, Box<dyn Extension>)>,
}

impl ExtensionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            extensions: HashMap::new(),
        }
    }

    /// Register an extension under `(super_name, extension_name)`,
    /// applicable while the super-plugin's version is within `range`.
    pub fn register(
        &mut self,
        super_name: impl Into<String>,
        extension_name: impl Into<String>,
        range: VersionRange,
        extension: Box<dyn Extension>,
    ) {
        let key = ExtensionKey {
            super_name: super_name.into(),
            extension_name: extension_name.into(),
        };
        self.extensions.insert(key, (range, extension));
    }

    /// Every extension registered for `super_name` whose version range
    /// accepts `super_version`.
    pub fn applicable(
        &self,
        super_name: &str,
        super_version: Version,
    ) -> impl Iterator<Item = &dyn Extension> {
        self.extensions.iter().filter_map(move |(key, (range, ext))| {
            (key.super_name == super_name && range.accepts(super_version)).then_some(ext.as_ref())
        })
    }

    /// Dispatch an unrecognized xattr request key to the first applicable
    /// extension that claims the token.
    pub fn find_handler(
        &self,
        super_name: &str,
        super_version: Version,
        token: &str,
    ) -> Option<&dyn Extension> {
        self.applicable(super_name, super_version)
            .find(|ext| ext.check_valid_token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;
    impl Extension for Stub {
        fn check_valid_token(&self, token: &str) -> bool {
            token == "stub"
        }
        fn build_filter(&self, _token: &str, _argument: &str) -> Result<Filter<'static>> {
            Ok(Filter::All)
        }
        fn fill_entry_info(&self, _entry: &mut FSEntry<'_>) -> Result<()> {
            Ok(())
        }
        fn delete_entry(&self, _id: &Id) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn version_out_of_range_is_not_applicable() {
        let mut reg = ExtensionRegistry::new();
        let range = VersionRange {
            min: Version::new(1, 0, 0),
            max: Version::new(1, 9, 9),
        };
        reg.register("posix", "stub", range, Box::new(Stub));
        assert!(reg
            .find_handler("posix", Version::new(2, 0, 0), "stub")
            .is_none());
        assert!(reg
            .find_handler("posix", Version::new(1, 5, 0), "stub")
            .is_some());
    }

    #[test]
    fn unclaimed_token_finds_no_handler() {
        let mut reg = ExtensionRegistry::new();
        let range = VersionRange {
            min: Version::new(1, 0, 0),
            max: Version::new(9, 0, 0),
        };
        reg.register("posix", "stub", range, Box::new(Stub));
        assert!(reg
            .find_handler("posix", Version::new(1, 0, 0), "other")
            .is_none());
    }
}
