//! The retention extension: materializes a `trusted.expiration_date`
//! inode xattr from a configurable "expires" xattr.
//!
//! The xattr key (`xattr_expires_key`, defaulting to `user.expires`) is
//! a field on the extension value, set once at construction, rather than
//! a process-global cached in a thread-local.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::Extension;
use crate::error::Result;
use crate::filter::{Comparand, Field, Filter, Op};
use crate::fsentry::FSEntry;
use crate::id::Id;
use crate::value::Value;

/// Default xattr key holding a file's expiration, absent explicit
/// configuration.
pub const DEFAULT_EXPIRES_KEY: &str = "user.expires";

/// The xattr key the enricher materializes the resolved expiration
/// date under.
pub const EXPIRATION_DATE_KEY: &str = "trusted.expiration_date";

/// Resolves retention-related predicates and fills in `trusted.expiration_date`.
pub struct RetentionExtension {
    expires_key: String,
}

impl RetentionExtension {
    /// Use the default `user.expires` xattr key.
    pub fn new() -> Self {
        Self::with_expires_key(DEFAULT_EXPIRES_KEY)
    }

    /// Use a caller-configured xattr key instead of the default.
    pub fn with_expires_key(key: impl Into<String>) -> Self {
        Self {
            expires_key: key.into(),
        }
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Parse a raw `expires` xattr value into an expiration timestamp.
    /// `"inf"` (case-insensitive) never expires; anything else must be a
    /// base-10 seconds-since-epoch string. Malformed values resolve to
    /// `None` rather than erroring, tolerating entries that cannot be
    /// fully enriched.
    fn parse_expiration(raw: &str) -> Option<i64> {
        if raw.eq_ignore_ascii_case("inf") {
            Some(i64::MAX)
        } else {
            raw.trim().parse::<i64>().ok()
        }
    }
}

impl Default for RetentionExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for RetentionExtension {
    fn check_valid_token(&self, token: &str) -> bool {
        matches!(token, "-expired" | "-expired-at")
    }

    fn build_filter(&self, token: &str, argument: &str) -> Result<Filter<'static>> {
        let field = Field::InodeXattr(Some(EXPIRATION_DATE_KEY.to_string()));
        let threshold = match token {
            "-expired" => Self::now_secs(),
            "-expired-at" => argument.trim().parse::<i64>().map_err(|_| {
                crate::error::RbhError::new(
                    crate::error::ErrorKind::Validation,
                    format!("-expired-at expects an integer timestamp, got {argument:?}"),
                )
            })?,
            other => {
                return Err(crate::error::RbhError::new(
                    crate::error::ErrorKind::Unsupported,
                    format!("retention extension does not handle {other:?}"),
                ))
            }
        };
        Ok(Filter::Comparison {
            field,
            op: Op::StrictlyLower,
            value: Some(Comparand::Literal(Value::Int64(threshold))),
        })
    }

    fn fill_entry_info(&self, entry: &mut FSEntry<'_>) -> Result<()> {
        let Some(Value::String(raw)) = entry.inode_xattrs.get(&self.expires_key) else {
            return Ok(());
        };
        let Some(expiration) = Self::parse_expiration(raw) else {
            return Ok(());
        };
        entry
            .inode_xattrs
            .insert(EXPIRATION_DATE_KEY.to_string().into(), Value::Int64(expiration));
        Ok(())
    }

    fn delete_entry(&self, _id: &Id) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueMap;

    fn entry_with_expires(raw: &str) -> FSEntry<'static> {
        let mut entry = FSEntry::id_only(Id::new(crate::id::BackendTag::Posix, vec![1]));
        entry.inode_xattrs = ValueMap::from_pairs(vec![crate::value::ValuePair {
            key: "user.expires".into(),
            value: Value::String(raw.to_string().into()),
        }]);
        entry
    }

    #[test]
    fn fills_expiration_date_from_numeric_expires() {
        let ext = RetentionExtension::new();
        let mut entry = entry_with_expires("1700000000");
        ext.fill_entry_info(&mut entry).unwrap();
        assert_eq!(
            entry.inode_xattrs.get(EXPIRATION_DATE_KEY),
            Some(&Value::Int64(1700000000))
        );
    }

    #[test]
    fn inf_never_expires() {
        let ext = RetentionExtension::new();
        let mut entry = entry_with_expires("Inf");
        ext.fill_entry_info(&mut entry).unwrap();
        assert_eq!(
            entry.inode_xattrs.get(EXPIRATION_DATE_KEY),
            Some(&Value::Int64(i64::MAX))
        );
    }

    #[test]
    fn missing_expires_xattr_is_a_no_op() {
        let ext = RetentionExtension::new();
        let mut entry = FSEntry::id_only(Id::new(crate::id::BackendTag::Posix, vec![1]));
        ext.fill_entry_info(&mut entry).unwrap();
        assert!(entry.inode_xattrs.get(EXPIRATION_DATE_KEY).is_none());
    }

    #[test]
    fn expired_at_rejects_non_integer_argument() {
        let ext = RetentionExtension::new();
        assert!(ext.build_filter("-expired-at", "not-a-number").is_err());
    }
}
