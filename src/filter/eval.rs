//! Reference (non-pushed-down) evaluation of a [`Filter`](super::ast::Filter)
//! against an [`FSEntry`](crate::fsentry::FSEntry).
//!
//! Real backends translate the AST into their own query language instead of
//! calling this for every entry; this module exists so the in-memory target
//! backend and tests have a correct, independent oracle to check pushdown
//! translations against.

use crate::attributes::StatxMask;
use crate::filter::ast::{Comparand, Filter};
use crate::filter::field::Field;
use crate::filter::ops::Op;
use crate::fsentry::FSEntry;
use crate::value::Value;

/// Read `field`'s value out of `entry`, the same extraction
/// [`comparison`] uses. Exposed crate-wide so the in-memory target
/// backend's sort/group stages can order and bucket entries without
/// duplicating field lookup.
pub(crate) fn extract<'e, 'a>(field: &Field, entry: &'e FSEntry<'a>) -> Option<Value<'e>>
where
    'a: 'e,
{
    match field {
        Field::Id => Some(Value::Binary(crate::container::Container::from(
            entry.id.as_bytes().to_vec(),
        ))),
        Field::ParentId => entry.parent_id.as_ref().map(|id| {
            Value::Binary(crate::container::Container::from(id.as_bytes().to_vec()))
        }),
        Field::Name => entry
            .name
            .as_deref()
            .map(|n| Value::String(std::borrow::Cow::Borrowed(n))),
        Field::Symlink => entry
            .symlink
            .as_deref()
            .map(|s| Value::String(std::borrow::Cow::Borrowed(s))),
        Field::Statx(mask) => extract_statx(*mask, entry),
        Field::NamespaceXattr(Some(key)) => entry.namespace_xattrs.get(key).cloned(),
        Field::NamespaceXattr(None) => {
            (!entry.namespace_xattrs.is_empty()).then(|| Value::Map(entry.namespace_xattrs.clone()))
        }
        Field::InodeXattr(Some(key)) => entry.inode_xattrs.get(key).cloned(),
        Field::InodeXattr(None) => {
            (!entry.inode_xattrs.is_empty()).then(|| Value::Map(entry.inode_xattrs.clone()))
        }
    }
}

fn extract_statx<'e>(mask: StatxMask, entry: &'e FSEntry<'_>) -> Option<Value<'e>> {
    let statx = entry.statx.as_ref()?;
    if !statx.mask.contains(mask) {
        return None;
    }
    Some(match mask {
        StatxMask::TYPE => Value::UInt32(statx.kind? as u32),
        StatxMask::MODE => Value::UInt32(statx.mode as u32),
        StatxMask::NLINK => Value::UInt32(statx.nlink),
        StatxMask::UID => Value::UInt32(statx.uid),
        StatxMask::GID => Value::UInt32(statx.gid),
        StatxMask::SIZE => Value::UInt64(statx.size),
        StatxMask::BLOCKS => Value::UInt64(statx.blocks),
        StatxMask::INO => Value::UInt64(statx.ino),
        StatxMask::BLKSIZE => Value::UInt32(statx.blksize),
        StatxMask::ATIME => Value::Int64(statx.atime.sec),
        StatxMask::BTIME => Value::Int64(statx.btime.sec),
        StatxMask::CTIME => Value::Int64(statx.ctime.sec),
        StatxMask::MTIME => Value::Int64(statx.mtime.sec),
        StatxMask::ATTRIBUTES => Value::UInt32(statx.attributes.bits()),
        StatxMask::MNT_ID => Value::UInt64(statx.mount_id),
        _ => return None,
    })
}

/// Widen an integer-ish value to a common signed representation, the
/// same comparison basis [`compare_ordered`] uses. Exposed crate-wide so
/// the in-memory target's group-by executor can bucket range fields
/// without duplicating numeric coercion.
pub(crate) fn numeric(value: &Value<'_>) -> Option<i128> {
    match value {
        Value::Int32(v) => Some(*v as i128),
        Value::UInt32(v) => Some(*v as i128),
        Value::Int64(v) => Some(*v as i128),
        Value::UInt64(v) => Some(*v as i128),
        Value::Bool(v) => Some(*v as i128),
        _ => None,
    }
}

/// Order two values the same way [`comparison`] does for
/// `StrictlyLower`/`StrictlyGreater`/etc — exposed for the in-memory
/// target's sort stage.
pub(crate) fn compare_ordered(lhs: &Value<'_>, rhs: &Value<'_>) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (numeric(lhs), numeric(rhs)) {
        return Some(a.cmp(&b));
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    if let (Some(a), Some(b)) = (numeric(lhs), numeric(rhs)) {
        return a == b;
    }
    lhs == rhs
}

fn bits_of(value: &Value<'_>) -> Option<u64> {
    match value {
        Value::Int32(v) => Some(*v as u32 as u64),
        Value::UInt32(v) => Some(*v as u64),
        Value::Int64(v) => Some(*v as u64),
        Value::UInt64(v) => Some(*v),
        _ => None,
    }
}

/// Evaluate one comparison node. `reference` resolves any
/// [`Comparand::Get`] node; it is ignored for a [`Comparand::Literal`].
pub fn comparison(
    field: &Field,
    op: Op,
    comparand: Option<&Comparand<'_>>,
    entry: &FSEntry<'_>,
    reference: Option<&FSEntry<'_>>,
) -> bool {
    let actual = extract(field, entry);
    let resolved = comparand.and_then(|c| match c {
        Comparand::Literal(v) => Some(v.clone()),
        Comparand::Get(other_field) => reference.and_then(|r| extract(other_field, r).map(|v| v.clone())),
    });
    match op {
        Op::Exists => actual.is_some(),
        _ => {
            let (Some(actual), Some(value)) = (actual, resolved) else {
                return false;
            };
            let value = &value;
            match op {
                Op::Equal => values_equal(&actual, value),
                Op::NotEqual => !values_equal(&actual, value),
                Op::StrictlyLower => {
                    compare_ordered(&actual, value) == Some(std::cmp::Ordering::Less)
                }
                Op::StrictlyGreater => {
                    compare_ordered(&actual, value) == Some(std::cmp::Ordering::Greater)
                }
                Op::LowerOrEqual => matches!(
                    compare_ordered(&actual, value),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                ),
                Op::GreaterOrEqual => matches!(
                    compare_ordered(&actual, value),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ),
                Op::In => match value {
                    Value::Sequence(items) => items.iter().any(|v| values_equal(&actual, v)),
                    other => values_equal(&actual, other),
                },
                Op::Regex => match (&actual, value) {
                    (Value::String(s), Value::Regex(r)) => match_pattern(s, r),
                    _ => false,
                },
                Op::BitsAnySet => {
                    matches!((bits_of(&actual), bits_of(value)), (Some(a), Some(b)) if a & b != 0)
                }
                Op::BitsAllSet => {
                    matches!((bits_of(&actual), bits_of(value)), (Some(a), Some(b)) if a & b == b)
                }
                Op::BitsAnyClear => {
                    matches!((bits_of(&actual), bits_of(value)), (Some(a), Some(b)) if a & b != b)
                }
                Op::BitsAllClear => {
                    matches!((bits_of(&actual), bits_of(value)), (Some(a), Some(b)) if a & b == 0)
                }
                Op::Exists | Op::ElemMatch => unreachable!("handled elsewhere"),
            }
        }
    }
}

fn match_pattern(haystack: &str, pattern: &crate::value::RegexValue<'_>) -> bool {
    use crate::value::RegexOptions;
    let text = if pattern.options.contains(RegexOptions::CASE_INSENSITIVE) {
        haystack.to_lowercase()
    } else {
        haystack.to_string()
    };
    let pat_bytes = pattern.pattern.to_vec();
    let pat = String::from_utf8_lossy(&pat_bytes);
    let pat = if pattern.options.contains(RegexOptions::CASE_INSENSITIVE) {
        pat.to_lowercase()
    } else {
        pat.to_string()
    };
    if pattern.options.contains(RegexOptions::SHELL_PATTERN) {
        shell_pattern_match(&text, &pat)
    } else {
        // No regex crate in the dependency stack; a literal-substring
        // fallback covers the common "contains" case used in tests and by
        // the in-memory executor. Real backends (mongo, etc.) push the
        // pattern down to their own regex engine instead of using this.
        text.contains(&pat)
    }
}

fn shell_pattern_match(text: &str, pattern: &str) -> bool {
    fn helper(text: &[u8], pattern: &[u8]) -> bool {
        match (text.first(), pattern.first()) {
            (_, Some(b'*')) => {
                helper(text, &pattern[1..]) || (!text.is_empty() && helper(&text[1..], pattern))
            }
            (Some(_), Some(b'?')) => helper(&text[1..], &pattern[1..]),
            (Some(t), Some(p)) if t == p => helper(&text[1..], &pattern[1..]),
            (None, None) => true,
            _ => false,
        }
    }
    helper(text.as_bytes(), pattern.as_bytes())
}

/// Evaluate an `ElemMatch` node: true if `field` is a sequence with at
/// least one element satisfying `filter`, where `filter`'s comparisons are
/// evaluated directly against the element value rather than re-entering
/// [`FSEntry`] field extraction (an `ElemMatch` sub-filter compares the
/// array element itself).
pub fn elem_match(field: &Field, filter: &Filter<'_>, entry: &FSEntry<'_>) -> bool {
    let Some(Value::Sequence(items)) = extract(field, entry) else {
        return false;
    };
    items.iter().any(|item| matches_value(filter, item))
}

fn matches_value(filter: &Filter<'_>, value: &Value<'_>) -> bool {
    match filter {
        Filter::All => true,
        Filter::None => false,
        Filter::Not(inner) => !matches_value(inner, value),
        Filter::And(children) => children.iter().all(|c| matches_value(c, value)),
        Filter::Or(children) => children.iter().any(|c| matches_value(c, value)),
        Filter::ElemMatch { .. } => false,
        Filter::Comparison { op, value: rhs, .. } => {
            let literal = rhs.as_ref().and_then(|c| match c {
                Comparand::Literal(v) => Some(v),
                // A "get" comparand has no reference entry to resolve
                // against inside an element match.
                Comparand::Get(_) => None,
            });
            match op {
                Op::Exists => true,
                Op::Equal => literal.is_some_and(|rhs| values_equal(value, rhs)),
                Op::NotEqual => literal.is_some_and(|rhs| !values_equal(value, rhs)),
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{BackendTag, Id};

    fn sample_entry() -> FSEntry<'static> {
        let mut e = FSEntry::id_only(Id::new(BackendTag::Posix, vec![1]));
        e.name = Some("foo.txt".to_string());
        e
    }

    #[test]
    fn equal_matches_name() {
        let entry = sample_entry();
        assert!(comparison(
            &Field::Name,
            Op::Equal,
            Some(&Comparand::Literal(Value::String("foo.txt".into()))),
            &entry,
            None,
        ));
    }

    #[test]
    fn exists_false_when_absent() {
        let entry = sample_entry();
        assert!(!comparison(&Field::Symlink, Op::Exists, None, &entry, None));
    }

    #[test]
    fn get_node_compares_against_reference_entry() {
        use crate::attributes::StatxMask;
        use crate::statx::StatX;

        let mut older = sample_entry();
        let mut newer = sample_entry();
        let mut s_old = StatX::empty();
        s_old.mask = StatxMask::MTIME;
        s_old.mtime.sec = 100;
        older.statx = Some(s_old);
        let mut s_new = StatX::empty();
        s_new.mask = StatxMask::MTIME;
        s_new.mtime.sec = 200;
        newer.statx = Some(s_new);

        assert!(comparison(
            &Field::Statx(StatxMask::MTIME),
            Op::StrictlyGreater,
            Some(&Comparand::Get(Field::Statx(StatxMask::MTIME))),
            &newer,
            Some(&older),
        ));
        assert!(!comparison(
            &Field::Statx(StatxMask::MTIME),
            Op::StrictlyGreater,
            Some(&Comparand::Get(Field::Statx(StatxMask::MTIME))),
            &older,
            Some(&newer),
        ));
    }

    #[test]
    fn shell_pattern_star_matches() {
        assert!(shell_pattern_match("foo.txt", "*.txt"));
        assert!(!shell_pattern_match("foo.bin", "*.txt"));
    }
}
