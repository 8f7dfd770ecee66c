//! Tagged-union values.
//!
//! Value payloads are borrowed from a per-iterator [`scratch`](crate::iter::scratch)
//! arena where possible; the [`Container`](crate::container::Container) enum
//! gives us a single type that is equally at home holding a borrowed
//! slice, an owned `Vec`, or a shared `Arc` without forcing a copy at
//! every pipeline stage.

use bitflags::bitflags;
use std::borrow::Cow;
use std::fmt;

use crate::container::Container;

bitflags! {
    /// Regex option flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
    pub struct RegexOptions: u8 {
        /// Interpret the pattern as a shell glob (`fnmatch`-style) rather
        /// than a POSIX extended regex.
        const SHELL_PATTERN = 0b0000_0001;
        /// Case-insensitive matching.
        const CASE_INSENSITIVE = 0b0000_0010;
    }
}

/// A compiled-looking, but not-yet-compiled, regular expression value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegexValue<'a> {
    /// The pattern text.
    pub pattern: Container<'a, u8>,
    /// The option flags under which it must be interpreted.
    pub options: RegexOptions,
}

/// A tagged union over every scalar and composite value the data model
/// carries.
///
/// Lifetimes are borrowed from the producing iterator's scratch arena;
/// consumers that outlive one `next()` call must `.to_owned()`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    /// Boolean.
    Bool(bool),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer (compared against signed stored values via
    /// a common wide representation; see [`Value::is_integer`]).
    UInt64(u64),
    /// UTF-8 string.
    String(Cow<'a, str>),
    /// Arbitrary bytes.
    Binary(Container<'a, u8>),
    /// A regular expression or shell pattern.
    Regex(RegexValue<'a>),
    /// A homogeneous-ish sequence of values.
    Sequence(Vec<Value<'a>>),
    /// A string-keyed map of values, order-preserving (used for both
    /// namespace and inode extended attributes — see [`ValueMap`]).
    Map(ValueMap<'a>),
}

impl Value<'_> {
    /// A short name for the variant, used in validator error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Regex(_) => "regex",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
        }
    }

    /// True if this value is one of the integer variants (signed or
    /// unsigned, any width) — used by the field validator.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::UInt32(_) | Value::Int64(_) | Value::UInt64(_)
        )
    }
}

/// One `(key, value)` pair of a [`ValueMap`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValuePair<'a> {
    /// The attribute key. Unique within the owning map.
    pub key: Cow<'a, str>,
    /// The attribute value.
    pub value: Value<'a>,
}

/// An ordered sequence of `(key, value)` pairs with keys unique within the
/// map. Used for both namespace and inode extended
/// attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueMap<'a> {
    pairs: Vec<ValuePair<'a>>,
}

impl<'a> ValueMap<'a> {
    /// An empty map.
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Build a map from pairs, the caller is responsible for key uniqueness
    /// (debug-asserted here, not checked in release builds for throughput).
    pub fn from_pairs(pairs: Vec<ValuePair<'a>>) -> Self {
        debug_assert!(has_unique_keys(&pairs), "duplicate key in ValueMap");
        Self { pairs }
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value<'a>> {
        self.pairs.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    /// Insert or overwrite a pair, preserving insertion order of first
    /// occurrence.
    pub fn insert(&mut self, key: impl Into<Cow<'a, str>>, value: Value<'a>) {
        let key = key.into();
        if let Some(pair) = self.pairs.iter_mut().find(|p| p.key == key) {
            pair.value = value;
        } else {
            self.pairs.push(ValuePair { key, value });
        }
    }

    /// Remove a pair by key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value<'a>> {
        let idx = self.pairs.iter().position(|p| p.key == key)?;
        Some(self.pairs.remove(idx).value)
    }

    /// Iterate the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = &ValuePair<'a>> {
        self.pairs.iter()
    }
}

fn has_unique_keys(pairs: &[ValuePair<'_>]) -> bool {
    for i in 0..pairs.len() {
        for j in (i + 1)..pairs.len() {
            if pairs[i].key == pairs[j].key {
                return false;
            }
        }
    }
    true
}

impl<'a> FromIterator<ValuePair<'a>> for ValueMap<'a> {
    fn from_iter<T: IntoIterator<Item = ValuePair<'a>>>(iter: T) -> Self {
        let mut map = ValueMap::new();
        for pair in iter {
            map.insert(pair.key, pair.value);
        }
        map
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Value::Regex(v) => write!(f, "/{:?}/", v.pattern),
            Value::Sequence(items) => write!(f, "[{} items]", items.len()),
            Value::Map(m) => write!(f, "{{{} pairs}}", m.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_map_preserves_order_and_overwrites() {
        let mut map = ValueMap::new();
        map.insert("a", Value::Int32(1));
        map.insert("b", Value::Int32(2));
        map.insert("a", Value::Int32(3));
        let keys: Vec<_> = map.iter().map(|p| p.key.as_ref()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::Int32(3)));
    }

    #[test]
    fn remove_returns_value() {
        let mut map = ValueMap::new();
        map.insert("k", Value::Bool(true));
        assert_eq!(map.remove("k"), Some(Value::Bool(true)));
        assert!(map.is_empty());
    }

    #[test]
    fn is_integer_covers_all_widths() {
        assert!(Value::Int32(1).is_integer());
        assert!(Value::UInt64(1).is_integer());
        assert!(!Value::Bool(true).is_integer());
    }
}
