//! Comparison operators and the unsigned-integer / negation
//! transformations used by filter evaluation.

/// A comparison operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    /// `field == value`
    Equal,
    /// `field != value`
    NotEqual,
    /// `field < value`
    StrictlyLower,
    /// `field > value`
    StrictlyGreater,
    /// `field <= value`
    LowerOrEqual,
    /// `field >= value`
    GreaterOrEqual,
    /// `field` is one of a set of values.
    In,
    /// `field` matches a regex/shell pattern value.
    Regex,
    /// `field` is populated at all.
    Exists,
    /// At least one bit of `value` is set in `field`.
    BitsAnySet,
    /// Every bit of `value` is set in `field`.
    BitsAllSet,
    /// At least one bit of `value` is clear in `field`.
    BitsAnyClear,
    /// Every bit of `value` is clear in `field`.
    BitsAllClear,
    /// At least one element of an array field matches a sub-filter.
    ElemMatch,
}

impl Op {
    /// The dual operator produced by pushing a `NOT` through a
    /// comparison. `Regex` has no direct
    /// negation: the caller must wrap the comparison in the store's "not"
    /// document syntax instead, which is why it returns itself here
    /// unchanged — callers must special-case it.
    pub fn negate(self) -> Op {
        match self {
            Op::Equal => Op::NotEqual,
            Op::NotEqual => Op::Equal,
            Op::StrictlyLower => Op::GreaterOrEqual,
            Op::StrictlyGreater => Op::LowerOrEqual,
            Op::LowerOrEqual => Op::StrictlyGreater,
            Op::GreaterOrEqual => Op::StrictlyLower,
            Op::BitsAnySet => Op::BitsAllClear,
            Op::BitsAllSet => Op::BitsAnyClear,
            Op::BitsAnyClear => Op::BitsAllSet,
            Op::BitsAllClear => Op::BitsAnySet,
            // In, Regex, Exists, ElemMatch have no direct dual: the
            // caller must wrap in the store's logical "not" instead.
            other => other,
        }
    }

    /// Whether [`negate`](Self::negate) produces a meaningful dual for
    /// this operator, as opposed to requiring an explicit wrapping NOT.
    pub fn has_direct_negation(self) -> bool {
        !matches!(self, Op::In | Op::Regex | Op::Exists | Op::ElemMatch)
    }
}

/// A two-clause translation of an unsigned 64-bit comparison against a
/// store that only has signed 64-bit integers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UintClause {
    /// `value < threshold` (threshold interpreted as signed).
    LowerThan(i64),
    /// `value >= 0`
    NonNegative,
    /// `value >= threshold` (threshold interpreted as signed).
    GreaterOrEqualTo(i64),
}

/// How the two clauses of a translated unsigned comparison combine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Combine {
    /// Both clauses must hold.
    And,
    /// Either clause may hold.
    Or,
}

/// Translate `field < u` (u unsigned) into the signed two-clause form
/// required because the store has no native uint64.
///
/// Returns `(combine, clauses)`. When `u <= i64::MAX as u64`, both
/// `value >= 0` and `value < signed(u)` must hold (`And`); otherwise
/// every non-negative value is already smaller than `u`, and amongst the
/// negative (two's-complement) values only those less than `signed(u)`
/// qualify, so the two clauses are combined with `Or`.
pub fn translate_uint_less_than(u: u64) -> (Combine, [UintClause; 2]) {
    if u <= i64::MAX as u64 {
        (
            Combine::And,
            [UintClause::NonNegative, UintClause::LowerThan(u as i64)],
        )
    } else {
        let signed = u as i64; // wraps negative for u > i64::MAX
        (
            Combine::Or,
            [UintClause::NonNegative, UintClause::LowerThan(signed)],
        )
    }
}

/// The symmetric translation of `field > u`.
pub fn translate_uint_greater_than(u: u64) -> (Combine, [UintClause; 2]) {
    if u <= i64::MAX as u64 {
        (
            Combine::Or,
            [
                UintClause::GreaterOrEqualTo((u as i64).saturating_add(1)),
                // Negative two's-complement values are always larger in
                // the unsigned domain than any u <= i64::MAX, so "field
                // is negative" also qualifies.
                UintClause::LowerThan(0),
            ],
        )
    } else {
        let signed = u as i64;
        (
            Combine::And,
            [
                UintClause::LowerThan(0),
                UintClause::GreaterOrEqualTo(signed.saturating_add(1)),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_is_involutive_for_direct_duals() {
        for op in [
            Op::Equal,
            Op::StrictlyLower,
            Op::StrictlyGreater,
            Op::LowerOrEqual,
            Op::GreaterOrEqual,
            Op::BitsAnySet,
            Op::BitsAllSet,
        ] {
            assert_eq!(op.negate().negate(), op);
        }
    }

    #[test]
    fn regex_has_no_direct_negation() {
        assert!(!Op::Regex.has_direct_negation());
    }

    #[test]
    fn boundary_at_int63_max() {
        let (combine, _) = translate_uint_less_than(i64::MAX as u64);
        assert_eq!(combine, Combine::And);
        let (combine, _) = translate_uint_less_than(i64::MAX as u64 + 1);
        assert_eq!(combine, Combine::Or);
    }

    #[test]
    fn boundary_at_u64_max() {
        let (combine, _) = translate_uint_less_than(u64::MAX);
        assert_eq!(combine, Combine::Or);
    }
}
