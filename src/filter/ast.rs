//! The Filter AST.

use crate::filter::field::Field;
use crate::filter::ops::Op;
use crate::value::Value;

/// The right-hand side of a [`Filter::Comparison`]: either a literal value
/// or a "get" node that lazily reads the comparand from a separate
/// reference entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparand<'a> {
    /// A literal value known up front.
    Literal(Value<'a>),
    /// Read this field from the reference entry supplied at evaluation
    /// time.
    Get(Field),
}

impl<'a> From<Value<'a>> for Comparand<'a> {
    fn from(value: Value<'a>) -> Self {
        Comparand::Literal(value)
    }
}

/// A predicate tree over [`FSEntry`](crate::fsentry::FSEntry) fields.
///
/// `Filter` is backend-agnostic: a [`crate::backend::Backend`] translates
/// it into its own query language (e.g. a Mongo match document) rather
/// than evaluating it directly, though [`Filter::matches`] gives every
/// backend a reference evaluator for free (used by the in-memory target
/// and by tests).
#[derive(Clone, Debug, PartialEq)]
pub enum Filter<'a> {
    /// Matches every entry.
    All,
    /// Matches no entry.
    None,
    /// A single `field OP value` comparison.
    Comparison {
        /// The field being compared.
        field: Field,
        /// The comparison operator.
        op: Op,
        /// The right-hand side. Absent for unary operators ([`Op::Exists`]).
        value: Option<Comparand<'a>>,
    },
    /// A sub-filter evaluated against each element of an array-valued
    /// field.
    ElemMatch {
        /// The array field.
        field: Field,
        /// The predicate each element must satisfy.
        filter: Box<Filter<'a>>,
    },
    /// Every child must match.
    And(Vec<Filter<'a>>),
    /// At least one child must match.
    Or(Vec<Filter<'a>>),
    /// The child must not match.
    Not(Box<Filter<'a>>),
}

impl<'a> Filter<'a> {
    /// A `field == value` comparison.
    pub fn eq(field: Field, value: Value<'a>) -> Self {
        Filter::Comparison {
            field,
            op: Op::Equal,
            value: Some(Comparand::Literal(value)),
        }
    }

    /// A `field OP reference_entry.field` comparison whose comparand is
    /// read lazily from a reference entry at evaluation time, e.g. `-newer`.
    pub fn compare_to_other(field: Field, op: Op, other_field: Field) -> Self {
        Filter::Comparison {
            field,
            op,
            value: Some(Comparand::Get(other_field)),
        }
    }

    /// A `field` "is present" comparison.
    pub fn exists(field: Field) -> Self {
        Filter::Comparison {
            field,
            op: Op::Exists,
            value: None,
        }
    }

    /// Combine with `other` under `AND`, flattening nested `And` nodes.
    pub fn and(self, other: Filter<'a>) -> Self {
        match (self, other) {
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), b) => {
                a.push(b);
                Filter::And(a)
            }
            (a, Filter::And(mut b)) => {
                b.insert(0, a);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Combine with `other` under `OR`, flattening nested `Or` nodes.
    pub fn or(self, other: Filter<'a>) -> Self {
        match (self, other) {
            (Filter::Or(mut a), Filter::Or(b)) => {
                a.extend(b);
                Filter::Or(a)
            }
            (Filter::Or(mut a), b) => {
                a.push(b);
                Filter::Or(a)
            }
            (a, Filter::Or(mut b)) => {
                b.insert(0, a);
                Filter::Or(b)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    /// Push a `NOT` through this tree:
    /// De Morgan through `And`/`Or`, double-negation elimination through
    /// `Not`, comparator duals through `Comparison` where one exists, and
    /// an explicit wrapping [`Filter::Not`] everywhere else (`In`, `Regex`,
    /// `Exists`, `ElemMatch`, and any already-wrapped child).
    pub fn negate(self) -> Self {
        match self {
            Filter::All => Filter::None,
            Filter::None => Filter::All,
            Filter::Not(inner) => *inner,
            Filter::And(children) => {
                Filter::Or(children.into_iter().map(Filter::negate).collect())
            }
            Filter::Or(children) => {
                Filter::And(children.into_iter().map(Filter::negate).collect())
            }
            Filter::Comparison { field, op, value } if op.has_direct_negation() => {
                Filter::Comparison {
                    field,
                    op: op.negate(),
                    value,
                }
            }
            other => Filter::Not(Box::new(other)),
        }
    }

    /// Reference evaluation against one entry, used by the in-memory
    /// target backend and by tests. Real backends translate the tree into
    /// their native query language instead of calling this for every
    /// entry. `reference` supplies the comparand for any
    /// [`Comparand::Get`] node; a `Get` node evaluates to "no match" when
    /// no reference entry was supplied or the referenced field is absent.
    pub fn matches(
        &self,
        entry: &crate::fsentry::FSEntry<'_>,
        reference: Option<&crate::fsentry::FSEntry<'_>>,
    ) -> bool {
        match self {
            Filter::All => true,
            Filter::None => false,
            Filter::Not(inner) => !inner.matches(entry, reference),
            Filter::And(children) => children.iter().all(|c| c.matches(entry, reference)),
            Filter::Or(children) => children.iter().any(|c| c.matches(entry, reference)),
            Filter::ElemMatch { field, filter } => {
                crate::filter::eval::elem_match(field, filter, entry)
            }
            Filter::Comparison { field, op, value } => {
                crate::filter::eval::comparison(field, *op, value.as_ref(), entry, reference)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::StatxMask;

    #[test]
    fn negating_and_applies_de_morgan() {
        let f = Filter::And(vec![
            Filter::eq(Field::Name, Value::String("a".into())),
            Filter::eq(Field::Name, Value::String("b".into())),
        ]);
        let negated = f.negate();
        assert!(matches!(negated, Filter::Or(ref v) if v.len() == 2));
    }

    #[test]
    fn negating_comparison_uses_dual_when_available() {
        let f = Filter::Comparison {
            field: Field::Statx(StatxMask::SIZE),
            op: Op::StrictlyLower,
            value: Some(Comparand::Literal(Value::Int64(10))),
        };
        match f.negate() {
            Filter::Comparison { op, .. } => assert_eq!(op, Op::GreaterOrEqual),
            _ => panic!("expected a direct dual"),
        }
    }

    #[test]
    fn negating_regex_wraps_instead_of_inverting() {
        let f = Filter::Comparison {
            field: Field::Name,
            op: Op::Regex,
            value: None,
        };
        assert!(matches!(f.negate(), Filter::Not(_)));
    }

    #[test]
    fn double_negation_cancels() {
        let f = Filter::exists(Field::Symlink);
        let twice = f.clone().negate().negate();
        assert_eq!(f, twice);
    }
}
