//! Filter AST validation.
//!
//! A filter is valid iff every comparison's value type matches its
//! field's expected type, every regex option is one we support, and
//! every `AND`/`OR` subtree is non-empty.

use crate::filter::ast::{Comparand, Filter};
use crate::filter::field::Field;
use crate::filter::ops::Op;
use crate::value::{RegexOptions, Value};

/// Why a filter failed validation.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A comparison's value type does not match what the field accepts.
    #[error("field {field:?} does not accept a {actual} value")]
    TypeMismatch {
        /// The offending field.
        field: Field,
        /// The value's actual type name.
        actual: &'static str,
    },
    /// An `AND`/`OR` node had no children.
    #[error("logical node has no operands")]
    EmptyLogicalNode,
    /// A required comparand was missing for a binary operator.
    #[error("operator {op:?} requires a value")]
    MissingValue {
        /// The offending operator.
        op: Op,
    },
    /// `ElemMatch` was applied to a field that is not an array-typed one.
    #[error("field {field:?} is not an array field")]
    NotAnArrayField {
        /// The offending field.
        field: Field,
    },
}

/// Whether `field` accepts a value of `value`'s runtime type.
fn type_matches(field: &Field, value: &Value<'_>) -> bool {
    match field {
        Field::Id | Field::ParentId => matches!(value, Value::Binary(_)),
        Field::Name | Field::Symlink => {
            matches!(value, Value::String(_) | Value::Regex(_) | Value::Sequence(_))
        }
        Field::Statx(_) => value.is_integer() || matches!(value, Value::Sequence(_)),
        Field::NamespaceXattr(_) | Field::InodeXattr(_) => true,
    }
}

fn validate_comparand(field: &Field, comparand: &Comparand<'_>) -> Result<(), ValidationError> {
    match comparand {
        Comparand::Literal(value) => {
            if type_matches(field, value) {
                Ok(())
            } else {
                Err(ValidationError::TypeMismatch {
                    field: field.clone(),
                    actual: value.type_name(),
                })
            }
        }
        // A "get" node's type is only known once the reference entry is
        // read; nothing to validate statically beyond the field existing.
        Comparand::Get(_) => Ok(()),
    }
}

fn validate_regex_options(options: RegexOptions) -> Result<(), ValidationError> {
    let supported = RegexOptions::SHELL_PATTERN | RegexOptions::CASE_INSENSITIVE;
    if supported.contains(options) {
        Ok(())
    } else {
        Err(ValidationError::TypeMismatch {
            field: Field::Name,
            actual: "regex (unsupported option bits)",
        })
    }
}

/// Validate a filter tree, recursively.
pub fn validate(filter: &Filter<'_>) -> Result<(), ValidationError> {
    match filter {
        Filter::All | Filter::None => Ok(()),
        Filter::Not(inner) => validate(inner),
        Filter::And(children) | Filter::Or(children) => {
            if children.is_empty() {
                return Err(ValidationError::EmptyLogicalNode);
            }
            children.iter().try_for_each(validate)
        }
        Filter::ElemMatch { field, filter } => {
            if !matches!(field, Field::NamespaceXattr(None) | Field::InodeXattr(None)) {
                return Err(ValidationError::NotAnArrayField {
                    field: field.clone(),
                });
            }
            validate(filter)
        }
        Filter::Comparison { field, op, value } => {
            if *op != Op::Exists && value.is_none() {
                return Err(ValidationError::MissingValue { op: *op });
            }
            if let Some(value) = value {
                validate_comparand(field, value)?;
                if *op == Op::Regex {
                    if let Comparand::Literal(Value::Regex(r)) = value {
                        validate_regex_options(r.options)?;
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_is_rejected() {
        let f: Filter<'_> = Filter::And(vec![]);
        assert_eq!(validate(&f), Err(ValidationError::EmptyLogicalNode));
    }

    #[test]
    fn exists_needs_no_value() {
        let f = Filter::exists(Field::Symlink);
        assert!(validate(&f).is_ok());
    }

    #[test]
    fn equal_without_value_is_invalid() {
        let f = Filter::Comparison {
            field: Field::Name,
            op: Op::Equal,
            value: None,
        };
        assert_eq!(
            validate(&f),
            Err(ValidationError::MissingValue { op: Op::Equal })
        );
    }

    #[test]
    fn id_rejects_string_value() {
        let f = Filter::eq(Field::Id, Value::String("nope".into()));
        assert!(matches!(
            validate(&f),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }
}
