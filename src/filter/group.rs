//! Group-by / aggregation.

use crate::filter::field::Field;
use crate::value::{Value, ValueMap};

/// An ordered list of boundary values bucketing a range field. An empty
/// list means "group by exact value".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeField {
    /// The field to bucket by.
    pub field: Field,
    /// Ascending boundary values; entries fall into the interval between
    /// consecutive boundaries. Empty means group by exact value.
    pub boundaries: Vec<Value<'static>>,
}

impl RangeField {
    /// Group by the exact value of `field` (no buckets).
    pub fn exact(field: Field) -> Self {
        Self {
            field,
            boundaries: Vec::new(),
        }
    }

    /// Group by `field` bucketed into the half-open intervals implied by
    /// `boundaries`.
    pub fn buckets(field: Field, boundaries: Vec<Value<'static>>) -> Self {
        Self { field, boundaries }
    }
}

/// An aggregate accumulator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Accumulator {
    /// Arithmetic mean.
    Avg,
    /// Maximum value.
    Max,
    /// Minimum value.
    Min,
    /// Sum of values.
    Sum,
    /// Number of entries in the bucket; omits the field.
    Count,
}

/// One requested aggregate: an accumulator over a field, or a bare
/// [`Accumulator::Count`] with no field.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    /// Which accumulator to apply.
    pub accumulator: Accumulator,
    /// The field to accumulate; `None` only valid for [`Accumulator::Count`].
    pub field: Option<Field>,
}

impl Aggregate {
    /// A plain count of entries in each bucket.
    pub fn count() -> Self {
        Self {
            accumulator: Accumulator::Count,
            field: None,
        }
    }

    /// An accumulator over a specific field.
    pub fn over(accumulator: Accumulator, field: Field) -> Self {
        assert!(
            !matches!(accumulator, Accumulator::Count),
            "Count takes no field, use Aggregate::count()"
        );
        Self {
            accumulator,
            field: Some(field),
        }
    }
}

/// A group-by clause: the range fields to bucket by, and the aggregates
/// to compute per bucket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupBy {
    /// The fields (and optional bucket boundaries) to group by.
    pub range_fields: Vec<RangeField>,
    /// The aggregates to compute within each bucket.
    pub aggregates: Vec<Aggregate>,
}

/// One output row: the bucket's identifying key-value map and its
/// computed accumulator map.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRow<'a> {
    /// The bucket key, one pair per range field.
    pub id: ValueMap<'a>,
    /// The computed accumulators, one pair per aggregate (keyed by a
    /// descriptive name such as `"sum"`, `"count"`).
    pub accumulators: ValueMap<'a>,
}

fn accumulator_key(agg: &Aggregate) -> String {
    match agg.accumulator {
        Accumulator::Avg => "avg".to_string(),
        Accumulator::Max => "max".to_string(),
        Accumulator::Min => "min".to_string(),
        Accumulator::Sum => "sum".to_string(),
        Accumulator::Count => "count".to_string(),
    }
}

fn as_f64(value: &Value<'_>) -> Option<f64> {
    match value {
        Value::Int32(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        Value::Int64(v) => Some(*v as f64),
        Value::UInt64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Compute the accumulator map for one bucket's member rows, used by the
/// in-memory target's group-by executor ([`crate::target::memory`]).
pub fn accumulate<'a>(aggregates: &[Aggregate], members: &[&Value<'a>]) -> ValueMap<'a> {
    let mut out = ValueMap::new();
    for agg in aggregates {
        let key = accumulator_key(agg);
        let value = match agg.accumulator {
            Accumulator::Count => Value::UInt64(members.len() as u64),
            Accumulator::Sum => {
                Value::Int64(members.iter().filter_map(|v| as_f64(v)).sum::<f64>() as i64)
            }
            Accumulator::Avg => {
                let values: Vec<f64> = members.iter().filter_map(|v| as_f64(v)).collect();
                if values.is_empty() {
                    Value::Int64(0)
                } else {
                    Value::Int64((values.iter().sum::<f64>() / values.len() as f64) as i64)
                }
            }
            Accumulator::Max => members
                .iter()
                .filter_map(|v| as_f64(v))
                .fold(f64::MIN, f64::max)
                .into(),
            Accumulator::Min => members
                .iter()
                .filter_map(|v| as_f64(v))
                .fold(f64::MAX, f64::min)
                .into(),
        };
        out.insert(key, value);
    }
    out
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Int64(v as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_ignores_field() {
        let agg = Aggregate::count();
        let members: Vec<&Value<'_>> = vec![&Value::Int64(1), &Value::Int64(2)];
        let map = accumulate(&[agg], &members);
        assert_eq!(map.get("count"), Some(&Value::UInt64(2)));
    }

    #[test]
    fn sum_adds_integers() {
        let agg = Aggregate::over(Accumulator::Sum, Field::Statx(crate::attributes::StatxMask::SIZE));
        let members: Vec<&Value<'_>> = vec![&Value::Int64(10), &Value::Int64(20)];
        let map = accumulate(&[agg], &members);
        assert_eq!(map.get("sum"), Some(&Value::Int64(30)));
    }

    #[test]
    #[should_panic]
    fn count_with_explicit_field_panics() {
        Aggregate::over(Accumulator::Count, Field::Id);
    }
}
