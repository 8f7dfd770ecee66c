//! Filter / sort / projection / group algebra.
//!
//! This module is deliberately backend-agnostic: it describes predicates,
//! orderings, projections and aggregations as data, so that each
//! [`Backend`](crate::backend::Backend) can translate them into its own
//! query language. [`eval`] and [`group::accumulate`] provide a reference,
//! in-process evaluator used by the in-memory target backend and by tests.

pub mod ast;
pub mod eval;
pub mod field;
pub mod group;
pub mod ops;
pub mod projection;
pub mod sort;
pub mod validator;

pub use ast::{Comparand, Filter};
pub use field::Field;
pub use group::{Accumulator, Aggregate, GroupBy, GroupRow, RangeField};
pub use ops::{Combine, Op, UintClause};
pub use projection::{Projection, XattrKeys};
pub use sort::{Sort, SortKey, SortOrder};
pub use validator::{validate, ValidationError};
