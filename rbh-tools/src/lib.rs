//! Shared plumbing for the `rbh-find`/`rbh-sync`/`rbh-gc`/`rbh-info`/
//! `rbh-report` binaries: URI parsing,
//! backend resolution, and the GNU-find-style expression grammar.

pub mod expr;
pub mod uri;

pub use expr::{parse_expression, Action, ParsedExpression};
pub use uri::{open_target, Uri};
