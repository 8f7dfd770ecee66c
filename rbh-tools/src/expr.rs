//! The GNU-find-style expression grammar: tokens are open-paren, close-paren, `-not`, `-and`, `-or`,
//! `-sort`/`-rsort`, predicates, and actions. Implicit `-and` binds
//! adjacent predicates the way GNU find does.
//!
//! This driver implements the time/size/name/type/uid/gid/xattr
//! predicate families and the `print`/`print0`/`ls`/`printf`/`delete`/
//! `count`/`quit` actions; `-perm`, `-user`/`-group` by name (no
//! passwd/group lookup in this reference build), `fprint`/`fprintf`,
//! and `-exec` are left for a real deployment's driver — see
//! `DESIGN.md`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use rbh_core::attributes::{FileType, StatxMask};
use rbh_core::filter::{Comparand, Field, Filter, Op, Sort, SortOrder};
use rbh_core::value::Value;

/// An action requested by the expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Print the path, newline-terminated.
    Print,
    /// Print the path, NUL-terminated.
    Print0,
    /// `ls -dils`-style long listing.
    Ls,
    /// A `printf`-style format string over a fixed field vocabulary
    /// (`%p` path, `%s` size, `%i` id).
    Printf(String),
    /// Delete the matched entry from the target.
    Delete,
    /// Count matches instead of printing them.
    Count,
    /// Stop evaluating as soon as one entry matches.
    Quit,
}

/// The parsed expression: a predicate tree, an optional sort, and the
/// requested actions (defaulting to `[Print]` when none are given, same
/// as GNU find).
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedExpression {
    /// The predicate tree.
    pub filter: Filter<'static>,
    /// The requested sort order, if `-sort`/`-rsort` was given.
    pub sort: Sort,
    /// The requested actions.
    pub actions: Vec<Action>,
}

struct Tokens<'a> {
    args: &'a [String],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.args.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_arg(&mut self, predicate: &str) -> Result<&'a str> {
        self.next()
            .with_context(|| format!("{predicate} requires an argument"))
    }
}

/// Parse `args` (everything after the URI on the command line) into a
/// [`ParsedExpression`].
pub fn parse_expression(args: &[String]) -> Result<ParsedExpression> {
    let mut tokens = Tokens { args, pos: 0 };
    let mut sort = Sort::unordered();
    let mut actions = Vec::new();
    let filter = parse_or(&mut tokens, &mut sort, &mut actions)?;
    if tokens.peek().is_some() {
        bail!("unexpected trailing token {:?}", tokens.peek().unwrap());
    }
    if actions.is_empty() {
        actions.push(Action::Print);
    }
    Ok(ParsedExpression {
        filter,
        sort,
        actions,
    })
}

fn parse_or(tokens: &mut Tokens<'_>, sort: &mut Sort, actions: &mut Vec<Action>) -> Result<Filter<'static>> {
    let mut children = vec![parse_and(tokens, sort, actions)?];
    while tokens.peek() == Some("-or") {
        tokens.next();
        children.push(parse_and(tokens, sort, actions)?);
    }
    Ok(if children.len() == 1 {
        children.pop().expect("non-empty")
    } else {
        Filter::Or(children)
    })
}

fn parse_and(tokens: &mut Tokens<'_>, sort: &mut Sort, actions: &mut Vec<Action>) -> Result<Filter<'static>> {
    let mut children = Vec::new();
    loop {
        match tokens.peek() {
            None | Some(")") | Some("-or") => break,
            Some("-and") => {
                tokens.next();
                continue;
            }
            _ => children.push(parse_unary(tokens, sort, actions)?),
        }
    }
    if children.is_empty() {
        bail!("empty parenthesized expression");
    }
    Ok(if children.len() == 1 {
        children.pop().expect("non-empty")
    } else {
        Filter::And(children)
    })
}

fn parse_unary(tokens: &mut Tokens<'_>, sort: &mut Sort, actions: &mut Vec<Action>) -> Result<Filter<'static>> {
    match tokens.peek() {
        Some("-not") | Some("!") => {
            tokens.next();
            Ok(parse_unary(tokens, sort, actions)?.negate())
        }
        Some("(") => {
            tokens.next();
            let inner = parse_or(tokens, sort, actions)?;
            match tokens.next() {
                Some(")") => Ok(inner),
                _ => bail!("expected closing paren"),
            }
        }
        Some("-sort") | Some("-rsort") => {
            let descending = tokens.next() == Some("-rsort");
            let name = tokens.expect_arg("-sort")?;
            let field = field_by_name(name)?;
            let order = if descending {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            *sort = std::mem::replace(sort, Sort::unordered()).then(field, order);
            Ok(Filter::All)
        }
        Some(token) if is_action(token) => {
            actions.push(parse_action(tokens)?);
            Ok(Filter::All)
        }
        Some(token) if token.starts_with('-') => parse_predicate(tokens),
        other => bail!("unexpected token {other:?}"),
    }
}

fn is_action(token: &str) -> bool {
    matches!(
        token,
        "-print" | "-print0" | "-ls" | "-printf" | "-delete" | "-count" | "-quit"
    )
}

fn parse_action(tokens: &mut Tokens<'_>) -> Result<Action> {
    match tokens.next().expect("checked by caller") {
        "-print" => Ok(Action::Print),
        "-print0" => Ok(Action::Print0),
        "-ls" => Ok(Action::Ls),
        "-printf" => {
            let format = tokens.expect_arg("-printf")?;
            Ok(Action::Printf(format.to_string()))
        }
        "-delete" => Ok(Action::Delete),
        "-count" => Ok(Action::Count),
        "-quit" => Ok(Action::Quit),
        other => bail!("unknown action {other:?}"),
    }
}

fn field_by_name(name: &str) -> Result<Field> {
    Ok(match name {
        "name" => Field::Name,
        "id" => Field::Id,
        "size" => Field::Statx(StatxMask::SIZE),
        "uid" => Field::Statx(StatxMask::UID),
        "gid" => Field::Statx(StatxMask::GID),
        "atime" => Field::Statx(StatxMask::ATIME),
        "mtime" => Field::Statx(StatxMask::MTIME),
        "ctime" => Field::Statx(StatxMask::CTIME),
        other => bail!("unknown sort field {other:?}"),
    })
}

/// `[+-]N`: GNU find's exactly/more-than/less-than-N modifier.
enum Magnitude {
    Exact(i64),
    MoreThan(i64),
    LessThan(i64),
}

fn parse_magnitude(raw: &str) -> Result<Magnitude> {
    if let Some(rest) = raw.strip_prefix('+') {
        Ok(Magnitude::MoreThan(rest.parse()?))
    } else if let Some(rest) = raw.strip_prefix('-') {
        Ok(Magnitude::LessThan(rest.parse()?))
    } else {
        Ok(Magnitude::Exact(raw.parse()?))
    }
}

fn magnitude_filter(field: Field, magnitude: Magnitude) -> Filter<'static> {
    match magnitude {
        Magnitude::Exact(n) => Filter::eq(field, Value::Int64(n)),
        Magnitude::MoreThan(n) => Filter::Comparison {
            field,
            op: Op::StrictlyGreater,
            value: Some(Comparand::Literal(Value::Int64(n))),
        },
        Magnitude::LessThan(n) => Filter::Comparison {
            field,
            op: Op::StrictlyLower,
            value: Some(Comparand::Literal(Value::Int64(n))),
        },
    }
}

fn parse_size(raw: &str) -> Result<Filter<'static>> {
    let (digits, unit) = match raw.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&raw[..raw.len() - 1], c),
        _ => (raw, 'c'),
    };
    let multiplier: i64 = match unit {
        'c' => 1,
        'k' => 1024,
        'M' => 1024 * 1024,
        'G' => 1024 * 1024 * 1024,
        other => bail!("unknown size unit {other:?}"),
    };
    let magnitude = parse_magnitude(digits)?;
    let scaled = match magnitude {
        Magnitude::Exact(n) => Magnitude::Exact(n * multiplier),
        Magnitude::MoreThan(n) => Magnitude::MoreThan(n * multiplier),
        Magnitude::LessThan(n) => Magnitude::LessThan(n * multiplier),
    };
    Ok(magnitude_filter(Field::Statx(StatxMask::SIZE), scaled))
}

/// GNU find's `n*24h`-ago semantics for `-atime`/`-mtime`/`-ctime`: `n`
/// means "between n and n+1 days ago", `+n` means "more than n+1 days
/// ago", `-n` means "less than n days ago".
fn parse_time(field: Field, raw: &str) -> Result<Filter<'static>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let day = 24 * 60 * 60;
    let magnitude = parse_magnitude(raw)?;
    Ok(match magnitude {
        Magnitude::Exact(n) => Filter::And(vec![
            Filter::Comparison {
                field: field.clone(),
                op: Op::GreaterOrEqual,
                value: Some(Comparand::Literal(Value::Int64(now - (n + 1) * day))),
            },
            Filter::Comparison {
                field,
                op: Op::StrictlyLower,
                value: Some(Comparand::Literal(Value::Int64(now - n * day))),
            },
        ]),
        Magnitude::MoreThan(n) => Filter::Comparison {
            field,
            op: Op::StrictlyLower,
            value: Some(Comparand::Literal(Value::Int64(now - (n + 1) * day))),
        },
        Magnitude::LessThan(n) => Filter::Comparison {
            field,
            op: Op::StrictlyGreater,
            value: Some(Comparand::Literal(Value::Int64(now - n * day))),
        },
    })
}

fn file_type_from_letter(letter: &str) -> Result<FileType> {
    Ok(match letter {
        "f" => FileType::RegularFile,
        "d" => FileType::Directory,
        "l" => FileType::Symlink,
        "b" => FileType::BlockDevice,
        "c" => FileType::CharDevice,
        "p" => FileType::NamedPipe,
        "s" => FileType::Socket,
        other => bail!("unknown -type letter {other:?}"),
    })
}

fn parse_predicate(tokens: &mut Tokens<'_>) -> Result<Filter<'static>> {
    let predicate = tokens.next().expect("checked by caller");
    match predicate {
        "-name" => {
            let pattern = tokens.expect_arg(predicate)?;
            Ok(Filter::Comparison {
                field: Field::Name,
                op: Op::Regex,
                value: Some(Comparand::Literal(Value::Regex(
                    rbh_core::value::RegexValue {
                        pattern: pattern.as_bytes().to_vec().into(),
                        options: rbh_core::value::RegexOptions::SHELL_PATTERN,
                    },
                ))),
            })
        }
        "-type" => {
            let letter = tokens.expect_arg(predicate)?;
            let kind = file_type_from_letter(letter)?;
            Ok(Filter::eq(
                Field::Statx(StatxMask::TYPE),
                Value::Int32(kind as i32),
            ))
        }
        "-size" => parse_size(tokens.expect_arg(predicate)?),
        "-uid" => magnitude_filter_arg(Field::Statx(StatxMask::UID), tokens, predicate),
        "-gid" => magnitude_filter_arg(Field::Statx(StatxMask::GID), tokens, predicate),
        "-atime" => parse_time(Field::Statx(StatxMask::ATIME), tokens.expect_arg(predicate)?),
        "-mtime" => parse_time(Field::Statx(StatxMask::MTIME), tokens.expect_arg(predicate)?),
        "-ctime" => parse_time(Field::Statx(StatxMask::CTIME), tokens.expect_arg(predicate)?),
        "-xattr" => {
            let key = tokens.expect_arg(predicate)?;
            let value = tokens.expect_arg(predicate)?;
            Ok(Filter::eq(
                Field::InodeXattr(Some(key.to_string())),
                Value::String(value.to_string().into()),
            ))
        }
        other => bail!("unknown predicate {other:?}"),
    }
}

fn magnitude_filter_arg(field: Field, tokens: &mut Tokens<'_>, predicate: &str) -> Result<Filter<'static>> {
    let raw = tokens.expect_arg(predicate)?;
    Ok(magnitude_filter(field, parse_magnitude(raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn size_and_type_combine_with_implicit_and() {
        let parsed = parse_expression(&args(&["-size", "+512c", "-type", "f"])).unwrap();
        assert!(matches!(parsed.filter, Filter::And(ref c) if c.len() == 2));
        assert_eq!(parsed.actions, vec![Action::Print]);
    }

    #[test]
    fn explicit_and_or_not_parse() {
        let parsed =
            parse_expression(&args(&["-not", "(", "-name", "*.tmp", "-or", "-size", "0c", ")"]))
                .unwrap();
        assert!(matches!(parsed.filter, Filter::Not(_)));
    }

    #[test]
    fn rejects_empty_parens() {
        assert!(parse_expression(&args(&["(", ")"])).is_err());
    }

    #[test]
    fn print0_is_recognized_as_an_action_not_a_predicate() {
        let parsed = parse_expression(&args(&["-name", "a", "-print0"])).unwrap();
        assert_eq!(parsed.actions, vec![Action::Print0]);
    }
}
