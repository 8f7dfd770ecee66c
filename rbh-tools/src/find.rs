//! `rbh-find <uri> [expression]`: evaluate a GNU-find-style expression
//! against a target backend and run its actions over the matches.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use rbh_core::backend::{Backend, FilterOptions};
use rbh_core::enrich::extensions::retention::{DEFAULT_EXPIRES_KEY, EXPIRATION_DATE_KEY};
use rbh_core::filter::Projection;
use rbh_core::fsevent::FSEvent;
use rbh_core::value::Value;
use rbh_tools::{open_target, parse_expression, Action};

#[derive(Parser)]
#[command(name = "rbh-find", about = "Query a filesystem metadata target")]
struct Cli {
    /// Backend URI, e.g. `rbh:memory:myfs` or `rbh:memory:myfs#/some/path`.
    uri: String,
    /// GNU-find-style expression (predicates, `-and`/`-or`/`-not`, actions).
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    expression: Vec<String>,
}

fn format_entry(entry: &rbh_core::fsentry::FSEntry<'_>) -> String {
    entry
        .namespace_xattrs
        .get("path")
        .and_then(|v| match v {
            Value::String(s) => Some(s.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| entry.name.clone().unwrap_or_default())
}

fn format_printf(format: &str, entry: &rbh_core::fsentry::FSEntry<'_>) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('p') => out.push_str(&format_entry(entry)),
            Some('s') => {
                let size = entry.statx.map(|s| s.size).unwrap_or(0);
                out.push_str(&size.to_string());
            }
            Some('i') => out.push_str(&format!("{:?}", entry.id)),
            Some('e') => {
                let raw = entry.inode_xattrs.get(DEFAULT_EXPIRES_KEY).and_then(|v| match v {
                    Value::String(s) => Some(s.to_string()),
                    _ => None,
                });
                out.push_str(raw.as_deref().unwrap_or(""));
            }
            Some('E') => out.push_str(&format_expiration_date(entry)),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// `%E` printf directive: the retention extension's materialized
/// expiration date, `"Inf"` for an unbounded retention and `"None"`
/// when the entry was never enriched.
fn format_expiration_date(entry: &rbh_core::fsentry::FSEntry<'_>) -> String {
    match entry.inode_xattrs.get(EXPIRATION_DATE_KEY) {
        Some(Value::Int64(i64::MAX)) => "Inf".to_string(),
        Some(Value::Int64(v)) => v.to_string(),
        _ => "None".to_string(),
    }
}

fn format_ls(entry: &rbh_core::fsentry::FSEntry<'_>) -> String {
    let statx = entry.statx.unwrap_or_default();
    format!(
        "{:>6} {:>10} {}",
        statx.nlink,
        statx.size,
        format_entry(entry)
    )
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let uri: rbh_tools::Uri = cli.uri.parse().context("parsing URI")?;
    let parsed = parse_expression(&cli.expression).context("parsing expression")?;

    let mut target = open_target(&uri).context("opening target")?;

    let projection = Projection::everything();

    let options = FilterOptions {
        sort: parsed.sort.clone(),
        ..FilterOptions::default()
    };

    let mut count = 0u64;
    let mut quit = false;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut to_delete = Vec::new();

    {
        let entries = target
            .filter(&parsed.filter, &options, &projection)
            .context("running filter")?;
        for entry in entries {
            let entry = entry.context("reading entry")?;
            count += 1;
            for action in &parsed.actions {
                match action {
                    Action::Print => writeln!(out, "{}", format_entry(&entry))?,
                    Action::Print0 => write!(out, "{}\0", format_entry(&entry))?,
                    Action::Ls => writeln!(out, "{}", format_ls(&entry))?,
                    Action::Printf(fmt) => writeln!(out, "{}", format_printf(fmt, &entry))?,
                    Action::Delete => to_delete.push(entry.id.clone()),
                    Action::Count => {}
                    Action::Quit => quit = true,
                }
            }
            if quit {
                break;
            }
        }
    }

    if parsed.actions.contains(&Action::Count) {
        writeln!(out, "{count}")?;
    }
    if !to_delete.is_empty() {
        let mut events = to_delete
            .into_iter()
            .map(|id| Some(FSEvent::Delete { id }))
            .collect::<Vec<_>>();
        events.push(None);
        target
            .update(&mut events.into_iter())
            .context("applying -delete")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbh_core::id::{BackendTag, Id};
    use rbh_core::value::ValuePair;

    fn entry_with_xattrs(pairs: Vec<ValuePair<'static>>) -> rbh_core::fsentry::FSEntry<'static> {
        let mut entry = rbh_core::fsentry::FSEntry::id_only(Id::new(BackendTag::Posix, vec![1]));
        entry.inode_xattrs = pairs.into_iter().collect();
        entry
    }

    #[test]
    fn percent_e_prints_the_raw_expires_string() {
        let entry = entry_with_xattrs(vec![ValuePair {
            key: DEFAULT_EXPIRES_KEY.into(),
            value: Value::String("1700000000".into()),
        }]);
        assert_eq!(format_printf("%e", &entry), "1700000000");
    }

    #[test]
    fn percent_e_is_blank_when_never_enriched() {
        let entry = entry_with_xattrs(vec![]);
        assert_eq!(format_printf("%e", &entry), "");
    }

    #[test]
    fn percent_cap_e_formats_inf_and_none() {
        let inf = entry_with_xattrs(vec![ValuePair {
            key: EXPIRATION_DATE_KEY.into(),
            value: Value::Int64(i64::MAX),
        }]);
        assert_eq!(format_printf("%E", &inf), "Inf");

        let none = entry_with_xattrs(vec![]);
        assert_eq!(format_printf("%E", &none), "None");

        let dated = entry_with_xattrs(vec![ValuePair {
            key: EXPIRATION_DATE_KEY.into(),
            value: Value::Int64(1700000000),
        }]);
        assert_eq!(format_printf("%E", &dated), "1700000000");
    }
}
