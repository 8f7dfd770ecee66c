//! `rbh-report <uri> <field>[:<boundary>,...] [<field>...] -- <agg>[:<field>] ...`:
//! group matching entries by one or more fields (optionally bucketed by
//! range boundaries) and print the requested aggregates per bucket.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rbh_core::attributes::StatxMask;
use rbh_core::filter::{Accumulator, Aggregate, Field, Filter, GroupBy, RangeField};
use rbh_core::value::Value;
use rbh_tools::open_target;

#[derive(Parser)]
#[command(name = "rbh-report", about = "Group and aggregate matching entries")]
struct Cli {
    /// Target backend URI, e.g. `rbh:memory:myfs`.
    uri: String,
    /// Range fields to group by, e.g. `size` or `size:0,1024,1048576`.
    #[arg(long = "group", required = true)]
    group: Vec<String>,
    /// Aggregates to compute, e.g. `count` or `avg:size`.
    #[arg(long = "agg", required = true)]
    agg: Vec<String>,
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
        other => bail!("unknown field {other:?}"),
    })
}

fn parse_group(raw: &str) -> Result<RangeField> {
    match raw.split_once(':') {
        Some((name, boundaries)) => {
            let field = field_by_name(name)?;
            let values = boundaries
                .split(',')
                .map(|b| b.parse::<i64>().map(Value::Int64))
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("parsing boundaries for {name:?}"))?;
            Ok(RangeField::buckets(field, values))
        }
        None => Ok(RangeField::exact(field_by_name(raw)?)),
    }
}

fn parse_agg(raw: &str) -> Result<Aggregate> {
    if raw == "count" {
        return Ok(Aggregate::count());
    }
    match raw.split_once(':') {
        Some((name, field)) => {
            let accumulator = match name {
                "avg" => Accumulator::Avg,
                "max" => Accumulator::Max,
                "min" => Accumulator::Min,
                "sum" => Accumulator::Sum,
                other => bail!("unknown accumulator {other:?}"),
            };
            Ok(Aggregate::over(accumulator, field_by_name(field)?))
        }
        None => bail!("aggregate {raw:?} needs a field, e.g. \"avg:size\""),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let uri: rbh_tools::Uri = cli.uri.parse().context("parsing URI")?;
    let target = open_target(&uri).context("opening target")?;

    let grouping = GroupBy {
        range_fields: cli.group.iter().map(|g| parse_group(g)).collect::<Result<_>>()?,
        aggregates: cli.agg.iter().map(|a| parse_agg(a)).collect::<Result<_>>()?,
    };

    let rows = target
        .report(&Filter::All, &grouping, &Default::default())
        .context("running report")?;

    for row in rows {
        let row = row.context("reading group row")?;
        let id_parts: Vec<String> = row
            .id
            .iter()
            .map(|pair| format!("{}={}", pair.key, pair.value))
            .collect();
        let acc_parts: Vec<String> = row
            .accumulators
            .iter()
            .map(|pair| format!("{}={}", pair.key, pair.value))
            .collect();
        println!("{}  {}", id_parts.join(" "), acc_parts.join(" "));
    }
    Ok(())
}
