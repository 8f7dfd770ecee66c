//! `rbh-gc <target-uri> <mount-path>`: reconcile a target against a live
//! mount, deleting (or reporting) entries that no longer exist.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rbh_core::statx::Timestamp;
use rbh_tools::open_target;

#[derive(Parser)]
#[command(name = "rbh-gc", about = "Reclaim orphaned target entries")]
struct Cli {
    /// Target backend URI, e.g. `rbh:memory:myfs`.
    target: String,
    /// The live mount to probe liveness against.
    mount: PathBuf,
    /// Only consider entries whose `sync_time` predates this many seconds
    /// since the Unix epoch.
    #[arg(long)]
    sync_time_before: Option<i64>,
    /// Report what would be deleted instead of deleting it.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let uri: rbh_tools::Uri = cli.target.parse().context("parsing target URI")?;
    let mut target = open_target(&uri).context("opening target")?;

    let threshold = cli.sync_time_before.map(|sec| Timestamp { sec, nsec: 0 });
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let report = rbh_core::gc::collect(
        target.as_mut(),
        &cli.mount,
        threshold,
        cli.dry_run,
        &mut out,
    )
    .context("running garbage collection")?;

    log::info!(
        "gc complete: {} absent entr{} ({})",
        report.absent_count,
        if report.absent_count == 1 { "y" } else { "ies" },
        if report.dry_run { "dry run" } else { "deleted" }
    );
    Ok(())
}
