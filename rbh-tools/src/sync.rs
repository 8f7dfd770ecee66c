//! `rbh-sync <source-path> <target-uri>`: walk a POSIX tree and apply
//! the resulting event stream to a target backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rbh_core::backend::Backend;
use rbh_core::source::PosixWalker;
use rbh_tools::open_target;

#[derive(Parser)]
#[command(name = "rbh-sync", about = "Mirror a POSIX tree into a target backend")]
struct Cli {
    /// Root of the POSIX tree to walk.
    source: PathBuf,
    /// Target backend URI, e.g. `rbh:memory:myfs`.
    target: String,
    /// Keep walking past per-entry stat errors instead of aborting.
    #[arg(long)]
    skip_errors: bool,
    /// How many events to batch before flushing to the target.
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let uri: rbh_tools::Uri = cli.target.parse().context("parsing target URI")?;
    let mut target = open_target(&uri).context("opening target")?;

    let walker = PosixWalker::new(&cli.source, cli.skip_errors);
    let mut applied = 0u64;
    let mut batch = Vec::with_capacity(cli.chunk_size);

    for event in walker {
        let event = event.context("walking source tree")?;
        batch.push(Some(event));
        if batch.len() >= cli.chunk_size {
            batch.push(None);
            applied += target.update(&mut batch.drain(..)).context("applying batch")?;
        }
    }
    if !batch.is_empty() {
        batch.push(None);
        applied += target.update(&mut batch.drain(..)).context("applying final batch")?;
    }

    log::info!("applied {applied} events from {:?}", cli.source);
    Ok(())
}
