//! `rbh-info <uri>`: print plugin identity and introspection info for a
//! target backend.

use anyhow::{Context, Result};
use clap::Parser;
use rbh_core::backend::{Backend, InfoFlags};
use rbh_tools::open_target;

#[derive(Parser)]
#[command(name = "rbh-info", about = "Inspect a target backend")]
struct Cli {
    /// Target backend URI, e.g. `rbh:memory:myfs`.
    uri: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let uri: rbh_tools::Uri = cli.uri.parse().context("parsing URI")?;
    let target = open_target(&uri).context("opening target")?;

    let info = target.plugin_info();
    println!("backend: {} v{}", info.name, info.version);
    println!("capabilities: {:?}", info.capabilities);

    let flags = InfoFlags::BACKEND_NAME
        | InfoFlags::ROOT_ID
        | InfoFlags::ENTRY_COUNT
        | InfoFlags::AVAILABLE_SIZE;
    let details = target.get_info(flags).context("fetching backend info")?;
    for pair in details.iter() {
        println!("{}: {}", pair.key, pair.value);
    }
    Ok(())
}
