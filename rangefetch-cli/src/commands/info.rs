//! Info command - show object metadata.

use clap::Args;
use rangefetch::{Catalog, ConfigFile};

use super::common::{create_runtime, format_size, StoreArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Logical object path
    pub path: String,

    /// Print metadata as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Run the info command.
pub fn run(args: InfoArgs, config: &ConfigFile) -> Result<(), CliError> {
    let store = args.store.open(config);
    let runtime = create_runtime()?;
    let metadata = runtime.block_on(store.resolve(&args.path))?;

    if args.json {
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| CliError::Output(e.into()))?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", metadata.path);
    println!("  Size:       {} ({} bytes)", format_size(metadata.size), metadata.size);
    println!("  Chunk size: {}", format_size(metadata.chunk_size));
    println!("  Chunks:     {}", metadata.chunk_count);
    Ok(())
}
