//! Put command - import a local file into the object store.

use std::path::PathBuf;

use clap::Args;
use rangefetch::ConfigFile;

use super::common::{create_runtime, format_size, StoreArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct PutArgs {
    /// Local file to import
    pub file: PathBuf,

    /// Logical object path, e.g. media/clip.mp4
    pub path: String,

    /// Chunk size in bytes (defaults to [store] chunk_size)
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Run the put command.
pub fn run(args: PutArgs, config: &ConfigFile) -> Result<(), CliError> {
    let chunk_size = args.chunk_size.unwrap_or(config.store.chunk_size);
    if chunk_size == 0 {
        return Err(CliError::Config("chunk size must be positive".to_string()));
    }

    let store = args.store.open(config);
    let runtime = create_runtime()?;
    let metadata = runtime.block_on(store.import(&args.path, &args.file, chunk_size))?;

    println!("Stored {}", metadata.path);
    println!("  Size:   {}", format_size(metadata.size));
    println!(
        "  Chunks: {} x {}",
        metadata.chunk_count,
        format_size(metadata.chunk_size)
    );
    println!("  Store:  {}", store.root().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangefetch::Catalog;
    use tempfile::TempDir;

    #[test]
    fn test_put_imports_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("clip.bin");
        std::fs::write(&source, vec![3u8; 2500]).unwrap();
        let store_dir = temp.path().join("store");

        let args = PutArgs {
            file: source,
            path: "media/clip.bin".to_string(),
            chunk_size: Some(1000),
            store: StoreArgs {
                store: Some(store_dir.clone()),
            },
        };
        run(args, &ConfigFile::default()).unwrap();

        let store = rangefetch::DirectoryStore::new(store_dir);
        let metadata = create_runtime()
            .unwrap()
            .block_on(store.resolve("media/clip.bin"))
            .unwrap();
        assert_eq!(metadata.size, 2500);
        assert_eq!(metadata.chunk_count, 3);
    }

    #[test]
    fn test_put_rejects_zero_chunk_size() {
        let temp = TempDir::new().unwrap();
        let args = PutArgs {
            file: temp.path().join("missing"),
            path: "x".to_string(),
            chunk_size: Some(0),
            store: StoreArgs {
                store: Some(temp.path().to_path_buf()),
            },
        };
        assert!(matches!(
            run(args, &ConfigFile::default()),
            Err(CliError::Config(_))
        ));
    }
}
