//! Main entry point for the zipsplit CLI application.
//!
//! Parses the command line, installs logging, resolves the requested
//! archiver from the registry and runs the chosen operation.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zipsplit::cli::Command;
use zipsplit::{ArchiverRegistry, Cli, CompressionOptions, DecompressionOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::builder()
        .with_default_directive(cli.log_level().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = ArchiverRegistry::with_defaults();
    let archiver = registry.create(&cli.archiver).with_context(|| {
        format!(
            "available archivers: {}",
            registry.names().collect::<Vec<_>>().join(", ")
        )
    })?;

    match cli.command {
        Command::Compress {
            input,
            output,
            max_file_size,
            buffer_size,
        } => {
            let options = CompressionOptions::new(input, output, buffer_size, max_file_size)?;
            let archives = archiver.compress(&options).await?;
            if !cli.quiet {
                for archive in archives {
                    println!("{}", archive.display());
                }
            }
        }
        Command::Decompress {
            input,
            output,
            buffer_size,
        } => {
            let options = DecompressionOptions::new(input, output, buffer_size)?;
            archiver.decompress(&options).await?;
        }
    }

    Ok(())
}
