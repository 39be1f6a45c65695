use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::options::DEFAULT_BUFFER_SIZE;

#[derive(Parser, Debug)]
#[command(name = "zipsplit")]
#[command(version)]
#[command(about = "Pack a directory into size-bounded zip archives and restore it", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipsplit compress -i photos -o backup -m 104857600   at most 100 MiB per archive\n  \
  zipsplit decompress -i backup -o restored            rebuild photos/ from backup/*.zip")]
pub struct Cli {
    /// Archiver implementation to use
    #[arg(short = 'a', long, default_value = "zip", global = true)]
    pub archiver: String,

    /// More logging (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack a directory into one or more archives
    Compress {
        /// Input directory where files to compress are found
        #[arg(short = 'i', long, value_name = "DIR")]
        input: PathBuf,

        /// Output directory where compression results are generated
        #[arg(short = 'o', long, value_name = "DIR")]
        output: PathBuf,

        /// Maximum bytes of file data per archive; 0 or less disables splitting
        #[arg(short = 'm', long, default_value_t = -1, allow_negative_numbers = true)]
        max_file_size: i64,

        /// Buffer size when writing files during compression
        #[arg(short = 'b', long, default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,
    },

    /// Restore a directory from the archives in a directory
    Decompress {
        /// Input directory where archives to decompress are found
        #[arg(short = 'i', long, value_name = "DIR")]
        input: PathBuf,

        /// Output directory where decompression results are generated
        #[arg(short = 'o', long, value_name = "DIR")]
        output: PathBuf,

        /// Buffer size when writing files during decompression
        #[arg(short = 'b', long, default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,
    },
}

impl Cli {
    /// Default log level when `RUST_LOG` is unset
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compress_with_defaults() {
        let cli = Cli::try_parse_from(["zipsplit", "compress", "-i", "in", "-o", "out"]).unwrap();
        assert_eq!(cli.archiver, "zip");
        assert_eq!(cli.log_level(), LevelFilter::INFO);
        match cli.command {
            Command::Compress {
                input,
                output,
                max_file_size,
                buffer_size,
            } => {
                assert_eq!(input, PathBuf::from("in"));
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(max_file_size, -1);
                assert_eq!(buffer_size, DEFAULT_BUFFER_SIZE);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_decompress_with_global_flags() {
        let cli = Cli::try_parse_from([
            "zipsplit", "decompress", "-i", "in", "-o", "out", "-b", "4096", "-vv", "-a", "zip",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), LevelFilter::TRACE);
        assert!(matches!(
            cli.command,
            Command::Decompress { buffer_size: 4096, .. }
        ));
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(Cli::try_parse_from(["zipsplit", "compress", "-i", "in"]).is_err());
        assert!(Cli::try_parse_from(["zipsplit", "decompress"]).is_err());
    }
}
