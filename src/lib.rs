//! # zipsplit
//!
//! Pack a directory tree into one or more size-bounded zip archives and
//! restore it byte for byte.
//!
//! Compression walks the input directory in a stable pre-order and groups
//! its entries into chunks whose total size stays within a configured
//! limit. A file larger than the limit is cut into `.part.<N>` fragments
//! that are chunked like ordinary files. Each chunk becomes its own
//! archive: `<dir>.zip` for a single chunk, `<dir>.part.<N>.zip` otherwise.
//!
//! Decompression processes the archives in numeric part order and appends
//! every fragment to its original file, so split files are reassembled
//! across archive boundaries.
//!
//! ## Limitations
//!
//! A file whose name already carries a `.part.<N>` infix is
//! indistinguishable from a fragment. It round-trips with the infix
//! removed: `notes.part.1.txt` is restored as `notes.txt`, even when it was
//! never split. Two such files that differ only in the index are
//! concatenated into one.
//!
//! ## Features
//!
//! - Size-bounded multi-part output with transparent file splitting
//! - Parallel archive writes with fail-fast error handling
//! - Streaming DEFLATE codec with CRC-32 verification and ZIP64 support
//! - Archivers selected by name through an explicit registry
//!
//! ## Example
//!
//! ```no_run
//! use zipsplit::{Archiver, CompressionOptions, DecompressionOptions, ZipArchiver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let archiver = ZipArchiver::new();
//!
//!     // At most 10 MiB of file data per archive
//!     let options = CompressionOptions::new("photos", "backup", 64 * 1024, 10 << 20)?;
//!     for archive in archiver.compress(&options).await? {
//!         println!("{}", archive.display());
//!     }
//!
//!     let options = DecompressionOptions::new("backup", "restored", 64 * 1024)?;
//!     archiver.decompress(&options).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod archiver;
pub mod chunk;
pub mod cli;
pub mod error;
pub mod io;
pub mod naming;
pub mod options;
pub mod validate;
pub mod zip;

pub use archiver::{Archiver, ArchiverFactory, ArchiverRegistry, ZipArchiver};
pub use cli::Cli;
pub use error::{ArchiverError, ErrorKind, Result};
pub use io::{LocalFileReader, ReadAt};
pub use options::{CompressionOptions, DecompressionOptions, IoOptions};
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};
