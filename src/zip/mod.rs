//! ZIP archive reading and writing.
//!
//! This module provides everything needed to produce and consume the
//! single-volume ZIP archives this crate works with.
//!
//! ## Architecture
//!
//! The module is organized into four components:
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Streaming extraction, including append-mode extraction
//! - [`writer`]: Streaming archive creation
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The reader starts from the EOCD, then walks the Central Directory,
//! which lists entries in the order they were written.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) method when reading
//! - DEFLATE compression method
//! - CRC-32 verification on extraction
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::ZipWriter;
