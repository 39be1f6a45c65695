//! Archiver abstraction and the implementations shipped with the crate.

mod registry;
mod zip_archiver;

pub use registry::{ArchiverFactory, ArchiverRegistry};
pub use zip_archiver::ZipArchiver;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::options::{CompressionOptions, DecompressionOptions};

/// Packs a directory into archives and restores it.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Stable identifier used for lookup in an [`ArchiverRegistry`].
    fn name(&self) -> &'static str;

    /// Generate one or more archives from the input directory into the
    /// output directory. Returns the archives written, in part order.
    async fn compress(&self, options: &CompressionOptions) -> Result<Vec<PathBuf>>;

    /// Restore the tree packed by [`Archiver::compress`] from every archive
    /// found in the input directory.
    async fn decompress(&self, options: &DecompressionOptions) -> Result<()>;
}
