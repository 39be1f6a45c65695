//! Immutable inputs for a single compress or decompress call.

use std::path::{Path, PathBuf};

use crate::error::{ArchiverError, Result};

/// Default copy buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Paths and buffer size shared by both directions.
pub trait IoOptions {
    fn input(&self) -> &Path;
    fn output(&self) -> &Path;
    fn buffer_size(&self) -> usize;
}

/// Options for packing a directory into one or more archives.
#[derive(Debug, Clone)]
pub struct CompressionOptions {
    input: PathBuf,
    output: PathBuf,
    buffer_size: usize,
    max_file_size: Option<u64>,
}

impl CompressionOptions {
    /// `max_file_size <= 0` disables chunking.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        buffer_size: usize,
        max_file_size: i64,
    ) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            output: output.into(),
            buffer_size: check_buffer_size(buffer_size)?,
            max_file_size: u64::try_from(max_file_size).ok().filter(|&m| m > 0),
        })
    }

    /// Upper bound on the aggregate size of one chunk, if any.
    pub fn max_file_size(&self) -> Option<u64> {
        self.max_file_size
    }
}

impl IoOptions for CompressionOptions {
    fn input(&self) -> &Path {
        &self.input
    }

    fn output(&self) -> &Path {
        &self.output
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Options for restoring a directory from archives.
#[derive(Debug, Clone)]
pub struct DecompressionOptions {
    input: PathBuf,
    output: PathBuf,
    buffer_size: usize,
}

impl DecompressionOptions {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        buffer_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            output: output.into(),
            buffer_size: check_buffer_size(buffer_size)?,
        })
    }
}

impl IoOptions for DecompressionOptions {
    fn input(&self) -> &Path {
        &self.input
    }

    fn output(&self) -> &Path {
        &self.output
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

fn check_buffer_size(buffer_size: usize) -> Result<usize> {
    if buffer_size == 0 {
        return Err(ArchiverError::InvalidArgument(
            "Buffer size must be greater than zero".to_string(),
        ));
    }
    Ok(buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn zero_buffer_is_rejected() {
        let err = CompressionOptions::new("in", "out", 0, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = DecompressionOptions::new("in", "out", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn non_positive_limit_means_unlimited() {
        for limit in [-1, 0] {
            let options = CompressionOptions::new("in", "out", 512, limit).unwrap();
            assert_eq!(options.max_file_size(), None);
        }

        let options = CompressionOptions::new("in", "out", 512, 1000).unwrap();
        assert_eq!(options.max_file_size(), Some(1000));
        assert_eq!(options.buffer_size(), 512);
        assert_eq!(options.input(), Path::new("in"));
        assert_eq!(options.output(), Path::new("out"));
    }
}
