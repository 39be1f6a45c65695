//! Error taxonomy shared by every archiver operation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type returned by the archiver core.
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Coarse classification of an [`ArchiverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input missing, or the input directory has no children.
    NotFound,
    /// Input/output is not a directory, or an option is out of range.
    InvalidArgument,
    /// Any read/write failure during walk, split, write or reassembly.
    IoFailure,
    /// No archiver is registered under the requested name.
    UnsupportedArchiver,
}

#[derive(Error, Debug)]
pub enum ArchiverError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported archiver '{0}'")]
    UnsupportedArchiver(String),
}

impl ArchiverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiverError::NotFound(_) => ErrorKind::NotFound,
            ArchiverError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ArchiverError::Io { .. } => ErrorKind::IoFailure,
            ArchiverError::UnsupportedArchiver(_) => ErrorKind::UnsupportedArchiver,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiverError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attach the path an I/O operation was working on.
pub trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| ArchiverError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_carry_path_and_kind() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        let err = result.with_path(Path::new("out/data.zip")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IoFailure);
        let message = err.to_string();
        assert!(message.contains("out/data.zip"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            ArchiverError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ArchiverError::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ArchiverError::UnsupportedArchiver("tar".into()).kind(),
            ErrorKind::UnsupportedArchiver
        );
    }
}
