use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::trace;

use crate::error::{ArchiverError, IoResultExt, Result};
use crate::naming::part_name;

/// Copy buffer used while cutting fragments.
const SPLIT_BUFFER_SIZE: usize = 8 * 1024;

/// Scratch directory holding fragments for the duration of one compress
/// call. Created on first use; removed by [`Staging::close`] or on drop.
#[derive(Debug, Default)]
pub struct Staging {
    dir: Option<TempDir>,
    /// Where the staging directory is created; the system temp dir if unset
    parent: Option<PathBuf>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage fragments below `parent` instead of the system temp directory.
    pub fn new_in(parent: impl Into<PathBuf>) -> Self {
        Self {
            dir: None,
            parent: Some(parent.into()),
        }
    }

    /// Staging root, if anything has been staged yet.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    fn root(&mut self) -> Result<&Path> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let parent = self.parent.clone().unwrap_or_else(std::env::temp_dir);
                let dir = tempfile::Builder::new()
                    .prefix("compress-")
                    .tempdir_in(&parent)
                    .map_err(|e| ArchiverError::io(parent, e))?;
                trace!(staging = %dir.path().display(), "Created staging area");
                dir
            }
        };
        Ok(self.dir.insert(dir).path())
    }

    /// Delete the staging area and everything in it.
    pub fn close(self) -> Result<()> {
        match self.dir {
            Some(dir) => {
                let path = dir.path().to_path_buf();
                dir.close().with_path(&path)
            }
            None => Ok(()),
        }
    }
}

/// A contiguous byte range of a source file, staged as its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Location of the fragment inside the staging area.
    pub path: PathBuf,
    /// Logical path relative to the input root, with the `.part.<N>` infix.
    pub relative: PathBuf,
    pub size: u64,
}

/// Cut `file` (of `size` bytes, located at `relative` below the input root)
/// into fragments of exactly `limit` bytes, with the remainder last.
///
/// Requires `size > limit > 0`. Concatenating the returned fragments in
/// order reproduces the source byte for byte.
pub fn split(
    file: &Path,
    relative: &Path,
    size: u64,
    limit: u64,
    staging: &mut Staging,
) -> Result<Vec<Fragment>> {
    debug_assert!(limit > 0 && size > limit);

    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ArchiverError::InvalidArgument(format!("'{}' has no file name", file.display()))
        })?;
    let parent = relative.parent().unwrap_or(Path::new(""));

    let stage_dir = staging.root()?.join(parent);
    fs::create_dir_all(&stage_dir).with_path(&stage_dir)?;

    let mut reader = BufReader::new(File::open(file).with_path(file)?);
    let mut buf = vec![0u8; SPLIT_BUFFER_SIZE];
    let mut fragments = Vec::new();
    let mut remaining = size;

    let mut index = 0;
    while remaining > 0 {
        let len = remaining.min(limit);
        let name = part_name(&file_name, index);
        let path = stage_dir.join(&name);

        let mut out = File::create(&path).with_path(&path)?;
        copy_exact(&mut reader, &mut out, len, &mut buf).map_err(|e| ArchiverError::io(file, e))?;
        out.flush().with_path(&path)?;

        trace!(source = %file.display(), fragment = %path.display(), len, "Created fragment");
        fragments.push(Fragment {
            path,
            relative: parent.join(&name),
            size: len,
        });
        remaining -= len;
        index += 1;
    }

    Ok(fragments)
}

fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    mut len: u64,
    buf: &mut [u8],
) -> std::io::Result<()> {
    while len > 0 {
        let n = len.min(buf.len() as u64) as usize;
        reader.read_exact(&mut buf[..n])?;
        writer.write_all(&buf[..n])?;
        len -= n as u64;
    }
    Ok(())
}
