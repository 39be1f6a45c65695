use std::path::{Component, Path, PathBuf};

use tracing::{trace, warn};
use walkdir::WalkDir;

use super::splitter::{Fragment, Staging, split};
use crate::error::{ArchiverError, Result};

/// Housekeeping files left behind by desktop file managers.
const SKIPPED_FILE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One filesystem entry scheduled for an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Where the bytes are read from (source tree or staging area).
    pub source: PathBuf,
    /// Archive entry name: POSIX path relative to the input root, without
    /// the trailing `/` of directories.
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl ChunkEntry {
    fn directory(source: PathBuf, relative: &Path) -> Self {
        Self {
            source,
            name: posix_name(relative),
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    fn file(source: PathBuf, relative: &Path, size: u64) -> Self {
        Self {
            source,
            name: posix_name(relative),
            kind: EntryKind::File,
            size,
        }
    }
}

impl From<Fragment> for ChunkEntry {
    fn from(fragment: Fragment) -> Self {
        ChunkEntry::file(fragment.path, &fragment.relative, fragment.size)
    }
}

/// Ordered entries destined for a single archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    entries: Vec<ChunkEntry>,
    size: u64,
}

impl Chunk {
    pub fn entries(&self) -> &[ChunkEntry] {
        &self.entries
    }

    /// Aggregate size of the files in this chunk.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: ChunkEntry) {
        self.size += entry.size;
        self.entries.push(entry);
    }
}

/// Accumulator folded over the tree walk.
#[derive(Debug, Default)]
struct ChunkFold {
    chunks: Vec<Chunk>,
    current: Chunk,
}

impl ChunkFold {
    fn push_directory(mut self, entry: ChunkEntry) -> Self {
        trace!(directory = %entry.name, chunk = self.chunks.len(), "Added to chunk");
        self.current.push(entry);
        self
    }

    /// Append a file no larger than `limit`, opening a new chunk when the
    /// current one would overflow.
    fn push_file(mut self, entry: ChunkEntry, limit: Option<u64>) -> Self {
        if let Some(limit) = limit {
            if self.current.size + entry.size > limit && !self.current.is_empty() {
                let full = std::mem::take(&mut self.current);
                self.chunks.push(full);
            }
        }
        trace!(file = %entry.name, size = entry.size, chunk = self.chunks.len(), "Added to chunk");
        self.current.push(entry);
        self
    }

    fn finish(mut self) -> Vec<Chunk> {
        if !self.current.is_empty() {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Walk the tree below `root` in pre-order (root excluded, siblings sorted
/// by name) and group its entries into chunks of at most `limit` bytes.
///
/// Files larger than `limit` are split into fragments inside `staging`,
/// and the fragments are chunked like ordinary files. With no limit every
/// entry lands in a single chunk.
pub fn walk(root: &Path, limit: Option<u64>, staging: &mut Staging) -> Result<Vec<Chunk>> {
    let fold = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e.file_name().to_str()))
        .try_fold(ChunkFold::default(), |fold, entry| -> Result<ChunkFold> {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let path = entry.path();
            let relative = path.strip_prefix(root).map_err(|_| {
                ArchiverError::InvalidArgument(format!(
                    "'{}' is outside '{}'",
                    path.display(),
                    root.display()
                ))
            })?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                return Ok(fold.push_directory(ChunkEntry::directory(path.to_path_buf(), relative)));
            }
            if !file_type.is_file() {
                warn!(path = %path.display(), "Skipping entry that is not a regular file");
                return Ok(fold);
            }

            let size = entry.metadata().map_err(|e| walk_error(root, e))?.len();
            match limit {
                Some(limit) if size > limit => {
                    let fragments = split(path, relative, size, limit, staging)?;
                    Ok(fragments
                        .into_iter()
                        .fold(fold, |fold, fragment| fold.push_file(fragment.into(), Some(limit))))
                }
                _ => Ok(fold.push_file(ChunkEntry::file(path.to_path_buf(), relative, size), limit)),
            }
        })?;

    Ok(fold.finish())
}

fn is_skipped(file_name: Option<&str>) -> bool {
    file_name.is_some_and(|name| SKIPPED_FILE_NAMES.contains(&name))
}

fn walk_error(root: &Path, err: walkdir::Error) -> ArchiverError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    ArchiverError::io(path, source)
}

fn posix_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
