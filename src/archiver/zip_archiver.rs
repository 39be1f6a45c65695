//! Zip implementation of [`Archiver`].
//!
//! Compression walks the input tree into size-bounded chunks (splitting
//! oversized files into fragments) and writes one archive per chunk, in
//! parallel when there is more than one. Decompression replays every
//! archive strictly in part order, appending fragment bytes so that split
//! files come back whole.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info};

use super::Archiver;
use crate::chunk::{self, Chunk, EntryKind, Staging};
use crate::error::{ArchiverError, IoResultExt, Result};
use crate::io::LocalFileReader;
use crate::naming::{ARCHIVE_SUFFIX, archive_name, archive_sort_key, strip_part};
use crate::options::{CompressionOptions, DecompressionOptions, IoOptions};
use crate::validate::check_arguments;
use crate::zip::{ZipExtractor, ZipWriter};

/// Archiver producing `.zip` containers.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiver {
    max_parallel_writes: Option<NonZeroUsize>,
    staging_dir: Option<PathBuf>,
}

impl ZipArchiver {
    pub const NAME: &'static str = "zip";

    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of archives written concurrently. Defaults to the
    /// available parallelism.
    pub fn max_parallel_writes(mut self, limit: NonZeroUsize) -> Self {
        self.max_parallel_writes = Some(limit);
        self
    }

    /// Create the fragment staging area below `dir` rather than the
    /// system temp directory.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    fn parallelism(&self) -> usize {
        self.max_parallel_writes
            .or_else(|| std::thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }

    /// Write each chunk to `<base>.part.<index>.zip`, several at a time.
    ///
    /// The first failure stops scheduling, aborts the writes still in
    /// flight and is returned. Archives already written stay on disk.
    async fn write_parts(
        &self,
        chunks: Vec<Chunk>,
        output: &Path,
        base: &str,
        buffer_size: usize,
    ) -> Result<Vec<PathBuf>> {
        let permits = Arc::new(Semaphore::new(self.parallelism()));
        let mut tasks = JoinSet::new();
        let mut failure = None;
        let archives: Vec<PathBuf> = (0..chunks.len())
            .map(|index| output.join(archive_name(base, Some(index))))
            .collect();

        for (chunk, dest) in chunks.into_iter().zip(archives.iter().cloned()) {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ArchiverError::io(output, std::io::Error::other(e)))?;

            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = flatten(done, output) {
                    failure = Some(e);
                    break;
                }
            }
            if failure.is_some() {
                break;
            }

            tasks.spawn(async move {
                let _permit = permit;
                write_chunk(&chunk, &dest, buffer_size).await
            });
        }

        while failure.is_none() {
            match tasks.join_next().await {
                Some(done) => {
                    if let Err(e) = flatten(done, output) {
                        failure = Some(e);
                    }
                }
                None => break,
            }
        }

        match failure {
            Some(e) => {
                tasks.shutdown().await;
                Err(e)
            }
            None => Ok(archives),
        }
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn compress(&self, options: &CompressionOptions) -> Result<Vec<PathBuf>> {
        check_arguments(options)?;
        let input = options.input().to_path_buf();
        let output = options.output();
        let base = base_name(&input)?;
        let limit = options.max_file_size();

        let mut staging = match &self.staging_dir {
            Some(dir) => Staging::new_in(dir),
            None => Staging::new(),
        };
        let (chunks, staging) = tokio::task::spawn_blocking(move || {
            let chunks = chunk::walk(&input, limit, &mut staging)?;
            Ok::<_, ArchiverError>((chunks, staging))
        })
        .await
        .map_err(|e| join_error(e, options.input()))??;
        info!(
            input = %options.input().display(),
            chunks = chunks.len(),
            limit = ?limit,
            "Chunked input"
        );

        let archives = if chunks.len() > 1 {
            self.write_parts(chunks, output, &base, options.buffer_size())
                .await?
        } else {
            let dest = output.join(archive_name(&base, None));
            let chunk = chunks.into_iter().next().unwrap_or_default();
            write_chunk(&chunk, &dest, options.buffer_size()).await?;
            vec![dest]
        };

        staging.close()?;
        Ok(archives)
    }

    async fn decompress(&self, options: &DecompressionOptions) -> Result<()> {
        check_arguments(options)?;
        let archives = list_archives(options.input())?;
        if archives.is_empty() {
            return Err(ArchiverError::NotFound(format!(
                "Input '{}' contains no {} archives",
                options.input().display(),
                ARCHIVE_SUFFIX
            )));
        }

        for archive in &archives {
            restore_archive(archive, options.output(), options.buffer_size()).await?;
        }
        Ok(())
    }
}

/// Serialize one chunk into the archive at `dest`, preserving entry order.
async fn write_chunk(chunk: &Chunk, dest: &Path, buffer_size: usize) -> Result<u64> {
    let mut writer = ZipWriter::create(dest).await.with_path(dest)?;

    for entry in chunk.entries() {
        match entry.kind {
            EntryKind::Directory => {
                writer.add_directory(&entry.name).await.with_path(dest)?;
                debug!(directory = %format!("{}/", entry.name), "Written");
            }
            EntryKind::File => {
                let mut source = tokio::fs::File::open(&entry.source)
                    .await
                    .with_path(&entry.source)?;
                writer
                    .add_file(&entry.name, &mut source, entry.size, buffer_size)
                    .await
                    .with_path(dest)?;
                debug!(file = %entry.name, "Written");
            }
        }
    }

    let entries = writer.len();
    let size = writer.finish().await.with_path(dest)?;
    info!(archive = %dest.display(), entries, size, "Archive written");
    Ok(size)
}

/// Replay one archive into `output`, in Central Directory order.
async fn restore_archive(archive: &Path, output: &Path, buffer_size: usize) -> Result<()> {
    let reader = LocalFileReader::new(archive).with_path(archive)?;
    let extractor = ZipExtractor::new(Arc::new(reader));
    let entries = extractor.list_files().await.with_path(archive)?;

    for entry in &entries {
        let relative = entry.relative_path().with_path(archive)?;
        if entry.is_directory {
            let dir = output.join(&relative);
            tokio::fs::create_dir_all(&dir).await.with_path(&dir)?;
            debug!(directory = %entry.file_name, "Restored");
            continue;
        }

        let target = output.join(unpart(&relative));
        let appended = extractor
            .extract_append(entry, &target, buffer_size)
            .await
            .with_path(&target)?;
        debug!(file = %entry.file_name, target = %target.display(), appended, "Restored");
    }

    info!(archive = %archive.display(), entries = entries.len(), "Archive extracted");
    Ok(())
}

/// Archives in `dir`, ordered by numeric part index.
fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();
        let is_archive = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(ARCHIVE_SUFFIX));
        if is_archive && path.is_file() {
            archives.push(path);
        }
    }

    archives.sort_by(|a, b| archive_sort_key(&file_name(a)).cmp(&archive_sort_key(&file_name(b))));
    Ok(archives)
}

/// Destination path of an entry: its name with any `.part.<N>` removed.
fn unpart(relative: &Path) -> PathBuf {
    match relative.file_name().and_then(|n| n.to_str()) {
        Some(name) => relative.with_file_name(strip_part(name)),
        None => relative.to_path_buf(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn base_name(input: &Path) -> Result<String> {
    let resolved = fs::canonicalize(input).with_path(input)?;
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ArchiverError::InvalidArgument(format!(
                "Input '{}' has no directory name",
                input.display()
            ))
        })
}

fn flatten(done: std::result::Result<Result<u64>, JoinError>, output: &Path) -> Result<u64> {
    done.map_err(|e| join_error(e, output))?
}

fn join_error(err: JoinError, path: &Path) -> ArchiverError {
    ArchiverError::io(path, std::io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn write(root: &Path, relative: &str, data: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn unpart_strips_only_the_file_name() {
        assert_eq!(
            unpart(Path::new("a.part.1/b.part.3.txt")),
            PathBuf::from("a.part.1/b.txt")
        );
        assert_eq!(unpart(Path::new("plain.txt")), PathBuf::from("plain.txt"));
    }

    #[test]
    fn archives_are_listed_by_numeric_part() {
        let tmp = tempfile::tempdir().unwrap();
        for index in [10, 2, 0, 1, 11] {
            write(tmp.path(), &format!("data.part.{index}.zip"), b"");
        }
        write(tmp.path(), "notes.txt", b"");
        fs::create_dir(tmp.path().join("dir.zip")).unwrap();

        let names: Vec<String> = list_archives(tmp.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(
            names,
            vec![
                "data.part.0.zip",
                "data.part.1.zip",
                "data.part.2.zip",
                "data.part.10.zip",
                "data.part.11.zip",
            ]
        );
    }

    #[tokio::test]
    async fn parallel_round_trip_with_many_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        let big: Vec<u8> = (0..5_000u32).map(|i| (i % 253) as u8).collect();
        write(&input, "big.bin", &big);
        write(&input, "sub/small.txt", b"tiny");

        let packed = tmp.path().join("packed");
        let archiver = ZipArchiver::new().max_parallel_writes(NonZeroUsize::new(3).unwrap());
        let archives = archiver
            .compress(&CompressionOptions::new(&input, &packed, 64, 400).unwrap())
            .await
            .unwrap();
        // 12 full fragments, then the 200-byte tail shares a part with sub/
        assert_eq!(archives.len(), 13);
        assert!(packed.join("data.part.12.zip").exists());
        assert!(!packed.join("data.zip").exists());

        let restored = tmp.path().join("restored");
        archiver
            .decompress(&DecompressionOptions::new(&packed, &restored, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(fs::read(restored.join("big.bin")).unwrap(), big);
        assert_eq!(fs::read(restored.join("sub/small.txt")).unwrap(), b"tiny");
    }

    #[tokio::test]
    async fn failed_part_write_keeps_earlier_parts_and_drops_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        write(&input, "big.bin", &vec![7u8; 1_200]);
        let scratch = tmp.path().join("scratch");
        fs::create_dir(&scratch).unwrap();

        // A directory squatting on the second part's name makes its write fail
        let packed = tmp.path().join("packed");
        fs::create_dir_all(packed.join("data.part.1.zip")).unwrap();

        let archiver = ZipArchiver::new()
            .max_parallel_writes(NonZeroUsize::new(1).unwrap())
            .staging_dir(&scratch);
        let err = archiver
            .compress(&CompressionOptions::new(&input, &packed, 64, 400).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().contains("data.part.1.zip"));
        assert!(packed.join("data.part.0.zip").is_file());
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn decompress_without_archives_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "in/readme.txt", b"not an archive");

        let err = ZipArchiver::new()
            .decompress(
                &DecompressionOptions::new(tmp.path().join("in"), tmp.path().join("out"), 16)
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_io_failure() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "in/data.zip", b"PK but not really");

        let err = ZipArchiver::new()
            .decompress(
                &DecompressionOptions::new(tmp.path().join("in"), tmp.path().join("out"), 16)
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().contains("data.zip"));
    }
}
