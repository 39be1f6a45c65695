//! Streaming ZIP archive writer.
//!
//! Entries are appended one at a time. Each file entry's Local File Header
//! is written with placeholder CRC and sizes, the data is streamed through
//! the DEFLATE encoder, and the header is then patched in place. The
//! Central Directory and End of Central Directory records are emitted by
//! [`ZipWriter::finish`].

use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use std::io::{Error, ErrorKind, Result, SeekFrom, Write};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};

use super::structures::*;

/// Entries whose uncompressed size reaches this bound get ZIP64 headers.
///
/// Kept below `u32::MAX` so that DEFLATE expansion of incompressible data
/// still fits in the classic 32-bit fields.
const ZIP64_THRESHOLD: u64 = 0xFFFF_0000;

/// Writes a single ZIP archive to disk.
pub struct ZipWriter {
    out: BufWriter<File>,
    /// Bytes written so far; the offset of the next record
    offset: u64,
    entries: Vec<ZipFileEntry>,
}

impl ZipWriter {
    /// Create (or truncate) the archive at `path`.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            out: BufWriter::new(file),
            offset: 0,
            entries: Vec::new(),
        })
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an empty directory entry. A trailing `/` is appended to `name`
    /// if missing.
    pub async fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        let entry = ZipFileEntry::new(name, CompressionMethod::Stored, self.offset);

        let mut header = Vec::with_capacity(LFH_SIZE + entry.file_name.len());
        entry.write_local_header(false, &mut header)?;
        self.write(&header).await?;

        self.entries.push(entry);
        Ok(())
    }

    /// Add a file entry named `name`, compressing everything `reader`
    /// yields. `size_hint` is the expected uncompressed size; it decides
    /// whether ZIP64 headers are needed. Data is copied in pieces of
    /// `buffer_size` bytes. Returns the uncompressed size.
    pub async fn add_file<R: AsyncRead + Unpin>(
        &mut self,
        name: &str,
        reader: &mut R,
        size_hint: u64,
        buffer_size: usize,
    ) -> Result<u64> {
        if name.ends_with('/') {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("File entry name '{name}' ends with '/'"),
            ));
        }
        let zip64 = size_hint >= ZIP64_THRESHOLD;
        let mut entry = ZipFileEntry::new(name.to_string(), CompressionMethod::Deflate, self.offset);

        let mut header = Vec::with_capacity(LFH_SIZE + name.len() + 20);
        entry.write_local_header(zip64, &mut header)?;
        let header_len = header.len();
        self.write(&header).await?;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        let mut crc = Crc::new();
        let mut buf = vec![0u8; buffer_size.max(1)];
        let mut uncompressed = 0u64;
        let mut compressed = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
            uncompressed += n as u64;
            encoder.write_all(&buf[..n])?;
            compressed += self.drain(encoder.get_mut()).await?;
        }
        let tail = encoder.finish()?;
        compressed += tail.len() as u64;
        self.write(&tail).await?;

        if !zip64 && (uncompressed >= ZIP64_MARKER_U32 as u64 || compressed >= ZIP64_MARKER_U32 as u64) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("'{name}' grew past {size_hint} bytes while being archived"),
            ));
        }

        entry.crc32 = crc.sum();
        entry.uncompressed_size = uncompressed;
        entry.compressed_size = compressed;

        // Patch the local header now that CRC and sizes are known
        header.clear();
        entry.write_local_header(zip64, &mut header)?;
        debug_assert_eq!(header.len(), header_len);
        self.out.seek(SeekFrom::Start(entry.lfh_offset)).await?;
        self.out.write_all(&header).await?;
        self.out.seek(SeekFrom::Start(self.offset)).await?;

        self.entries.push(entry);
        Ok(uncompressed)
    }

    /// Write the Central Directory and End of Central Directory records,
    /// then flush everything to disk. Returns the archive size in bytes.
    pub async fn finish(mut self) -> Result<u64> {
        let cd_offset = self.offset;
        let mut cd = Vec::new();
        for entry in &self.entries {
            entry.write_central_header(&mut cd)?;
        }
        let cd_size = cd.len() as u64;
        let total_entries = self.entries.len() as u64;

        let eocd = EndOfCentralDirectory::new(total_entries, cd_size, cd_offset);
        if eocd.is_zip64() {
            let eocd64_offset = cd_offset + cd_size;
            Zip64EOCD::new(total_entries, cd_size, cd_offset).write_to(&mut cd)?;
            Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            }
            .write_to(&mut cd)?;
        }
        eocd.write_to(&mut cd)?;
        self.write(&cd).await?;

        self.out.flush().await?;
        self.out.get_mut().sync_all().await?;
        Ok(self.offset)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data).await?;
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Move whatever the encoder has produced so far into the archive
    async fn drain(&mut self, pending: &mut Vec<u8>) -> Result<u64> {
        let n = pending.len() as u64;
        if n > 0 {
            self.write(pending).await?;
            pending.clear();
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LocalFileReader;
    use crate::zip::ZipExtractor;
    use std::sync::Arc;

    async fn write_archive(path: &Path, files: &[(&str, &[u8])], buffer_size: usize) {
        let mut writer = ZipWriter::create(path).await.unwrap();
        writer.add_directory("docs").await.unwrap();
        for (name, data) in files {
            let mut reader: &[u8] = data;
            let n = writer
                .add_file(name, &mut reader, data.len() as u64, buffer_size)
                .await
                .unwrap();
            assert_eq!(n, data.len() as u64);
        }
        assert_eq!(writer.len(), files.len() + 1);
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn written_entries_are_listed_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.zip");
        let big: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
        write_archive(
            &path,
            &[
                ("docs/readme.txt", b"hello zip".as_slice()),
                ("data.bin", big.as_slice()),
                ("empty", b"".as_slice()),
            ],
            333,
        )
        .await;

        let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(&path).unwrap()));
        let entries = extractor.list_files().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["docs/", "docs/readme.txt", "data.bin", "empty"]);

        assert!(entries[0].is_directory);
        assert_eq!(entries[0].uncompressed_size, 0);
        assert_eq!(entries[2].compression_method, CompressionMethod::Deflate);

        assert_eq!(extractor.extract_to_memory(&entries[1]).await.unwrap(), b"hello zip");
        assert_eq!(extractor.extract_to_memory(&entries[2]).await.unwrap(), big);
        assert!(extractor.extract_to_memory(&entries[3]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_extraction_concatenates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("parts.zip");
        write_archive(
            &path,
            &[
                ("a.part.0.txt", b"first-".as_slice()),
                ("a.part.1.txt", b"second".as_slice()),
            ],
            4,
        )
        .await;

        let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(&path).unwrap()));
        let entries = extractor.list_files().await.unwrap();
        let target = tmp.path().join("restored").join("a.txt");
        for entry in entries.iter().filter(|e| !e.is_directory) {
            extractor.extract_append(entry, &target, 3).await.unwrap();
        }

        assert_eq!(std::fs::read(&target).unwrap(), b"first-second");
    }

    #[tokio::test]
    async fn corrupted_data_fails_crc_check() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.zip");
        let mut writer = ZipWriter::create(&path).await.unwrap();
        let data = vec![b'z'; 2048];
        writer
            .add_file("z.bin", &mut data.as_slice(), 2048, 512)
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(&path).unwrap()));
        let mut entry = extractor.list_files().await.unwrap().remove(0);
        entry.crc32 ^= 1;
        let err = extractor.extract_to_memory(&entry).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn garbage_is_not_a_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.zip");
        std::fs::write(&path, vec![0x42; 100]).unwrap();

        let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(&path).unwrap()));
        let err = extractor.list_files().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
