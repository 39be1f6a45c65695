use flate2::Crc;
use flate2::write::DeflateDecoder;
use std::io::{Result, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry, invalid_data};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all entries in Central Directory order
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        self.extract_into(entry, &mut data, 64 * 1024).await?;
        Ok(data)
    }

    /// Append the entry's bytes to the end of `output_path`.
    ///
    /// # Arguments
    ///
    /// * `entry` - The file entry to extract
    /// * `output_path` - Destination file; it and its parent directories
    ///   are created if missing
    /// * `buffer_size` - Size of each compressed read window
    ///
    /// # Returns
    ///
    /// The number of bytes appended.
    pub async fn extract_append(
        &self,
        entry: &ZipFileEntry,
        output_path: &Path,
        buffer_size: usize,
    ) -> Result<u64> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .await?;
        let written = self.extract_into(entry, &mut file, buffer_size).await?;
        file.flush().await?;

        Ok(written)
    }

    /// Stream the entry's decompressed bytes into `writer`.
    ///
    /// Compressed data is read in windows of `buffer_size` bytes and fed
    /// through the decoder; decoded output is forwarded as soon as it is
    /// produced, so memory use stays bounded by the window size.
    ///
    /// # Arguments
    ///
    /// * `entry` - Entry from [`list_files`](Self::list_files)
    /// * `writer` - Destination for the decompressed bytes
    /// * `buffer_size` - Size of each compressed read window
    ///
    /// # Returns
    ///
    /// The number of decompressed bytes written.
    ///
    /// # Errors
    ///
    /// `InvalidData` for an unsupported compression method, a truncated
    /// entry, or a length or CRC-32 that disagrees with the Central
    /// Directory. Bytes already forwarded to `writer` are not retracted.
    pub async fn extract_into<W: AsyncWrite + Unpin>(
        &self,
        entry: &ZipFileEntry,
        writer: &mut W,
        buffer_size: usize,
    ) -> Result<u64> {
        let mut decoder = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(DeflateDecoder::new(Vec::new())),
            CompressionMethod::Unknown(method) => {
                return Err(invalid_data(format!(
                    "Unsupported compression method {} for '{}'",
                    method, entry.file_name
                )));
            }
        };

        let data_offset = self.parser.get_data_offset(entry).await?;
        let end = data_offset
            .checked_add(entry.compressed_size)
            .filter(|&end| end <= self.parser.reader().size())
            .ok_or_else(|| invalid_data(format!("Entry '{}' is truncated", entry.file_name)))?;

        let window = buffer_size.max(1).min(entry.compressed_size.max(1) as usize);
        let mut buf = vec![0u8; window];
        let mut crc = Crc::new();
        let mut written = 0u64;
        let mut offset = data_offset;

        while offset < end {
            let n = (end - offset).min(buf.len() as u64) as usize;
            self.parser
                .reader()
                .read_exact_at(offset, &mut buf[..n])
                .await?;
            offset += n as u64;

            match decoder.as_mut() {
                Some(decoder) => {
                    decoder.write_all(&buf[..n])?;
                    let out = decoder.get_mut();
                    written += emit(writer, &mut crc, out).await?;
                    out.clear();
                }
                None => written += emit(writer, &mut crc, &buf[..n]).await?,
            }
        }

        if let Some(decoder) = decoder {
            let rest = decoder.finish()?;
            written += emit(writer, &mut crc, &rest).await?;
        }

        if written != entry.uncompressed_size {
            return Err(invalid_data(format!(
                "Entry '{}' expanded to {} bytes, expected {}",
                entry.file_name, written, entry.uncompressed_size
            )));
        }
        if crc.sum() != entry.crc32 {
            return Err(invalid_data(format!(
                "CRC-32 mismatch for '{}'",
                entry.file_name
            )));
        }

        Ok(written)
    }
}

async fn emit<W: AsyncWrite + Unpin>(writer: &mut W, crc: &mut Crc, data: &[u8]) -> Result<u64> {
    crc.update(data);
    writer.write_all(data).await?;
    Ok(data.len() as u64)
}
