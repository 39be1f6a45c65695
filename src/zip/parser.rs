//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data
//!
//! Entries are returned in the order they appear in the Central
//! Directory, which is the order they were written in.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Result};
use std::sync::Arc;

use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Where the Central Directory lives and how many entries it holds
struct CentralDirectory {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so any positional source can back it.
/// Typically used through [`ZipExtractor`](super::ZipExtractor) rather
/// than directly.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is normally the last 22 bytes of the archive. When the
    /// archive carries a trailing comment, the last 64 KiB are scanned
    /// backwards for a signature whose comment length matches the bytes
    /// that follow it.
    ///
    /// # Returns
    ///
    /// The parsed record and its absolute offset in the archive. The
    /// offset is needed to locate the ZIP64 locator that precedes it.
    ///
    /// # Errors
    ///
    /// `InvalidData` if no EOCD signature is found, or any I/O error from
    /// the underlying reader.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;

        // Common case: no comment, EOCD is the last 22 bytes
        if self.size >= eocd_size {
            let offset = self.size - eocd_size;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // The comment length must account for every byte after the record
        let found = (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE - 1))
            .rev()
            .find(|&i| {
                &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE
                    && u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize
                        == buf.len() - i - EndOfCentralDirectory::SIZE
            });

        match found {
            Some(i) => {
                let eocd = EndOfCentralDirectory::from_bytes(&buf[i..])?;
                Ok((eocd, search_start + i as u64))
            }
            None => Err(invalid_data("Not a valid ZIP file")),
        }
    }

    /// Read the ZIP64 End of Central Directory record that the locator
    /// just before the regular EOCD points to.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| invalid_data("Invalid ZIP64 format"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    async fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let cd = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            }
        } else {
            CentralDirectory {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                entries: eocd.total_entries as u64,
            }
        };

        if cd.offset.saturating_add(cd.size) > eocd_offset {
            return Err(invalid_data("Central Directory lies outside the archive"));
        }
        Ok(cd)
    }

    /// List every entry in Central Directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let cd = self.central_directory().await?;

        // One read for the whole directory
        let mut cd_data = vec![0u8; cd.size as usize];
        self.reader.read_exact_at(cd.offset, &mut cd_data).await?;

        let mut cursor = Cursor::new(cd_data.as_slice());
        (0..cd.entries).map(|_| parse_cdfh(&mut cursor)).collect()
    }

    /// Offset of an entry's data, just past its Local File Header.
    ///
    /// The LFH name and extra field may differ in length from the Central
    /// Directory copy, so the header itself is consulted.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(invalid_data("Invalid Local File Header"));
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse one Central Directory File Header at the cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(invalid_data("Invalid Central Directory File Header"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    let is_directory = file_name.ends_with('/');

    // Only fields whose header slot holds the marker appear in the ZIP64
    // extra field, always in this order
    let extra_field_end = cursor.position() + extra_field_length as u64;
    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = (cursor.position() + field_size).min(extra_field_end);

        if header_id == ZIP64_EXTRA_ID {
            for value in [&mut uncompressed_size, &mut compressed_size, &mut lfh_offset] {
                if *value == ZIP64_MARKER_U32 as u64 && cursor.position() + 8 <= field_end {
                    *value = cursor.read_u64::<LittleEndian>()?;
                }
            }
        }
        cursor.set_position(field_end);
    }

    // Skip the rest of the extra field and the file comment
    cursor.set_position(extra_field_end + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// In-memory archive for parser tests
    struct Bytes(Vec<u8>);

    #[async_trait]
    impl ReadAt for Bytes {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let start = (offset as usize).min(self.0.len());
            let n = buf.len().min(self.0.len() - start);
            buf[..n].copy_from_slice(&self.0[start..start + n]);
            Ok(n)
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    fn archive_with(entry: &ZipFileEntry, comment: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        entry.write_local_header(false, &mut data).unwrap();
        let cd_offset = data.len() as u64;
        let mut cd = Vec::new();
        entry.write_central_header(&mut cd).unwrap();
        let cd_size = cd.len() as u64;
        data.extend_from_slice(&cd);

        let mut eocd = EndOfCentralDirectory::new(1, cd_size, cd_offset);
        eocd.comment_len = comment.len() as u16;
        eocd.write_to(&mut data).unwrap();
        data.extend_from_slice(comment);
        data
    }

    #[tokio::test]
    async fn finds_eocd_behind_a_comment() {
        let entry = ZipFileEntry::new("dir/".into(), CompressionMethod::Stored, 0);
        let data = archive_with(&entry, b"archived by a test");

        let parser = ZipParser::new(Arc::new(Bytes(data)));
        let entries = parser.list_files().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "dir/");
        assert!(entries[0].is_directory);
        assert_eq!(parser.get_data_offset(&entries[0]).await.unwrap(), 34);
    }

    #[tokio::test]
    async fn reads_zip64_sizes_from_the_extra_field() {
        let mut entry = ZipFileEntry::new("huge.bin".into(), CompressionMethod::Deflate, 0);
        entry.uncompressed_size = 6 << 30;
        entry.compressed_size = 1 << 20;
        entry.crc32 = 0x1234_5678;
        let data = archive_with(&entry, b"");

        let parser = ZipParser::new(Arc::new(Bytes(data)));
        let parsed = parser.list_files().await.unwrap().remove(0);

        assert_eq!(parsed.uncompressed_size, 6 << 30);
        assert_eq!(parsed.compressed_size, 1 << 20);
        assert_eq!(parsed.crc32, 0x1234_5678);
        assert_eq!(parsed.compression_method, CompressionMethod::Deflate);
    }

    #[tokio::test]
    async fn truncated_directory_is_rejected() {
        let entry = ZipFileEntry::new("a.txt".into(), CompressionMethod::Stored, 0);
        let mut data = archive_with(&entry, b"");
        // Point the Central Directory past the EOCD
        let len = data.len();
        data[len - 6..len - 2].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        let parser = ZipParser::new(Arc::new(Bytes(data)));
        assert!(parser.list_files().await.is_err());
    }
}
