use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Error, ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Marker stored in a 16-bit field whose value lives in a ZIP64 record
pub const ZIP64_MARKER_U16: u16 = 0xFFFF;
/// Marker stored in a 32-bit field whose value lives in a ZIP64 record
pub const ZIP64_MARKER_U32: u32 = 0xFFFF_FFFF;

/// ZIP64 extended information extra field ID
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// DOS date for 1980-01-01, the earliest representable timestamp
pub const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;
pub const DOS_EPOCH_TIME: u16 = 0;

/// General purpose flag: file name is UTF-8
const FLAG_UTF8: u16 = 1 << 11;
/// Version made by: UNIX host, APPNOTE 4.5
const VERSION_MADE_BY: u16 = (3 << 8) | 45;
const VERSION_DEFLATE: u16 = 20;
const VERSION_ZIP64: u16 = 45;

const UNIX_DIR_MODE: u32 = 0o040755;
const UNIX_FILE_MODE: u32 = 0o100644;
const MSDOS_DIR_ATTR: u32 = 0x10;

pub(crate) fn invalid_data(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidData, message.into())
}

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Build the record for a single-disk archive, switching fields to
    /// their ZIP64 markers when the values do not fit.
    pub fn new(total_entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        let entries = u16::try_from(total_entries)
            .ok()
            .filter(|&n| n != ZIP64_MARKER_U16)
            .unwrap_or(ZIP64_MARKER_U16);
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size: narrow_u32(cd_size),
            cd_offset: narrow_u32(cd_offset),
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(invalid_data("Invalid End of Central Directory"));
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            return Err(invalid_data("Invalid End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_MARKER_U16
            || self.total_entries == ZIP64_MARKER_U16
            || self.cd_size == ZIP64_MARKER_U32
            || self.cd_offset == ZIP64_MARKER_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(invalid_data("Invalid ZIP64 format"));
        }

        if &data[0..4] != Self::SIGNATURE {
            return Err(invalid_data("Invalid ZIP64 format"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(self.total_disks)?;
        Ok(())
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn new(total_entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        Self {
            // Size of the remaining record, excluding signature and this field
            eocd64_size: (Self::MIN_SIZE - 12) as u64,
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_ZIP64,
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(invalid_data("Invalid ZIP64 format"));
        }

        if &data[0..4] != Self::SIGNATURE {
            return Err(invalid_data("Invalid ZIP64 format"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u64::<LittleEndian>(self.eocd64_size)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u32::<LittleEndian>(self.disk_number)?;
        out.write_u32::<LittleEndian>(self.disk_with_cd)?;
        out.write_u64::<LittleEndian>(self.disk_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(())
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// A fresh entry about to be written at `lfh_offset`
    pub fn new(file_name: String, compression_method: CompressionMethod, lfh_offset: u64) -> Self {
        let is_directory = file_name.ends_with('/');
        Self {
            file_name,
            compression_method,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset,
            last_mod_time: DOS_EPOCH_TIME,
            last_mod_date: DOS_EPOCH_DATE,
            is_directory,
        }
    }

    /// Entry name as a path relative to an extraction root.
    ///
    /// Absolute names and names containing `..` are rejected so that an
    /// archive can never write outside the directory it is extracted to.
    pub fn relative_path(&self) -> Result<PathBuf> {
        let mut path = PathBuf::new();
        for component in Path::new(&self.file_name).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(invalid_data(format!(
                        "Unsafe entry name '{}'",
                        self.file_name
                    )));
                }
            }
        }
        if path.as_os_str().is_empty() {
            return Err(invalid_data(format!("Empty entry name '{}'", self.file_name)));
        }
        Ok(path)
    }

    /// Serialize the Local File Header.
    ///
    /// With `zip64` set, both sizes are stored in a ZIP64 extra field so the
    /// header length does not depend on the final sizes.
    pub fn write_local_header(&self, zip64: bool, out: &mut Vec<u8>) -> Result<()> {
        let name = self.file_name.as_bytes();
        out.extend_from_slice(LFH_SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_needed(zip64))?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if zip64 {
            out.write_u32::<LittleEndian>(ZIP64_MARKER_U32)?;
            out.write_u32::<LittleEndian>(ZIP64_MARKER_U32)?;
        } else {
            out.write_u32::<LittleEndian>(narrow_u32(self.compressed_size))?;
            out.write_u32::<LittleEndian>(narrow_u32(self.uncompressed_size))?;
        }
        out.write_u16::<LittleEndian>(name_len(name)?)?;
        out.write_u16::<LittleEndian>(if zip64 { 20 } else { 0 })?;
        out.extend_from_slice(name);
        if zip64 {
            out.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            out.write_u16::<LittleEndian>(16)?;
            out.write_u64::<LittleEndian>(self.uncompressed_size)?;
            out.write_u64::<LittleEndian>(self.compressed_size)?;
        }
        Ok(())
    }

    /// Serialize the Central Directory File Header, adding a ZIP64 extra
    /// field for every value that overflows its 32-bit slot.
    pub fn write_central_header(&self, out: &mut Vec<u8>) -> Result<()> {
        let name = self.file_name.as_bytes();
        let mut extra = Vec::new();
        if self.uncompressed_size >= ZIP64_MARKER_U32 as u64 {
            extra.write_u64::<LittleEndian>(self.uncompressed_size)?;
        }
        if self.compressed_size >= ZIP64_MARKER_U32 as u64 {
            extra.write_u64::<LittleEndian>(self.compressed_size)?;
        }
        if self.lfh_offset >= ZIP64_MARKER_U32 as u64 {
            extra.write_u64::<LittleEndian>(self.lfh_offset)?;
        }
        let zip64 = !extra.is_empty();

        let external_attrs = if self.is_directory {
            (UNIX_DIR_MODE << 16) | MSDOS_DIR_ATTR
        } else {
            UNIX_FILE_MODE << 16
        };

        out.extend_from_slice(CDFH_SIGNATURE);
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(self.version_needed(zip64))?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(narrow_u32(self.compressed_size))?;
        out.write_u32::<LittleEndian>(narrow_u32(self.uncompressed_size))?;
        out.write_u16::<LittleEndian>(name_len(name)?)?;
        out.write_u16::<LittleEndian>(if zip64 { extra.len() as u16 + 4 } else { 0 })?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(external_attrs)?;
        out.write_u32::<LittleEndian>(narrow_u32(self.lfh_offset))?;
        out.extend_from_slice(name);
        if zip64 {
            out.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            out.write_u16::<LittleEndian>(extra.len() as u16)?;
            out.extend_from_slice(&extra);
        }
        Ok(())
    }

    fn version_needed(&self, zip64: bool) -> u16 {
        if zip64 { VERSION_ZIP64 } else { VERSION_DEFLATE }
    }
}

/// Narrow a value into a 32-bit field, using the ZIP64 marker on overflow
fn narrow_u32(value: u64) -> u32 {
    u32::try_from(value)
        .ok()
        .filter(|&v| v != ZIP64_MARKER_U32)
        .unwrap_or(ZIP64_MARKER_U32)
}

fn name_len(name: &[u8]) -> Result<u16> {
    u16::try_from(name.len()).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Entry name is {} bytes, longer than 65535", name.len()),
        )
    })
}
