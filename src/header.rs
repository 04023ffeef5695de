//! Fixed 64-byte archive header.
//!
//! All fields are little-endian and decoded field by field; layout is
//! controlled solely by this codec, never by in-memory struct packing.
//! Reserved bytes are carried verbatim through a decode/encode cycle so a
//! newer minor revision can stash data there without breaking older tools.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::Variant;
use crate::error::{PackError, PackResult};
use crate::table::ENTRY_SIZE;

/// Magic signature at offset 0.
pub const MAGIC: &[u8; 8] = b"KFXMOD\0\0";
/// Highest format version this build understands.
pub const FORMAT_VERSION: u16 = 1;
/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format_version: u16,
    /// Variant tag applied to the metadata block.
    pub metadata_compression: u16,
    pub metadata_offset: u32,
    pub metadata_size_compressed: u32,
    pub metadata_size_uncompressed: u32,
    pub file_table_offset: u32,
    pub file_table_count: u32,
    pub content_offset: u32,
    pub total_size: u32,
    /// CRC-32 over every byte after the header.
    pub archive_checksum: u32,
    /// Reserved bit field.
    pub flags: u32,
    /// Reserved padding, preserved verbatim when rewriting.
    pub reserved: [u8; 16],
}

impl Header {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(self.format_version)?;
        writer.write_u16::<LittleEndian>(self.metadata_compression)?;
        writer.write_u32::<LittleEndian>(self.metadata_offset)?;
        writer.write_u32::<LittleEndian>(self.metadata_size_compressed)?;
        writer.write_u32::<LittleEndian>(self.metadata_size_uncompressed)?;
        writer.write_u32::<LittleEndian>(self.file_table_offset)?;
        writer.write_u32::<LittleEndian>(self.file_table_count)?;
        writer.write_u32::<LittleEndian>(self.content_offset)?;
        writer.write_u32::<LittleEndian>(self.total_size)?;
        writer.write_u32::<LittleEndian>(self.archive_checksum)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_all(&self.reserved)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> PackResult<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                PackError::InvalidHeader("file shorter than the 64-byte header".into())
            } else {
                PackError::Io(e)
            }
        })?;
        let mut cur = &buf[..];

        let mut magic = [0u8; 8];
        cur.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PackError::InvalidHeader(format!(
                "bad magic {:02x?}",
                magic
            )));
        }

        let format_version = cur.read_u16::<LittleEndian>()?;
        if format_version > FORMAT_VERSION {
            return Err(PackError::InvalidHeader(format!(
                "format version {format_version} is newer than supported version {FORMAT_VERSION}"
            )));
        }

        let metadata_compression = cur.read_u16::<LittleEndian>()?;
        let metadata_offset = cur.read_u32::<LittleEndian>()?;
        let metadata_size_compressed = cur.read_u32::<LittleEndian>()?;
        let metadata_size_uncompressed = cur.read_u32::<LittleEndian>()?;
        let file_table_offset = cur.read_u32::<LittleEndian>()?;
        let file_table_count = cur.read_u32::<LittleEndian>()?;
        let content_offset = cur.read_u32::<LittleEndian>()?;
        let total_size = cur.read_u32::<LittleEndian>()?;
        let archive_checksum = cur.read_u32::<LittleEndian>()?;
        let flags = cur.read_u32::<LittleEndian>()?;
        let mut reserved = [0u8; 16];
        cur.read_exact(&mut reserved)?;

        Ok(Self {
            format_version,
            metadata_compression,
            metadata_offset,
            metadata_size_compressed,
            metadata_size_uncompressed,
            file_table_offset,
            file_table_count,
            content_offset,
            total_size,
            archive_checksum,
            flags,
            reserved,
        })
    }

    /// The variant applied to the metadata block.
    pub fn metadata_variant(&self) -> PackResult<Variant> {
        Variant::from_tag(self.metadata_compression).ok_or_else(|| {
            PackError::UnsupportedCompression(format!(
                "unknown compression tag {} for the metadata block",
                self.metadata_compression
            ))
        })
    }

    /// Structural invariants over the declared offsets, checked against the
    /// physical file size.  Returns one message per violated invariant.
    pub fn layout_issues(&self, physical_size: u64) -> Vec<String> {
        let mut issues = Vec::new();
        if self.metadata_offset as usize != HEADER_SIZE {
            issues.push(format!(
                "metadata offset {} != header size {}",
                self.metadata_offset, HEADER_SIZE
            ));
        }
        if self.file_table_offset != self.metadata_offset.wrapping_add(self.metadata_size_compressed) {
            issues.push(format!(
                "file table offset {} != metadata offset {} + compressed metadata size {}",
                self.file_table_offset, self.metadata_offset, self.metadata_size_compressed
            ));
        }
        let table_end =
            self.file_table_offset as u64 + self.file_table_count as u64 * ENTRY_SIZE as u64;
        if (self.content_offset as u64) < table_end {
            issues.push(format!(
                "content offset {} overlaps the file table ending at {}",
                self.content_offset, table_end
            ));
        }
        if self.total_size as u64 != physical_size {
            issues.push(format!(
                "declared total size {} != physical file size {}",
                self.total_size, physical_size
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            format_version: FORMAT_VERSION,
            metadata_compression: 1,
            metadata_offset: HEADER_SIZE as u32,
            metadata_size_compressed: 120,
            metadata_size_uncompressed: 300,
            file_table_offset: 184,
            file_table_count: 2,
            content_offset: 184 + 2 * ENTRY_SIZE as u32,
            total_size: 4096,
            archive_checksum: 0xdeadbeef,
            flags: 0,
            reserved: [0u8; 16],
        }
    }

    #[test]
    fn roundtrip() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = Header::read(&buf[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn reserved_bytes_survive_roundtrip() {
        let mut header = sample();
        header.reserved = *b"0123456789abcdef";
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let decoded = Header::read(&buf[..]).unwrap();
        assert_eq!(&decoded.reserved, b"0123456789abcdef");
    }

    #[test]
    fn bad_magic() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf[0] = b'X';
        let err = Header::read(&buf[..]).unwrap_err();
        assert!(matches!(err, PackError::InvalidHeader(_)));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf[8] = 0xff; // format_version LE low byte
        let err = Header::read(&buf[..]).unwrap_err();
        assert!(matches!(err, PackError::InvalidHeader(_)));
    }

    #[test]
    fn truncated_header() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        let err = Header::read(&buf[..HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, PackError::InvalidHeader(_)));
    }

    #[test]
    fn layout_issues_flag_each_invariant() {
        let header = sample();
        assert!(header.layout_issues(4096).is_empty());

        let mut bad = sample();
        bad.metadata_offset = 32;
        bad.total_size = 1;
        let issues = bad.layout_issues(4096);
        // metadata offset, table offset chain, and total size all fire.
        assert_eq!(issues.len(), 3);
    }
}
