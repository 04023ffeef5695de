//! File table: one fixed 256-byte record per packed entry.
//!
//! Record layout (little-endian):
//! - `[u8; 236]` logical path, UTF-8, zero-padded, forward slashes
//! - `u32` offset into the content region
//! - `u32` compressed size
//! - `u32` uncompressed size
//! - `u16` compression variant tag
//! - `u16` reserved
//! - `u32` CRC-32 of the uncompressed bytes
//!
//! The on-disk order is also the extraction order.  The writer sorts entries
//! by logical path bytes; the decoder accepts any order and preserves it, so
//! re-encoding an unmodified table is byte-for-byte identical.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeSet;
use std::io::Read;

use crate::codec::Variant;
use crate::error::{PackError, PackResult};

/// Encoded record size in bytes.
pub const ENTRY_SIZE: usize = 256;
const PATH_FIELD_LEN: usize = 236;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Archive-internal relative path, forward-slash separated.
    pub path: String,
    /// Byte offset into the content region.
    pub offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Per-entry variant tag.
    pub compression: u16,
    /// CRC-32 of the uncompressed bytes.
    pub checksum: u32,
}

impl FileEntry {
    pub fn variant(&self) -> PackResult<Variant> {
        Variant::from_tag(self.compression).ok_or_else(|| {
            PackError::UnsupportedCompression(format!(
                "unknown compression tag {} for entry {}",
                self.compression, self.path
            ))
        })
    }
}

/// Why a logical path is not acceptable inside an archive, or `None` if it is.
pub fn path_issue(path: &str) -> Option<&'static str> {
    if path.is_empty() {
        return Some("empty path");
    }
    if path.starts_with('/') {
        return Some("absolute path");
    }
    if path.contains('\\') {
        return Some("backslash separator");
    }
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        return Some("drive-qualified path");
    }
    if path
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Some("relative traversal segment");
    }
    None
}

pub fn encode(entries: &[FileEntry]) -> PackResult<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * ENTRY_SIZE);
    for entry in entries {
        if let Some(issue) = path_issue(&entry.path) {
            return Err(PackError::PathViolation(format!(
                "{issue}: {}",
                entry.path
            )));
        }
        let path = entry.path.as_bytes();
        if path.len() > PATH_FIELD_LEN {
            return Err(PackError::PathViolation(format!(
                "path longer than {PATH_FIELD_LEN} bytes: {}",
                entry.path
            )));
        }
        let mut field = [0u8; PATH_FIELD_LEN];
        field[..path.len()].copy_from_slice(path);
        out.extend_from_slice(&field);
        out.write_u32::<LittleEndian>(entry.offset)?;
        out.write_u32::<LittleEndian>(entry.compressed_size)?;
        out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
        out.write_u16::<LittleEndian>(entry.compression)?;
        out.write_u16::<LittleEndian>(0)?; // reserved
        out.write_u32::<LittleEndian>(entry.checksum)?;
    }
    Ok(out)
}

pub fn decode(bytes: &[u8], count: usize) -> PackResult<Vec<FileEntry>> {
    if bytes.len() < count * ENTRY_SIZE {
        return Err(PackError::CorruptData(format!(
            "file table truncated: {} bytes for {} entries",
            bytes.len(),
            count
        )));
    }
    let mut cur = &bytes[..];
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let mut path_field = [0u8; PATH_FIELD_LEN];
        cur.read_exact(&mut path_field)?;
        let len = path_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PATH_FIELD_LEN);
        let path = std::str::from_utf8(&path_field[..len])
            .map_err(|_| PackError::CorruptData(format!("entry {i}: path is not valid UTF-8")))?
            .to_owned();

        let offset = cur.read_u32::<LittleEndian>()?;
        let compressed_size = cur.read_u32::<LittleEndian>()?;
        let uncompressed_size = cur.read_u32::<LittleEndian>()?;
        let compression = cur.read_u16::<LittleEndian>()?;
        let _reserved = cur.read_u16::<LittleEndian>()?;
        let checksum = cur.read_u32::<LittleEndian>()?;

        entries.push(FileEntry {
            path,
            offset,
            compressed_size,
            uncompressed_size,
            compression,
            checksum,
        });
    }
    Ok(entries)
}

/// Structural checks over a decoded table: path safety, uniqueness, and that
/// every entry fits inside the `content_len`-byte content region.  Returns
/// every violation so the validator can report them all; `ModPack::open`
/// fails on the first.
pub fn check_entries(entries: &[FileEntry], content_len: u64) -> Vec<PackError> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    for entry in entries {
        if let Some(issue) = path_issue(&entry.path) {
            issues.push(PackError::PathViolation(format!(
                "{issue}: {}",
                entry.path
            )));
        }
        if !seen.insert(entry.path.as_str()) {
            issues.push(PackError::CorruptData(format!(
                "duplicate path in file table: {}",
                entry.path
            )));
        }
        let end = entry.offset as u64 + entry.compressed_size as u64;
        if end > content_len {
            issues.push(PackError::CorruptData(format!(
                "entry {} spans {}..{} beyond the {} byte content region",
                entry.path, entry.offset, end, content_len
            )));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            path: path.to_owned(),
            offset: 0,
            compressed_size: 10,
            uncompressed_size: 20,
            compression: 1,
            checksum: 0x1234,
        }
    }

    #[test]
    fn roundtrip() {
        let entries = vec![entry("data/map01.bin"), entry("readme.txt")];
        let bytes = encode(&entries).unwrap();
        assert_eq!(bytes.len(), 2 * ENTRY_SIZE);
        let decoded = decode(&bytes, 2).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn reencode_preserves_order() {
        // Decoder accepts unsorted tables and re-encoding keeps them verbatim.
        let entries = vec![entry("zzz.bin"), entry("aaa.bin")];
        let bytes = encode(&entries).unwrap();
        let reencoded = encode(&decode(&bytes, 2).unwrap()).unwrap();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(path_issue("maps/level1.bin").is_none());
        assert_eq!(path_issue("../escape"), Some("relative traversal segment"));
        assert_eq!(path_issue("/abs/path"), Some("absolute path"));
        assert_eq!(path_issue("a//b"), Some("relative traversal segment"));
        assert_eq!(path_issue("a\\b"), Some("backslash separator"));
        assert_eq!(path_issue("c:/windows"), Some("drive-qualified path"));
        assert_eq!(path_issue(""), Some("empty path"));
        assert!(matches!(
            encode(&[entry("../escape")]).unwrap_err(),
            PackError::PathViolation(_)
        ));
    }

    #[test]
    fn flags_duplicates_and_bounds() {
        let mut far = entry("far.bin");
        far.offset = 100;
        far.compressed_size = 50;
        let issues = check_entries(&[entry("a.bin"), entry("a.bin"), far], 120);
        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0], PackError::CorruptData(_)));
        assert!(issues[1].to_string().contains("far.bin"));
    }

    #[test]
    fn truncated_table() {
        let bytes = encode(&[entry("a.bin")]).unwrap();
        let err = decode(&bytes[..ENTRY_SIZE - 1], 1).unwrap_err();
        assert!(matches!(err, PackError::CorruptData(_)));
    }

    proptest! {
        #[test]
        fn traversal_segments_never_pass(segments in prop::collection::vec("[a-z]{1,8}", 1..4), pos in 0usize..4) {
            let mut parts = segments.clone();
            let pos = pos.min(parts.len());
            parts.insert(pos, "..".to_owned());
            let path = parts.join("/");
            prop_assert!(path_issue(&path).is_some());
            // The same path without the traversal segment is accepted.
            prop_assert!(path_issue(&segments.join("/")).is_none());
        }
    }
}
