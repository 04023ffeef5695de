//! Archive reading: open/decode/parse, then lazy per-entry extraction.
//!
//! `open` reads and checks the header, decompresses and parses the metadata
//! block, and decodes the file table.  Content is never touched eagerly;
//! each `extract` seeks to the entry's payload, decompresses it with the
//! entry's own variant, and verifies the entry checksum before any bytes
//! are returned.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::checksum::{crc32, Crc32};
use crate::codec;
use crate::error::{PackError, PackResult};
use crate::header::{Header, HEADER_SIZE};
use crate::metadata::{ModMetadata, METADATA_FILE_NAME};
use crate::table::{self, FileEntry, ENTRY_SIZE};

/// An opened archive: decoded header, parsed metadata, decoded file table,
/// and the backing file handle.  Owned by whichever operation opened it;
/// concurrent reads go through fresh handles on the stored path.
#[derive(Debug)]
pub struct ModPack {
    pub header: Header,
    pub metadata: ModMetadata,
    pub entries: Vec<FileEntry>,
    path: PathBuf,
    file: File,
}

impl ModPack {
    pub fn open<P: AsRef<Path>>(path: P) -> PackResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let header = Header::read(&mut file)?;
        if header.metadata_offset as usize != HEADER_SIZE {
            return Err(PackError::InvalidHeader(format!(
                "metadata offset {} != header size {}",
                header.metadata_offset, HEADER_SIZE
            )));
        }
        if header.file_table_offset
            != header
                .metadata_offset
                .wrapping_add(header.metadata_size_compressed)
        {
            return Err(PackError::InvalidHeader(format!(
                "file table offset {} does not follow the metadata block",
                header.file_table_offset
            )));
        }
        let table_end =
            header.file_table_offset as u64 + header.file_table_count as u64 * ENTRY_SIZE as u64;
        if (header.content_offset as u64) < table_end {
            return Err(PackError::InvalidHeader(format!(
                "content offset {} overlaps the file table ending at {}",
                header.content_offset, table_end
            )));
        }

        // Metadata block.
        let variant = header.metadata_variant()?;
        file.seek(SeekFrom::Start(header.metadata_offset as u64))?;
        let mut meta_comp = vec![0u8; header.metadata_size_compressed as usize];
        file.read_exact(&mut meta_comp)
            .map_err(|e| truncated(e, "metadata block"))?;
        let meta_json = codec::decompress(
            variant,
            &meta_comp,
            header.metadata_size_uncompressed as usize,
        )?;
        let metadata = ModMetadata::parse(&meta_json)?;

        // File table.
        file.seek(SeekFrom::Start(header.file_table_offset as u64))?;
        let mut table_bytes = vec![0u8; header.file_table_count as usize * ENTRY_SIZE];
        file.read_exact(&mut table_bytes)
            .map_err(|e| truncated(e, "file table"))?;
        let entries = table::decode(&table_bytes, header.file_table_count as usize)?;

        let content_len = (header.total_size as u64).saturating_sub(header.content_offset as u64);
        if let Some(err) = table::check_entries(&entries, content_len).into_iter().next() {
            return Err(err);
        }

        Ok(Self {
            header,
            metadata,
            entries,
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Read, decompress, and checksum-verify a single entry by logical path.
    pub fn extract(&mut self, path: &str) -> PackResult<Vec<u8>> {
        let entry = self
            .entry(path)
            .ok_or_else(|| PackError::EntryNotFound(path.to_owned()))?
            .clone();
        read_entry(&mut self.file, self.header.content_offset, &entry)
    }

    /// Write `metadata.json` plus every (filtered) entry under `dest`.
    /// Returns the number of entries written.
    pub fn unpack_to(
        &mut self,
        dest: &Path,
        filter: &[String],
        metadata_only: bool,
    ) -> PackResult<usize> {
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(METADATA_FILE_NAME), self.metadata.to_json()?)?;
        if metadata_only {
            return Ok(0);
        }

        let selected: Vec<FileEntry> = self
            .entries
            .iter()
            .filter(|e| filter.is_empty() || filter.iter().any(|f| e.path.contains(f.as_str())))
            .cloned()
            .collect();

        #[cfg(feature = "parallel")]
        {
            // Entries are read-only and independently addressed; each worker
            // gets its own handle.
            let content_offset = self.header.content_offset;
            let path = self.path.clone();
            selected.par_iter().try_for_each(|entry| {
                let mut file = File::open(&path)?;
                let data = read_entry(&mut file, content_offset, entry)?;
                write_entry_file(dest, entry, &data)
            })?;
        }
        #[cfg(not(feature = "parallel"))]
        {
            for entry in &selected {
                let data = read_entry(&mut self.file, self.header.content_offset, entry)?;
                write_entry_file(dest, entry, &data)?;
            }
        }

        Ok(selected.len())
    }

    pub fn physical_size(&self) -> PackResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// CRC-32 over every byte after the header, streamed from disk.
    pub fn compute_archive_checksum(&mut self) -> PackResult<u32> {
        self.file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        let mut crc = Crc32::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = self.file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
        }
        Ok(crc.finalize())
    }
}

fn read_entry(file: &mut File, content_offset: u32, entry: &FileEntry) -> PackResult<Vec<u8>> {
    let variant = entry.variant()?;
    file.seek(SeekFrom::Start(content_offset as u64 + entry.offset as u64))?;
    let mut payload = vec![0u8; entry.compressed_size as usize];
    file.read_exact(&mut payload)
        .map_err(|e| truncated(e, &format!("content for {}", entry.path)))?;

    let raw = codec::decompress(variant, &payload, entry.uncompressed_size as usize)
        .map_err(|e| match e {
            PackError::CorruptData(msg) => {
                PackError::CorruptData(format!("{}: {msg}", entry.path))
            }
            other => other,
        })?;

    let actual = crc32(&raw);
    if actual != entry.checksum {
        return Err(PackError::ChecksumMismatch {
            subject: entry.path.clone(),
            expected: entry.checksum,
            actual,
        });
    }
    Ok(raw)
}

fn write_entry_file(dest: &Path, entry: &FileEntry, data: &[u8]) -> PackResult<()> {
    let mut out = dest.to_path_buf();
    for seg in entry.path.split('/') {
        out.push(seg);
    }
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, data)?;
    Ok(())
}

fn truncated(e: io::Error, what: &str) -> PackError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        PackError::CorruptData(format!("{what} truncated"))
    } else {
        PackError::Io(e)
    }
}
