//! Full-archive validation.
//!
//! Unlike the reader, which fails on the first problem, the validator runs
//! every check and accumulates a report: header invariants, metadata
//! required fields and dependency sanity, file-table structure, every
//! entry's checksum (a full decompress pass), and the whole-archive
//! checksum.  Genuine I/O failures still abort; a report is only useful if
//! the medium underneath it is readable.

use std::collections::BTreeSet;

use crate::error::{PackError, PackResult};
use crate::reader::ModPack;
use crate::table;

/// Entries larger than this (uncompressed) draw a warning.
pub const LARGE_ENTRY_WARN_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Header,
    Metadata,
    FileTable,
    EntryChecksum,
    ArchiveChecksum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: CheckKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl Report {
    /// Warnings alone pass; any error fails.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, kind: CheckKind, message: impl Into<String>) {
        self.errors.push(Issue {
            kind,
            message: message.into(),
        });
    }

    fn warn(&mut self, kind: CheckKind, message: impl Into<String>) {
        self.warnings.push(Issue {
            kind,
            message: message.into(),
        });
    }
}

pub fn validate(pack: &mut ModPack) -> PackResult<Report> {
    let mut report = Report::default();

    // 1. Header structural invariants.
    let physical_size = pack.physical_size()?;
    for message in pack.header.layout_issues(physical_size) {
        report.error(CheckKind::Header, message);
    }

    // 2. Metadata.
    if let Err(e) = pack.metadata.validate_required() {
        report.error(CheckKind::Metadata, e.to_string());
    }
    let mut dep_ids = BTreeSet::new();
    for dep in &pack.metadata.dependencies {
        if dep.id.trim().is_empty() {
            report.error(CheckKind::Metadata, "dependency with empty mod id");
        } else if !dep_ids.insert(dep.id.as_str()) {
            report.warn(
                CheckKind::Metadata,
                format!("dependency declared twice: {}", dep.id),
            );
        }
    }

    // 3. File table structure.
    let content_len = physical_size.saturating_sub(pack.header.content_offset as u64);
    for err in table::check_entries(&pack.entries, content_len) {
        report.error(CheckKind::FileTable, err.to_string());
    }

    // 4. Every entry's checksum (forces a full decompress pass).
    let entries: Vec<(String, u64, u64)> = pack
        .entries
        .iter()
        .map(|e| {
            (
                e.path.clone(),
                e.uncompressed_size as u64,
                e.compressed_size as u64,
            )
        })
        .collect();
    for (path, uncompressed, compressed) in entries {
        if uncompressed > LARGE_ENTRY_WARN_BYTES {
            report.warn(
                CheckKind::EntryChecksum,
                format!("unusually large entry ({uncompressed} bytes): {path}"),
            );
        }
        // Small payloads legitimately inflate by a few bytes of stream framing.
        if uncompressed >= 4096 && compressed > uncompressed {
            report.warn(
                CheckKind::EntryChecksum,
                format!("stored payload much larger than source: {path}"),
            );
        }
        match pack.extract(&path) {
            Ok(_) => {}
            Err(PackError::Io(e)) => return Err(PackError::Io(e)),
            Err(e) => report.error(CheckKind::EntryChecksum, e.to_string()),
        }
    }

    // 5. Whole-archive checksum.
    let actual = pack.compute_archive_checksum()?;
    if actual != pack.header.archive_checksum {
        report.error(
            CheckKind::ArchiveChecksum,
            format!(
                "archive checksum mismatch: stored {:08x}, computed {:08x}",
                pack.header.archive_checksum, actual
            ),
        );
    }

    Ok(report)
}
