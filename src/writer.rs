//! Archive construction: directory tree in, sealed `.kfxmod` file out.
//!
//! The archive is assembled fully in memory (metadata block, file table,
//! content region), checksummed, then written to a temporary file next to
//! the destination and renamed into place.  Either the complete archive
//! lands at the destination path or nothing does; the temp file is removed
//! on every error path.
//!
//! Determinism rules:
//! - logical paths are normalized to forward slashes
//! - entries are sorted lexicographically by path bytes, so the same input
//!   tree packs to the same bytes regardless of filesystem traversal order

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::checksum::{crc32, Crc32};
use crate::codec::{self, Variant};
use crate::error::{PackError, PackResult};
use crate::header::{Header, FORMAT_VERSION, HEADER_SIZE};
use crate::metadata::{ContentManifest, ModMetadata};
use crate::reader::ModPack;
use crate::table::{self, FileEntry};
use crate::validate::validate;

/// Observer for long-running pack operations.  Calls are fire-and-forget;
/// the writer never blocks on the observer.
pub trait Progress {
    fn file_packed(&self, index: usize, total: usize, path: &str) {
        let _ = (index, total, path);
    }
}

/// Default no-op observer.
pub struct NoProgress;
impl Progress for NoProgress {}

#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Variant applied to the metadata block and every entry.
    pub variant: Variant,
    /// Re-open and fully validate the temp archive before it replaces the
    /// destination.
    pub validate_first: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            variant: Variant::Zlib,
            validate_first: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackSummary {
    pub entry_count: usize,
    pub total_size: u64,
    pub output: PathBuf,
}

/// Pack `source` into a `.kfxmod` archive at `dest`.
///
/// `metadata_src` names the file `metadata` was read from, so it can be
/// excluded from the packed set; pass `None` when the metadata did not come
/// from inside `source`.
pub fn pack_dir(
    source: &Path,
    dest: &Path,
    metadata: ModMetadata,
    metadata_src: Option<&Path>,
    opts: &PackOptions,
) -> PackResult<PackSummary> {
    pack_dir_with_progress(source, dest, metadata, metadata_src, opts, &NoProgress)
}

pub fn pack_dir_with_progress(
    source: &Path,
    dest: &Path,
    mut metadata: ModMetadata,
    metadata_src: Option<&Path>,
    opts: &PackOptions,
    progress: &dyn Progress,
) -> PackResult<PackSummary> {
    match opts.variant {
        Variant::Lz4 => {
            return Err(PackError::UnsupportedCompression(
                "lz4 is a reserved variant and not implemented".into(),
            ))
        }
        Variant::None | Variant::Zlib => {}
    }
    metadata.validate_required()?;

    // ── Enumerate regular files, excluding the metadata source ──────────────
    let skip = metadata_src
        .filter(|p| p.exists())
        .map(|p| p.canonicalize())
        .transpose()?;

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for ent in WalkDir::new(source).follow_links(false) {
        let ent = ent.map_err(|e| {
            let msg = e.to_string();
            PackError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg)),
            )
        })?;
        if !ent.file_type().is_file() {
            continue;
        }
        if let Some(skip) = &skip {
            if ent.path().canonicalize()? == *skip {
                continue;
            }
        }
        let logical = logical_path(source, ent.path())?;
        files.push((logical, ent.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    // ── Content region + file table ──────────────────────────────────────────
    let total = files.len();
    let mut entries: Vec<FileEntry> = Vec::with_capacity(total);
    let mut content: Vec<u8> = Vec::new();
    let mut manifest = ContentManifest::default();

    for (index, (logical, physical)) in files.iter().enumerate() {
        let raw = std::fs::read(physical)?;
        let payload = codec::compress(opts.variant, &raw)?;
        let offset = u32_len(content.len() as u64, "content region")?;

        entries.push(FileEntry {
            path: logical.clone(),
            offset,
            compressed_size: u32_len(payload.len() as u64, logical)?,
            uncompressed_size: u32_len(raw.len() as u64, logical)?,
            compression: opts.variant.tag(),
            checksum: crc32(&raw),
        });
        content.extend_from_slice(&payload);

        *manifest.categories.entry(category_of(logical)).or_insert(0) += 1;
        manifest.total_files += 1;
        progress.file_packed(index + 1, total, logical);
    }
    metadata.manifest = manifest;

    // ── Metadata block ───────────────────────────────────────────────────────
    let meta_json = metadata.to_json()?;
    let meta_comp = codec::compress(opts.variant, &meta_json)?;
    let table_bytes = table::encode(&entries)?;

    // ── Header ───────────────────────────────────────────────────────────────
    // Offsets are summed in u64 first; each region can fit u32 on its own
    // while the running offset does not.
    let metadata_offset = HEADER_SIZE as u32;
    let file_table_offset = u32_len(
        HEADER_SIZE as u64 + meta_comp.len() as u64,
        "file table offset",
    )?;
    let content_offset = u32_len(
        file_table_offset as u64 + table_bytes.len() as u64,
        "content offset",
    )?;
    let total_size = u32_len(content_offset as u64 + content.len() as u64, "archive")?;

    let mut crc = Crc32::new();
    crc.update(&meta_comp);
    crc.update(&table_bytes);
    crc.update(&content);
    let archive_checksum = crc.finalize();

    let header = Header {
        format_version: FORMAT_VERSION,
        metadata_compression: opts.variant.tag(),
        metadata_offset,
        metadata_size_compressed: meta_comp.len() as u32,
        metadata_size_uncompressed: meta_json.len() as u32,
        file_table_offset,
        file_table_count: entries.len() as u32,
        content_offset,
        total_size,
        archive_checksum,
        flags: 0,
        reserved: [0u8; 16],
    };

    // ── Atomic publish ───────────────────────────────────────────────────────
    let dest_dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dest_dir)?;
    header.write(tmp.as_file_mut())?;
    tmp.write_all(&meta_comp)?;
    tmp.write_all(&table_bytes)?;
    tmp.write_all(&content)?;
    tmp.flush()?;

    if opts.validate_first {
        let mut pack = ModPack::open(tmp.path())?;
        let report = validate(&mut pack)?;
        drop(pack);
        if let Some(issue) = report.errors.first() {
            return Err(PackError::CorruptData(format!(
                "freshly written archive failed validation: {}",
                issue.message
            )));
        }
    }

    tmp.persist(dest).map_err(|e| PackError::Io(e.error))?;

    Ok(PackSummary {
        entry_count: entries.len(),
        total_size: total_size as u64,
        output: dest.to_path_buf(),
    })
}

/// Archive-internal logical path for a file under `root`: forward slashes,
/// normal components only.
fn logical_path(root: &Path, file: &Path) -> PackResult<String> {
    let rel = file.strip_prefix(root).map_err(|_| {
        PackError::PathViolation(format!(
            "file is outside the source directory: {}",
            file.display()
        ))
    })?;

    let mut out = String::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&part.to_string_lossy());
            }
            _ => {
                return Err(PackError::PathViolation(format!(
                    "non-normal path component in {}",
                    rel.display()
                )))
            }
        }
    }
    if out.is_empty() {
        return Err(PackError::PathViolation("empty relative path".into()));
    }
    Ok(out)
}

/// Manifest category: lower-cased extension, `none` when absent.
fn category_of(logical: &str) -> String {
    match logical.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && !ext.contains('/') => {
            ext.to_ascii_lowercase()
        }
        _ => "none".to_owned(),
    }
}

fn u32_len(len: u64, what: &str) -> PackResult<u32> {
    u32::try_from(len).map_err(|_| {
        PackError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("{what} exceeds the 4 GiB format limit ({len} bytes)"),
        ))
    })
}
