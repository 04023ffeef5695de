//! Compression variants and their dispatch.
//!
//! # Identity rules
//! Every variant is identified by a frozen u16 tag written into the header
//! (for the metadata block) and into every file-table entry.  Tags are
//! permanent and never reused.  A reader that encounters a tag it cannot
//! supply MUST fail immediately; falling back to another variant is never
//! allowed.
//!
//! `Lz4` (tag 2) is a declared reservation: the tag is parsed so that a
//! future revision can ship the codec, but both directions fail with
//! [`PackError::UnsupportedCompression`] in this build.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{PackError, PackResult};

// ── Frozen tags ──────────────────────────────────────────────────────────────

/// Payload stored verbatim.
pub const TAG_NONE: u16 = 0;
/// Zlib-wrapped DEFLATE stream.
pub const TAG_ZLIB: u16 = 1;
/// Reserved; encoding and decoding both fail in this build.
pub const TAG_LZ4: u16 = 2;

// ── Variant enum ─────────────────────────────────────────────────────────────

/// Compression strategy discriminant.  Dispatch is an exhaustive match so a
/// future variant is a compile-time-checked addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    None,
    Zlib,
    Lz4,
}

impl Variant {
    /// The frozen on-disk tag for this variant.
    #[inline]
    pub fn tag(self) -> u16 {
        match self {
            Variant::None => TAG_NONE,
            Variant::Zlib => TAG_ZLIB,
            Variant::Lz4 => TAG_LZ4,
        }
    }

    /// Resolve an on-disk tag.  Returns `None` for tags unknown to this build.
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            TAG_NONE => Some(Variant::None),
            TAG_ZLIB => Some(Variant::Zlib),
            TAG_LZ4 => Some(Variant::Lz4),
            _ => None,
        }
    }

    /// Human-readable name (for diagnostics and the CLI).
    pub fn name(self) -> &'static str {
        match self {
            Variant::None => "none",
            Variant::Zlib => "zlib",
            Variant::Lz4 => "lz4",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Variant::None),
            "zlib" => Some(Variant::Zlib),
            "lz4" => Some(Variant::Lz4),
            _ => None,
        }
    }
}

// ── Compress / decompress ────────────────────────────────────────────────────

/// Compress `data` with the given variant.
///
/// Zlib always encodes at best-compression effort; decode accepts any
/// conforming stream regardless of the effort it was produced with.
pub fn compress(variant: Variant, data: &[u8]) -> PackResult<Vec<u8>> {
    match variant {
        Variant::None => Ok(data.to_vec()),
        Variant::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Variant::Lz4 => Err(PackError::UnsupportedCompression(
            "lz4 is a reserved variant and not implemented".into(),
        )),
    }
}

/// Decompress `data`, failing with [`PackError::CorruptData`] if the output
/// length does not equal `expected_size`.
pub fn decompress(variant: Variant, data: &[u8], expected_size: usize) -> PackResult<Vec<u8>> {
    let out = match variant {
        Variant::None => data.to_vec(),
        Variant::Zlib => {
            let mut out = Vec::with_capacity(expected_size);
            // Cap the read so a stream lying about its size cannot balloon
            // past `expected_size` before the length check.
            ZlibDecoder::new(data)
                .take(expected_size as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| PackError::CorruptData(format!("zlib stream: {e}")))?;
            out
        }
        Variant::Lz4 => {
            return Err(PackError::UnsupportedCompression(
                "lz4 is a reserved variant and not implemented".into(),
            ))
        }
    };
    if out.len() != expected_size {
        return Err(PackError::CorruptData(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            expected_size
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_roundtrip() {
        let original = b"Hello, World! This is a test of zlib compression.";
        let compressed = compress(Variant::Zlib, original).unwrap();
        let decompressed = decompress(Variant::Zlib, &compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn zlib_accepts_any_effort_level() {
        // Streams produced at a different level than the writer's must decode.
        let original = vec![7u8; 4096];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = decompress(Variant::Zlib, &compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn none_is_identity() {
        let data = b"stored verbatim";
        assert_eq!(compress(Variant::None, data).unwrap(), data);
        assert_eq!(decompress(Variant::None, data, data.len()).unwrap(), data);
    }

    #[test]
    fn size_mismatch_is_corrupt_data() {
        let compressed = compress(Variant::Zlib, b"twelve bytes").unwrap();
        let err = decompress(Variant::Zlib, &compressed, 99).unwrap_err();
        assert!(matches!(err, PackError::CorruptData(_)));
    }

    #[test]
    fn overlong_stream_stops_at_the_declared_size() {
        // A stream expanding far past the declared size must fail without
        // materializing the full expansion.
        let compressed = compress(Variant::Zlib, &vec![0u8; 1 << 20]).unwrap();
        let err = decompress(Variant::Zlib, &compressed, 16).unwrap_err();
        assert!(matches!(err, PackError::CorruptData(_)));
    }

    #[test]
    fn lz4_fails_fast() {
        let err = compress(Variant::Lz4, b"data").unwrap_err();
        assert!(matches!(err, PackError::UnsupportedCompression(_)));
        let err = decompress(Variant::Lz4, b"data", 4).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedCompression(_)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(Variant::from_tag(3), None);
        assert_eq!(Variant::from_tag(0xffff), None);
    }
}
