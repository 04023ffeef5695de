//! CRC-32 helpers.
//!
//! The streaming accumulator is a plain local value owned by whichever
//! call is hashing; nothing here is shared between operations.

use crc32fast::Hasher;

/// One-shot CRC-32 of a byte span.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Streaming CRC-32 accumulator for spans that are not contiguous in memory.
#[derive(Default)]
pub struct Crc32 {
    hasher: Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_matches_one_shot() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut crc = Crc32::new();
        crc.update(&data[..20]);
        crc.update(&data[20..]);
        assert_eq!(crc.finalize(), crc32(data));
    }

    #[test]
    fn empty_span() {
        assert_eq!(crc32(b""), 0);
    }
}
