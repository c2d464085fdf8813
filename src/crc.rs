//! CRC32 (IEEE 802.3 polynomial) over a blob's index and payload sections (C7).
//!
//! Wraps `crc32fast`, the same hardware-accelerated-when-available crate used
//! elsewhere in the corpus for frame integrity checks; the teacher itself
//! checks block integrity via its LZ4 checksum path rather than a standalone
//! CRC, so there is no teacher file to adapt directly here.

/// Computes the IEEE CRC32 of `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Incrementally accumulates a CRC32 across non-contiguous sections (index
/// table, then each payload section) without concatenating them first.
#[derive(Default)]
pub struct Hasher(crc32fast::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(crc32fast::Hasher::new())
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    #[inline]
    pub fn finalize(self) -> u32 {
        self.0.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // CRC32(IEEE) of the ASCII string "123456789" is a standard check value.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let whole = checksum(b"hello world");
        let mut h = Hasher::new();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), whole);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn single_bit_flip_changes_checksum() {
        let a = checksum(b"abcdefgh");
        let b = checksum(b"abcdefgi");
        assert_ne!(a, b);
    }
}
