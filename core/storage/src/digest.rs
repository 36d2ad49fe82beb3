//! Running checksum over stored bytes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Incremental BLAKE2b-256 digest that also counts the bytes it has seen.
pub struct Checksum {
    hasher: Blake2b<U32>,
    bytes: u64,
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            hasher: Blake2b::<U32>::new(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        self.hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

/// Checksum of a complete buffer.
pub fn checksum_hex(data: &[u8]) -> String {
    let mut checksum = Checksum::new();
    checksum.update(data);
    checksum.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut checksum = Checksum::new();
        checksum.update(b"hel");
        checksum.update(b"lo");
        assert_eq!(checksum.bytes(), 5);
        assert_eq!(checksum.finalize_hex(), checksum_hex(b"hello"));
    }

    #[test]
    fn test_hex_shape() {
        let hex = checksum_hex(b"");
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(hex, checksum_hex(b"x"));
    }
}
