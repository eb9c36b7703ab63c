//! Bloom filter for "recently seen" checks
//!
//! Positions are derived by double hashing the first eight bytes of a
//! SHA-256 digest. Individual keys are never removed; the owner clears the
//! whole filter on a fixed cycle instead, which bounds both staleness and
//! false-positive growth.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// Thread-safe bloom filter over string keys
#[derive(Debug)]
pub struct BloomFilter {
    bits: RwLock<Vec<u8>>,
    num_bits: usize,
    num_hashes: usize,
}

impl BloomFilter {
    /// Create a filter with `num_bits` bits and `num_hashes` probes per key
    pub fn new(num_bits: usize, num_hashes: usize) -> Self {
        let num_bits = num_bits.max(1);
        let num_bytes = (num_bits + 7) / 8;

        Self {
            bits: RwLock::new(vec![0u8; num_bytes]),
            num_bits,
            num_hashes: num_hashes.clamp(1, 30),
        }
    }

    /// Add a key to the filter
    pub fn add(&self, key: &str) {
        let (h1, h2) = Self::hash_key(key);
        let mut bits = self.bits.write();

        for i in 0..self.num_hashes {
            let bit = self.bit_position(h1, h2, i);
            bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// Check if a key may have been added since the last clear
    pub fn contains(&self, key: &str) -> bool {
        let (h1, h2) = Self::hash_key(key);
        let bits = self.bits.read();

        (0..self.num_hashes).all(|i| {
            let bit = self.bit_position(h1, h2, i);
            (bits[bit / 8] >> (bit % 8)) & 1 == 1
        })
    }

    /// Reset every bit
    pub fn clear(&self) {
        self.bits.write().fill(0);
    }

    /// Number of bits in the filter
    pub fn len_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of hash probes per key
    pub fn hash_count(&self) -> usize {
        self.num_hashes
    }

    /// Expected false positive rate after `num_keys` insertions
    pub fn estimate_false_positive_rate(&self, num_keys: usize) -> f64 {
        if num_keys == 0 {
            return 0.0;
        }
        let k = self.num_hashes as f64;
        let m = self.num_bits as f64;
        let n = num_keys as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    fn hash_key(key: &str) -> (u32, u32) {
        let digest = Sha256::digest(key.as_bytes());
        let h1 = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let h2 = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);
        (h1, h2)
    }

    fn bit_position(&self, h1: u32, h2: u32, i: usize) -> usize {
        let hash = h1.wrapping_add((i as u32).wrapping_mul(h2));
        hash as usize % self.num_bits
    }
}
