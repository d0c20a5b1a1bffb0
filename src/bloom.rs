//! Bloom filter over encoded flow keys
//!
//! Used as the flow filter inside invertible sketches: a first-seen test
//! with false positives but no false negatives. The bit array is packed
//! into 64-bit words and reused across epochs.

use crate::hash;
use crate::traits::ConfigError;

#[derive(Clone, Debug)]
pub struct BloomFilter {
    /// Bit array, word-packed.
    bits: Vec<u64>,
    /// Number of bits (m).
    num_bits: usize,
    /// Seeds for the k hash functions.
    seeds: Vec<u64>,
}

impl BloomFilter {
    /// Create a filter with `num_bits` bits and `num_hashes` hash functions.
    ///
    /// The bit count is rounded up to a multiple of 64 for word alignment.
    pub fn with_params(num_bits: usize, num_hashes: usize) -> Result<Self, ConfigError> {
        if num_bits == 0 {
            return Err(ConfigError::invalid("bloom filter needs at least 1 bit"));
        }
        if num_hashes == 0 {
            return Err(ConfigError::invalid(
                "bloom filter needs at least 1 hash function",
            ));
        }

        let num_bits = (num_bits + 63) / 64 * 64;
        let num_words = num_bits / 64;

        Ok(Self {
            bits: vec![0u64; num_words],
            num_bits,
            seeds: hash::seeds(num_hashes),
        })
    }

    pub fn insert(&mut self, item: &[u8]) {
        for &seed in &self.seeds {
            let bit_idx = (hash::hash(item, seed) as usize) % self.num_bits;
            self.bits[bit_idx / 64] |= 1u64 << (bit_idx % 64);
        }
    }

    /// `true` means the item might have been inserted (possible false
    /// positive); `false` means it definitely was not.
    pub fn contains(&self, item: &[u8]) -> bool {
        for &seed in &self.seeds {
            let bit_idx = (hash::hash(item, seed) as usize) % self.num_bits;
            if self.bits[bit_idx / 64] & (1u64 << (bit_idx % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Zero the bit array without reallocating.
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.seeds.len()
    }

    pub fn bits_set(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn memory_bytes(&self) -> usize {
        self.bits.len() * 8
    }
}
