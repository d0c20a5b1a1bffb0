//! Seeded hash family over encoded flow keys
//!
//! Every sketch draws its row/stage hash functions from this family:
//! xxh3 with one seed per function index. Seeds are spaced by a golden-ratio
//! multiply so nearby indices land far apart in seed space.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Golden-ratio scramble applied to function indices to derive seeds.
pub const SEED_SCRAMBLE: u64 = 0x9e3779b97f4a7c15;

/// Salt separating the sign-function seed space from the index seed space.
const SIGN_SALT: u64 = 0x2545f4914f6cdd1d;

/// Seed for hash function `index` of the family.
#[inline]
pub fn seed_at(index: usize) -> u64 {
    (index as u64).wrapping_mul(SEED_SCRAMBLE)
}

/// Seeds for hash functions `0..n`.
pub fn seeds(n: usize) -> Vec<u64> {
    (0..n).map(seed_at).collect()
}

/// Seeds for hash functions `start..start + n`.
///
/// Lets two structures inside one sketch (e.g. a membership filter and a
/// counting table) draw from disjoint parts of the family.
pub fn seeds_from(start: usize, n: usize) -> Vec<u64> {
    (start..start + n).map(seed_at).collect()
}

/// Seeds for the sign functions `S_0..S_n`, disjoint from [`seeds`].
pub fn sign_seeds(n: usize) -> Vec<u64> {
    (0..n)
        .map(|i| (i as u64 ^ SIGN_SALT).wrapping_mul(SEED_SCRAMBLE))
        .collect()
}

/// `H_seed(item)`: deterministic, uniform 64-bit hash of an encoded key.
#[inline]
pub fn hash(item: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(item, seed)
}

/// `S_seed(item)`: a balanced ±1 drawn from one bit of a dedicated hash.
#[inline]
pub fn sign(item: &[u8], seed: u64) -> i32 {
    if xxh3_64_with_seed(item, seed) & 1 == 0 {
        1
    } else {
        -1
    }
}
