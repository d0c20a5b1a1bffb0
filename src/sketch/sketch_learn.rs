//! SketchLearn
//!
//! Counts traffic per bit of a 32-bit key hash: one counter matrix per bit
//! position plus a total matrix of the same shape. A query reads its
//! column in every row, treats each bit's share of the column total as a
//! probability, and keeps the factors of the discriminating bits. A column
//! owned by a single flow reproduces its count exactly.

use crate::flow::FlowKey;
use crate::hash;
use crate::matrix::{width_for_budget, CounterMatrix};
use crate::traits::{ConfigError, Sketch};

/// Width of the per-key hash whose bits are counted.
pub const HASH_BITS: usize = 32;

/// Hash-family index reserved for the bit-level key hash.
const KEY_SEED_INDEX: usize = 131;

/// Per-bit counter-array frequency estimator.
#[derive(Clone, Debug)]
pub struct SketchLearn {
    /// Traffic totals per (row, column).
    total: CounterMatrix<u32>,
    /// One matrix per hash-bit position, counting traffic with that bit set.
    bits: Vec<CounterMatrix<u32>>,
    seeds: Vec<u64>,
    key_seed: u64,
    theta: f64,
}

impl SketchLearn {
    /// Create a sketch with `rows` hash rows inside `memory_bytes`,
    /// accepting bits whose probability is at least `theta` from 1/2.
    ///
    /// The budget covers the total matrix plus one matrix per hash bit, so
    /// each gets `memory_bytes / (HASH_BITS + 1)` bytes.
    pub fn new(memory_bytes: usize, rows: usize, theta: f64) -> Result<Self, ConfigError> {
        if !(0.0..=0.5).contains(&theta) {
            return Err(ConfigError::invalid(format!(
                "bit-acceptance threshold {} outside [0, 0.5]",
                theta
            )));
        }
        let cell_bytes = (HASH_BITS + 1) * core::mem::size_of::<u32>();
        let width = width_for_budget(memory_bytes, rows, cell_bytes)?;

        Ok(Self {
            total: CounterMatrix::new(rows, width),
            bits: (0..HASH_BITS)
                .map(|_| CounterMatrix::new(rows, width))
                .collect(),
            seeds: hash::seeds(rows),
            key_seed: hash::seed_at(KEY_SEED_INDEX),
            theta,
        })
    }

    pub fn rows(&self) -> usize {
        self.total.rows()
    }

    pub fn width(&self) -> usize {
        self.total.width()
    }

    /// The 32-bit hash whose bit pattern identifies a key.
    #[inline]
    pub fn key_hash(&self, item: &[u8]) -> u32 {
        hash::hash(item, self.key_seed) as u32
    }

    /// Column an encoded key maps to in `row`. Test/inspection hook.
    #[inline]
    pub fn column(&self, row: usize, item: &[u8]) -> usize {
        (hash::hash(item, self.seeds[row]) as usize) % self.total.width()
    }

    /// Total traffic recorded in `(row, col)`.
    pub fn total_count(&self, row: usize, col: usize) -> u32 {
        self.total.at(row, col)
    }

    /// Traffic recorded in `(row, col)` whose hash bit `bit` is set.
    pub fn bit_count(&self, bit: usize, row: usize, col: usize) -> u32 {
        self.bits[bit].at(row, col)
    }

    pub fn add(&mut self, item: &[u8], delta: u32) {
        let h = self.key_hash(item);
        for row in 0..self.total.rows() {
            let col = self.column(row, item);
            let cell = self.total.at_mut(row, col);
            *cell = cell.saturating_add(delta);
            for bit in 0..HASH_BITS {
                if (h >> bit) & 1 == 1 {
                    let cell = self.bits[bit].at_mut(row, col);
                    *cell = cell.saturating_add(delta);
                }
            }
        }
    }

    /// Per-row estimate: the column total scaled by the probability factors
    /// of every discriminating bit, then the median across rows.
    pub fn estimate(&self, item: &[u8]) -> u64 {
        let h = self.key_hash(item);
        let mut row_estimates: Vec<f64> = (0..self.total.rows())
            .map(|row| {
                let col = self.column(row, item);
                let total = f64::from(self.total.at(row, col));
                if total == 0.0 {
                    return 0.0;
                }
                let mut est = total;
                for bit in 0..HASH_BITS {
                    let p = f64::from(self.bits[bit].at(row, col)) / total;
                    if (p - 0.5).abs() >= self.theta {
                        est *= if (h >> bit) & 1 == 1 { p } else { 1.0 - p };
                    }
                }
                est
            })
            .collect();
        row_estimates.sort_by(|a, b| a.total_cmp(b));

        let mid = row_estimates.len() / 2;
        let median = if row_estimates.len() % 2 == 1 {
            row_estimates[mid]
        } else {
            (row_estimates[mid - 1] + row_estimates[mid]) / 2.0
        };
        median.round() as u64
    }

    pub fn clear(&mut self) {
        self.total.clear();
        for m in &mut self.bits {
            m.clear();
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.total.memory_bytes() + self.bits.iter().map(|m| m.memory_bytes()).sum::<usize>()
    }
}

impl<K: FlowKey> Sketch<K> for SketchLearn {
    fn update(&mut self, key: &K, delta: u32) {
        self.add(key.encode().as_slice(), delta);
    }

    fn query(&self, key: &K) -> u64 {
        self.estimate(key.encode().as_slice())
    }

    fn clear(&mut self) {
        SketchLearn::clear(self);
    }

    fn memory_footprint(&self) -> usize {
        self.memory_bytes()
    }
}
