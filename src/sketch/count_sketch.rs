//! Count sketch
//!
//! Like Count-Min but with signed counters: every row also draws a ±1 sign
//! for the key, so colliding flows cancel in expectation instead of piling
//! up. The estimate is the median across rows, clamped at zero.

use crate::flow::FlowKey;
use crate::hash;
use crate::matrix::{width_for_budget, CounterMatrix};
use crate::traits::{ConfigError, Sketch};

/// Median-of-signed-counters frequency estimator.
#[derive(Clone, Debug)]
pub struct CountSketch {
    matrix: CounterMatrix<i32>,
    seeds: Vec<u64>,
    sign_seeds: Vec<u64>,
}

impl CountSketch {
    /// Create a sketch with `rows` hash rows inside `memory_bytes`.
    pub fn new(rows: usize, memory_bytes: usize) -> Result<Self, ConfigError> {
        let width = width_for_budget(memory_bytes, rows, core::mem::size_of::<i32>())?;
        Ok(Self {
            matrix: CounterMatrix::new(rows, width),
            seeds: hash::seeds(rows),
            sign_seeds: hash::sign_seeds(rows),
        })
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn width(&self) -> usize {
        self.matrix.width()
    }

    #[inline]
    fn column(&self, row: usize, item: &[u8]) -> usize {
        (hash::hash(item, self.seeds[row]) as usize) % self.matrix.width()
    }

    /// Add `delta` signed occurrences of an encoded key. Counters saturate
    /// at the `i32` range ends.
    pub fn add(&mut self, item: &[u8], delta: u32) {
        for row in 0..self.matrix.rows() {
            let col = self.column(row, item);
            let signed = i64::from(hash::sign(item, self.sign_seeds[row])) * i64::from(delta);
            let cell = self.matrix.at_mut(row, col);
            *cell = (i64::from(*cell) + signed).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
                as i32;
        }
    }

    /// Median across rows of the sign-corrected counters; negative medians
    /// clamp to zero.
    pub fn estimate(&self, item: &[u8]) -> u64 {
        let mut values: Vec<i64> = (0..self.matrix.rows())
            .map(|row| {
                let col = self.column(row, item);
                i64::from(hash::sign(item, self.sign_seeds[row]))
                    * i64::from(self.matrix.at(row, col))
            })
            .collect();
        values.sort_unstable();

        let mid = values.len() / 2;
        let median = if values.len() % 2 == 1 {
            values[mid]
        } else {
            (values[mid - 1] + values[mid]) / 2
        };
        median.max(0) as u64
    }

    pub fn clear(&mut self) {
        self.matrix.clear();
    }

    pub fn memory_bytes(&self) -> usize {
        self.matrix.memory_bytes()
    }
}

impl<K: FlowKey> Sketch<K> for CountSketch {
    fn update(&mut self, key: &K, delta: u32) {
        self.add(key.encode().as_slice(), delta);
    }

    fn query(&self, key: &K) -> u64 {
        self.estimate(key.encode().as_slice())
    }

    fn clear(&mut self) {
        CountSketch::clear(self);
    }

    fn memory_footprint(&self) -> usize {
        self.memory_bytes()
    }
}
