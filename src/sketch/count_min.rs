//! Count-Min sketch
//!
//! A `rows x width` matrix of unsigned counters; every row hashes the key
//! to one column and the estimate is the minimum across rows. Estimates
//! never undercount: collisions only ever inflate a counter.
//!
//! # Example
//!
//! ```
//! use sketchbench::sketch::CountMin;
//!
//! let mut cm = CountMin::new(4, 64 * 1024).unwrap();
//! cm.add(b"10.0.0.1", 5);
//! cm.add(b"10.0.0.2", 3);
//! assert!(cm.estimate(b"10.0.0.1") >= 5);
//! ```

use crate::flow::FlowKey;
use crate::hash;
use crate::matrix::{width_for_budget, CounterMatrix};
use crate::traits::{ConfigError, Sketch};

/// Count-Min frequency estimator over encoded keys.
#[derive(Clone, Debug)]
pub struct CountMin {
    matrix: CounterMatrix<u32>,
    seeds: Vec<u64>,
}

impl CountMin {
    /// Create a sketch with `rows` hash rows inside `memory_bytes`.
    ///
    /// Column count is `memory_bytes / (rows * 4)`; fails with
    /// `InvalidConfig` when that would be zero.
    pub fn new(rows: usize, memory_bytes: usize) -> Result<Self, ConfigError> {
        let width = width_for_budget(memory_bytes, rows, core::mem::size_of::<u32>())?;
        Ok(Self {
            matrix: CounterMatrix::new(rows, width),
            seeds: hash::seeds(rows),
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

    /// Add `delta` occurrences of an encoded key. Counters saturate at
    /// `u32::MAX`.
    pub fn add(&mut self, item: &[u8], delta: u32) {
        for row in 0..self.matrix.rows() {
            let col = self.column(row, item);
            let cell = self.matrix.at_mut(row, col);
            *cell = cell.saturating_add(delta);
        }
    }

    /// Minimum counter across rows: an upper bound on the true count.
    pub fn estimate(&self, item: &[u8]) -> u64 {
        let mut min = u32::MAX;
        for row in 0..self.matrix.rows() {
            let col = self.column(row, item);
            min = min.min(self.matrix.at(row, col));
        }
        u64::from(min)
    }

    pub fn clear(&mut self) {
        self.matrix.clear();
    }

    pub fn memory_bytes(&self) -> usize {
        self.matrix.memory_bytes()
    }
}

impl<K: FlowKey> Sketch<K> for CountMin {
    fn update(&mut self, key: &K, delta: u32) {
        self.add(key.encode().as_slice(), delta);
    }

    fn query(&self, key: &K) -> u64 {
        self.estimate(key.encode().as_slice())
    }

    fn clear(&mut self) {
        CountMin::clear(self);
    }

    fn memory_footprint(&self) -> usize {
        self.memory_bytes()
    }
}
