//! Exact per-flow reference counter
//!
//! `Ideal` is the ground truth the metrics layer compares every sketch
//! against. It is a plain hash map and grows with the number of distinct
//! flows in an epoch; `clear` keeps the allocation for the next epoch.

use std::collections::HashMap;

use crate::flow::FlowKey;
use crate::traits::{HeavyHitterSketch, Sketch};

/// Exact map from flow key to packet count.
#[derive(Clone, Debug, Default)]
pub struct Ideal<K: FlowKey> {
    counts: HashMap<K, u64>,
}

impl<K: FlowKey> Ideal<K> {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    /// Number of distinct flows observed since the last clear.
    pub fn num_flows(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all per-flow counts (the epoch's packet total).
    pub fn total_packets(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate over every observed flow and its exact count.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &u64)> {
        self.counts.iter()
    }
}

impl<K: FlowKey> Sketch<K> for Ideal<K> {
    fn update(&mut self, key: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        *self.counts.entry(*key).or_insert(0) += u64::from(delta);
    }

    fn query(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    fn clear(&mut self) {
        self.counts.clear();
    }

    fn memory_footprint(&self) -> usize {
        self.counts.len() * (K::ENCODED_LEN + core::mem::size_of::<u64>())
    }
}

impl<K: FlowKey> HeavyHitterSketch<K> for Ideal<K> {
    fn heavy_hitters(&self, threshold: u64) -> Vec<(K, u64)> {
        self.counts
            .iter()
            .filter(|(_, &c)| c >= threshold)
            .map(|(k, &c)| (*k, c))
            .collect()
    }
}
