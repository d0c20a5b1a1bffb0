//! FlowRadar
//!
//! A Bloom filter of seen flows in front of an invertible counting table.
//! Each table cell folds in the XOR of the keys that landed on it, the
//! number of distinct flows among them, and their packet total. Cells with
//! exactly one remaining flow can be read off directly and peeled out of
//! the table, often recovering the full flow set with exact counts.

use std::collections::VecDeque;

use crate::bloom::BloomFilter;
use crate::flow::{FlowKey, KeyBytes};
use crate::hash;
use crate::traits::{ConfigError, DecodableSketch, DecodedFlows, Sketch};

/// Hash-family offset for the counting-table hashes, keeping them disjoint
/// from the Bloom filter's.
const TABLE_SEED_OFFSET: usize = 16;

#[derive(Clone, Debug)]
struct Cell {
    flow_xor: KeyBytes,
    flow_count: u32,
    packet_count: u32,
}

/// Invertible flow sketch: Bloom filter plus counting table.
#[derive(Clone, Debug)]
pub struct FlowRadar<K: FlowKey> {
    bloom: BloomFilter,
    /// Counting table, partitioned into one sub-range per hash so a key's
    /// cells are always distinct.
    cells: Vec<Cell>,
    cells_per_hash: usize,
    ct_seeds: Vec<u64>,
    _key: core::marker::PhantomData<K>,
}

impl<K: FlowKey> FlowRadar<K> {
    /// Cell cost: encoded key bag plus two 32-bit counters.
    const CELL_BYTES: usize = K::ENCODED_LEN + 2 * core::mem::size_of::<u32>();

    /// Create a sketch giving `bf_percentage` of `total_memory` to the
    /// Bloom filter (as bits) and the rest to the counting table.
    pub fn new(
        total_memory: usize,
        bf_percentage: f64,
        bf_hashes: usize,
        ct_hashes: usize,
    ) -> Result<Self, ConfigError> {
        if !(bf_percentage > 0.0 && bf_percentage < 1.0) {
            return Err(ConfigError::invalid(format!(
                "bloom filter share {} outside (0, 1)",
                bf_percentage
            )));
        }
        if ct_hashes == 0 {
            return Err(ConfigError::invalid(
                "counting table needs at least 1 hash function",
            ));
        }

        let bf_bytes = (total_memory as f64 * bf_percentage) as usize;
        let bloom = BloomFilter::with_params(bf_bytes * 8, bf_hashes)?;

        let ct_bytes = total_memory.saturating_sub(bf_bytes);
        let cells_per_hash = ct_bytes / (ct_hashes * Self::CELL_BYTES);
        if cells_per_hash == 0 {
            return Err(ConfigError::invalid(format!(
                "{} bytes cannot fit {} partitions of {}-byte cells",
                ct_bytes,
                ct_hashes,
                Self::CELL_BYTES
            )));
        }

        Ok(Self {
            bloom,
            cells: vec![
                Cell {
                    flow_xor: KeyBytes::zeroed(K::ENCODED_LEN),
                    flow_count: 0,
                    packet_count: 0,
                };
                cells_per_hash * ct_hashes
            ],
            cells_per_hash,
            ct_seeds: hash::seeds_from(TABLE_SEED_OFFSET, ct_hashes),
            _key: core::marker::PhantomData,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_indices(&self, item: &[u8]) -> Vec<usize> {
        self.ct_seeds
            .iter()
            .enumerate()
            .map(|(i, &seed)| {
                i * self.cells_per_hash + (hash::hash(item, seed) as usize) % self.cells_per_hash
            })
            .collect()
    }

    fn peel(cells: &mut [Cell], indices: &dyn Fn(&[u8]) -> Vec<usize>) -> (Vec<(K, u64)>, bool) {
        let mut ready: VecDeque<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.flow_count == 1)
            .map(|(i, _)| i)
            .collect();
        let mut flows = Vec::new();

        while let Some(idx) = ready.pop_front() {
            if cells[idx].flow_count != 1 {
                continue;
            }
            let key_bytes = cells[idx].flow_xor;
            let count = cells[idx].packet_count;
            let key = K::decode(key_bytes.as_slice());
            flows.push((key, u64::from(count)));

            for peer in indices(key_bytes.as_slice()) {
                let cell = &mut cells[peer];
                cell.flow_xor.xor_assign(&key_bytes);
                cell.flow_count = cell.flow_count.saturating_sub(1);
                cell.packet_count = cell.packet_count.saturating_sub(count);
                if cell.flow_count == 1 {
                    ready.push_back(peer);
                }
            }
        }

        let complete = cells.iter().all(|c| c.flow_count == 0);
        (flows, complete)
    }
}

impl<K: FlowKey> Sketch<K> for FlowRadar<K> {
    fn update(&mut self, key: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        let item = key.encode();

        // A flow is folded into its cells once, the first time the Bloom
        // filter has not seen it.
        if !self.bloom.contains(item.as_slice()) {
            self.bloom.insert(item.as_slice());
            for idx in self.cell_indices(item.as_slice()) {
                let cell = &mut self.cells[idx];
                cell.flow_xor.xor_assign(&item);
                cell.flow_count = cell.flow_count.saturating_add(1);
            }
        }

        for idx in self.cell_indices(item.as_slice()) {
            let cell = &mut self.cells[idx];
            cell.packet_count = cell.packet_count.saturating_add(delta);
        }
    }

    fn query(&self, key: &K) -> u64 {
        let item = key.encode();
        if !self.bloom.contains(item.as_slice()) {
            return 0;
        }

        let indices = self.cell_indices(item.as_slice());

        // A pure cell holding exactly this key reports it exactly.
        for &idx in &indices {
            let cell = &self.cells[idx];
            if cell.flow_count == 1 && cell.flow_xor == item {
                return u64::from(cell.packet_count);
            }
        }

        // Otherwise the smallest shared cell is an upper bound.
        indices
            .iter()
            .map(|&idx| u64::from(self.cells[idx].packet_count))
            .min()
            .unwrap_or(0)
    }

    fn clear(&mut self) {
        self.bloom.clear();
        self.cells.fill(Cell {
            flow_xor: KeyBytes::zeroed(K::ENCODED_LEN),
            flow_count: 0,
            packet_count: 0,
        });
    }

    fn memory_footprint(&self) -> usize {
        self.bloom.memory_bytes() + self.cells.len() * Self::CELL_BYTES
    }
}

impl<K: FlowKey> DecodableSketch<K> for FlowRadar<K> {
    /// Peel pure cells until none remain, on a scratch copy of the table.
    ///
    /// When overcrowded cells block the chain the result is flagged
    /// incomplete and carries the flows recovered so far.
    fn decode(&self) -> DecodedFlows<K> {
        let mut scratch = self.cells.clone();
        let cells_per_hash = self.cells_per_hash;
        let ct_seeds = self.ct_seeds.clone();
        let indices = move |item: &[u8]| -> Vec<usize> {
            ct_seeds
                .iter()
                .enumerate()
                .map(|(i, &seed)| {
                    i * cells_per_hash + (hash::hash(item, seed) as usize) % cells_per_hash
                })
                .collect()
        };
        let (flows, complete) = Self::peel(&mut scratch, &indices);
        DecodedFlows { flows, complete }
    }
}
