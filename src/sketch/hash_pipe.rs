//! HashPipe
//!
//! A pipeline of flow tables. New keys always claim their stage-0 slot; the
//! displaced entry is carried down the stages, surviving only while it is
//! larger than what it meets. Small flows fall off the end, heavy flows
//! settle into a slot with their full count.

use crate::flow::FlowKey;
use crate::hash;
use crate::traits::{ConfigError, HeavyHitterSketch, Sketch};

#[derive(Clone, Copy, Debug)]
struct Slot<K> {
    key: K,
    count: u32,
}

/// Multi-stage flow table with always-evict-smaller carry semantics.
#[derive(Clone, Debug)]
pub struct HashPipe<K: FlowKey> {
    stages: usize,
    width: usize,
    slots: Vec<Slot<K>>,
    seeds: Vec<u64>,
}

impl<K: FlowKey> HashPipe<K> {
    /// Slot cost: encoded key plus a 32-bit counter.
    const SLOT_BYTES: usize = K::ENCODED_LEN + core::mem::size_of::<u32>();

    /// Create a pipeline of `num_stages` tables inside `memory_bytes`.
    pub fn new(memory_bytes: usize, num_stages: usize) -> Result<Self, ConfigError> {
        if num_stages == 0 {
            return Err(ConfigError::invalid("pipeline needs at least 1 stage"));
        }
        let width = memory_bytes / (num_stages * Self::SLOT_BYTES);
        if width == 0 {
            return Err(ConfigError::invalid(format!(
                "{} bytes cannot fit {} stages of {}-byte slots",
                memory_bytes,
                num_stages,
                Self::SLOT_BYTES
            )));
        }

        Ok(Self {
            stages: num_stages,
            width,
            slots: vec![
                Slot {
                    key: K::default(),
                    count: 0,
                };
                num_stages * width
            ],
            seeds: hash::seeds(num_stages),
        })
    }

    pub fn num_stages(&self) -> usize {
        self.stages
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn slot_index(&self, stage: usize, key: &K) -> usize {
        let col = (hash::hash(key.encode().as_slice(), self.seeds[stage]) as usize) % self.width;
        stage * self.width + col
    }

    /// The occupied entry at `(stage, col)`, if any. Test/report hook.
    pub fn slot_entry(&self, stage: usize, col: usize) -> Option<(K, u32)> {
        let slot = &self.slots[stage * self.width + col];
        if slot.key.is_null() {
            None
        } else {
            Some((slot.key, slot.count))
        }
    }

    /// Sum of every resident count across all stages.
    pub fn resident_total(&self) -> u64 {
        self.slots.iter().map(|s| u64::from(s.count)).sum()
    }
}

impl<K: FlowKey> Sketch<K> for HashPipe<K> {
    fn update(&mut self, key: &K, delta: u32) {
        if delta == 0 {
            return;
        }

        // Stage 0: the incoming key always wins its slot.
        let idx = self.slot_index(0, key);
        let slot = &mut self.slots[idx];
        if slot.key.is_null() {
            *slot = Slot {
                key: *key,
                count: delta,
            };
            return;
        }
        if slot.key == *key {
            slot.count = slot.count.saturating_add(delta);
            return;
        }
        let mut carry = core::mem::replace(
            slot,
            Slot {
                key: *key,
                count: delta,
            },
        );

        // Later stages: the larger count survives, the smaller carries on.
        for stage in 1..self.stages {
            let idx = self.slot_index(stage, &carry.key);
            let slot = &mut self.slots[idx];
            if slot.key.is_null() {
                *slot = carry;
                return;
            }
            if slot.key == carry.key {
                slot.count = slot.count.saturating_add(carry.count);
                return;
            }
            if slot.count < carry.count {
                core::mem::swap(slot, &mut carry);
            } else {
                return;
            }
        }
        // Carry fell off the end: dropped.
    }

    fn query(&self, key: &K) -> u64 {
        let mut total = 0u64;
        for stage in 0..self.stages {
            let slot = &self.slots[self.slot_index(stage, key)];
            if slot.key == *key {
                total += u64::from(slot.count);
            }
        }
        total
    }

    fn clear(&mut self) {
        self.slots.fill(Slot {
            key: K::default(),
            count: 0,
        });
    }

    fn memory_footprint(&self) -> usize {
        self.stages * self.width * Self::SLOT_BYTES
    }
}

impl<K: FlowKey> HeavyHitterSketch<K> for HashPipe<K> {
    fn heavy_hitters(&self, threshold: u64) -> Vec<(K, u64)> {
        // A key can occupy one slot per stage after repeated displacement;
        // report the summed estimate once per key.
        let mut out: Vec<(K, u64)> = Vec::new();
        for slot in &self.slots {
            if slot.key.is_null() {
                continue;
            }
            if out.iter().any(|(k, _)| *k == slot.key) {
                continue;
            }
            let est = self.query(&slot.key);
            if est >= threshold {
                out.push((slot.key, est));
            }
        }
        out
    }
}
