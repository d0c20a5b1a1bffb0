//! UnivMon
//!
//! A cascade of sub-sampled Count sketches. Level 0 sees every key; each
//! deeper level keeps a key only when one more low bit of a dedicated
//! sampling hash is zero, so the levels form a nested halving of the
//! stream. Point queries read level 0; stream-wide functions combine the
//! levels through the universal recursion.

use std::collections::HashMap;

use crate::flow::FlowKey;
use crate::hash;
use crate::sketch::CountSketch;
use crate::traits::{ConfigError, HeavyHitterSketch, Sketch};

/// Hash-family index reserved for the level-sampling hash.
const SAMPLE_SEED_INDEX: usize = 97;

/// Flows a level remembers for the universal recursion.
pub const DEFAULT_TOP_FLOWS: usize = 256;

#[derive(Clone, Debug)]
struct Level<K: FlowKey> {
    sketch: CountSketch,
    tracked: HashMap<K, u64>,
}

/// Universal sketch: one sub-sampled CountSketch per level.
#[derive(Clone, Debug)]
pub struct UnivMon<K: FlowKey> {
    levels: Vec<Level<K>>,
    sample_seed: u64,
    top_flows: usize,
}

impl<K: FlowKey> UnivMon<K> {
    /// Create a cascade of `num_levels` sketches with `rows` hash rows
    /// each, splitting `memory_bytes` across levels in halving shares.
    pub fn new(num_levels: usize, memory_bytes: usize, rows: usize) -> Result<Self, ConfigError> {
        Self::with_top_flows(num_levels, memory_bytes, rows, DEFAULT_TOP_FLOWS)
    }

    pub fn with_top_flows(
        num_levels: usize,
        memory_bytes: usize,
        rows: usize,
        top_flows: usize,
    ) -> Result<Self, ConfigError> {
        if num_levels == 0 {
            return Err(ConfigError::invalid("cascade needs at least 1 level"));
        }
        if top_flows == 0 {
            return Err(ConfigError::invalid(
                "levels must track at least 1 flow each",
            ));
        }

        // Level l's share is proportional to 1/2^l, normalised over levels.
        let denom: f64 = (0..num_levels).map(|l| 0.5f64.powi(l as i32)).sum();
        let mut levels = Vec::with_capacity(num_levels);
        for l in 0..num_levels {
            let share = (memory_bytes as f64 * 0.5f64.powi(l as i32) / denom) as usize;
            levels.push(Level {
                sketch: CountSketch::new(rows, share)?,
                tracked: HashMap::with_capacity(top_flows + 1),
            });
        }

        Ok(Self {
            levels,
            sample_seed: hash::seed_at(SAMPLE_SEED_INDEX),
            top_flows,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Whether `key` is part of level `level`'s sub-stream.
    ///
    /// Level 0 samples everything; level l keeps a key iff the bottom l
    /// bits of the sampling hash are zero, so deeper levels are nested
    /// subsets of shallower ones.
    pub fn sampled_at(&self, level: usize, key: &K) -> bool {
        if level == 0 {
            return true;
        }
        let g = hash::hash(key.encode().as_slice(), self.sample_seed);
        g & ((1u64 << level) - 1) == 0
    }

    fn track(level: &mut Level<K>, top_flows: usize, key: &K, estimate: u64) {
        level.tracked.insert(*key, estimate);
        if level.tracked.len() > top_flows {
            // Evict the currently smallest flow to stay bounded.
            let victim = level
                .tracked
                .iter()
                .min_by_key(|(_, &est)| est)
                .map(|(&k, _)| k);
            if let Some(victim) = victim {
                level.tracked.remove(&victim);
            }
        }
    }

    /// Apply the universal recursion to `g` over the tracked flows:
    /// `Y_l = 2 * Y_{l+1} + sum_k g(est_l(k)) * (1 - 2 * [k sampled at l+1])`.
    ///
    /// With the identity function this estimates the total stream weight.
    pub fn universal_estimate<F: Fn(u64) -> f64>(&self, g: F) -> f64 {
        let last = self.levels.len() - 1;
        let mut y: f64 = self.levels[last]
            .tracked
            .keys()
            .map(|k| g(self.levels[last].sketch.estimate(k.encode().as_slice())))
            .sum();

        for l in (0..last).rev() {
            let level = &self.levels[l];
            let correction: f64 = level
                .tracked
                .keys()
                .map(|k| {
                    let est = g(level.sketch.estimate(k.encode().as_slice()));
                    if self.sampled_at(l + 1, k) {
                        -est
                    } else {
                        est
                    }
                })
                .sum();
            y = 2.0 * y + correction;
        }
        y
    }
}

impl<K: FlowKey> Sketch<K> for UnivMon<K> {
    fn update(&mut self, key: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        let item = key.encode();
        for l in 0..self.levels.len() {
            if !self.sampled_at(l, key) {
                // Sampling is nested: once a level rejects the key, every
                // deeper level does too.
                break;
            }
            let level = &mut self.levels[l];
            level.sketch.add(item.as_slice(), delta);
            let est = level.sketch.estimate(item.as_slice());
            Self::track(level, self.top_flows, key, est);
        }
    }

    fn query(&self, key: &K) -> u64 {
        self.levels[0].sketch.estimate(key.encode().as_slice())
    }

    fn clear(&mut self) {
        for level in &mut self.levels {
            level.sketch.clear();
            level.tracked.clear();
        }
    }

    fn memory_footprint(&self) -> usize {
        self.levels.iter().map(|l| l.sketch.memory_bytes()).sum()
    }
}

impl<K: FlowKey> HeavyHitterSketch<K> for UnivMon<K> {
    fn heavy_hitters(&self, threshold: u64) -> Vec<(K, u64)> {
        let level = &self.levels[0];
        level
            .tracked
            .keys()
            .map(|k| (*k, level.sketch.estimate(k.encode().as_slice())))
            .filter(|(_, est)| *est >= threshold)
            .collect()
    }
}
