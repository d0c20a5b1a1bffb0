//! Elastic sketch
//!
//! A heavy part of voting buckets in front of a Count-Min light part.
//! Each bucket entry keeps positive votes for its resident key and negative
//! votes from contenders; once the contention ratio crosses `lambda` the
//! resident is ejected and its accumulated count forwarded to the light
//! part, exactly once per ejection.

use crate::flow::FlowKey;
use crate::hash;
use crate::sketch::CountMin;
use crate::traits::{ConfigError, HeavyHitterSketch, Sketch};

/// Hash-family index reserved for the bucket-choice hash, away from the
/// light part's row seeds.
const BUCKET_SEED_INDEX: usize = 163;

#[derive(Clone, Copy, Debug)]
struct HeavyEntry<K> {
    key: K,
    vote_pos: u32,
    vote_neg: u32,
    /// Set when the slot was re-occupied after an ejection: the resident's
    /// early packets may live in the light part.
    hot: bool,
}

impl<K: FlowKey> HeavyEntry<K> {
    fn empty() -> Self {
        Self {
            key: K::default(),
            vote_pos: 0,
            vote_neg: 0,
            hot: false,
        }
    }
}

/// View of one heavy-part entry, for inspection and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeavyEntryView {
    pub vote_pos: u32,
    pub vote_neg: u32,
    pub hot: bool,
}

/// Heavy/light two-part frequency sketch.
#[derive(Clone, Debug)]
pub struct ElasticSketch<K: FlowKey> {
    buckets: usize,
    lambda: usize,
    entries: Vec<HeavyEntry<K>>,
    bucket_seed: u64,
    light: CountMin,
}

impl<K: FlowKey> ElasticSketch<K> {
    /// Bucket entry cost: key, two vote counters, one flag byte.
    const ENTRY_BYTES: usize = K::ENCODED_LEN + 2 * core::mem::size_of::<u32>() + 1;

    /// Create a sketch whose heavy part gets `heavy_memory` bytes of
    /// `lambda`-way buckets and whose light part is a Count-Min with
    /// `light_rows` rows over the remaining budget.
    pub fn new(
        heavy_memory: usize,
        lambda: usize,
        total_memory: usize,
        light_rows: usize,
    ) -> Result<Self, ConfigError> {
        if lambda == 0 {
            return Err(ConfigError::invalid("bucket arity must be at least 1"));
        }
        if total_memory <= heavy_memory {
            return Err(ConfigError::invalid(format!(
                "total memory {} leaves nothing for the light part after {} heavy bytes",
                total_memory, heavy_memory
            )));
        }
        let buckets = heavy_memory / (lambda * Self::ENTRY_BYTES);
        if buckets == 0 {
            return Err(ConfigError::invalid(format!(
                "{} bytes cannot fit a {}-way bucket of {}-byte entries",
                heavy_memory,
                lambda,
                Self::ENTRY_BYTES
            )));
        }

        Ok(Self {
            buckets,
            lambda,
            entries: vec![HeavyEntry::empty(); buckets * lambda],
            bucket_seed: hash::seed_at(BUCKET_SEED_INDEX),
            light: CountMin::new(light_rows, total_memory - heavy_memory)?,
        })
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets
    }

    pub fn lambda(&self) -> usize {
        self.lambda
    }

    #[inline]
    fn bucket_range(&self, key: &K) -> core::ops::Range<usize> {
        let b = (hash::hash(key.encode().as_slice(), self.bucket_seed) as usize) % self.buckets;
        b * self.lambda..(b + 1) * self.lambda
    }

    /// The heavy-part entry currently holding `key`, if any.
    pub fn heavy_entry(&self, key: &K) -> Option<HeavyEntryView> {
        self.entries[self.bucket_range(key)]
            .iter()
            .find(|e| e.key == *key)
            .map(|e| HeavyEntryView {
                vote_pos: e.vote_pos,
                vote_neg: e.vote_neg,
                hot: e.hot,
            })
    }
}

impl<K: FlowKey> Sketch<K> for ElasticSketch<K> {
    fn update(&mut self, key: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        let range = self.bucket_range(key);

        // Resident key: positive vote.
        if let Some(entry) = self.entries[range.clone()].iter_mut().find(|e| e.key == *key) {
            entry.vote_pos = entry.vote_pos.saturating_add(delta);
            return;
        }

        // Free slot: move in cold.
        if let Some(entry) = self.entries[range.clone()].iter_mut().find(|e| e.key.is_null()) {
            *entry = HeavyEntry {
                key: *key,
                vote_pos: delta,
                vote_neg: 0,
                hot: false,
            };
            return;
        }

        // Contended bucket: vote against the weakest resident and eject it
        // when negatives reach lambda times its positives (integer ratio).
        let mut weakest = range.start;
        for i in range {
            if self.entries[i].vote_pos < self.entries[weakest].vote_pos {
                weakest = i;
            }
        }
        let entry = &mut self.entries[weakest];
        entry.vote_neg = entry.vote_neg.saturating_add(1);
        if entry.vote_neg / entry.vote_pos >= self.lambda as u32 {
            let evicted = *entry;
            *entry = HeavyEntry {
                key: *key,
                vote_pos: delta,
                vote_neg: 0,
                hot: true,
            };
            self.light
                .add(evicted.key.encode().as_slice(), evicted.vote_pos);
        } else {
            // The contender did not win the slot; its packets still count,
            // in the light part.
            self.light.add(key.encode().as_slice(), delta);
        }
    }

    fn query(&self, key: &K) -> u64 {
        if let Some(entry) = self.entries[self.bucket_range(key)]
            .iter()
            .find(|e| e.key == *key)
        {
            let mut est = u64::from(entry.vote_pos);
            if entry.hot {
                est += self.light.estimate(key.encode().as_slice());
            }
            return est;
        }
        self.light.estimate(key.encode().as_slice())
    }

    fn clear(&mut self) {
        self.entries.fill(HeavyEntry::empty());
        self.light.clear();
    }

    fn memory_footprint(&self) -> usize {
        self.buckets * self.lambda * Self::ENTRY_BYTES + self.light.memory_bytes()
    }
}

impl<K: FlowKey> HeavyHitterSketch<K> for ElasticSketch<K> {
    fn heavy_hitters(&self, threshold: u64) -> Vec<(K, u64)> {
        self.entries
            .iter()
            .filter(|e| !e.key.is_null())
            .map(|e| (e.key, self.query(&e.key)))
            .filter(|(_, est)| *est >= threshold)
            .collect()
    }
}
