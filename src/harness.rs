//! Epoch-driven evaluation of the sketch suite
//!
//! Builds the seven sketches from one configuration, replays each epoch
//! (clear, then update in timestamp order), and evaluates every sketch
//! against the exact reference once the epoch's last update is in.

use tracing::info;

use crate::capture::PacketRecord;
use crate::flow::{FlowKey, FlowKeyKind};
use crate::ideal::Ideal;
use crate::metrics::{summarize, MetricsSummary, ResultMetrics};
use crate::sketch::{
    CountMin, CountSketch, ElasticSketch, FlowRadar, HashPipe, SketchLearn, UnivMon,
};
use crate::traits::{ConfigError, Sketch};

/// Per-sketch tuning knobs.
///
/// `default_for` mirrors the evaluation tool's stock parameters for a given
/// total budget: the elastic sketch's heavy part takes half of it.
#[derive(Debug, Clone, Copy)]
pub struct SketchParams {
    pub cm_rows: usize,
    pub cs_rows: usize,
    pub es_heavy_memory: usize,
    pub es_lambda: usize,
    pub es_light_rows: usize,
    pub hp_stages: usize,
    pub um_levels: usize,
    pub um_rows: usize,
    pub sl_rows: usize,
    pub sl_theta: f64,
    pub fr_bf_percentage: f64,
    pub fr_bf_hashes: usize,
    pub fr_ct_hashes: usize,
}

impl SketchParams {
    pub fn default_for(sketch_memory_bytes: usize) -> Self {
        Self {
            cm_rows: 4,
            cs_rows: 4,
            es_heavy_memory: sketch_memory_bytes / 2,
            es_lambda: 4,
            es_light_rows: 4,
            hp_stages: 8,
            um_levels: 4,
            um_rows: 4,
            sl_rows: 1,
            sl_theta: 0.5,
            fr_bf_percentage: 0.3,
            fr_bf_hashes: 3,
            fr_ct_hashes: 3,
        }
    }
}

/// Full run configuration.
#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    pub flow_key_kind: FlowKeyKind,
    pub sketch_memory_bytes: usize,
    /// 0 means a single epoch over the whole capture.
    pub epoch_duration_ms: u32,
    /// Heavy-hitter threshold as a percentage of the epoch's packets
    /// (0.01 means 0.01%).
    pub hh_threshold_percentage: f64,
    pub params: SketchParams,
}

impl EvalConfig {
    pub fn epoch_duration_ns(&self) -> u64 {
        u64::from(self.epoch_duration_ms) * 1_000_000
    }
}

/// Heavy-hitter threshold for an epoch: `percentage` percent of
/// `total_packets`, floored, but at least 1 for a non-empty epoch.
pub fn hh_threshold(total_packets: u64, percentage: f64) -> u64 {
    if total_packets == 0 {
        return 0;
    }
    let threshold = (total_packets as f64 * percentage / 100.0).floor() as u64;
    threshold.max(1)
}

/// The seven sketches under evaluation, driven uniformly.
pub struct SketchSuite<K: FlowKey> {
    sketches: Vec<(&'static str, Box<dyn Sketch<K>>)>,
}

impl<K: FlowKey> SketchSuite<K> {
    /// Build every sketch from the shared budget and per-sketch knobs.
    pub fn build(memory_bytes: usize, params: &SketchParams) -> Result<Self, ConfigError> {
        let sketches: Vec<(&'static str, Box<dyn Sketch<K>>)> = vec![
            (
                "CountMin",
                Box::new(CountMin::new(params.cm_rows, memory_bytes)?),
            ),
            (
                "CountSketch",
                Box::new(CountSketch::new(params.cs_rows, memory_bytes)?),
            ),
            (
                "ElasticSketch",
                Box::new(ElasticSketch::<K>::new(
                    params.es_heavy_memory,
                    params.es_lambda,
                    memory_bytes,
                    params.es_light_rows,
                )?),
            ),
            (
                "HashPipe",
                Box::new(HashPipe::<K>::new(memory_bytes, params.hp_stages)?),
            ),
            (
                "UnivMon",
                Box::new(UnivMon::<K>::new(
                    params.um_levels,
                    memory_bytes,
                    params.um_rows,
                )?),
            ),
            (
                "SketchLearn",
                Box::new(SketchLearn::new(
                    memory_bytes,
                    params.sl_rows,
                    params.sl_theta,
                )?),
            ),
            (
                "FlowRadar",
                Box::new(FlowRadar::<K>::new(
                    memory_bytes,
                    params.fr_bf_percentage,
                    params.fr_bf_hashes,
                    params.fr_ct_hashes,
                )?),
            ),
        ];
        Ok(Self { sketches })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sketches.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    pub fn clear_all(&mut self) {
        for (_, sketch) in &mut self.sketches {
            sketch.clear();
        }
    }

    pub fn update_all(&mut self, key: &K, delta: u32) {
        for (_, sketch) in &mut self.sketches {
            sketch.update(key, delta);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn Sketch<K>)> {
        self.sketches
            .iter()
            .map(|(name, sketch)| (*name, sketch.as_ref()))
    }
}

/// Replay one epoch into the reference and every sketch.
pub fn run_epoch<K: FlowKey>(
    suite: &mut SketchSuite<K>,
    ideal: &mut Ideal<K>,
    packets: &[PacketRecord<K>],
) {
    Sketch::clear(ideal);
    suite.clear_all();
    for packet in packets {
        ideal.update(&packet.flow, 1);
        suite.update_all(&packet.flow, 1);
    }
}

/// Per-sketch results of a whole run.
pub struct EvalReport {
    pub sketch_names: Vec<&'static str>,
    /// `per_epoch[sketch][epoch]`.
    pub per_epoch: Vec<Vec<ResultMetrics>>,
    pub averages: Vec<MetricsSummary>,
    pub num_epochs: usize,
}

/// Drive the full evaluation: every epoch through every sketch, metrics per
/// epoch, then averages across epochs.
pub fn run_evaluation<K: FlowKey>(
    epochs: &[Vec<PacketRecord<K>>],
    config: &EvalConfig,
) -> Result<EvalReport, ConfigError> {
    let mut suite = SketchSuite::<K>::build(config.sketch_memory_bytes, &config.params)?;
    let mut ideal = Ideal::<K>::new();

    let sketch_names = suite.names();
    let mut per_epoch: Vec<Vec<ResultMetrics>> = vec![Vec::new(); sketch_names.len()];

    for (epoch_idx, packets) in epochs.iter().enumerate() {
        info!(
            epoch = epoch_idx + 1,
            total = epochs.len(),
            packets = packets.len(),
            "processing epoch"
        );
        run_epoch(&mut suite, &mut ideal, packets);

        let threshold = hh_threshold(ideal.total_packets(), config.hh_threshold_percentage);
        for (sketch_idx, (_, sketch)) in suite.iter().enumerate() {
            per_epoch[sketch_idx].push(ResultMetrics::evaluate(&ideal, sketch, threshold));
        }
    }

    let averages = per_epoch.iter().map(|m| summarize(m)).collect();
    Ok(EvalReport {
        sketch_names,
        per_epoch,
        averages,
        num_epochs: epochs.len(),
    })
}
