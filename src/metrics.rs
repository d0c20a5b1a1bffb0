//! Accuracy metrics: sketch estimates against the exact reference
//!
//! For each (reference, sketch, threshold) triple this layer walks every
//! flow the reference saw, compares the sketch's estimate, and produces
//! frequency-error aggregates plus a heavy-hitter confusion matrix.

use crate::flow::FlowKey;
use crate::ideal::Ideal;
use crate::traits::Sketch;

/// Frequency-estimation error aggregates over one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ErrorMetric {
    /// Average absolute error: mean over flows of |true - estimate|.
    pub aae: f64,
    /// Average relative error: mean over flows of |true - estimate| / true.
    pub are: f64,
    /// Weighted mean relative error: relative errors weighted by true
    /// count, divided by the packet total.
    pub wmre: f64,
}

/// Heavy-hitter classification outcome at a fixed threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeavyHitterMetric {
    pub true_positives: u32,
    pub true_negatives: u32,
    pub false_positives: u32,
    pub false_negatives: u32,
    pub threshold: u64,
}

impl HeavyHitterMetric {
    pub fn precision(&self) -> f64 {
        let predicted = f64::from(self.true_positives + self.false_positives);
        if predicted > 0.0 {
            f64::from(self.true_positives) / predicted
        } else {
            0.0
        }
    }

    pub fn recall(&self) -> f64 {
        let actual = f64::from(self.true_positives + self.false_negatives);
        if actual > 0.0 {
            f64::from(self.true_positives) / actual
        } else {
            0.0
        }
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    pub fn accuracy(&self) -> f64 {
        let total = f64::from(
            self.true_positives + self.true_negatives + self.false_positives
                + self.false_negatives,
        );
        if total > 0.0 {
            f64::from(self.true_positives + self.true_negatives) / total
        } else {
            0.0
        }
    }

    pub fn tpr(&self) -> f64 {
        self.recall()
    }

    pub fn fpr(&self) -> f64 {
        let actual_negative = f64::from(self.true_negatives + self.false_positives);
        if actual_negative > 0.0 {
            f64::from(self.false_positives) / actual_negative
        } else {
            0.0
        }
    }
}

/// One epoch's evaluation of one sketch against the reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMetrics {
    error: ErrorMetric,
    heavy_hitter: HeavyHitterMetric,
}

impl ResultMetrics {
    /// Query the sketch for every flow the reference saw and aggregate.
    ///
    /// A flow is heavy when its count meets the threshold; the predicate is
    /// applied to the true and the estimated count independently.
    pub fn evaluate<K: FlowKey, S: Sketch<K> + ?Sized>(
        ideal: &Ideal<K>,
        sketch: &S,
        threshold: u64,
    ) -> Self {
        let mut heavy_hitter = HeavyHitterMetric {
            threshold,
            ..Default::default()
        };
        let mut error = ErrorMetric::default();

        if ideal.is_empty() {
            return Self {
                error,
                heavy_hitter,
            };
        }

        let mut sum_absolute = 0.0;
        let mut sum_relative = 0.0;
        let mut sum_weighted_relative = 0.0;
        let mut total_flows = 0u64;
        let mut total_packets = 0u64;

        for (flow, &true_count) in ideal.iter() {
            let estimated = sketch.query(flow);

            let absolute = (true_count as f64 - estimated as f64).abs();
            sum_absolute += absolute;
            if true_count > 0 {
                let relative = absolute / true_count as f64;
                sum_relative += relative;
                sum_weighted_relative += relative * true_count as f64;
            }

            total_flows += 1;
            total_packets += true_count;

            let heavy_true = true_count >= threshold;
            let heavy_estimated = estimated >= threshold;
            match (heavy_true, heavy_estimated) {
                (true, true) => heavy_hitter.true_positives += 1,
                (false, false) => heavy_hitter.true_negatives += 1,
                (false, true) => heavy_hitter.false_positives += 1,
                (true, false) => heavy_hitter.false_negatives += 1,
            }
        }

        if total_flows > 0 {
            error.aae = sum_absolute / total_flows as f64;
            error.are = sum_relative / total_flows as f64;
        }
        if total_packets > 0 {
            error.wmre = sum_weighted_relative / total_packets as f64;
        }

        Self {
            error,
            heavy_hitter,
        }
    }

    pub fn error_metric(&self) -> &ErrorMetric {
        &self.error
    }

    pub fn heavy_hitter_metric(&self) -> &HeavyHitterMetric {
        &self.heavy_hitter
    }
}

/// Metrics averaged over the epochs of a run.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricsSummary {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
    pub are: f64,
    pub aae: f64,
    pub wmre: f64,
}

/// Average per-epoch metrics; F1 is recomputed from the averaged precision
/// and recall.
pub fn summarize(epochs: &[ResultMetrics]) -> MetricsSummary {
    if epochs.is_empty() {
        return MetricsSummary::default();
    }

    let n = epochs.len() as f64;
    let mut summary = MetricsSummary::default();
    for m in epochs {
        summary.precision += m.heavy_hitter.precision();
        summary.recall += m.heavy_hitter.recall();
        summary.accuracy += m.heavy_hitter.accuracy();
        summary.are += m.error.are;
        summary.aae += m.error.aae;
        summary.wmre += m.error.wmre;
    }
    summary.precision /= n;
    summary.recall /= n;
    summary.accuracy /= n;
    summary.are /= n;
    summary.aae /= n;
    summary.wmre /= n;
    summary.f1_score =
        2.0 * summary.precision * summary.recall / (summary.precision + summary.recall + 1e-10);
    summary
}
