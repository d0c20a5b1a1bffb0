//! Correctness and invariant tests for sketchbench
//!
//! These tests verify the invariants every sketch must hold (clear
//! semantics, one-sided error bounds, count conservation, decode
//! exactness, memory budgets) plus the end-to-end epoch and threshold
//! behaviour. They complement the unit tests in each module.

use sketchbench::capture::{group_into_epochs, PacketRecord};
use sketchbench::flow::{FiveTuple, FlowKey, OneTuple, TwoTuple};
use sketchbench::harness::{hh_threshold, run_epoch, SketchParams, SketchSuite};
use sketchbench::ideal::Ideal;
use sketchbench::sketch::{
    CountMin, CountSketch, ElasticSketch, FlowRadar, HashPipe, SketchLearn, UnivMon, HASH_BITS,
};
use sketchbench::traits::{DecodableSketch, HeavyHitterSketch, Sketch};

fn key(i: u32) -> FiveTuple {
    FiveTuple::new(0x0a000000 + i, 0xc0a80000 + i, 1024 + (i % 1000) as u16, 443, 6)
}

/// Deterministic Zipf-like workload: flow of rank r gets `scale / r` packets.
fn zipf_counts(flows: usize, scale: u64) -> Vec<(FiveTuple, u64)> {
    (1..=flows as u64)
        .map(|r| (key(r as u32), (scale / r).max(1)))
        .collect()
}

// ============================================================================
// Shared contract
// ============================================================================

mod contract {
    use super::*;

    const MEMORY: usize = 600 * 1024;

    #[test]
    fn query_is_zero_after_clear_for_every_sketch() {
        let mut suite =
            SketchSuite::<FiveTuple>::build(MEMORY, &SketchParams::default_for(MEMORY)).unwrap();

        for i in 0..1_000 {
            suite.update_all(&key(i % 50), 1);
        }
        suite.clear_all();

        for i in 0..50 {
            for (name, sketch) in suite.iter() {
                assert_eq!(
                    sketch.query(&key(i)),
                    0,
                    "{} returned nonzero for flow {} after clear",
                    name,
                    i
                );
            }
        }
    }

    #[test]
    fn memory_footprint_within_configured_budget() {
        let mut params = SketchParams::default_for(MEMORY);
        params.fr_bf_percentage = 0.3;
        let suite = SketchSuite::<FiveTuple>::build(MEMORY, &params).unwrap();

        for (name, sketch) in suite.iter() {
            assert!(
                sketch.memory_footprint() <= MEMORY + 8,
                "{} footprint {} exceeds budget {}",
                name,
                sketch.memory_footprint(),
                MEMORY
            );
        }
    }

    #[test]
    fn unseen_key_queries_zero_everywhere() {
        let suite =
            SketchSuite::<FiveTuple>::build(MEMORY, &SketchParams::default_for(MEMORY)).unwrap();
        for (name, sketch) in suite.iter() {
            assert_eq!(sketch.query(&key(12345)), 0, "{} invented traffic", name);
        }
    }
}

// ============================================================================
// Count-Min
// ============================================================================

mod count_min {
    use super::*;

    /// A single flow a million deep, alone in 64 KB: the estimate is exact.
    #[test]
    fn single_flow_is_exact() {
        let mut cm = CountMin::new(4, 64 * 1024).unwrap();
        let k = key(1);

        for _ in 0..1_000 {
            Sketch::update(&mut cm, &k, 1_000);
        }
        assert_eq!(Sketch::query(&cm, &k), 1_000_000);
    }

    /// One cell forces any two keys to share a counter.
    #[test]
    fn forced_collision_reports_sum() {
        let mut cm = CountMin::new(1, 4).unwrap();
        let (k1, k2) = (key(1), key(2));

        for _ in 0..100 {
            Sketch::update(&mut cm, &k1, 1);
        }
        for _ in 0..50 {
            Sketch::update(&mut cm, &k2, 1);
        }

        assert_eq!(Sketch::query(&cm, &k1), 150);
        assert_eq!(Sketch::query(&cm, &k2), 150);
    }

    #[test]
    fn never_undercounts_on_zipf_workload() {
        let mut cm = CountMin::new(4, 32 * 1024).unwrap();
        let workload = zipf_counts(2_000, 5_000);

        for (k, count) in &workload {
            for _ in 0..*count {
                Sketch::update(&mut cm, k, 1);
            }
        }
        for (k, count) in &workload {
            assert!(
                Sketch::query(&cm, k) >= *count,
                "flow {:?} undercounted: {} < {}",
                k,
                Sketch::query(&cm, k),
                count
            );
        }
    }

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        let mut cm = CountMin::new(1, 4).unwrap();
        let k = key(1);

        Sketch::update(&mut cm, &k, u32::MAX);
        Sketch::update(&mut cm, &k, u32::MAX);
        assert_eq!(Sketch::query(&cm, &k), u64::from(u32::MAX));
    }
}

// ============================================================================
// Count sketch
// ============================================================================

mod count_sketch {
    use super::*;

    /// Median estimates stay inside modest error bars on a skewed stream.
    #[test]
    fn median_error_within_bars_on_zipf() {
        let mut cs = CountSketch::new(4, 64 * 1024).unwrap();
        let workload = zipf_counts(1_000, 10_000);

        for (k, count) in &workload {
            // Bulk update is equivalent to `count` unit updates.
            Sketch::update(&mut cs, k, *count as u32);
        }

        // Heavy flows: relative error small.
        for (k, count) in workload.iter().take(10) {
            let est = Sketch::query(&cs, k);
            let err = (est as i64 - *count as i64).unsigned_abs();
            assert!(
                err <= count / 5 + 500,
                "heavy flow {:?}: |{} - {}| too large",
                k,
                est,
                count
            );
        }

        // All flows: estimates bounded by true count plus noise.
        for (k, count) in &workload {
            let est = Sketch::query(&cs, k);
            assert!(
                est <= count + 2_000,
                "flow {:?} wildly overcounted: {} vs {}",
                k,
                est,
                count
            );
        }
    }

    #[test]
    fn signed_counters_saturate() {
        let mut cs = CountSketch::new(1, 4).unwrap();
        let k = key(1);

        Sketch::update(&mut cs, &k, u32::MAX);
        Sketch::update(&mut cs, &k, u32::MAX);
        // Counter pinned at an i32 bound (which one depends on the key's
        // sign); the estimate stays clamped instead of wrapping.
        let est = Sketch::query(&cs, &k);
        assert!(
            est == i32::MAX as u64 || est == i32::MAX as u64 + 1,
            "estimate {} is not a clamped i32 bound",
            est
        );
    }
}

// ============================================================================
// HashPipe
// ============================================================================

mod hash_pipe {
    use super::*;

    /// Two stages of one slot each: pin down the whole eviction dance.
    #[test]
    fn eviction_scenario_single_slot_stages() {
        let slot_bytes = OneTuple::ENCODED_LEN + 4;
        let mut hp = HashPipe::<OneTuple>::new(2 * slot_bytes, 2).unwrap();
        assert_eq!(hp.width(), 1);

        let (k1, k2, k3) = (OneTuple::new(1), OneTuple::new(2), OneTuple::new(3));

        for _ in 0..10 {
            hp.update(&k1, 1);
        }
        hp.update(&k2, 1); // k2 takes stage 0; k1 (count 10) settles in stage 1
        hp.update(&k3, 1); // k3 takes stage 0; k2's carry loses to k1 and drops

        assert_eq!(hp.query(&k1), 10);
        assert_eq!(hp.query(&k2), 0);
        assert_eq!(hp.query(&k3), 1);
    }

    /// Without drops, resident counts conserve the update total exactly.
    #[test]
    fn counts_conserved_when_table_is_wide() {
        let mut hp = HashPipe::<FiveTuple>::new(256 * 1024, 4).unwrap();

        let mut total = 0u64;
        for i in 0..2_000 {
            hp.update(&key(i), 2);
            total += 2;
        }
        assert_eq!(hp.resident_total(), total);
    }

    /// Each live key occupies at most one slot per lookup path, so the query
    /// equals the single resident count.
    #[test]
    fn single_flow_lives_in_one_slot() {
        let mut hp = HashPipe::<FiveTuple>::new(64 * 1024, 4).unwrap();
        let k = key(7);

        for _ in 0..500 {
            hp.update(&k, 1);
        }

        let mut occurrences = 0;
        for stage in 0..hp.num_stages() {
            for col in 0..hp.width() {
                if let Some((resident, _)) = hp.slot_entry(stage, col) {
                    if resident == k {
                        occurrences += 1;
                    }
                }
            }
        }
        assert_eq!(occurrences, 1);
        assert_eq!(hp.query(&k), 500);
    }
}

// ============================================================================
// Elastic sketch
// ============================================================================

mod elastic {
    use super::*;

    #[test]
    fn cold_entries_answer_exactly() {
        let mut es = ElasticSketch::<FiveTuple>::new(128 * 1024, 4, 256 * 1024, 4).unwrap();

        // Few flows, no bucket pressure: everything stays cold and exact.
        for i in 0..100 {
            for _ in 0..=(i % 9) {
                Sketch::update(&mut es, &key(i), 1);
            }
        }
        for i in 0..100 {
            let entry = es.heavy_entry(&key(i)).expect("entry should be resident");
            assert!(!entry.hot, "flow {} unexpectedly contended", i);
            assert_eq!(Sketch::query(&es, &key(i)), u64::from(entry.vote_pos));
            assert_eq!(Sketch::query(&es, &key(i)), u64::from(i % 9) + 1);
        }
    }

    #[test]
    fn estimates_upper_bound_truth_under_contention() {
        // Tiny heavy part: constant ejections.
        let mut es = ElasticSketch::<FiveTuple>::new(512, 4, 64 * 1024, 4).unwrap();
        let workload = zipf_counts(500, 2_000);

        for _ in 0..10 {
            for (k, count) in &workload {
                Sketch::update(&mut es, k, (*count / 10).max(1) as u32);
            }
        }

        for (k, count) in &workload {
            let true_count = (*count / 10).max(1) * 10;
            assert!(
                Sketch::query(&es, k) >= true_count,
                "flow {:?} undercounted: {} < {}",
                k,
                Sketch::query(&es, k),
                true_count
            );
        }
    }

    #[test]
    fn heavy_hitters_found_in_heavy_part() {
        let mut es = ElasticSketch::<FiveTuple>::new(128 * 1024, 4, 256 * 1024, 4).unwrap();

        let hot = key(1);
        for _ in 0..10_000 {
            Sketch::update(&mut es, &hot, 1);
        }
        for i in 2..200 {
            Sketch::update(&mut es, &key(i), 1);
        }

        let hh = es.heavy_hitters(5_000);
        assert!(hh.iter().any(|(k, est)| *k == hot && *est >= 10_000));
    }
}

// ============================================================================
// UnivMon
// ============================================================================

mod univmon {
    use super::*;

    #[test]
    fn sampling_predicates_are_nested() {
        let um = UnivMon::<FiveTuple>::new(6, 512 * 1024, 4).unwrap();

        for i in 0..5_000 {
            let k = key(i);
            let mut deepest_sampled = true;
            for level in 0..um.num_levels() {
                let sampled = um.sampled_at(level, &k);
                assert!(
                    !(sampled && !deepest_sampled),
                    "flow {} sampled at level {} but not at a shallower one",
                    i,
                    level
                );
                deepest_sampled = sampled;
            }
        }
    }

    #[test]
    fn point_queries_use_the_full_level_zero_sketch() {
        let mut um = UnivMon::<FiveTuple>::new(4, 512 * 1024, 4).unwrap();
        let hot = key(1);

        for _ in 0..5_000 {
            Sketch::update(&mut um, &hot, 1);
        }
        for i in 2..100 {
            Sketch::update(&mut um, &key(i), 1);
        }

        let est = Sketch::query(&um, &hot);
        assert!(
            (4_500..=5_500).contains(&est),
            "hot flow estimate {} strayed from 5000",
            est
        );
    }
}

// ============================================================================
// SketchLearn
// ============================================================================

mod sketch_learn {
    use super::*;

    #[test]
    fn bit_counts_never_exceed_totals() {
        let mut sl = SketchLearn::new(128 * 1024, 2, 0.5).unwrap();
        let workload = zipf_counts(1_500, 3_000);

        for (k, count) in &workload {
            Sketch::update(&mut sl, k, *count as u32);
        }

        for row in 0..sl.rows() {
            for col in 0..sl.width() {
                let total = sl.total_count(row, col);
                for bit in 0..HASH_BITS {
                    assert!(
                        sl.bit_count(bit, row, col) <= total,
                        "R[{}][{}][{}] exceeds total",
                        bit,
                        row,
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn column_totals_partition_the_stream() {
        let mut sl = SketchLearn::new(64 * 1024, 1, 0.5).unwrap();

        let mut expected = vec![0u64; sl.width()];
        for i in 0..1_000 {
            let k = key(i);
            let delta = 1 + i % 4;
            Sketch::update(&mut sl, &k, delta);
            expected[sl.column(0, k.encode().as_slice())] += u64::from(delta);
        }

        for col in 0..sl.width() {
            assert_eq!(
                u64::from(sl.total_count(0, col)),
                expected[col],
                "column {} total drifted",
                col
            );
        }
    }
}

// ============================================================================
// FlowRadar
// ============================================================================

mod flow_radar {
    use super::*;

    /// Three sparse flows decode back exactly.
    #[test]
    fn sparse_peel_recovers_all_flows() {
        let mut fr = FlowRadar::<FiveTuple>::new(64 * 1024, 0.3, 3, 3).unwrap();

        let flows = [(key(1), 5u32), (key(2), 50), (key(3), 500)];
        for (k, count) in &flows {
            for _ in 0..*count {
                Sketch::update(&mut fr, k, 1);
            }
        }

        let decoded = fr.decode();
        assert!(decoded.complete, "peeling stalled on 3 sparse flows");

        let mut got = decoded.flows;
        got.sort();
        let mut want: Vec<(FiveTuple, u64)> =
            flows.iter().map(|&(k, c)| (k, u64::from(c))).collect();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn uncrowded_table_decodes_exact_counts() {
        let mut fr = FlowRadar::<FiveTuple>::new(512 * 1024, 0.3, 3, 3).unwrap();

        for i in 0..2_000 {
            Sketch::update(&mut fr, &key(i), 1 + i % 5);
        }

        let decoded = fr.decode();
        assert!(decoded.complete);
        assert_eq!(decoded.flows.len(), 2_000);
        for (k, count) in decoded.flows {
            let i = k.src_ip - 0x0a000000;
            assert_eq!(count, u64::from(1 + i % 5), "flow {} decoded wrong", i);
        }
    }

    #[test]
    fn point_queries_upper_bound_without_decode() {
        let mut fr = FlowRadar::<FiveTuple>::new(64 * 1024, 0.3, 3, 3).unwrap();

        for i in 0..3_000 {
            Sketch::update(&mut fr, &key(i), 1);
        }
        for i in 0..3_000 {
            assert!(Sketch::query(&fr, &key(i)) >= 1);
        }
    }
}

// ============================================================================
// Epochs and thresholds
// ============================================================================

mod epochs {
    use super::*;

    fn record(ts_ms: u64) -> PacketRecord<TwoTuple> {
        PacketRecord {
            flow: TwoTuple::new(1, 2),
            timestamp_ns: ts_ms * 1_000_000,
        }
    }

    /// Timestamps [0, 50ms, 99ms, 100ms, 250ms] at 100 ms per epoch split
    /// into {0, 50, 99}, {100}, {250}.
    #[test]
    fn boundary_timestamps_split_correctly() {
        let packets = vec![record(0), record(50), record(99), record(100), record(250)];
        let epochs = group_into_epochs(packets, 100 * 1_000_000);

        let sizes: Vec<usize> = epochs.iter().map(|e| e.len()).collect();
        assert_eq!(sizes, vec![3, 1, 1]);
        assert_eq!(epochs[0][2].timestamp_ns, 99_000_000);
        assert_eq!(epochs[1][0].timestamp_ns, 100_000_000);
        assert_eq!(epochs[2][0].timestamp_ns, 250_000_000);
    }

    #[test]
    fn replay_isolates_epochs() {
        const MEMORY: usize = 256 * 1024;
        let mut suite =
            SketchSuite::<TwoTuple>::build(MEMORY, &SketchParams::default_for(MEMORY)).unwrap();
        let mut ideal = Ideal::new();

        let heavy_epoch: Vec<_> = (0..1_000)
            .map(|i| PacketRecord {
                flow: TwoTuple::new(1, 2),
                timestamp_ns: i,
            })
            .collect();
        run_epoch(&mut suite, &mut ideal, &heavy_epoch);
        assert_eq!(Sketch::query(&ideal, &TwoTuple::new(1, 2)), 1_000);

        let quiet_epoch: Vec<_> = (0..5)
            .map(|i| PacketRecord {
                flow: TwoTuple::new(3, 4),
                timestamp_ns: i,
            })
            .collect();
        run_epoch(&mut suite, &mut ideal, &quiet_epoch);

        for (name, sketch) in suite.iter() {
            assert_eq!(
                sketch.query(&TwoTuple::new(1, 2)),
                0,
                "{} leaked the previous epoch",
                name
            );
        }
        assert_eq!(ideal.total_packets(), 5);
    }
}

mod thresholds {
    use super::*;

    /// 10_000 packets at 0.01 percent floors to exactly 1.
    #[test]
    fn percentage_math() {
        assert_eq!(hh_threshold(10_000, 0.01), 1);
        assert_eq!(hh_threshold(100_000, 0.01), 10);
        assert_eq!(hh_threshold(9_999, 0.01), 1);
        assert_eq!(hh_threshold(1, 0.01), 1);
        assert_eq!(hh_threshold(0, 0.01), 0);
        assert_eq!(hh_threshold(10_000, 1.0), 100);
    }
}
