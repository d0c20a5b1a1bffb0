//! Sketch evaluation CLI: parse a capture, replay it epoch by epoch, and
//! print per-sketch accuracy tables.

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sketchbench::capture::{group_into_epochs, read_packets};
use sketchbench::flow::{FiveTuple, FlowKey, FlowKeyKind, OneTuple, TwoTuple};
use sketchbench::harness::{run_evaluation, EvalConfig, EvalReport, SketchParams};

#[derive(Parser, Debug)]
#[command(name = "sketchbench")]
#[command(about = "Evaluate flow-measurement sketches against a packet capture", version)]
struct Args {
    /// Path to the legacy pcap file to evaluate
    #[arg(short, long)]
    pcap: PathBuf,

    /// Flow key definition
    #[arg(long, value_enum, default_value_t = FlowKeyKind::TwoTuple)]
    flow_key: FlowKeyKind,

    /// Memory budget per sketch, in kilobytes
    #[arg(long, default_value_t = 600)]
    memory_kb: usize,

    /// Epoch duration in milliseconds (0 = one epoch over the whole capture)
    #[arg(long, default_value_t = 100)]
    epoch_ms: u32,

    /// Heavy-hitter threshold as a percentage of epoch packets (0.01 = 0.01%)
    #[arg(long, default_value_t = 0.01)]
    hh_percentage: f64,

    /// Count-Min rows
    #[arg(long, default_value_t = 4)]
    cm_rows: usize,

    /// Count sketch rows
    #[arg(long, default_value_t = 4)]
    cs_rows: usize,

    /// Elastic sketch bucket arity (lambda)
    #[arg(long, default_value_t = 4)]
    es_lambda: usize,

    /// HashPipe stages
    #[arg(long, default_value_t = 8)]
    hp_stages: usize,

    /// UnivMon levels
    #[arg(long, default_value_t = 4)]
    um_levels: usize,

    /// FlowRadar share of memory spent on the Bloom filter
    #[arg(long, default_value_t = 0.3)]
    fr_bf_percentage: f64,
}

impl Args {
    fn config(&self) -> EvalConfig {
        let memory = self.memory_kb * 1024;
        let mut params = SketchParams::default_for(memory);
        params.cm_rows = self.cm_rows;
        params.cs_rows = self.cs_rows;
        params.es_lambda = self.es_lambda;
        params.hp_stages = self.hp_stages;
        params.um_levels = self.um_levels;
        params.fr_bf_percentage = self.fr_bf_percentage;

        EvalConfig {
            flow_key_kind: self.flow_key,
            sketch_memory_bytes: memory,
            epoch_duration_ms: self.epoch_ms,
            hh_threshold_percentage: self.hh_percentage,
            params,
        }
    }
}

const RULE: &str = "============================================================";

fn print_banner(args: &Args, config: &EvalConfig) {
    println!("{}", RULE);
    println!("          Sketch Performance Evaluation Tool");
    println!("{}", RULE);
    println!("Capture: {}", args.pcap.display());
    println!("Flow key: {}", config.flow_key_kind);
    println!("Sketch memory: {} KB", config.sketch_memory_bytes / 1024);
    println!("Epoch duration: {} ms", config.epoch_duration_ms);
    println!(
        "Heavy-hitter threshold: {}% of packets per epoch",
        config.hh_threshold_percentage
    );
    let p = &config.params;
    println!("Sketch parameters:");
    println!("  CountMin: rows = {}", p.cm_rows);
    println!("  CountSketch: rows = {}", p.cs_rows);
    println!(
        "  ElasticSketch: heavy = {} KB, lambda = {}, light rows = {}",
        p.es_heavy_memory / 1024,
        p.es_lambda,
        p.es_light_rows
    );
    println!("  HashPipe: stages = {}", p.hp_stages);
    println!("  UnivMon: levels = {}, rows = {}", p.um_levels, p.um_rows);
    println!(
        "  SketchLearn: rows = {}, theta = {}",
        p.sl_rows, p.sl_theta
    );
    println!(
        "  FlowRadar: bf share = {}, bf hashes = {}, table hashes = {}",
        p.fr_bf_percentage, p.fr_bf_hashes, p.fr_ct_hashes
    );
    println!("{}", RULE);
}

fn print_summary(report: &EvalReport) {
    println!();
    println!("{}", RULE);
    println!(
        "       Average Metrics Across {} Epoch{}",
        report.num_epochs,
        if report.num_epochs == 1 { "" } else { "s" }
    );
    println!("{}", RULE);
    println!(
        "{:<20}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
        "Sketch", "Precision", "Recall", "F1-Score", "Accuracy", "ARE(%)", "AAE", "WMRE(%)"
    );
    println!("------------------------------------------------------------");
    for (name, avg) in report.sketch_names.iter().zip(report.averages.iter()) {
        println!(
            "{:<20}{:>12.4}{:>12.4}{:>12.4}{:>12.4}{:>12.4}{:>12.4}{:>12.4}",
            name,
            avg.precision * 100.0,
            avg.recall * 100.0,
            avg.f1_score,
            avg.accuracy * 100.0,
            avg.are * 100.0,
            avg.aae,
            avg.wmre * 100.0
        );
    }
    println!("{}", RULE);
}

fn run<K: FlowKey>(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = args.config();
    print_banner(args, &config);

    println!("\n[1/3] Parsing capture...");
    let packets = read_packets::<K>(&args.pcap)?;
    let epochs = group_into_epochs(packets, config.epoch_duration_ns());
    println!("Found {} epochs", epochs.len());
    if epochs.is_empty() {
        return Err("no usable packets in capture".into());
    }

    println!("\n[2/3] Running sketches...");
    let report = run_evaluation(&epochs, &config)?;

    println!("\n[3/3] Results");
    print_summary(&report);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let result = match args.flow_key {
        FlowKeyKind::OneTuple => run::<OneTuple>(&args),
        FlowKeyKind::TwoTuple => run::<TwoTuple>(&args),
        FlowKeyKind::FiveTuple => run::<FiveTuple>(&args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
