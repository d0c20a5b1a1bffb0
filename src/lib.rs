//! # Sketchbench
//!
//! Offline accuracy evaluation for network-flow measurement sketches.
//!
//! Sketchbench replays a packet capture through an exact per-flow counter
//! and a family of bounded-memory sketches, epoch by epoch, and reports how
//! far each sketch's estimates stray from the truth.
//!
//! ## What it measures
//!
//! - **Frequency error**: average absolute, average relative, and weighted
//!   mean relative error over every flow in an epoch
//! - **Heavy-hitter quality**: confusion matrix, precision/recall/F1 at a
//!   per-epoch packet-share threshold
//!
//! ## The sketches
//!
//! Count-Min, Count sketch, Elastic sketch, HashPipe, UnivMon, SketchLearn
//! and FlowRadar, all behind one [`traits::Sketch`] contract:
//! `update`, `query`, `clear`, `memory_footprint`.
//!
//! ## Quick start
//!
//! ```rust
//! use sketchbench::flow::TwoTuple;
//! use sketchbench::sketch::CountMin;
//! use sketchbench::traits::Sketch;
//!
//! let mut cm = CountMin::new(4, 64 * 1024).unwrap();
//! let flow = TwoTuple::new(0x0a000001, 0x0a000002);
//!
//! for _ in 0..1_000 {
//!     cm.update(&flow, 1);
//! }
//! assert!(cm.query(&flow) >= 1_000);
//! ```
//!
//! The binary drives the whole pipeline: parse a pcap, group packets into
//! fixed-duration epochs, replay each epoch into every sketch, and print
//! per-sketch accuracy tables.

pub mod bloom;
pub mod capture;
pub mod flow;
pub mod harness;
pub mod hash;
pub mod ideal;
pub mod matrix;
pub mod metrics;
pub mod sketch;
pub mod traits;

pub mod prelude {
    pub use crate::flow::{FiveTuple, FlowKey, FlowKeyKind, OneTuple, TwoTuple};
    pub use crate::harness::{EvalConfig, SketchParams, SketchSuite};
    pub use crate::ideal::Ideal;
    pub use crate::sketch::{
        CountMin, CountSketch, ElasticSketch, FlowRadar, HashPipe, SketchLearn, UnivMon,
    };
    pub use crate::traits::{DecodableSketch, HeavyHitterSketch, Sketch};
}
