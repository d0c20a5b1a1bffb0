//! The sketch family under evaluation
//!
//! Seven bounded-memory frequency structures behind one contract:
//!
//! - [`CountMin`]: unsigned counter matrix, min estimator
//! - [`CountSketch`]: signed counter matrix, median estimator
//! - [`HashPipe`]: multi-stage flow table with evict-smaller carries
//! - [`ElasticSketch`]: voting buckets in front of a Count-Min light part
//! - [`UnivMon`]: cascade of sub-sampled Count sketches
//! - [`SketchLearn`]: per-bit counter arrays over a key hash
//! - [`FlowRadar`]: Bloom filter plus invertible counting table

mod count_min;
mod count_sketch;
mod elastic;
mod flow_radar;
mod hash_pipe;
mod sketch_learn;
mod univmon;

pub use count_min::CountMin;
pub use count_sketch::CountSketch;
pub use elastic::{ElasticSketch, HeavyEntryView};
pub use flow_radar::FlowRadar;
pub use hash_pipe::HashPipe;
pub use sketch_learn::{SketchLearn, HASH_BITS};
pub use univmon::{UnivMon, DEFAULT_TOP_FLOWS};
