//! Online auto-tuner for chunked-compression parameters.
//!
//! The tuner observes per-chunk compression results and steers the codec,
//! filter, split mode, compression level, block size, shuffle unit and
//! thread counts of subsequent chunks toward a configured objective
//! (compression speed, decompression speed or balanced throughput, weighted
//! by a target bandwidth).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Proposer    │────▶│  Host        │────▶│  Scoring +   │
//! │  (per phase) │     │  compressor  │     │  improvement │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!        ▲                                         │
//!        └──────────── state machine ◀─────────────┘
//! ```
//!
//! # Key components
//!
//! - [`config::BtuneConfig`]: objective modes and readapt behaviour
//! - [`cparams::Cparams`]: one trial parameter set with its measurements
//! - [`tuner::Tuner`]: the facade driven once per chunk
//! - [`tuner::CparamsInference`]: optional first-chunk codec/filter bootstrap

pub mod blocksize;
pub mod config;
pub mod context;
pub mod cparams;
pub mod logger;
pub mod score;
pub mod state;
pub mod tuner;

pub use config::{Behaviour, BtuneConfig, CompMode, PerfMode, RepeatMode, Tuning};
pub use context::{CompressionContext, DecompressionContext, MAX_FILTERS, MAX_OVERHEAD};
pub use cparams::{Codec, Cparams, Filter, SplitMode};
pub use state::{Readapt, State};
pub use tuner::{CparamsInference, Tuner};
