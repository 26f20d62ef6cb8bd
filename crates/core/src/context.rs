//! The host compression/decompression context contract.
//!
//! The tuner never compresses anything itself; it writes its parameter
//! choices into these structs and reads the per-chunk results back out of
//! them. The fields mirror what a chunked-compression host exposes.

use crate::cparams::{Codec, Filter, SplitMode};

/// Number of slots in the host filter pipeline.
pub const MAX_FILTERS: usize = 6;

/// Fixed per-chunk header overhead of the host container format.
pub const MAX_OVERHEAD: usize = 32;

/// Compression-side host context.
#[derive(Debug, Clone)]
pub struct CompressionContext {
    pub codec: Codec,
    /// Filter pipeline; the primary filter lives in the last slot.
    pub filters: [Filter; MAX_FILTERS],
    pub filters_meta: [u8; MAX_FILTERS],
    pub splitmode: SplitMode,
    pub clevel: i32,
    /// Block size in bytes; 0 asks the host for an automatic choice.
    pub blocksize: usize,
    /// Element size in bytes. The tuner writes the chosen shuffle unit here.
    pub typesize: usize,
    /// Size of the chunk about to be (or just) compressed.
    pub sourcesize: usize,
    /// Compressed size of the last chunk, filled by the host.
    pub destsize: usize,
    /// Current worker count of the compression pool.
    pub nthreads: usize,
    /// Worker count the host should apply before the next chunk.
    pub new_nthreads: usize,
}

impl CompressionContext {
    pub fn new(typesize: usize, nthreads: usize) -> Self {
        Self {
            codec: Codec::Lz4,
            filters: [Filter::NoFilter; MAX_FILTERS],
            filters_meta: [0; MAX_FILTERS],
            splitmode: SplitMode::Always,
            clevel: 9,
            blocksize: 0,
            typesize,
            sourcesize: 0,
            destsize: 0,
            nthreads,
            new_nthreads: nthreads,
        }
    }

    /// The primary (last-slot) filter.
    pub fn filter(&self) -> Filter {
        self.filters[MAX_FILTERS - 1]
    }
}

/// Decompression-side host context. Only thread counts are tuned.
#[derive(Debug, Clone)]
pub struct DecompressionContext {
    pub nthreads: usize,
    pub new_nthreads: usize,
}

impl DecompressionContext {
    pub fn new(nthreads: usize) -> Self {
        Self {
            nthreads,
            new_nthreads: nthreads,
        }
    }
}
