//! Trial compression parameters and their bounds.

use serde::{Deserialize, Serialize};

pub const MAX_CLEVEL: i32 = 9;
pub const MIN_BLOCK: usize = 16 * 1024;
pub const MAX_BLOCK: usize = 2 * 1024 * 1024;
pub const MIN_BITSHUFFLE: u32 = 1;
pub const MIN_SHUFFLE: u32 = 2;
pub const MAX_SHUFFLE: u32 = 16;
pub const MIN_THREADS: usize = 1;
pub const SOFT_STEP_SIZE: i32 = 1;
pub const HARD_STEP_SIZE: i32 = 2;

/// Codecs the tuner can hand to the host, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    BloscLz,
    Lz4,
    Lz4hc,
    Zlib,
    Zstd,
}

impl Codec {
    pub fn code(&self) -> u8 {
        match self {
            Codec::BloscLz => 0,
            Codec::Lz4 => 1,
            Codec::Lz4hc => 2,
            Codec::Zlib => 4,
            Codec::Zstd => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Codec::BloscLz),
            1 => Some(Codec::Lz4),
            2 => Some(Codec::Lz4hc),
            4 => Some(Codec::Zlib),
            5 => Some(Codec::Zstd),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::BloscLz => "blosclz",
            Codec::Lz4 => "lz4",
            Codec::Lz4hc => "lz4hc",
            Codec::Zlib => "zlib",
            Codec::Zstd => "zstd",
        }
    }

    /// Whether this codec (with the active filter) targets high compression
    /// ratios. Lz4 counts only together with BitShuffle; BloscLz never does.
    pub fn is_high_ratio(&self, filter: Filter) -> bool {
        match self {
            Codec::BloscLz => false,
            Codec::Lz4 => filter == Filter::BitShuffle,
            Codec::Lz4hc | Codec::Zlib | Codec::Zstd => true,
        }
    }
}

/// Precompression filters, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    NoFilter,
    Shuffle,
    BitShuffle,
    ByteDelta,
}

impl Filter {
    pub fn code(&self) -> u8 {
        match self {
            Filter::NoFilter => 0,
            Filter::Shuffle => 1,
            Filter::BitShuffle => 2,
            Filter::ByteDelta => 35,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Filter::NoFilter),
            1 => Some(Filter::Shuffle),
            2 => Some(Filter::BitShuffle),
            35 => Some(Filter::ByteDelta),
            _ => None,
        }
    }

    /// Smallest shuffle unit this filter accepts.
    pub fn min_shuffle(&self) -> u32 {
        if *self == Filter::Shuffle {
            MIN_SHUFFLE
        } else {
            MIN_BITSHUFFLE
        }
    }
}

/// Whether blocks are split into streams before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    Always,
    Never,
}

/// One trial parameter set, together with the directions the monotonic
/// parameters are currently being explored in and the measurements of the
/// last trial that used it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cparams {
    pub codec: Codec,
    pub filter: Filter,
    pub splitmode: SplitMode,
    pub clevel: i32,
    /// Block size in bytes; 0 means "derive automatically".
    pub blocksize: usize,
    /// Shuffle unit in bytes; seeded from the host typesize.
    pub shufflesize: u32,
    pub nthreads_comp: usize,
    pub nthreads_decomp: usize,
    pub increasing_clevel: bool,
    pub increasing_block: bool,
    pub increasing_shuffle: bool,
    pub increasing_nthreads: bool,
    pub score: f64,
    pub cratio: f64,
    pub ctime: f64,
    pub dtime: f64,
}

impl Default for Cparams {
    fn default() -> Self {
        Self {
            codec: Codec::Lz4,
            filter: Filter::Shuffle,
            splitmode: SplitMode::Always,
            clevel: 9,
            blocksize: 0,
            shufflesize: 0,
            nthreads_comp: 0,
            nthreads_decomp: 0,
            increasing_clevel: false,
            increasing_block: true,
            increasing_shuffle: true,
            increasing_nthreads: false,
            score: 100.0,
            cratio: 1.0,
            ctime: 100.0,
            dtime: 100.0,
        }
    }
}

impl Cparams {
    /// Clamp the compression level to the caps of the given mode:
    /// Balanced with Zstd/Zlib never goes above 3, Hcr never above 6.
    pub fn clamp_clevel(&mut self, comp_mode: crate::config::CompMode) {
        use crate::config::CompMode;
        if comp_mode == CompMode::Balanced
            && (self.codec == Codec::Zstd || self.codec == Codec::Zlib)
            && self.clevel >= 3
        {
            self.clevel = 3;
        }
        if comp_mode == CompMode::Hcr && self.clevel >= 6 {
            self.clevel = 6;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompMode;

    #[test]
    fn test_codec_codes_roundtrip() {
        for codec in [Codec::BloscLz, Codec::Lz4, Codec::Lz4hc, Codec::Zlib, Codec::Zstd] {
            assert_eq!(Codec::from_code(codec.code()), Some(codec));
        }
        assert_eq!(Codec::from_code(3), None);
    }

    #[test]
    fn test_filter_codes_roundtrip() {
        for filter in [
            Filter::NoFilter,
            Filter::Shuffle,
            Filter::BitShuffle,
            Filter::ByteDelta,
        ] {
            assert_eq!(Filter::from_code(filter.code()), Some(filter));
        }
        assert_eq!(Filter::from_code(7), None);
    }

    #[test]
    fn test_high_ratio_codecs() {
        assert!(!Codec::BloscLz.is_high_ratio(Filter::BitShuffle));
        assert!(!Codec::Lz4.is_high_ratio(Filter::Shuffle));
        assert!(Codec::Lz4.is_high_ratio(Filter::BitShuffle));
        assert!(Codec::Zstd.is_high_ratio(Filter::NoFilter));
    }

    #[test]
    fn test_min_shuffle_per_filter() {
        assert_eq!(Filter::Shuffle.min_shuffle(), MIN_SHUFFLE);
        assert_eq!(Filter::BitShuffle.min_shuffle(), MIN_BITSHUFFLE);
    }

    #[test]
    fn test_clevel_caps() {
        let mut cp = Cparams {
            codec: Codec::Zstd,
            clevel: 9,
            ..Cparams::default()
        };
        cp.clamp_clevel(CompMode::Balanced);
        assert_eq!(cp.clevel, 3);

        let mut cp = Cparams {
            codec: Codec::Zstd,
            clevel: 8,
            ..Cparams::default()
        };
        cp.clamp_clevel(CompMode::Hcr);
        assert_eq!(cp.clevel, 6);

        // Hsp leaves the level alone
        let mut cp = Cparams {
            clevel: 9,
            ..Cparams::default()
        };
        cp.clamp_clevel(CompMode::Hsp);
        assert_eq!(cp.clevel, 9);
    }
}
