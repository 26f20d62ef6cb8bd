//! Tuner configuration: objective modes, readapt behaviour and bandwidth.

use serde::{Deserialize, Serialize};

/// A 1 MB/s bandwidth expressed in kB/s.
pub const MBPS: u32 = 1024;
/// A 10 MB/s bandwidth expressed in kB/s.
pub const MBPS10: u32 = 10 * MBPS;
/// A 100 MB/s bandwidth expressed in kB/s.
pub const MBPS100: u32 = 100 * MBPS;
/// A 1 GB/s bandwidth expressed in kB/s.
pub const GBPS: u32 = MBPS * MBPS;
/// A 10 GB/s bandwidth expressed in kB/s.
pub const GBPS10: u32 = 10 * GBPS;
/// A 100 GB/s bandwidth expressed in kB/s.
pub const GBPS100: u32 = 100 * GBPS;
/// A 1 TB/s bandwidth expressed in kB/s.
pub const TBPS: u32 = MBPS * MBPS * MBPS;

/// Which time terms enter the scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerfMode {
    /// Optimize the compression and transmission times.
    Comp,
    /// Optimize the decompression and transmission times.
    Decomp,
    /// Optimize compression, transmission and decompression times.
    Balanced,
}

impl PerfMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfMode::Comp => "COMP",
            PerfMode::Decomp => "DECOMP",
            PerfMode::Balanced => "BALANCED",
        }
    }
}

/// Which improvement criterion (and codec candidate set) is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompMode {
    /// High speed: optimize the speed, even accepting memcpy.
    Hsp,
    /// Optimize both speed and compression ratio.
    Balanced,
    /// High compression ratio.
    Hcr,
}

impl CompMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompMode::Hsp => "HSP",
            CompMode::Balanced => "BALANCED",
            CompMode::Hcr => "HCR",
        }
    }
}

/// What happens once the initial readapt schedule has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop improving permanently.
    Stop,
    /// Keep repeating only the soft readapts.
    RepeatSoft,
    /// Keep repeating the whole initial schedule.
    RepeatAll,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Stop => "STOP",
            RepeatMode::RepeatSoft => "REPEAT_SOFT",
            RepeatMode::RepeatAll => "REPEAT_ALL",
        }
    }
}

/// Readapt scheduling: how many waits, softs and hards make up the
/// initial schedule, and whether it repeats afterwards.
///
/// A readapt is the process by which the tuner adjusts parameters. A *soft*
/// readapt only touches the compression level (and optionally blocksize);
/// a *hard* readapt also revisits codec, filter, shuffle size and threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behaviour {
    /// Number of waiting chunks before each readapt.
    pub nwaits_before_readapt: u32,
    /// Number of soft readapts between hard readapts.
    pub nsofts_before_hard: u32,
    /// Number of initial hard readapts.
    pub nhards_before_stop: u32,
    pub repeat_mode: RepeatMode,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            nwaits_before_readapt: 0,
            nsofts_before_hard: 5,
            nhards_before_stop: 1,
            repeat_mode: RepeatMode::Stop,
        }
    }
}

/// Which exploration phases beyond codec/filter and clevel are active.
///
/// These default to off, which matches the original tuner builds; enabling
/// them adds the corresponding phases to each sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuning {
    pub shufflesize: bool,
    pub threads: bool,
    pub blocksize: bool,
    pub memcpy: bool,
}

/// Complete tuner configuration. Immutable once the tuner is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BtuneConfig {
    /// Target bandwidth in kB/s, used to weight byte volume against time.
    pub bandwidth: u32,
    pub perf_mode: PerfMode,
    pub comp_mode: CompMode,
    pub behaviour: Behaviour,
    /// Seed the initial best from the host-provided parameters instead of
    /// starting with an uncounted hard readapt.
    pub cparams_hint: bool,
    pub tuning: Tuning,
}

impl Default for BtuneConfig {
    fn default() -> Self {
        Self {
            bandwidth: 2 * GBPS10,
            perf_mode: PerfMode::Balanced,
            comp_mode: CompMode::Balanced,
            behaviour: Behaviour::default(),
            cparams_hint: false,
            tuning: Tuning::default(),
        }
    }
}

impl BtuneConfig {
    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.bandwidth == 0 {
            return Err("bandwidth must be > 0 kB/s".into());
        }
        Ok(())
    }
}

/// Render a bandwidth in kB/s with a human unit, for the startup banner.
pub fn bandwidth_to_str(bandwidth: u32) -> String {
    if bandwidth < MBPS {
        format!("{} KB/s", bandwidth)
    } else if bandwidth < GBPS {
        format!("{} MB/s", bandwidth / 1024)
    } else if bandwidth < TBPS {
        format!("{} GB/s", bandwidth / 1024 / 1024)
    } else {
        format!("{} TB/s", bandwidth / 1024 / 1024 / 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = BtuneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bandwidth, 2 * GBPS10);
        assert_eq!(config.behaviour.nsofts_before_hard, 5);
        assert_eq!(config.behaviour.nhards_before_stop, 1);
        assert!(!config.cparams_hint);
    }

    #[test]
    fn test_zero_bandwidth_rejected() {
        let mut config = BtuneConfig::default();
        config.bandwidth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = BtuneConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BtuneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_bandwidth_to_str() {
        assert_eq!(bandwidth_to_str(512), "512 KB/s");
        assert_eq!(bandwidth_to_str(MBPS10), "10 MB/s");
        assert_eq!(bandwidth_to_str(2 * GBPS10), "20 GB/s");
        assert_eq!(bandwidth_to_str(TBPS), "1 TB/s");
    }
}
