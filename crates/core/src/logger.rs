//! One-line-per-trial logging, enabled by the `BTUNE_LOG` environment
//! variable.

use crate::config::{bandwidth_to_str, BtuneConfig};
use crate::cparams::{Cparams, SplitMode};

/// Writes the trial table to stdout when enabled.
#[derive(Debug, Clone, Copy)]
pub struct TrialLog {
    enabled: bool,
}

impl TrialLog {
    /// Read `BTUNE_LOG` once; its presence enables the table.
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var_os("BTUNE_LOG").is_some(),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Startup banner with version, modes and behaviour.
    pub fn banner(&self, config: &BtuneConfig) {
        if !self.enabled {
            return;
        }
        println!("{}", "-=".repeat(40));
        println!(
            "BTune version: {}.\n\
             Performance Mode: {}, Compression Mode: {}, Bandwidth: {}.\n\
             Behaviour: Waits - {}, Softs - {}, Hards - {}, Repeat Mode - {}.",
            env!("CARGO_PKG_VERSION"),
            config.perf_mode.as_str(),
            config.comp_mode.as_str(),
            bandwidth_to_str(config.bandwidth),
            config.behaviour.nwaits_before_readapt,
            config.behaviour.nsofts_before_hard,
            config.behaviour.nhards_before_stop,
            config.behaviour.repeat_mode.as_str(),
        );
    }

    pub fn header(&self) {
        if !self.enabled {
            return;
        }
        println!(
            "|    Codec   | Filter | Split | C.Level | Blocksize | Shufflesize | \
             C.Threads | D.Threads |   Score   |  C.Ratio   |   BTune State   | Readapt | Winner"
        );
    }

    /// One table row per decided trial. `winner` is `W` for an accepted
    /// trial, `S` for a degenerate (special-values) chunk and `-` otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn trial(
        &self,
        cparams: &Cparams,
        score: f64,
        cratio: f64,
        state_name: &str,
        readapt_name: &str,
        winner: char,
    ) {
        if !self.enabled {
            return;
        }
        let split = if cparams.splitmode == SplitMode::Always { 1 } else { 0 };
        println!(
            "| {:>10} | {:>6} | {:>5} | {:>7} | {:>9} | {:>11} | {:>9} | {:>9} | {:>9.3} | {:>9.3}x | {:>15} | {:>7} | {}",
            cparams.codec.name(),
            cparams.filter.code(),
            split,
            cparams.clevel,
            cparams.blocksize / 1024,
            cparams.shufflesize,
            cparams.nthreads_comp,
            cparams.nthreads_decomp,
            score,
            cratio,
            state_name,
            readapt_name,
            winner,
        );
    }
}
