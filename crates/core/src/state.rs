//! Exploration phases and readapt kinds.

use serde::{Deserialize, Serialize};

/// The phase the tuner is currently exploring. Transitions form a DAG with a
/// single back-edge: `Waiting` re-enters `CodecFilter` or `Clevel` when the
/// readapt scheduler starts a new sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    CodecFilter,
    ShuffleSize,
    Threads,
    Clevel,
    Blocksize,
    Memcpy,
    Waiting,
    Stop,
}

impl State {
    /// Display name, matching the trial log. The threads phase is named
    /// after the side it is currently varying.
    pub fn name(&self, threads_for_comp: bool) -> &'static str {
        match self {
            State::CodecFilter => "CODEC_FILTER",
            State::ShuffleSize => "SHUFFLE_SIZE",
            State::Threads => {
                if threads_for_comp {
                    "THREADS_COMP"
                } else {
                    "THREADS_DECOMP"
                }
            }
            State::Clevel => "CLEVEL",
            State::Blocksize => "BLOCKSIZE",
            State::Memcpy => "MEMCPY",
            State::Waiting => "WAITING",
            State::Stop => "STOP",
        }
    }
}

/// Which kind of readapt the current sweep came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readapt {
    Wait,
    Soft,
    Hard,
}

impl Readapt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readapt::Wait => "WAIT",
            Readapt::Soft => "SOFT",
            Readapt::Hard => "HARD",
        }
    }
}
