//! Compression-free compressibility estimator.
//!
//! The probe scans a block with a small rolling-hash match finder and counts
//! the bytes an LZ-style literal/match encoding *would* emit, without
//! producing any compressed output. The resulting ratio and scan throughput
//! feed the first-chunk codec classifier and the demo driver's simulated
//! host.

use serde::{Deserialize, Serialize};
use std::time::Instant;

const HASH_LOG2: u32 = 12;
const HASH_LEN: usize = 1 << HASH_LOG2;
const MAX_COPY: u32 = 32;
const MAX_DISTANCE: usize = 8191;
const MAX_FARDISTANCE: usize = 65535 + MAX_DISTANCE - 1;

// Decent defaults; (4, 4), (3, 4) and (4, 3) also work
const MIN_LEN: usize = 3;
const IP_SHIFT: usize = 3;

/// Per-block instrumentation produced by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockInstr {
    /// Estimated compression ratio (uncompressed / estimated compressed).
    pub cratio: f32,
    /// Scan throughput in bytes per second.
    pub cspeed: f32,
    /// The block is a constant run of one byte value.
    pub special: bool,
}

fn hash(seq: u32) -> usize {
    (seq.wrapping_mul(2_654_435_761) >> (32 - HASH_LOG2)) as usize
}

fn read_u32(input: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([input[at], input[at + 1], input[at + 2], input[at + 3]])
}

// Extend a run of the byte preceding `ip`; returns the first position that
// breaks the run.
fn run_end(input: &[u8], mut ip: usize, bound: usize, mut r: usize) -> usize {
    let x = input[ip - 1];
    while ip < bound && input[r] == x {
        r += 1;
        ip += 1;
    }
    ip
}

// Extend a match against an earlier position; returns one past the byte that
// starts to differ.
fn match_end(input: &[u8], mut ip: usize, bound: usize, mut r: usize) -> usize {
    loop {
        if ip >= bound {
            return ip;
        }
        let equal = input[r] == input[ip];
        r += 1;
        ip += 1;
        if !equal {
            return ip;
        }
    }
}

/// Estimate the compression ratio of a buffer without compressing it.
///
/// Deterministic, single pass, O(n) time, O(2^12) extra memory. The scan is
/// capped at the hash-table size to trade testing too much against too
/// little. Returns at least 1.0 for any input.
pub fn cratio_estimate(input: &[u8]) -> f32 {
    let len = input.len();
    if len == 0 {
        return 1.0;
    }
    let cbytes = estimate_cbytes(input);
    len as f32 / cbytes as f32
}

/// Estimated compressed size of a buffer, clamped to the input length.
pub fn estimate_cbytes(input: &[u8]) -> usize {
    let len = input.len();
    if len == 0 {
        return 0;
    }
    let ratio = scan_ratio(input);
    if ratio <= 1.0 {
        return len;
    }
    let cbytes = (len as f32 / ratio) as usize;
    cbytes.clamp(1, len)
}

// Core scan: bytes consumed divided by the virtual output counter.
fn scan_ratio(input: &[u8]) -> f32 {
    let len = input.len();
    let limit = len.min(HASH_LEN);
    let ip_bound = limit - 1;
    let ip_limit = limit.saturating_sub(12);

    let mut htab = [0u16; HASH_LEN];
    let mut ip: usize = 0;
    let mut oc: i64 = 5;
    let mut copy: u32 = 4;

    macro_rules! literal {
        ($anchor:expr) => {{
            oc += 1;
            ip = $anchor + 1;
            copy += 1;
            if copy == MAX_COPY {
                copy = 0;
                oc += 1;
            }
        }};
    }

    while ip < ip_limit {
        let anchor = ip;

        // find a potential match
        let seq = read_u32(input, ip);
        let hval = hash(seq);
        let mut r = htab[hval] as usize;
        let distance = anchor - r;
        htab[hval] = anchor as u16;

        if distance == 0 || distance >= MAX_FARDISTANCE {
            literal!(anchor);
            continue;
        }

        // check the first 4 bytes
        if read_u32(input, r) == seq {
            r += 4;
        } else {
            literal!(anchor);
            continue;
        }

        ip = anchor + 4;

        // zero biased distance means a run
        let biased = distance - 1;
        ip = if biased == 0 {
            run_end(input, ip, ip_bound, r)
        } else {
            match_end(input, ip, ip_bound, r)
        };

        ip -= IP_SHIFT;
        let match_len = ip - anchor;
        if match_len < MIN_LEN {
            literal!(anchor);
            continue;
        }

        // a pending literal header becomes unnecessary
        if copy == 0 {
            oc -= 1;
        }
        copy = 0;

        // cost of the match encoding
        if match_len >= 7 {
            oc += ((match_len as i64 - 7) / 255) + 1;
        }
        oc += if biased < MAX_DISTANCE { 2 } else { 4 };

        // update the hash at the match boundary
        if ip + 4 <= len {
            let seq = read_u32(input, ip);
            htab[hash(seq)] = ip as u16;
        }
        ip += 2;
        // assuming literal copy
        oc += 1;
    }

    ip as f32 / oc as f32
}

/// Probe one block, timing the scan.
pub fn probe_block(block: &[u8]) -> BlockInstr {
    let start = Instant::now();
    let cratio = cratio_estimate(block);
    let elapsed = start.elapsed().as_secs_f64().max(1e-9);
    BlockInstr {
        cratio,
        cspeed: (block.len() as f64 / elapsed) as f32,
        special: is_constant(block),
    }
}

/// Probe every block of a chunk. A zero `blocksize` treats the whole chunk
/// as one block.
pub fn probe_chunk(chunk: &[u8], blocksize: usize) -> Vec<BlockInstr> {
    if chunk.is_empty() {
        return Vec::new();
    }
    let blocksize = if blocksize == 0 { chunk.len() } else { blocksize };
    chunk.chunks(blocksize).map(probe_block).collect()
}

fn is_constant(block: &[u8]) -> bool {
    match block.first() {
        Some(&first) => block.iter().all(|&b| b == first),
        None => false,
    }
}
