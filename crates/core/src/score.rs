//! Scoring and improvement criteria.

use crate::config::{CompMode, PerfMode};

/// Score a trial: lower is better. `transfer` is how long the compressed
/// bytes would take to move over the configured bandwidth.
pub fn score(
    perf_mode: PerfMode,
    ctime: f64,
    cbytes: usize,
    dtime: f64,
    bandwidth: u32,
) -> f64 {
    let transfer = (cbytes as f64 / 1024.0) / bandwidth as f64;
    match perf_mode {
        PerfMode::Comp => ctime + transfer,
        PerfMode::Decomp => transfer + dtime,
        PerfMode::Balanced => ctime + transfer + dtime,
    }
}

// Improvement rules as (cratio_coef, score_coef) thresholds; a trial improves
// when any row is exceeded on both axes.
const HSP_RULES: [(f64, f64); 4] = [(1.0, 1.0), (0.5, 2.0), (0.67, 1.3), (2.0, 0.7)];
const BALANCED_RULES: [(f64, f64); 3] = [(1.0, 1.0), (1.1, 0.8), (1.3, 0.5)];

/// Decide whether a trial improves on the current best.
///
/// `score_coef` is `best.score / new.score` and `cratio_coef` is
/// `new.cratio / best.cratio`, so both are "bigger is better".
pub fn has_improved(comp_mode: CompMode, score_coef: f64, cratio_coef: f64) -> bool {
    match comp_mode {
        CompMode::Hsp => rules_match(&HSP_RULES, score_coef, cratio_coef),
        CompMode::Balanced => rules_match(&BALANCED_RULES, score_coef, cratio_coef),
        CompMode::Hcr => cratio_coef > 1.0,
    }
}

fn rules_match(rules: &[(f64, f64)], score_coef: f64, cratio_coef: f64) -> bool {
    rules
        .iter()
        .any(|&(cratio_min, score_min)| cratio_coef > cratio_min && score_coef > score_min)
}
