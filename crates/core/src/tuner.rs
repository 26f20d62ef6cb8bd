//! The tuning state machine and its facade.
//!
//! One `Tuner` is owned by a host compression driver and driven strictly in
//! the order `next_cparams` → compress → `update`, once per chunk. Each
//! `next_cparams` clones the current best parameters, perturbs them according
//! to the active phase and writes them into the host context; each `update`
//! scores the result, decides whether the trial beat the best and advances
//! the phase machine.

use crate::blocksize;
use crate::config::{BtuneConfig, CompMode, PerfMode, RepeatMode};
use crate::context::{CompressionContext, DecompressionContext, MAX_FILTERS, MAX_OVERHEAD};
use crate::cparams::{
    Codec, Cparams, Filter, SplitMode, HARD_STEP_SIZE, MAX_BLOCK, MAX_CLEVEL, MAX_SHUFFLE,
    MIN_BLOCK, MIN_THREADS, SOFT_STEP_SIZE,
};
use crate::logger::TrialLog;
use crate::score;
use crate::state::{Readapt, State};
use tracing::{debug, warn};

/// Samples aggregated per improvement decision. The machinery averages over
/// this many trials; the current policy decides after every sample.
const REP_SAMPLES: usize = 1;

/// Trial budget guard for the threads phase, and the stage boundary between
/// its compression- and decompression-side halves.
const MAX_STATE_THREADS: u32 = 50;

/// First-chunk codec/filter bootstrap. Implementations typically probe the
/// chunk and ask a classifier; returning `None` keeps the default candidate
/// sets.
pub trait CparamsInference {
    fn infer(&self, chunk: &[u8], blocksize: usize, typesize: usize) -> Option<(Codec, Filter)>;
}

/// The auto-tuner. See the module docs for the driving protocol.
pub struct Tuner {
    config: BtuneConfig,
    codecs: Vec<Codec>,
    filters: Vec<Filter>,
    best: Cparams,
    aux: Cparams,
    current_scores: [f64; REP_SAMPLES],
    current_cratios: [f64; REP_SAMPLES],
    rep_index: usize,
    aux_index: u32,
    steps_count: u64,
    state: State,
    step_size: i32,
    nwaitings: u32,
    nsofts: u32,
    nhards: u32,
    is_repeating: bool,
    readapt_from: Readapt,
    max_threads: usize,
    // Decompression thread count mirror, used when no dctx is attached.
    nthreads_decomp: usize,
    threads_for_comp: bool,
    inference: Option<Box<dyn CparamsInference>>,
    inference_done: bool,
    log: TrialLog,
}

impl Tuner {
    /// Create a tuner attached to the given contexts. `None` selects the
    /// default configuration; an invalid configuration is replaced by the
    /// default with a warning.
    pub fn new(
        config: Option<BtuneConfig>,
        cctx: &CompressionContext,
        dctx: Option<&DecompressionContext>,
    ) -> Self {
        let mut config = config.unwrap_or_default();
        if let Err(err) = config.validate() {
            warn!(error = %err, "invalid tuner configuration, using defaults");
            config = BtuneConfig::default();
        }

        let log = TrialLog::from_env();
        log.banner(&config);

        let codecs = init_codecs(&config);
        let filters = vec![Filter::NoFilter, Filter::Shuffle, Filter::BitShuffle];

        let mut best = Cparams {
            codec: codecs[0],
            ..Cparams::default()
        };
        if config.comp_mode == CompMode::Hcr {
            best.clevel = 8;
        }
        best.shufflesize = cctx.typesize as u32;
        best.nthreads_comp = cctx.nthreads;
        let (max_threads, nthreads_decomp) = match dctx {
            Some(d) => (cctx.nthreads.max(d.nthreads), d.nthreads),
            None => (cctx.nthreads, cctx.nthreads),
        };
        best.nthreads_decomp = nthreads_decomp;

        let mut tuner = Self {
            config,
            codecs,
            filters,
            best,
            aux: best,
            current_scores: [0.0; REP_SAMPLES],
            current_cratios: [0.0; REP_SAMPLES],
            rep_index: 0,
            aux_index: 0,
            steps_count: 0,
            state: State::Waiting,
            step_size: HARD_STEP_SIZE,
            nwaitings: 0,
            nsofts: 0,
            nhards: 0,
            is_repeating: false,
            readapt_from: Readapt::Wait,
            max_threads,
            nthreads_decomp,
            threads_for_comp: config.perf_mode != PerfMode::Decomp,
            inference: None,
            inference_done: false,
            log,
        };

        if tuner.config.cparams_hint {
            tuner.extract_cparams(cctx, dctx);
            tuner.add_codec(cctx.codec);
            let b = tuner.config.behaviour;
            if b.nhards_before_stop > 0 {
                if b.nsofts_before_hard > 0 {
                    tuner.init_soft();
                } else if b.nwaits_before_readapt > 0 {
                    tuner.state = State::Waiting;
                    tuner.readapt_from = Readapt::Wait;
                } else {
                    tuner.init_hard();
                }
            } else {
                tuner.init_without_hards();
            }
        } else {
            // The seed hard readapt is not counted against the schedule.
            tuner.init_hard();
            tuner.config.behaviour.nhards_before_stop += 1;
        }

        tuner.step_size = if tuner.config.behaviour.nhards_before_stop == 1 {
            SOFT_STEP_SIZE
        } else {
            HARD_STEP_SIZE
        };

        tuner
    }

    /// Attach a first-chunk codec/filter bootstrap.
    pub fn with_inference(mut self, inference: Box<dyn CparamsInference>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn config(&self) -> &BtuneConfig {
        &self.config
    }

    pub fn best(&self) -> &Cparams {
        &self.best
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn readapt_from(&self) -> Readapt {
        self.readapt_from
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn nsofts(&self) -> u32 {
        self.nsofts
    }

    pub fn nhards(&self) -> u32 {
        self.nhards
    }

    pub fn nwaitings(&self) -> u32 {
        self.nwaitings
    }

    pub fn is_repeating(&self) -> bool {
        self.is_repeating
    }

    /// Resolve an automatic (zero) block size in the context.
    pub fn next_blocksize(&self, cctx: &mut CompressionContext) {
        blocksize::next_blocksize(cctx);
    }

    /// Propose the parameters for the next chunk and write them into the
    /// contexts. `chunk` is the payload about to be compressed; it is only
    /// read for the first-chunk inference pass.
    pub fn next_cparams(
        &mut self,
        cctx: &mut CompressionContext,
        mut dctx: Option<&mut DecompressionContext>,
        chunk: &[u8],
    ) {
        if !self.inference_done && self.steps_count == 0 {
            self.inference_done = true;
            if let Some(inference) = self.inference.as_ref() {
                if let Some((codec, filter)) = inference.infer(chunk, cctx.blocksize, cctx.typesize)
                {
                    debug!(
                        codec = codec.name(),
                        filter = filter.code(),
                        "inference narrowed the candidate sets"
                    );
                    self.codecs = vec![codec];
                    self.filters = vec![filter];
                }
            }
            self.log.header();
        }

        self.aux = self.best;
        let mut cparams = self.aux;

        match self.state {
            State::CodecFilter => {
                // Cycle codecs, filters and splits
                let n_filters_splits = (self.filters.len() * 2) as u32;
                cparams.codec = self.codecs[(self.aux_index / n_filters_splits) as usize];
                cparams.filter = self.filters[((self.aux_index % n_filters_splits) / 2) as usize];
                cparams.splitmode = if self.aux_index % 2 == 0 {
                    SplitMode::Always
                } else {
                    SplitMode::Never
                };
                // BloscLz only ever splits
                if cparams.codec == Codec::BloscLz {
                    cparams.splitmode = SplitMode::Always;
                }
                // The first tuning of Zstd/Zlib in the speed-aware modes
                // should start at clevel 3
                if matches!(self.config.perf_mode, PerfMode::Comp | PerfMode::Balanced)
                    && matches!(cparams.codec, Codec::Zstd | Codec::Zlib)
                    && self.nhards == 0
                {
                    cparams.clevel = 3;
                }
                self.aux_index += 1;
            }

            State::ShuffleSize => {
                self.aux_index += 1;
                if cparams.increasing_shuffle {
                    if cparams.shufflesize < MAX_SHUFFLE {
                        cparams.shufflesize <<= 1;
                    }
                } else if cparams.shufflesize > cparams.filter.min_shuffle() {
                    cparams.shufflesize >>= 1;
                }
            }

            State::Threads => {
                self.aux_index += 1;
                let increasing = cparams.increasing_nthreads;
                let nthreads = if self.threads_for_comp {
                    &mut cparams.nthreads_comp
                } else {
                    &mut cparams.nthreads_decomp
                };
                if increasing {
                    if *nthreads < self.max_threads {
                        *nthreads += 1;
                    }
                } else if *nthreads > MIN_THREADS {
                    *nthreads -= 1;
                }
            }

            State::Clevel => {
                // Force auto blocksize on hard readapts
                if self.readapt_from == Readapt::Hard {
                    cparams.blocksize = 0;
                }
                self.aux_index += 1;
                if cparams.increasing_clevel {
                    if cparams.clevel <= MAX_CLEVEL - self.step_size {
                        cparams.clevel += self.step_size;
                        // Zstd level 9 is extremely slow, so avoid it, always
                        if cparams.clevel == 9 && cparams.codec == Codec::Zstd {
                            cparams.clevel = 8;
                        }
                    }
                } else if cparams.clevel > self.step_size {
                    cparams.clevel -= self.step_size;
                }
            }

            State::Blocksize => {
                self.aux_index += 1;
                let step = self.step_size as u32;
                let step_factor = step - 1;
                if cparams.increasing_block {
                    let new_block = cparams.blocksize << step;
                    if cparams.blocksize <= MAX_BLOCK >> step_factor
                        && new_block <= cctx.sourcesize
                    {
                        cparams.blocksize = new_block;
                    }
                } else if cparams.blocksize >= MIN_BLOCK << step_factor {
                    cparams.blocksize >>= step;
                }
            }

            State::Memcpy => {
                self.aux_index += 1;
                cparams.clevel = 0;
            }

            State::Waiting => {
                self.nwaitings += 1;
            }

            State::Stop => return,
        }

        self.aux = cparams;
        self.apply_cparams(cctx, dctx.as_deref_mut());
    }

    /// Record the result of the last chunk and advance the machine.
    /// Decompression is assumed untimed; hosts that do time it should call
    /// [`Tuner::update_timed`].
    pub fn update(&mut self, cctx: &CompressionContext, ctime: f64) {
        self.update_timed(cctx, ctime, 0.0);
    }

    /// Like [`Tuner::update`], with an explicit decompression time.
    pub fn update_timed(&mut self, cctx: &CompressionContext, ctime: f64, dtime: f64) {
        if self.state == State::Stop {
            return;
        }
        self.steps_count += 1;

        let cbytes = cctx.destsize;
        let score = score::score(
            self.config.perf_mode,
            ctime,
            cbytes,
            dtime,
            self.config.bandwidth,
        );
        debug_assert!(score > 0.0);
        let cratio = cctx.sourcesize as f64 / cbytes as f64;

        self.aux.score = score;
        self.aux.cratio = cratio;
        self.aux.ctime = ctime;
        self.aux.dtime = dtime;

        self.current_scores[self.rep_index] = score;
        self.current_cratios[self.rep_index] = cratio;
        self.rep_index += 1;
        if self.rep_index < REP_SAMPLES {
            return;
        }

        let score = mean(&self.current_scores);
        let cratio = mean(&self.current_cratios);
        let cratio_coef = cratio / self.best.cratio;
        let score_coef = self.best.score / score;

        // In the threads phase the improvement comes from ctime or dtime
        let mut improved = if self.state == State::Threads {
            if self.threads_for_comp {
                ctime < self.best.ctime
            } else {
                dtime < self.best.dtime
            }
        } else {
            score::has_improved(self.config.comp_mode, score_coef, cratio_coef)
        };

        let mut winner = if improved { 'W' } else { '-' };
        // A chunk made of special values can never improve the scoring
        if cbytes <= MAX_OVERHEAD + cctx.typesize {
            improved = false;
            winner = 'S';
        }

        if !self.is_repeating {
            self.log.trial(
                &self.aux,
                score,
                cratio,
                self.state.name(self.threads_for_comp),
                self.readapt_from.as_str(),
                winner,
            );
        }

        if improved {
            self.best = self.aux;
        }
        self.rep_index = 0;
        self.update_aux(cctx, improved);
    }

    // ---- candidate sets -------------------------------------------------

    fn add_codec(&mut self, codec: Codec) {
        if !self.codecs.contains(&codec) {
            self.codecs.push(codec);
        }
    }

    // Seed best/aux from the host-provided parameters.
    fn extract_cparams(&mut self, cctx: &CompressionContext, dctx: Option<&DecompressionContext>) {
        self.best.codec = cctx.codec;
        self.best.filter = cctx.filter();
        self.best.clevel = cctx.clevel;
        self.best.splitmode = cctx.splitmode;
        self.best.blocksize = cctx.blocksize;
        self.best.shufflesize = cctx.typesize as u32;
        self.best.nthreads_comp = cctx.nthreads;
        self.best.nthreads_decomp = match dctx {
            Some(d) => d.nthreads,
            None => self.nthreads_decomp,
        };
        self.aux = self.best;
    }

    // ---- direction endpoints --------------------------------------------

    fn has_ended_clevel(&self) -> bool {
        (self.best.increasing_clevel && self.best.clevel >= MAX_CLEVEL - self.step_size)
            || (!self.best.increasing_clevel && self.best.clevel <= 1 + self.step_size)
    }

    fn has_ended_shuffle(&self) -> bool {
        let min_shuffle = self.best.filter.min_shuffle();
        (self.best.increasing_shuffle && self.best.shufflesize >= MAX_SHUFFLE)
            || (!self.best.increasing_shuffle && self.best.shufflesize <= min_shuffle)
    }

    fn has_ended_threads(&self) -> bool {
        let nthreads = if self.threads_for_comp {
            self.best.nthreads_comp
        } else {
            self.best.nthreads_decomp
        };
        (self.best.increasing_nthreads && nthreads >= self.max_threads)
            || (!self.best.increasing_nthreads && nthreads <= MIN_THREADS)
    }

    fn has_ended_blocksize(&self, sourcesize: usize) -> bool {
        let step = self.step_size as u32;
        let blocksize = self.best.blocksize;
        (self.best.increasing_block
            && (blocksize > MAX_BLOCK >> step || blocksize > sourcesize >> step))
            || (!self.best.increasing_block && blocksize < MIN_BLOCK << step)
    }

    // ---- readapt entry points -------------------------------------------

    fn init_soft(&mut self) {
        if self.has_ended_clevel() {
            self.best.increasing_clevel = !self.best.increasing_clevel;
        }
        self.state = State::Clevel;
        self.step_size = SOFT_STEP_SIZE;
        self.readapt_from = Readapt::Soft;
    }

    fn init_hard(&mut self) {
        self.state = State::CodecFilter;
        self.step_size = HARD_STEP_SIZE;
        self.readapt_from = Readapt::Hard;
        self.threads_for_comp = self.config.perf_mode != PerfMode::Decomp;
        if self.has_ended_shuffle() {
            self.best.increasing_shuffle = !self.best.increasing_shuffle;
        }
    }

    // Schedule start when the configuration asks for no hard readapts at all.
    fn init_without_hards(&mut self) {
        let b = self.config.behaviour;
        let minimum_hards: u32 = if self.config.cparams_hint { 0 } else { 1 };
        if b.repeat_mode == RepeatMode::RepeatAll && b.nhards_before_stop > minimum_hards {
            self.init_hard();
        } else if b.repeat_mode != RepeatMode::Stop && b.nsofts_before_hard > 0 {
            self.init_soft();
        } else if minimum_hards == 0 && b.nsofts_before_hard > 0 {
            self.init_soft();
        } else {
            self.state = State::Stop;
            self.readapt_from = Readapt::Wait;
        }
        self.is_repeating = true;
    }

    // ---- parameter writing ----------------------------------------------

    // Write the trial into the host contexts, applying the mode caps and the
    // filter slot protocol. The clamps are recorded back into the trial so
    // the decision sees what actually ran.
    fn apply_cparams(
        &mut self,
        cctx: &mut CompressionContext,
        dctx: Option<&mut DecompressionContext>,
    ) {
        cctx.codec = self.aux.codec;

        if self.aux.filter == Filter::ByteDelta {
            cctx.filters[MAX_FILTERS - 2] = Filter::Shuffle;
            cctx.filters[MAX_FILTERS - 1] = Filter::ByteDelta;
            cctx.filters_meta[MAX_FILTERS - 1] = cctx.typesize as u8;
        } else {
            cctx.filters[MAX_FILTERS - 2] = Filter::NoFilter;
            cctx.filters[MAX_FILTERS - 1] = self.aux.filter;
            cctx.filters_meta[MAX_FILTERS - 1] = 0;
        }

        cctx.splitmode = self.aux.splitmode;
        self.aux.clamp_clevel(self.config.comp_mode);
        cctx.clevel = self.aux.clevel;

        if self.aux.blocksize != 0 {
            cctx.blocksize = self.aux.blocksize;
        } else {
            cctx.blocksize = 0;
            blocksize::next_blocksize(cctx);
            self.aux.blocksize = cctx.blocksize;
        }

        cctx.typesize = self.aux.shufflesize as usize;
        cctx.new_nthreads = self.aux.nthreads_comp;
        match dctx {
            Some(d) => d.new_nthreads = self.aux.nthreads_decomp,
            None => self.nthreads_decomp = self.aux.nthreads_decomp,
        }
    }

    // ---- phase transitions ----------------------------------------------

    // Enter a phase, flipping its direction first when the best already sits
    // at that parameter's endpoint so the phase explores a fresh direction.
    fn enter(&mut self, next: State, sourcesize: usize) {
        self.aux_index = 0;
        match next {
            State::ShuffleSize => {
                if self.has_ended_shuffle() {
                    self.best.increasing_shuffle = !self.best.increasing_shuffle;
                }
            }
            State::Threads => {
                if self.has_ended_threads() {
                    self.best.increasing_nthreads = !self.best.increasing_nthreads;
                }
            }
            State::Clevel => {
                if self.has_ended_clevel() {
                    self.best.increasing_clevel = !self.best.increasing_clevel;
                }
            }
            State::Blocksize => {
                if self.has_ended_blocksize(sourcesize) {
                    self.best.increasing_block = !self.best.increasing_block;
                }
            }
            _ => {}
        }
        self.state = next;
    }

    fn update_aux(&mut self, cctx: &CompressionContext, improved: bool) {
        let first_time = self.aux_index == 1;
        match self.state {
            State::CodecFilter => {
                // Reached the last codec/filter/split combination
                if self.aux_index as usize >= self.codecs.len() * self.filters.len() * 2 {
                    let next = if self.config.tuning.shufflesize
                        && self.best.filter != Filter::NoFilter
                        && self.best.shufflesize.is_power_of_two()
                    {
                        State::ShuffleSize
                    } else if self.config.tuning.threads && self.max_threads > 1 {
                        State::Threads
                    } else {
                        State::Clevel
                    };
                    self.enter(next, cctx.sourcesize);
                }
            }

            State::ShuffleSize => {
                if !improved && first_time {
                    self.best.increasing_shuffle = !self.best.increasing_shuffle;
                }
                // Cannot change the parameter any more, or stopped improving
                if self.has_ended_shuffle() || (!improved && !first_time) {
                    let next = if self.config.tuning.threads && self.max_threads > 1 {
                        State::Threads
                    } else {
                        State::Clevel
                    };
                    self.enter(next, cctx.sourcesize);
                }
            }

            State::Threads => {
                let first_time = self.aux_index % MAX_STATE_THREADS == 1;
                if !improved && first_time {
                    self.best.increasing_nthreads = !self.best.increasing_nthreads;
                }
                if self.has_ended_threads() || (!improved && !first_time) {
                    if self.config.perf_mode == PerfMode::Balanced
                        && self.aux_index < MAX_STATE_THREADS
                    {
                        // Switch sides and run the phase again
                        self.threads_for_comp = !self.threads_for_comp;
                        self.aux_index = MAX_STATE_THREADS;
                        if self.has_ended_threads() {
                            self.best.increasing_nthreads = !self.best.increasing_nthreads;
                        }
                    } else {
                        self.aux_index = MAX_STATE_THREADS + 1;
                    }
                    if self.aux_index > MAX_STATE_THREADS {
                        self.enter(State::Clevel, cctx.sourcesize);
                    }
                }
            }

            State::Clevel => {
                if !improved && first_time {
                    self.best.increasing_clevel = !self.best.increasing_clevel;
                }
                if self.has_ended_clevel() || (!improved && !first_time) {
                    let next = if self.config.tuning.blocksize {
                        State::Blocksize
                    } else if self.config.tuning.memcpy {
                        State::Memcpy
                    } else {
                        State::Waiting
                    };
                    self.enter(next, cctx.sourcesize);
                }
            }

            State::Blocksize => {
                if !improved && first_time {
                    self.best.increasing_block = !self.best.increasing_block;
                }
                if self.has_ended_blocksize(cctx.sourcesize) || (!improved && !first_time) {
                    let next = if self.config.comp_mode == CompMode::Hsp
                        && self.config.tuning.memcpy
                    {
                        State::Memcpy
                    } else {
                        State::Waiting
                    };
                    self.enter(next, cctx.sourcesize);
                }
            }

            State::Memcpy => {
                self.enter(State::Waiting, cctx.sourcesize);
            }

            _ => {}
        }

        if self.state == State::Waiting {
            self.process_waiting_state();
        }
    }

    // Decide what follows a completed readapt (or wait).
    fn process_waiting_state(&mut self) {
        let b = self.config.behaviour;
        let minimum_hards: u32 = if self.config.cparams_hint { 0 } else { 1 };

        match self.readapt_from {
            Readapt::Hard => {
                self.nhards += 1;
                let last_hard = b.nhards_before_stop == minimum_hards
                    || (b.nhards_before_stop > 0 && self.nhards % b.nhards_before_stop == 0);
                if last_hard {
                    // Initial readapts completed
                    self.is_repeating = true;
                    if b.nsofts_before_hard > 0 && b.repeat_mode != RepeatMode::Stop {
                        self.init_soft();
                    } else if b.repeat_mode != RepeatMode::RepeatAll {
                        self.state = State::Stop;
                    } else if b.nwaits_before_readapt > 0 {
                        self.state = State::Waiting;
                        self.readapt_from = Readapt::Wait;
                    } else if b.nhards_before_stop > minimum_hards {
                        self.init_hard();
                    } else {
                        self.state = State::Stop;
                    }
                } else if b.nsofts_before_hard > 0 {
                    self.init_soft();
                } else if b.nwaits_before_readapt > 0 {
                    self.state = State::Waiting;
                    self.readapt_from = Readapt::Wait;
                } else {
                    self.init_hard();
                }
            }

            Readapt::Soft => {
                self.nsofts += 1;
                self.readapt_from = Readapt::Wait;
                if b.nwaits_before_readapt == 0 {
                    let soft_budget_done = b.nsofts_before_hard == 0
                        || self.nsofts % b.nsofts_before_hard == 0;
                    if soft_budget_done
                        && !(self.is_repeating && b.repeat_mode != RepeatMode::RepeatAll)
                        && b.nhards_before_stop > minimum_hards
                    {
                        self.init_hard();
                    } else if minimum_hards == 0
                        && b.nhards_before_stop == 0
                        && b.nsofts_before_hard > 0
                        && self.nsofts % b.nsofts_before_hard == 0
                        && b.repeat_mode == RepeatMode::Stop
                    {
                        // Hint given, no hards configured: the soft budget
                        // running out is the end of the schedule
                        self.is_repeating = true;
                        self.state = State::Stop;
                    } else {
                        self.init_soft();
                    }
                }
            }

            Readapt::Wait => {
                let wait_budget_done = b.nwaits_before_readapt == 0
                    || (self.nwaitings != 0 && self.nwaitings % b.nwaits_before_readapt == 0);
                if wait_budget_done {
                    let soft_budget_done = b.nsofts_before_hard == 0
                        || (self.nsofts != 0 && self.nsofts % b.nsofts_before_hard == 0);
                    if soft_budget_done
                        && !(self.is_repeating && b.repeat_mode != RepeatMode::RepeatAll)
                        && b.nhards_before_stop > minimum_hards
                    {
                        self.init_hard();
                    } else if b.nsofts_before_hard > 0
                        && !(self.is_repeating && b.repeat_mode == RepeatMode::Stop)
                    {
                        self.init_soft();
                    }
                }
            }
        }

        // The final hard of the schedule explores finely
        if self.readapt_from == Readapt::Hard
            && b.nhards_before_stop > 0
            && self.nhards == b.nhards_before_stop - 1
        {
            self.step_size = SOFT_STEP_SIZE;
        }
    }
}

fn init_codecs(config: &BtuneConfig) -> Vec<Codec> {
    let mut codecs = Vec::new();
    if config.comp_mode == CompMode::Hcr {
        // In HCR mode only try Zstd and Zlib; Lz4hc typically compresses less
        codecs.push(Codec::Zstd);
        codecs.push(Codec::Zlib);
    } else {
        // In all other modes Lz4 is mandatory
        codecs.push(Codec::Lz4);
        if config.comp_mode == CompMode::Balanced {
            // In balanced mode give BloscLz a chance
            codecs.push(Codec::BloscLz);
        }
        if config.perf_mode == PerfMode::Decomp {
            codecs.push(Codec::Lz4hc);
        }
    }
    codecs
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Behaviour;

    fn contexts(typesize: usize, nthreads: usize) -> (CompressionContext, DecompressionContext) {
        (
            CompressionContext::new(typesize, nthreads),
            DecompressionContext::new(nthreads),
        )
    }

    #[test]
    fn test_default_candidate_sets() {
        let (cctx, dctx) = contexts(4, 2);
        let tuner = Tuner::new(None, &cctx, Some(&dctx));
        assert_eq!(tuner.codecs(), &[Codec::Lz4, Codec::BloscLz]);
        assert_eq!(
            tuner.filters(),
            &[Filter::NoFilter, Filter::Shuffle, Filter::BitShuffle]
        );
        // Without a hint the schedule starts with an uncounted hard readapt
        assert_eq!(tuner.state(), State::CodecFilter);
        assert_eq!(tuner.readapt_from(), Readapt::Hard);
    }

    #[test]
    fn test_hcr_candidate_set_and_clevel() {
        let (cctx, dctx) = contexts(4, 1);
        let config = BtuneConfig {
            comp_mode: CompMode::Hcr,
            ..BtuneConfig::default()
        };
        let tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        assert_eq!(tuner.codecs(), &[Codec::Zstd, Codec::Zlib]);
        assert_eq!(tuner.best().clevel, 8);
    }

    #[test]
    fn test_decomp_perf_adds_lz4hc() {
        let (cctx, dctx) = contexts(4, 1);
        let config = BtuneConfig {
            perf_mode: PerfMode::Decomp,
            comp_mode: CompMode::Hsp,
            ..BtuneConfig::default()
        };
        let tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        assert_eq!(tuner.codecs(), &[Codec::Lz4, Codec::Lz4hc]);
    }

    #[test]
    fn test_hint_seeds_best_from_context() {
        let (mut cctx, dctx) = contexts(8, 3);
        cctx.codec = Codec::Zstd;
        cctx.filters[MAX_FILTERS - 1] = Filter::BitShuffle;
        cctx.clevel = 4;
        cctx.blocksize = 64 * 1024;
        let config = BtuneConfig {
            cparams_hint: true,
            ..BtuneConfig::default()
        };
        let tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        assert_eq!(tuner.best().codec, Codec::Zstd);
        assert_eq!(tuner.best().filter, Filter::BitShuffle);
        assert_eq!(tuner.best().clevel, 4);
        assert_eq!(tuner.best().blocksize, 64 * 1024);
        assert_eq!(tuner.best().shufflesize, 8);
        // The hint codec joins the candidates
        assert!(tuner.codecs().contains(&Codec::Zstd));
        // With softs configured the schedule starts soft
        assert_eq!(tuner.state(), State::Clevel);
        assert_eq!(tuner.readapt_from(), Readapt::Soft);
    }

    #[test]
    fn test_hint_without_any_readapts_stops() {
        let (cctx, dctx) = contexts(4, 1);
        let config = BtuneConfig {
            cparams_hint: true,
            behaviour: Behaviour {
                nwaits_before_readapt: 0,
                nsofts_before_hard: 0,
                nhards_before_stop: 0,
                repeat_mode: RepeatMode::Stop,
            },
            ..BtuneConfig::default()
        };
        let tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        assert_eq!(tuner.state(), State::Stop);
        assert!(tuner.is_repeating());
    }

    #[test]
    fn test_stop_state_proposes_nothing() {
        let (mut cctx, dctx) = contexts(4, 1);
        let config = BtuneConfig {
            cparams_hint: true,
            behaviour: Behaviour {
                nwaits_before_readapt: 0,
                nsofts_before_hard: 0,
                nhards_before_stop: 0,
                repeat_mode: RepeatMode::Stop,
            },
            ..BtuneConfig::default()
        };
        let mut dctx_mut = dctx;
        let mut tuner = Tuner::new(Some(config), &cctx.clone(), Some(&dctx_mut));
        let before = cctx.clone();
        tuner.next_cparams(&mut cctx, Some(&mut dctx_mut), &[0u8; 16]);
        assert_eq!(cctx.codec, before.codec);
        assert_eq!(cctx.clevel, before.clevel);
        assert_eq!(cctx.new_nthreads, before.new_nthreads);
    }

    #[test]
    fn test_codec_filter_enumeration_covers_product() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 1 << 20;
        let mut tuner = Tuner::new(None, &cctx, Some(&dctx));
        let combos = tuner.codecs().len() * tuner.filters().len() * 2;
        let mut seen = Vec::new();
        for _ in 0..combos {
            assert_eq!(tuner.state(), State::CodecFilter);
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            seen.push((cctx.codec, cctx.filter(), cctx.splitmode));
            cctx.destsize = cctx.sourcesize; // incompressible: never improves
            tuner.update(&cctx, 0.01);
        }
        // Every codec and filter candidate was proposed at least once
        for codec in tuner.codecs() {
            assert!(seen.iter().any(|(c, _, _)| c == codec));
        }
        for filter in tuner.filters() {
            assert!(seen.iter().any(|(_, f, _)| f == filter));
        }
        // BloscLz never runs unsplit
        assert!(seen
            .iter()
            .all(|(c, _, s)| *c != Codec::BloscLz || *s == SplitMode::Always));
        // Enumeration done, the sweep moves on to the clevel phase
        assert_eq!(tuner.state(), State::Clevel);
    }

    #[test]
    fn test_degenerate_chunk_never_improves() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 64 * 1024;
        let mut tuner = Tuner::new(None, &cctx, Some(&dctx));
        let initial_best = *tuner.best();
        for _ in 0..8 {
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            cctx.destsize = MAX_OVERHEAD + cctx.typesize; // special-values chunk
            tuner.update(&cctx, 0.0001);
        }
        let best = tuner.best();
        assert_eq!(best.codec, initial_best.codec);
        assert_eq!(best.clevel, initial_best.clevel);
        assert_eq!(best.score, initial_best.score);
    }

    #[test]
    fn test_best_replaced_only_on_improvement() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 64 * 1024;
        let mut tuner = Tuner::new(None, &cctx, Some(&dctx));
        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        cctx.destsize = 8 * 1024; // 8x ratio, tiny time: clear winner
        tuner.update(&cctx, 0.001);
        let best = *tuner.best();
        assert!(best.cratio > 7.9);
        assert!(best.score < 1.0);

        // A much worse trial must not displace it
        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        cctx.destsize = 64 * 1024;
        tuner.update(&cctx, 10.0);
        assert_eq!(tuner.best().cratio, best.cratio);
        assert_eq!(tuner.best().score, best.score);
    }

    #[test]
    fn test_score_roundtrip_stored_exactly() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 64 * 1024;
        let mut tuner = Tuner::new(None, &cctx, Some(&dctx));
        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        cctx.destsize = 8 * 1024;
        tuner.update(&cctx, 0.002);
        let best = tuner.best();
        let recomputed = crate::score::score(
            tuner.config().perf_mode,
            best.ctime,
            cctx.destsize,
            best.dtime,
            tuner.config().bandwidth,
        );
        assert_eq!(best.score, recomputed);
    }

    #[test]
    fn test_clevel_bounds_on_every_proposal() {
        let (mut cctx, mut dctx) = contexts(4, 2);
        cctx.sourcesize = 1 << 20;
        let config = BtuneConfig {
            comp_mode: CompMode::Hcr,
            ..BtuneConfig::default()
        };
        let mut tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        for step in 0..64 {
            if tuner.state() == State::Stop {
                break;
            }
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            assert!(cctx.clevel >= 0 && cctx.clevel <= 6, "step {}", step);
            assert!(!(cctx.clevel == 9 && cctx.codec == Codec::Zstd));
            cctx.destsize = cctx.sourcesize / 2;
            tuner.update(&cctx, 0.01);
        }
    }

    #[test]
    fn test_shufflesize_phase_doubles_and_halves() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 1 << 20;
        let config = BtuneConfig {
            tuning: crate::config::Tuning {
                shufflesize: true,
                ..Default::default()
            },
            ..BtuneConfig::default()
        };
        let mut tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
        // Exhaust the codec/filter product without improvements
        let combos = tuner.codecs().len() * tuner.filters().len() * 2;
        for _ in 0..combos {
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            cctx.destsize = cctx.sourcesize;
            tuner.update(&cctx, 0.01);
        }
        assert_eq!(tuner.state(), State::ShuffleSize);

        // Increasing first: 4 -> 8; the failed first trial flips direction
        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        assert_eq!(cctx.typesize, 8);
        cctx.destsize = cctx.sourcesize;
        tuner.update(&cctx, 0.01);

        // Then decreasing: 4 -> 2; a second failure exits the phase
        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        assert_eq!(cctx.typesize, 2);
        cctx.destsize = cctx.sourcesize;
        tuner.update(&cctx, 0.01);
        assert_eq!(tuner.state(), State::Clevel);
    }

    #[test]
    fn test_blocksize_phase_shifts_within_bounds() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.codec = Codec::Lz4;
        cctx.filters[MAX_FILTERS - 1] = Filter::Shuffle;
        cctx.clevel = 5;
        cctx.blocksize = 64 * 1024;
        cctx.sourcesize = 1 << 20;
        let config = BtuneConfig {
            cparams_hint: true,
            tuning: crate::config::Tuning {
                blocksize: true,
                ..Default::default()
            },
            ..BtuneConfig::default()
        };
        let mut tuner = Tuner::new(Some(config), &cctx, Some(&dctx));

        // Two failed clevel trials move the soft sweep on to blocksize
        for _ in 0..2 {
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            cctx.destsize = cctx.sourcesize;
            tuner.update(&cctx, 0.01);
        }
        assert_eq!(tuner.state(), State::Blocksize);

        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        assert_eq!(cctx.blocksize, 128 * 1024);
        assert_eq!(cctx.blocksize % cctx.typesize, 0);
        cctx.destsize = cctx.sourcesize;
        tuner.update(&cctx, 0.01);

        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        assert_eq!(cctx.blocksize, 32 * 1024);
        cctx.destsize = cctx.sourcesize;
        tuner.update(&cctx, 0.01);
        assert_eq!(tuner.state(), State::Clevel);
    }

    #[test]
    fn test_memcpy_phase_is_a_single_plain_copy_trial() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.clevel = 5;
        cctx.sourcesize = 1 << 18;
        let config = BtuneConfig {
            cparams_hint: true,
            comp_mode: CompMode::Hsp,
            tuning: crate::config::Tuning {
                memcpy: true,
                ..Default::default()
            },
            ..BtuneConfig::default()
        };
        let mut tuner = Tuner::new(Some(config), &cctx, Some(&dctx));

        for _ in 0..2 {
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            cctx.destsize = cctx.sourcesize;
            tuner.update(&cctx, 0.01);
        }
        assert_eq!(tuner.state(), State::Memcpy);

        tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
        assert_eq!(cctx.clevel, 0);
        cctx.destsize = cctx.sourcesize;
        tuner.update(&cctx, 0.01);
        // Memcpy is always a single trial; the sweep then waits and the
        // scheduler starts the next soft readapt
        assert_eq!(tuner.state(), State::Clevel);
    }

    #[test]
    fn test_monotone_counters() {
        let (mut cctx, mut dctx) = contexts(4, 1);
        cctx.sourcesize = 1 << 18;
        let mut tuner = Tuner::new(None, &cctx, Some(&dctx));
        let mut prev = (0, 0, 0);
        for _ in 0..64 {
            if tuner.state() == State::Stop {
                break;
            }
            tuner.next_cparams(&mut cctx, Some(&mut dctx), &[]);
            cctx.destsize = cctx.sourcesize;
            tuner.update(&cctx, 0.01);
            let now = (tuner.nsofts(), tuner.nhards(), tuner.nwaitings());
            assert!(now.0 >= prev.0 && now.1 >= prev.1 && now.2 >= prev.2);
            prev = now;
        }
    }
}
