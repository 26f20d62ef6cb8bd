//! CLI wiring for the tuning toolkit.

use anyhow::{Context, Result};
use btune_core::{
    Behaviour, BtuneConfig, CompMode, CompressionContext, DecompressionContext, PerfMode,
    RepeatMode, Tuner, MAX_OVERHEAD,
};
use btune_model::ModelInference;
use btune_probe::{estimate_cbytes, probe_chunk};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "btune", about = "Chunked-compression parameter tuning toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CompModeArg {
    Hsp,
    Balanced,
    Hcr,
}

impl From<CompModeArg> for CompMode {
    fn from(value: CompModeArg) -> CompMode {
        match value {
            CompModeArg::Hsp => CompMode::Hsp,
            CompModeArg::Balanced => CompMode::Balanced,
            CompModeArg::Hcr => CompMode::Hcr,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PerfModeArg {
    Comp,
    Decomp,
    Balanced,
}

impl From<PerfModeArg> for PerfMode {
    fn from(value: PerfModeArg) -> PerfMode {
        match value {
            PerfModeArg::Comp => PerfMode::Comp,
            PerfModeArg::Decomp => PerfMode::Decomp,
            PerfModeArg::Balanced => PerfMode::Balanced,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RepeatArg {
    Stop,
    Soft,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(value: RepeatArg) -> RepeatMode {
        match value {
            RepeatArg::Stop => RepeatMode::Stop,
            RepeatArg::Soft => RepeatMode::RepeatSoft,
            RepeatArg::All => RepeatMode::RepeatAll,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the tuner over a file, chunk by chunk. The host compressor is
    /// simulated with the entropy probe's size estimate, so the run shows
    /// the tuning schedule rather than real codec timings.
    Tune {
        input: PathBuf,
        /// Chunk size in bytes
        #[arg(long, default_value_t = 64 * 1024)]
        chunksize: usize,
        /// Block size handed to the host context (0 = automatic)
        #[arg(long, default_value_t = 8 * 1024)]
        blocksize: usize,
        #[arg(long, value_enum, default_value = "balanced")]
        comp_mode: CompModeArg,
        #[arg(long, value_enum, default_value = "balanced")]
        perf_mode: PerfModeArg,
        /// Target bandwidth in kB/s
        #[arg(long)]
        bandwidth: Option<u32>,
        #[arg(long, default_value_t = 4)]
        typesize: usize,
        #[arg(long, default_value_t = 1)]
        nthreads: usize,
        /// Number of initial hard readapts
        #[arg(long, default_value_t = 1)]
        hards: u32,
        /// Soft readapts between hard readapts
        #[arg(long, default_value_t = 5)]
        softs: u32,
        /// Waiting chunks between readapts
        #[arg(long, default_value_t = 0)]
        waits: u32,
        #[arg(long, value_enum, default_value = "stop")]
        repeat: RepeatArg,
    },
    /// Emit per-block probe features as CSV, for training-data collection.
    Probe {
        input: PathBuf,
        #[arg(long, default_value_t = 64 * 1024)]
        chunksize: usize,
        #[arg(long, default_value_t = 8 * 1024)]
        blocksize: usize,
        /// Output path; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // BTUNE_DEBUG raises the filter to debug for all crates
    let filter = if std::env::var_os("BTUNE_DEBUG").is_some() {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Tune {
            input,
            chunksize,
            blocksize,
            comp_mode,
            perf_mode,
            bandwidth,
            typesize,
            nthreads,
            hards,
            softs,
            waits,
            repeat,
        } => {
            let data = fs::read(&input)
                .with_context(|| format!("cannot read input file {}", input.display()))?;
            if data.is_empty() {
                anyhow::bail!("input file {} is empty", input.display());
            }

            let mut config = BtuneConfig {
                comp_mode: comp_mode.into(),
                perf_mode: perf_mode.into(),
                behaviour: Behaviour {
                    nwaits_before_readapt: waits,
                    nsofts_before_hard: softs,
                    nhards_before_stop: hards,
                    repeat_mode: repeat.into(),
                },
                ..BtuneConfig::default()
            };
            if let Some(bandwidth) = bandwidth {
                config.bandwidth = bandwidth;
            }

            let mut cctx = CompressionContext::new(typesize, nthreads);
            cctx.blocksize = blocksize;
            let mut dctx = DecompressionContext::new(nthreads);

            let mut tuner = Tuner::new(Some(config), &cctx, Some(&dctx));
            match ModelInference::from_env(config.comp_mode) {
                Ok(inference) => {
                    tuner = tuner.with_inference(Box::new(inference));
                }
                Err(err) => {
                    debug!(error = %err, "model not configured, using default candidates");
                }
            }

            let start = Instant::now();
            let mut nbytes = 0usize;
            let mut cbytes = 0usize;
            for chunk in data.chunks(chunksize.max(1)) {
                cctx.sourcesize = chunk.len();
                tuner.next_cparams(&mut cctx, Some(&mut dctx), chunk);

                let chunk_start = Instant::now();
                cctx.destsize = simulate_compress(chunk, &cctx);
                let ctime = chunk_start.elapsed().as_secs_f64().max(1e-9);

                tuner.update(&cctx, ctime);
                nbytes += chunk.len();
                cbytes += cctx.destsize;

                // The host applies the requested pool sizes before the next chunk
                cctx.nthreads = cctx.new_nthreads;
                dctx.nthreads = dctx.new_nthreads;
            }
            let total = start.elapsed().as_secs_f64();

            const MB: f64 = 1024.0 * 1024.0;
            println!(
                "Compression ratio: {:.1} MB -> {:.1} MB ({:.1}x)",
                nbytes as f64 / MB,
                cbytes as f64 / MB,
                nbytes as f64 / cbytes as f64
            );
            println!(
                "Compression time: {:.3} s, {:.1} MB/s",
                total,
                nbytes as f64 / (total * MB)
            );
        }

        Command::Probe {
            input,
            chunksize,
            blocksize,
            output,
        } => {
            let data = fs::read(&input)
                .with_context(|| format!("cannot read input file {}", input.display()))?;
            let mut out: Box<dyn Write> = match output {
                Some(path) => Box::new(fs::File::create(&path).with_context(|| {
                    format!("cannot create output file {}", path.display())
                })?),
                None => Box::new(std::io::stdout()),
            };

            writeln!(out, "cratio, speed, special_vals, nchunk")?;
            for (nchunk, chunk) in data.chunks(chunksize.max(1)).enumerate() {
                for instr in probe_chunk(chunk, blocksize) {
                    writeln!(
                        out,
                        "{:.3}, {:.3}, {}, {}",
                        instr.cratio,
                        instr.cspeed,
                        instr.special as u8,
                        nchunk
                    )?;
                }
            }
        }
    }
    Ok(())
}

// Stand-in for the host compressor: the probe's size estimate plus the
// container overhead. Level 0 is a plain copy.
fn simulate_compress(chunk: &[u8], ctx: &CompressionContext) -> usize {
    if ctx.clevel == 0 {
        return MAX_OVERHEAD + chunk.len();
    }
    let blocksize = if ctx.blocksize == 0 {
        chunk.len()
    } else {
        ctx.blocksize
    };
    let payload: usize = chunk
        .chunks(blocksize.max(1))
        .map(estimate_cbytes)
        .sum();
    MAX_OVERHEAD + payload.min(chunk.len())
}
