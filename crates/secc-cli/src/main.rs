//! secc CLI
//!
//! Runs the segmented spectral-domain matched filter on a JSON problem file.
//!
//! # Usage
//!
//! ```bash
//! # Stack correlations with segment length 4096 on 8 threads
//! secc run -i input.json -o ccc_sum.json -k 4096 --threads 8
//!
//! # Also dump every per-channel trace
//! secc run -i input.json -o ccc_sum.json --save-channels ./channels
//!
//! # Print a starter configuration
//! secc example-config > secc.yaml
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use secc_core::config::{ExecutionMode, SeccConfig};
use secc_core::io::{DirectorySink, MatchedFilterInput, ScoreReport};
use secc_core::matched_filter::compute_with_config;
use secc_core::observe::{init_logging, LogLevel};
use secc_core::sink::{CorrelationSink, NullSink};
use secc_core::ScoreMatrix;

#[derive(Parser)]
#[command(name = "secc")]
#[command(about = "Segmented spectral-domain matched filter for seismic template matching")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides the default search path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the stacked correlation coefficients
    Run {
        /// Input JSON with data, template, moveout, weight and optional k
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON for ccc_sum and the elapsed time
        #[arg(short, long)]
        output: PathBuf,

        /// Segment length (overrides the input file and the config)
        #[arg(short = 'k', long)]
        segment_length: Option<usize>,

        /// Worker threads (0 = all logical cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Process stations concurrently
        #[arg(long)]
        station_parallel: bool,

        /// Divide every weight by the number of components
        #[arg(long)]
        normalize_components: bool,

        /// Directory for per-channel CCC_<i>_<j>_<l>.json traces
        #[arg(long)]
        save_channels: Option<PathBuf>,
    },

    /// Print the default configuration as YAML
    ExampleConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => SeccConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SeccConfig::load().context("loading config")?,
    };
    let mut logging = config.logging.clone();
    if cli.quiet {
        logging = logging.with_level(LogLevel::Error);
    }
    for _ in 0..cli.verbose {
        logging.level = logging.level.louder();
    }
    init_logging(&logging);

    match cli.command {
        Commands::Run {
            input,
            output,
            segment_length,
            threads,
            station_parallel,
            normalize_components,
            save_channels,
        } => {
            let mut engine = config.engine.clone();
            if let Some(threads) = threads {
                engine.threads = threads;
            }
            if station_parallel {
                engine.execution = ExecutionMode::StationParallel;
            }
            if normalize_components {
                engine.normalize_by_components = true;
            }

            tracing::info!(path = %input.display(), "loading input");
            let problem = MatchedFilterInput::load_json(&input)?.into_problem()?;

            let k = segment_length
                .or(problem.k)
                .or(engine.segment_length)
                .context("no segment length given (use -k, the input's \"k\", or engine.segment_length)")?;

            let start = Instant::now();
            let ccc_sum = match save_channels {
                Some(dir) => {
                    let mut sink = DirectorySink::create(&dir)?;
                    let ccc_sum = run(&problem, k, &engine, &mut sink)?;
                    let written = sink.finish()?;
                    tracing::info!(files = written, dir = %dir.display(), "saved channel traces");
                    ccc_sum
                }
                None => run(&problem, k, &engine, &mut NullSink)?,
            };
            let t_toc = start.elapsed().as_secs_f64();

            ScoreReport::new(&ccc_sum, t_toc).save_json(&output)?;
            tracing::info!(path = %output.display(), "wrote ccc_sum");
            println!("Elapsed time is {:.6} seconds.", t_toc);
        }

        Commands::ExampleConfig => {
            print!("{}", SeccConfig::example_yaml());
        }
    }

    Ok(())
}

fn run<S: CorrelationSink>(
    problem: &secc_core::io::Problem,
    k: usize,
    engine: &secc_core::EngineConfig,
    sink: &mut S,
) -> anyhow::Result<ScoreMatrix> {
    let ccc_sum = compute_with_config(
        &problem.data,
        &problem.templates,
        k,
        &problem.moveouts,
        &problem.weights,
        engine,
        sink,
    )
    .context("matched filter failed")?;
    Ok(ccc_sum)
}
