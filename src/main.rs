//! # RADSYNTH
//!
//! Traces a synthetic radiograph of a brick target and fits a rescaled
//! copy of its center lineout.
//!
//! Usage:
//!     radsynth --config run.json --output report.json
//!     RUST_LOG=debug radsynth --threads 4 --seed 7

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use radsynth_rs::config::RunConfig;
use radsynth_rs::simulator::{self, RunReport};
use radsynth_rs::telemetry::init_tracing;
use radsynth_rs::{info as banner, RadError, Result};

/// Synthetic radiography and goal fitting
#[derive(Parser, Debug)]
#[command(name = "radsynth")]
#[command(version)]
#[command(about = "Synthetic radiograph of a brick target, fitted against a rescaled lineout", long_about = None)]
struct Cli {
    /// Run configuration (JSON); defaults are used for missing fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,

    /// Worker threads, overrides the configuration
    #[arg(short, long)]
    threads: Option<usize>,

    /// Write the full report (image, search history, fit) as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed of the scale search refinement
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut cfg = match &cli.config {
        Some(path) => RunConfig::from_json_reader(BufReader::new(File::open(path)?))?,
        None => RunConfig::default(),
    };
    if let Some(t) = cli.threads {
        cfg.threads = t;
    }
    if let Some(seed) = cli.seed {
        cfg.search.seed = seed;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, report)?;
    out.flush()?;
    Ok(())
}

fn execute(cli: &Cli) -> Result<()> {
    let cfg = load_config(cli)?;
    if cfg.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build_global()
            .map_err(|e| RadError::config(format!("thread pool: {}", e)))?;
    }
    info!(threads = rayon::current_num_threads(), "starting run");

    let start = std::time::Instant::now();
    let report = simulator::run(&cfg)?;
    let elapsed = start.elapsed();

    let image = &report.image;
    println!("Image: {} x {} patches, {} photon bins", image.nx, image.ny, image.nhv());
    println!("  Invalid patches: {}", image.invalid_count());
    println!("  Lineout row: {}", report.lineout_row);
    println!("Fit:");
    println!("  Best scale: {:.6} (goal built with {:.6})", report.search.best_scale, cfg.goal_scale);
    println!("  Best fitness: {:.3e}", report.search.best_fitness);
    println!("  Evaluations: {}", report.search.evaluations);
    if let Some(sweep) = &report.cases {
        println!("Case sweep ({:?}, {} cases):", sweep.layout, sweep.ncases);
        match sweep.best_case {
            Some(case) => println!("  Best case: {} (fitness {:.3e}, scale {:.6})", case, sweep.best_fitness, sweep.best_scale),
            None => println!("  No case produced a defined fitness"),
        }
    }
    println!("Wall-clock time: {:.3} s", elapsed.as_secs_f64());

    if let Some(path) = &cli.output {
        write_report(&report, path)?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);
    println!("{}", banner());
    println!();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
