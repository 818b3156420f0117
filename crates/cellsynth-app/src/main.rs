use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cellsynth_app::{HeadlessOptions, run_headless};
use cellsynth_core::{DecayCoupling, Grid, GridConfig};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "cellsynth",
    version,
    about = "Run the resonant cellular automaton headlessly and report its evolution"
)]
struct Cli {
    /// JSON file holding a grid configuration; flags below override its fields.
    #[arg(long, env = "CELLSYNTH_CONFIG")]
    config: Option<PathBuf>,

    /// Number of columns.
    #[arg(long)]
    width: Option<u32>,

    /// Number of rows.
    #[arg(long)]
    height: Option<u32>,

    /// Weight of harmonic diffusion relative to decay.
    #[arg(long, allow_negative_numbers = true)]
    balance: Option<f32>,

    /// Derive death decay and birth energy from `1 - balance`.
    #[arg(long)]
    balanced_decay: bool,

    /// Birth/survival counts in `B3/S23` notation.
    #[arg(long)]
    rule: Option<String>,

    /// Seed for reproducible runs.
    #[arg(long, env = "CELLSYNTH_SEED")]
    seed: Option<u64>,

    /// Probability that a cell starts alive.
    #[arg(long, default_value_t = 0.25)]
    bias: f32,

    /// Generations to simulate.
    #[arg(long, default_value_t = 120)]
    generations: u64,

    /// Wall-clock seconds per generation.
    #[arg(long, default_value_t = 0.1)]
    step_seconds: f64,

    /// Simulated seconds between frames.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    frame_seconds: f64,

    /// Write the JSON report here instead of printing its summary.
    #[arg(long, env = "CELLSYNTH_REPORT")]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut grid = Grid::with_config(config).context("invalid grid configuration")?;
    let alive = grid.shuffle(cli.bias).context("failed to seed grid")?;
    info!(
        width = grid.width(),
        height = grid.height(),
        balance = grid.balance(),
        alive,
        "seeded grid"
    );

    let options = HeadlessOptions {
        generations: cli.generations,
        step_interval: seconds(cli.step_seconds, "--step-seconds")?,
        frame_interval: seconds(cli.frame_seconds, "--frame-seconds")?,
        ..HeadlessOptions::default()
    };
    let report = run_headless(&mut grid, &options)?;

    match &cli.report {
        Some(path) => {
            report.write_json(path)?;
            info!(path = %path.display(), "wrote headless report");
        }
        None => {
            let summary = serde_json::to_string_pretty(&report.summary)
                .context("failed to serialize report summary")?;
            println!("{summary}");
        }
    }
    if let Some(generation) = report.summary.extinct_at {
        warn!(generation, "population went extinct");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<GridConfig> {
    let mut config: GridConfig = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => GridConfig::default(),
    };
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(balance) = cli.balance {
        config.balance = balance;
    }
    if cli.balanced_decay {
        config.rules.decay_coupling = DecayCoupling::Balanced;
    }
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(rule) = &cli.rule {
        config.rules = config
            .rules
            .with_notation(rule)
            .with_context(|| format!("invalid --rule `{rule}`"))?;
    }
    Ok(config)
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{flag} must be a non-negative number"))
}
