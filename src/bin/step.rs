use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traj_rs::*;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(about = "Simulate an allele frequency trajectory and write it as mssel input")]
struct Args {
    /// Present-day allele frequency.
    #[arg(long = "initial-allele-freq", visible_alias = "p0")]
    initial_allele_freq: f64,
    /// Selection coefficient.
    #[arg(short = 's', long)]
    selection_coefficient: f64,
    /// Effective population size.
    #[arg(short = 'n', long)]
    effective_population_size: f64,
    /// Time before present that selection starts.
    #[arg(long)]
    ton: usize,
    /// Time before present that selection ends.
    #[arg(long)]
    toff: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_BACKWARD_STEPS)]
    max_backward_steps: usize,
    /// Random seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "mssel.traj")]
    output_file_path: String,
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse_from(cli::legacy_args(std::env::args_os()));

    let random_seed = args
        .seed
        .unwrap_or_else(|| rand::rng().random_range(1..u64::MAX));

    let params = SimulationParameters {
        present_frequency: args.initial_allele_freq,
        selection_coefficient: args.selection_coefficient,
        population_size: args.effective_population_size,
        onset: args.ton,
        offset: args.toff,
        max_backward_steps: args.max_backward_steps,
        ..SimulationParameters::default()
    };
    info!(seed = random_seed, ?params, "simulating trajectory");

    let mut rng = SmallRng::seed_from_u64(random_seed);
    let sim = simulate_trajectory(&params, &mut rng).context("trajectory simulation failed")?;
    for diagnostic in &sim.diagnostics {
        warn!("{diagnostic}");
    }

    write_trajectory_to_path(&args.output_file_path, &sim.trajectory, params.population_size)
        .with_context(|| format!("writing {}", args.output_file_path))?;
    info!(
        points = sim.trajectory.len(),
        present = sim.trajectory.first(),
        output = %args.output_file_path,
        "trajectory written"
    );
    Ok(())
}
