use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traj_rs::*;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(about = "Draw ancient-sample genotype likelihoods from an allele frequency trajectory")]
struct Args {
    /// Present-day allele frequency.
    #[arg(long = "initial-allele-freq", visible_alias = "p0")]
    initial_allele_freq: Option<f64>,
    /// Selection coefficient.
    #[arg(short = 's', long)]
    selection_coefficient: Option<f64>,
    /// Effective population size.
    #[arg(short = 'n', long)]
    effective_population_size: Option<f64>,
    /// Time before present that selection starts.
    #[arg(long)]
    ton: Option<usize>,
    /// Time before present that selection ends.
    #[arg(long)]
    toff: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_MAX_BACKWARD_STEPS)]
    max_backward_steps: usize,
    /// Read the trajectory from an existing mssel file instead of simulating.
    #[arg(long, conflicts_with_all = ["initial_allele_freq", "selection_coefficient", "effective_population_size", "ton", "toff"])]
    trajectory_input: Option<String>,
    /// Also write the simulated trajectory as mssel input.
    #[arg(long, conflicts_with = "trajectory_input")]
    trajectory_output: Option<String>,
    /// Number of generations back the ancient samples go
    #[arg(long)]
    ancient_samples_generation_gap: usize,
    /// Number of ancient samples
    #[arg(long)]
    number_of_ancient_samples: usize,
    /// Chromosomes in the present-day sample; reports derived/ancestral counts.
    #[arg(long)]
    present_day_chromosomes: Option<u64>,
    /// Write a JSON run summary (seed, parameters, true genotypes).
    #[arg(long)]
    summary: Option<String>,
    /// Random seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "ancientSamples.txt")]
    output_file_path: String,
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunSummary<'a> {
    seed: u64,
    parameters: Option<&'a SimulationParameters>,
    trajectory_input: Option<&'a str>,
    trajectory_length: usize,
    generation_gap: usize,
    sample_count: usize,
    forced_present_day: usize,
    genotypes: &'a [u8],
    present_day: Option<PresentDaySample>,
    diagnostics: &'a [Diagnostic],
}

fn simulation_parameters(args: &Args) -> Result<SimulationParameters> {
    let (Some(p0), Some(s), Some(n), Some(ton), Some(toff)) = (
        args.initial_allele_freq,
        args.selection_coefficient,
        args.effective_population_size,
        args.ton,
        args.toff,
    ) else {
        bail!(
            "--initial-allele-freq, --selection-coefficient, --effective-population-size, \
             --ton and --toff are required unless --trajectory-input is given"
        );
    };
    Ok(SimulationParameters {
        present_frequency: p0,
        selection_coefficient: s,
        population_size: n,
        onset: ton,
        offset: toff,
        max_backward_steps: args.max_backward_steps,
        ..SimulationParameters::default()
    })
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
    let mut rng = SmallRng::seed_from_u64(random_seed);

    let (trajectory, params, diagnostics) = match &args.trajectory_input {
        Some(path) => {
            let file = read_trajectory_from_path(path)
                .with_context(|| format!("reading trajectory file {path}"))?;
            info!(seed = random_seed, points = file.len(), input = %path, "loaded trajectory");
            (file.trajectory(), None, Vec::new())
        }
        None => {
            let params = simulation_parameters(&args)?;
            info!(seed = random_seed, ?params, "simulating trajectory");
            let sim =
                simulate_trajectory(&params, &mut rng).context("trajectory simulation failed")?;
            for diagnostic in &sim.diagnostics {
                warn!("{diagnostic}");
            }
            if let Some(path) = &args.trajectory_output {
                write_trajectory_to_path(path, &sim.trajectory, params.population_size)
                    .with_context(|| format!("writing {path}"))?;
                info!(output = %path, "trajectory written");
            }
            (sim.trajectory, Some(params), sim.diagnostics)
        }
    };

    let set = simulate_ancient_samples(
        &trajectory,
        args.ancient_samples_generation_gap,
        args.number_of_ancient_samples,
        &mut rng,
    )
    .context("ancient sample simulation failed")?;
    write_ancient_samples_to_path(&args.output_file_path, &set.samples)
        .with_context(|| format!("writing {}", args.output_file_path))?;
    info!(
        samples = set.samples.len(),
        forced = set.forced_count(),
        output = %args.output_file_path,
        "ancient samples written"
    );

    let present_day = args
        .present_day_chromosomes
        .map(|n| present_day_sample(&trajectory, n, &mut rng))
        .transpose()
        .context("present-day sample failed")?;
    if let Some(sample) = present_day {
        info!(
            derived = sample.derived,
            ancestral = sample.ancestral,
            "present-day sample"
        );
    }

    if let Some(path) = &args.summary {
        let summary = RunSummary {
            seed: random_seed,
            parameters: params.as_ref(),
            trajectory_input: args.trajectory_input.as_deref(),
            trajectory_length: trajectory.len(),
            generation_gap: args.ancient_samples_generation_gap,
            sample_count: args.number_of_ancient_samples,
            forced_present_day: set.forced_count(),
            genotypes: &set.genotypes,
            present_day,
            diagnostics: &diagnostics,
        };
        let writer = BufWriter::new(File::create(path).with_context(|| format!("creating {path}"))?);
        serde_json::to_writer_pretty(writer, &summary)
            .with_context(|| format!("writing summary {path}"))?;
    }
    Ok(())
}
