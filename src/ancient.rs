//! Synthetic ancient samples drawn from a stitched trajectory.
//!
//! Each sample is a sampling time in generations before present plus a
//! genotype log-likelihood vector that puts all mass on one genotype.

use rand::Rng;
use rand::distr::{Distribution, Uniform};
use rand_distr::Binomial;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::{Trajectory, TrajectoryError};

/// Genotype assigned to samples in the forced present-day case.
pub const FORCED_GENOTYPE: u8 = 0;

// ── Epoch axis ───────────────────────────────────────────────────────────────

/// `generation_gap` evenly spaced points over `[0, generation_gap]`, both
/// ends included. Only used to bin sampling times.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochAxis {
    points: Vec<f64>,
}

impl EpochAxis {
    pub fn new(generation_gap: usize) -> Self {
        let stop = generation_gap as f64;
        let points = match generation_gap {
            0 => Vec::new(),
            1 => vec![0.0],
            n => {
                let step = stop / (n - 1) as f64;
                let mut points: Vec<f64> = (0..n).map(|j| j as f64 * step).collect();
                points[n - 1] = stop;
                points
            }
        };
        Self { points }
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Number of epoch points `<= t`.
    pub fn bin(&self, t: f64) -> usize {
        self.points.partition_point(|&e| e <= t)
    }
}

// ── Sampling ─────────────────────────────────────────────────────────────────

/// Where a sampling time lands on the trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSite {
    /// Within one generation of the present end of the sampling window.
    /// The genotype is fixed to [`FORCED_GENOTYPE`] without a lookup.
    ForcedPresentDay,
    Frequency(f64),
}

/// Step function from sampling time to trajectory frequency.
#[derive(Clone, Debug)]
pub struct SamplingGrid<'a> {
    trajectory: &'a Trajectory,
    epochs: EpochAxis,
    generation_gap: usize,
}

impl<'a> SamplingGrid<'a> {
    pub fn new(trajectory: &'a Trajectory, generation_gap: usize) -> Result<Self, TrajectoryError> {
        if generation_gap == 0 {
            return Err(TrajectoryError::invalid(
                "generation_gap",
                0.0,
                "must be at least 1",
            ));
        }
        if trajectory.is_empty() {
            return Err(TrajectoryError::EmptyTrajectory);
        }
        Ok(Self {
            trajectory,
            epochs: EpochAxis::new(generation_gap),
            generation_gap,
        })
    }

    pub fn epochs(&self) -> &EpochAxis {
        &self.epochs
    }

    /// Frequency at position `bin(t) + 1` of the trajectory.
    ///
    /// Times at or beyond `generation_gap - 1` are the forced present-day
    /// case. Positions past the end of the trajectory read its last value,
    /// the absorbing boundary.
    pub fn frequency_at_generation(&self, t: f64) -> SampleSite {
        if t >= (self.generation_gap - 1) as f64 {
            return SampleSite::ForcedPresentDay;
        }
        let idx = self.epochs.bin(t) + 1;
        let freqs = self.trajectory.frequencies();
        SampleSite::Frequency(freqs[idx.min(freqs.len() - 1)])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AncientSample {
    pub sampling_time: f64,
    /// `[ln P(0), ln P(1), ln P(2)]` over derived-allele copies.
    pub log_likelihoods: [f64; 3],
}

impl AncientSample {
    /// A sample whose genotype is known with certainty.
    pub fn certain(sampling_time: f64, genotype: u8) -> Self {
        let mut log_likelihoods = [f64::NEG_INFINITY; 3];
        log_likelihoods[genotype as usize] = 0.0;
        Self {
            sampling_time,
            log_likelihoods,
        }
    }

    pub fn genotype(&self) -> Option<u8> {
        self.log_likelihoods
            .iter()
            .position(|&l| l == 0.0)
            .map(|g| g as u8)
    }

    pub fn row(&self) -> [f64; 4] {
        let [l0, l1, l2] = self.log_likelihoods;
        [self.sampling_time, l0, l1, l2]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AncientSampleSet {
    /// Sorted by sampling time.
    pub samples: Vec<AncientSample>,
    /// True genotypes of the samples that were drawn from the trajectory.
    /// Forced present-day samples are left out, so this can be shorter
    /// than `samples`.
    pub genotypes: Vec<u8>,
}

impl AncientSampleSet {
    pub fn forced_count(&self) -> usize {
        self.samples.len() - self.genotypes.len()
    }
}

/// Draws `sample_count` sampling times uniformly on `[0, generation_gap)`,
/// sorts them, and draws a genotype `Binomial(2, p)` for each from the
/// trajectory.
pub fn simulate_ancient_samples<R: Rng + ?Sized>(
    trajectory: &Trajectory,
    generation_gap: usize,
    sample_count: usize,
    rng: &mut R,
) -> Result<AncientSampleSet, TrajectoryError> {
    let grid = SamplingGrid::new(trajectory, generation_gap)?;
    let uniform = Uniform::new(0.0, generation_gap as f64)
        .map_err(|e| TrajectoryError::Distribution(e.to_string()))?;
    let mut times: Vec<f64> = (0..sample_count).map(|_| uniform.sample(rng)).collect();
    times.sort_by(f64::total_cmp);

    let mut set = AncientSampleSet {
        samples: Vec::with_capacity(sample_count),
        genotypes: Vec::with_capacity(sample_count),
    };
    for t in times {
        let genotype = match grid.frequency_at_generation(t) {
            SampleSite::ForcedPresentDay => FORCED_GENOTYPE,
            SampleSite::Frequency(p) => {
                let binomial = Binomial::new(2, p)
                    .map_err(|e| TrajectoryError::Distribution(e.to_string()))?;
                let g = binomial.sample(rng) as u8;
                set.genotypes.push(g);
                g
            }
        };
        set.samples.push(AncientSample::certain(t, genotype));
    }
    Ok(set)
}

// ── Output ───────────────────────────────────────────────────────────────────

/// C `%.18e`: 18 fractional digits and an at-least-two-digit signed
/// exponent, e.g. `1.500000000000000000e+01`.
fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.18e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => format!("{mantissa}e{exponent:+03}"),
            Err(_) => formatted,
        },
        None => formatted,
    }
}

/// One space-separated row `t l0 l1 l2` per sample.
pub fn write_ancient_samples<W: Write>(mut writer: W, samples: &[AncientSample]) -> io::Result<()> {
    for sample in samples {
        let row = sample.row().map(format_scientific);
        writeln!(writer, "{}", row.join(" "))?;
    }
    Ok(())
}

pub fn write_ancient_samples_to_path<P: AsRef<Path>>(
    path: P,
    samples: &[AncientSample],
) -> Result<(), TrajectoryError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ancient_samples(&mut writer, samples)?;
    writer.flush()?;
    Ok(())
}
