use rand::Rng;
use rand_distr::{Binomial, Distribution};
use serde::Serialize;
use tracing::debug;

use crate::{Diagnostic, DiffusionStepper, Drift, SimulationParameters, TrajectoryError};

// ── Trajectory ───────────────────────────────────────────────────────────────

/// Allele frequencies at contiguous integer positions `0..len`.
/// Every value lies in [0, 1].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trajectory {
    frequencies: Vec<f64>,
}

impl Trajectory {
    pub fn new(frequencies: Vec<f64>) -> Result<Self, TrajectoryError> {
        if let Some(&bad) = frequencies.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(TrajectoryError::invalid(
                "frequency",
                bad,
                "must lie in [0, 1]",
            ));
        }
        Ok(Self { frequencies })
    }

    /// Caller guarantees every value is in [0, 1]; the simulators clamp.
    pub(crate) fn from_clamped(frequencies: Vec<f64>) -> Self {
        debug_assert!(frequencies.iter().all(|p| (0.0..=1.0).contains(p)));
        Self { frequencies }
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.frequencies.get(index).copied()
    }

    pub fn first(&self) -> Option<f64> {
        self.frequencies.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.frequencies.last().copied()
    }

    /// `(position, frequency)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.frequencies.iter().copied().enumerate()
    }

    pub fn reversed(&self) -> Self {
        let mut frequencies = self.frequencies.clone();
        frequencies.reverse();
        Self { frequencies }
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.frequencies
    }
}

// ── Backward phase ───────────────────────────────────────────────────────────

/// Runs the near-neutral diffusion back from `present_frequency` until it is
/// absorbed at exactly 0 or 1.
///
/// The seed value is not part of the result, so a seed already on a
/// boundary yields an empty trajectory. Gives up with
/// [`TrajectoryError::NotAbsorbed`] after `max_backward_steps` steps.
pub fn simulate_backward<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<Trajectory, TrajectoryError> {
    params.validate()?;
    let stepper = DiffusionStepper::new(params.population_size);
    let drift = Drift::Backward {
        a: 2.0 * params.backward_selection * params.population_size,
    };

    let mut path = Vec::new();
    let mut curr = params.present_frequency;
    while curr != 0.0 && curr != 1.0 {
        if path.len() >= params.max_backward_steps {
            return Err(TrajectoryError::NotAbsorbed {
                steps: path.len(),
                last_frequency: curr,
            });
        }
        curr = stepper.step(curr, drift, rng);
        path.push(curr);
    }
    debug!(steps = path.len(), boundary = curr, "backward phase absorbed");
    Ok(Trajectory::from_clamped(path))
}

// ── Forward phase ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct ForwardRun {
    /// `onset + 1` points, starting at the seed frequency.
    pub trajectory: Trajectory,
    pub diagnostic: Option<Diagnostic>,
}

/// Steps the diffusion once per generation from `onset` down to 1.
/// Generation `t` feels selection `2 s N` while `t > offset` and no drift
/// afterwards.
pub fn simulate_forward<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<ForwardRun, TrajectoryError> {
    params.validate()?;
    let stepper = DiffusionStepper::new(params.population_size);
    let selected = 2.0 * params.selection_coefficient * params.population_size;

    let mut path = Vec::with_capacity(params.onset + 1);
    let mut curr = params.present_frequency;
    path.push(curr);
    for t in (1..=params.onset).rev() {
        let a = if t > params.offset { selected } else { 0.0 };
        curr = stepper.step(curr, Drift::Forward { a }, rng);
        path.push(curr);
    }

    let maf = curr.min(1.0 - curr);
    let diagnostic = (maf < params.maf_threshold).then_some(Diagnostic::LowMinorAlleleFrequency {
        maf,
        threshold: params.maf_threshold,
    });
    debug!(points = path.len(), terminal = curr, "forward phase done");
    Ok(ForwardRun {
        trajectory: Trajectory::from_clamped(path),
        diagnostic,
    })
}

// ── Stitching ────────────────────────────────────────────────────────────────

/// `reverse(forward) ++ backward`: simulated present first, the seed value at
/// position `forward.len() - 1`, then the backward phase into the past.
pub fn stitch(forward: Trajectory, backward: Trajectory) -> Trajectory {
    let mut frequencies = forward.into_inner();
    frequencies.reverse();
    frequencies.extend(backward.into_inner());
    Trajectory::from_clamped(frequencies)
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedTrajectory {
    pub trajectory: Trajectory,
    /// Position of the seed frequency in `trajectory`.
    pub junction: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Backward phase, then forward phase, then [`stitch`].
pub fn simulate_trajectory<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<SimulatedTrajectory, TrajectoryError> {
    let backward = simulate_backward(params, rng)?;
    let forward = simulate_forward(params, rng)?;
    let junction = forward.trajectory.len() - 1;
    let trajectory = stitch(forward.trajectory, backward);
    debug!(len = trajectory.len(), junction, "trajectory stitched");
    Ok(SimulatedTrajectory {
        trajectory,
        junction,
        diagnostics: forward.diagnostic.into_iter().collect(),
    })
}

// ── Present-day sample ───────────────────────────────────────────────────────

/// Derived/ancestral chromosome counts of a modern sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PresentDaySample {
    pub derived: u64,
    pub ancestral: u64,
}

/// Draws `derived ~ Binomial(n_chromosomes, trajectory[0])`.
pub fn present_day_sample<R: Rng + ?Sized>(
    trajectory: &Trajectory,
    n_chromosomes: u64,
    rng: &mut R,
) -> Result<PresentDaySample, TrajectoryError> {
    let p = trajectory.first().ok_or(TrajectoryError::EmptyTrajectory)?;
    let binomial = Binomial::new(n_chromosomes, p)
        .map_err(|e| TrajectoryError::Distribution(e.to_string()))?;
    let derived = binomial.sample(rng);
    Ok(PresentDaySample {
        derived,
        ancestral: n_chromosomes - derived,
    })
}
