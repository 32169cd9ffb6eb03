pub mod ancient;
pub mod cli;
pub mod mssel;
pub mod trajectory;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use ancient::{
    AncientSample, AncientSampleSet, EpochAxis, SampleSite, SamplingGrid, simulate_ancient_samples,
    write_ancient_samples, write_ancient_samples_to_path,
};
pub use mssel::{
    TrajFile, TrajFileError, read_trajectory, read_trajectory_from_path, write_trajectory,
    write_trajectory_to_path,
};
pub use trajectory::{
    ForwardRun, PresentDaySample, SimulatedTrajectory, Trajectory, present_day_sample,
    simulate_backward, simulate_forward, simulate_trajectory, stitch,
};

// ── Parameters ───────────────────────────────────────────────────────────────

/// Selection coefficient of the backward phase. Small enough to be neutral
/// in practice while keeping `tanh(a p)` away from zero.
pub const BACKWARD_SELECTION: f64 = 1e-8;
pub const DEFAULT_MAF_THRESHOLD: f64 = 0.001;
pub const DEFAULT_MAX_BACKWARD_STEPS: usize = 10_000_000;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationParameters {
    /// Frequency seeding both phases. It sits at the junction of the
    /// stitched path, `onset` generations before the simulated present.
    pub present_frequency: f64,
    pub selection_coefficient: f64,
    /// Effective population size N; one step covers `1 / (4N)` diffusion time.
    pub population_size: f64,
    /// Generations before present at which selection switches on.
    pub onset: usize,
    /// Generations before present at which selection switches off.
    pub offset: usize,
    /// Minor-allele frequency below which the forward phase reports a
    /// diagnostic.
    pub maf_threshold: f64,
    pub backward_selection: f64,
    /// Upper bound on backward steps before giving up on absorption.
    pub max_backward_steps: usize,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            present_frequency: 0.5,
            selection_coefficient: 0.0,
            population_size: 10_000.0,
            onset: 0,
            offset: 0,
            maf_threshold: DEFAULT_MAF_THRESHOLD,
            backward_selection: BACKWARD_SELECTION,
            max_backward_steps: DEFAULT_MAX_BACKWARD_STEPS,
        }
    }
}

impl SimulationParameters {
    /// Diffusion time elapsed per step, `1 / (4N)`.
    pub fn delta(&self) -> f64 {
        1.0 / (4.0 * self.population_size)
    }

    pub fn validate(&self) -> Result<(), TrajectoryError> {
        if !(0.0..=1.0).contains(&self.present_frequency) {
            return Err(TrajectoryError::invalid(
                "present_frequency",
                self.present_frequency,
                "must lie in [0, 1]",
            ));
        }
        if !self.selection_coefficient.is_finite() {
            return Err(TrajectoryError::invalid(
                "selection_coefficient",
                self.selection_coefficient,
                "must be finite",
            ));
        }
        if !(self.population_size.is_finite() && self.population_size > 0.0) {
            return Err(TrajectoryError::invalid(
                "population_size",
                self.population_size,
                "must be finite and positive",
            ));
        }
        if self.offset > self.onset {
            return Err(TrajectoryError::invalid(
                "offset",
                self.offset as f64,
                "must not exceed onset",
            ));
        }
        if !(0.0..=0.5).contains(&self.maf_threshold) {
            return Err(TrajectoryError::invalid(
                "maf_threshold",
                self.maf_threshold,
                "must lie in [0, 0.5]",
            ));
        }
        if !self.backward_selection.is_finite() {
            return Err(TrajectoryError::invalid(
                "backward_selection",
                self.backward_selection,
                "must be finite",
            ));
        }
        if self.max_backward_steps == 0 {
            return Err(TrajectoryError::invalid(
                "max_backward_steps",
                0.0,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// The backward phase hit its step limit before reaching 0 or 1.
    #[error("backward phase did not absorb within {steps} steps (last frequency {last_frequency})")]
    NotAbsorbed { steps: usize, last_frequency: f64 },
    #[error("distribution error: {0}")]
    Distribution(String),
    #[error("trajectory is empty")]
    EmptyTrajectory,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrajectoryError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

// ── Diagnostics ──────────────────────────────────────────────────────────────

/// Non-fatal conditions reported alongside a result. The simulation is
/// never aborted or retried because of one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The forward phase ended with `min(p, 1 - p)` below the threshold.
    LowMinorAlleleFrequency { maf: f64, threshold: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowMinorAlleleFrequency { maf, threshold } => {
                write!(f, "MAF {maf:.6} less than {threshold:.4}")
            }
        }
    }
}

// ── Diffusion step ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drift {
    /// Time-reversed drift conditioned on loss, `-a p (1-p) / tanh(a p)`.
    Backward { a: f64 },
    /// Genic selection `a p (1-p)`; `a = 0` is neutral.
    Forward { a: f64 },
}

impl Drift {
    pub fn term(&self, p: f64) -> f64 {
        match *self {
            Self::Backward { a } => {
                let ap = a * p;
                if ap == 0.0 {
                    // limit of x / tanh(x) as x -> 0
                    -(1.0 - p)
                } else {
                    -ap * (1.0 - p) / ap.tanh()
                }
            }
            Self::Forward { a } => a * p * (1.0 - p),
        }
    }
}

/// One Euler-Maruyama step of the Wright-Fisher diffusion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffusionStepper {
    delta: f64,
}

impl DiffusionStepper {
    pub fn new(population_size: f64) -> Self {
        Self {
            delta: 1.0 / (4.0 * population_size),
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Draws `N(p + drift(p) δ, δ p (1-p))` and truncates the draw to [0, 1].
    /// Draws outside the unit interval are clamped, never resampled.
    pub fn step<R: Rng + ?Sized>(&self, p: f64, drift: Drift, rng: &mut R) -> f64 {
        let mean = p + drift.term(p) * self.delta;
        let sd = (self.delta * p * (1.0 - p)).sqrt();
        let z: f64 = rng.sample(StandardNormal);
        (mean + sd * z).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn default_parameters_are_valid() {
        assert!(SimulationParameters::default().validate().is_ok());
    }

    #[test]
    fn delta_is_one_over_four_n() {
        let params = SimulationParameters {
            population_size: 2500.0,
            ..SimulationParameters::default()
        };
        assert_relative_eq!(params.delta(), 1e-4);
        assert_relative_eq!(DiffusionStepper::new(2500.0).delta(), 1e-4);
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        let base = SimulationParameters::default();
        let cases = [
            SimulationParameters {
                present_frequency: 1.5,
                ..base.clone()
            },
            SimulationParameters {
                present_frequency: f64::NAN,
                ..base.clone()
            },
            SimulationParameters {
                population_size: 0.0,
                ..base.clone()
            },
            SimulationParameters {
                population_size: -10.0,
                ..base.clone()
            },
            SimulationParameters {
                selection_coefficient: f64::INFINITY,
                ..base.clone()
            },
            SimulationParameters {
                onset: 10,
                offset: 20,
                ..base.clone()
            },
            SimulationParameters {
                maf_threshold: 0.7,
                ..base.clone()
            },
            SimulationParameters {
                max_backward_steps: 0,
                ..base.clone()
            },
        ];
        for params in cases {
            assert!(
                matches!(
                    params.validate(),
                    Err(TrajectoryError::InvalidParameter { .. })
                ),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn boundary_frequencies_are_valid() {
        for p in [0.0, 1.0] {
            let params = SimulationParameters {
                present_frequency: p,
                ..SimulationParameters::default()
            };
            assert!(params.validate().is_ok());
        }
    }

    #[test]
    fn forward_drift_matches_genic_selection() {
        let drift = Drift::Forward { a: 200.0 };
        assert_relative_eq!(drift.term(0.25), 200.0 * 0.25 * 0.75);
        assert_eq!(Drift::Forward { a: 0.0 }.term(0.3), 0.0);
    }

    #[test]
    fn backward_drift_approaches_neutral_limit() {
        let p = 0.3;
        let tiny = Drift::Backward {
            a: 2.0 * BACKWARD_SELECTION * 10_000.0,
        };
        assert_relative_eq!(tiny.term(p), -(1.0 - p), epsilon = 1e-8);
        assert_relative_eq!(Drift::Backward { a: 0.0 }.term(p), -(1.0 - p));
    }

    #[test]
    fn step_stays_in_unit_interval() {
        let mut rng = SmallRng::seed_from_u64(7);
        // Tiny N makes the noise large enough to overshoot both boundaries.
        let stepper = DiffusionStepper::new(1.0);
        let mut hit_boundary = false;
        for i in 0..2_000 {
            let p = (i % 99 + 1) as f64 / 100.0;
            let next = stepper.step(p, Drift::Forward { a: 0.0 }, &mut rng);
            assert!((0.0..=1.0).contains(&next));
            hit_boundary |= next == 0.0 || next == 1.0;
        }
        assert!(hit_boundary, "clamping never triggered");
    }

    #[test]
    fn step_at_boundary_is_absorbing_without_drift() {
        let mut rng = SmallRng::seed_from_u64(1);
        let stepper = DiffusionStepper::new(100.0);
        assert_eq!(stepper.step(0.0, Drift::Forward { a: 50.0 }, &mut rng), 0.0);
        assert_eq!(stepper.step(1.0, Drift::Forward { a: 50.0 }, &mut rng), 1.0);
    }

    #[test]
    fn diagnostic_message_mentions_threshold() {
        let d = Diagnostic::LowMinorAlleleFrequency {
            maf: 0.0,
            threshold: 0.001,
        };
        assert_eq!(d.to_string(), "MAF 0.000000 less than 0.0010");
    }
}
