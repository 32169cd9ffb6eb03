//! The trajectory file read by `mssel`.
//!
//! ```text
//! ntraj: 1
//! npop: 1
//! n: <points>
//! <i / 4N to 9 decimals> <frequency to 6 decimals>
//! ...
//! ```
//!
//! `mssel` parses this layout literally, so key names, line order and
//! precision must not change.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::{Trajectory, TrajectoryError};

// ── Writer ───────────────────────────────────────────────────────────────────

/// `1 / (4N)`, or an error unless `population_size` is finite and positive.
fn checked_delta(population_size: f64) -> Result<f64, TrajectoryError> {
    if !(population_size.is_finite() && population_size > 0.0) {
        return Err(TrajectoryError::invalid(
            "population_size",
            population_size,
            "must be finite and positive",
        ));
    }
    Ok(1.0 / (4.0 * population_size))
}

/// Nothing is written when `population_size` is rejected.
pub fn write_trajectory<W: Write>(
    mut writer: W,
    trajectory: &Trajectory,
    population_size: f64,
) -> Result<(), TrajectoryError> {
    let delta = checked_delta(population_size)?;
    writeln!(writer, "ntraj: 1")?;
    writeln!(writer, "npop: 1")?;
    writeln!(writer, "n: {}", trajectory.len())?;
    for (i, freq) in trajectory.iter() {
        writeln!(writer, "{:.9} {:.6}", i as f64 * delta, freq)?;
    }
    Ok(())
}

pub fn write_trajectory_to_path<P: AsRef<Path>>(
    path: P,
    trajectory: &Trajectory,
    population_size: f64,
) -> Result<(), TrajectoryError> {
    checked_delta(population_size)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_trajectory(&mut writer, trajectory, population_size)?;
    writer.flush()?;
    Ok(())
}

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TrajFileError {
    #[error("line {line}: expected `{key}: <count>`, found {found:?}")]
    Header {
        line: usize,
        key: &'static str,
        found: String,
    },
    #[error("line {line}: only single-population, single-trajectory files are supported ({key} = {value})")]
    Unsupported {
        line: usize,
        key: &'static str,
        value: usize,
    },
    #[error("line {line}: expected `<time> <frequency>`, found {found:?}")]
    Data { line: usize, found: String },
    #[error("line {line}: frequency {value} outside [0, 1]")]
    Frequency { line: usize, value: f64 },
    #[error("header declares {declared} points but the file holds {found}")]
    Count { declared: usize, found: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A parsed trajectory file. Values carry the file's rounding.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajFile {
    /// `(time in units of 4N generations, frequency)` per data line.
    pub points: Vec<(f64, f64)>,
}

impl TrajFile {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|&(t, _)| t)
    }

    /// The frequency column as a trajectory, one position per data line.
    pub fn trajectory(&self) -> Trajectory {
        Trajectory::from_clamped(self.points.iter().map(|&(_, p)| p).collect())
    }
}

fn header<I>(lines: &mut I, line: usize, key: &'static str) -> Result<usize, TrajFileError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let text = lines.next().transpose()?.unwrap_or_default();
    text.trim()
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|value| value.trim().parse().ok())
        .ok_or(TrajFileError::Header {
            line,
            key,
            found: text.clone(),
        })
}

pub fn read_trajectory<R: BufRead>(reader: R) -> Result<TrajFile, TrajFileError> {
    let mut lines = reader.lines();
    for (line, key) in [(1, "ntraj"), (2, "npop")] {
        let value = header(&mut lines, line, key)?;
        if value != 1 {
            return Err(TrajFileError::Unsupported { line, key, value });
        }
    }
    let declared = header(&mut lines, 3, "n")?;

    let mut points = Vec::with_capacity(declared);
    for (i, text) in lines.enumerate() {
        let text = text?;
        let line = i + 4;
        if text.trim().is_empty() {
            continue;
        }
        let mut fields = text.split_whitespace().map(str::parse::<f64>);
        let (time, freq) = match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(time)), Some(Ok(freq)), None) => (time, freq),
            _ => {
                return Err(TrajFileError::Data {
                    line,
                    found: text.clone(),
                });
            }
        };
        if !(0.0..=1.0).contains(&freq) {
            return Err(TrajFileError::Frequency { line, value: freq });
        }
        points.push((time, freq));
    }

    if points.len() != declared {
        return Err(TrajFileError::Count {
            declared,
            found: points.len(),
        });
    }
    Ok(TrajFile { points })
}

pub fn read_trajectory_from_path<P: AsRef<Path>>(path: P) -> Result<TrajFile, TrajFileError> {
    read_trajectory(BufReader::new(File::open(path)?))
}
