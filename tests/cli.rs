//! CLI integration tests for the `step` and `ancient_samples` binaries.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;
use traj_rs::read_trajectory_from_path;

fn step_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_step"))
}

fn ancient_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ancient_samples"))
}

/// Parses every row of an ancient-sample file into floats.
fn read_rows(path: &std::path::Path) -> Vec<Vec<f64>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split(' ').map(|v| v.parse().unwrap()).collect())
        .collect()
}

#[test]
fn test_step_accepts_pipeline_p0_flag() {
    let dir = TempDir::new().unwrap();

    step_cmd()
        .current_dir(dir.path())
        .args([
            "-p0", "0.5", "-s", "0.0", "-n", "100", "--ton", "0", "--toff", "0", "--seed", "1",
        ])
        .assert()
        .success();

    // default output path
    let parsed = read_trajectory_from_path(dir.path().join("mssel.traj")).unwrap();
    assert!(!parsed.is_empty());
    // onset 0: the seed frequency is the first point
    assert_eq!(parsed.points[0], (0.0, 0.5));
}

#[test]
fn test_step_long_flags_and_output_path() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("run.traj");

    step_cmd()
        .args([
            "--initial-allele-freq",
            "0.3",
            "--selection-coefficient",
            "0.01",
            "--effective-population-size",
            "500",
            "--ton",
            "40",
            "--toff",
            "10",
            "--seed",
            "7",
            "--output-file-path",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let parsed = read_trajectory_from_path(&out).unwrap();
    assert!(parsed.len() > 40);
    assert_eq!(parsed.points[40].1, 0.3);
}

#[test]
fn test_step_same_seed_same_file() {
    let dir = TempDir::new().unwrap();
    let args = |out: &str| {
        vec![
            "-p0".to_string(),
            "0.4".into(),
            "-s".into(),
            "0.02".into(),
            "-n".into(),
            "200".into(),
            "--ton".into(),
            "30".into(),
            "--toff".into(),
            "0".into(),
            "--seed".into(),
            "99".into(),
            "--output-file-path".into(),
            out.into(),
        ]
    };
    let a = dir.path().join("a.traj");
    let b = dir.path().join("b.traj");
    step_cmd().args(args(a.to_str().unwrap())).assert().success();
    step_cmd().args(args(b.to_str().unwrap())).assert().success();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn test_step_rejects_offset_after_onset() {
    let dir = TempDir::new().unwrap();

    step_cmd()
        .current_dir(dir.path())
        .args([
            "-p0", "0.5", "-s", "0.01", "-n", "100", "--ton", "5", "--toff", "20",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("offset"));

    assert!(!dir.path().join("mssel.traj").exists());
}

#[test]
fn test_ancient_samples_simulated_run_with_summary() {
    let dir = TempDir::new().unwrap();

    ancient_cmd()
        .current_dir(dir.path())
        .args([
            "-p0",
            "0.3",
            "-s",
            "0.01",
            "-n",
            "500",
            "--ton",
            "150",
            "--toff",
            "20",
            "--ancient-samples-generation-gap",
            "100",
            "--number-of-ancient-samples",
            "40",
            "--present-day-chromosomes",
            "24",
            "--trajectory-output",
            "mssel.traj",
            "--summary",
            "summary.json",
            "--seed",
            "11",
        ])
        .assert()
        .success();

    // default output path
    let rows = read_rows(&dir.path().join("ancientSamples.txt"));
    assert_eq!(rows.len(), 40);
    for row in &rows {
        assert_eq!(row.len(), 4);
        assert!((0.0..100.0).contains(&row[0]));
        assert_eq!(row[1..].iter().filter(|l| l.is_finite()).count(), 1);
    }

    let trajectory = read_trajectory_from_path(dir.path().join("mssel.traj")).unwrap();
    assert_eq!(trajectory.points[150].1, 0.3);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["seed"], 11);
    assert_eq!(summary["sample_count"], 40);
    assert_eq!(summary["trajectory_length"], trajectory.len());
    assert_eq!(summary["parameters"]["onset"], 150);
    let genotypes = summary["genotypes"].as_array().unwrap();
    let forced = summary["forced_present_day"].as_u64().unwrap() as usize;
    assert_eq!(genotypes.len() + forced, 40);
    assert!(genotypes.iter().all(|g| g.as_u64().unwrap() <= 2));
    let derived = summary["present_day"]["derived"].as_u64().unwrap();
    let ancestral = summary["present_day"]["ancestral"].as_u64().unwrap();
    assert_eq!(derived + ancestral, 24);
}

#[test]
fn test_ancient_samples_from_trajectory_input() {
    let dir = TempDir::new().unwrap();

    step_cmd()
        .current_dir(dir.path())
        .args([
            "-p0", "0.5", "-s", "0.0", "-n", "300", "--ton", "60", "--toff", "0", "--seed", "3",
        ])
        .assert()
        .success();

    ancient_cmd()
        .current_dir(dir.path())
        .args([
            "--trajectory-input",
            "mssel.traj",
            "--ancient-samples-generation-gap",
            "50",
            "--number-of-ancient-samples",
            "20",
            "--output-file-path",
            "samples.txt",
            "--summary",
            "summary.json",
            "--seed",
            "5",
        ])
        .assert()
        .success();

    assert_eq!(read_rows(&dir.path().join("samples.txt")).len(), 20);
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert!(summary["parameters"].is_null());
    assert_eq!(summary["trajectory_input"], "mssel.traj");
    assert!(summary["present_day"].is_null());
}

#[test]
fn test_ancient_samples_requires_simulation_flags() {
    let dir = TempDir::new().unwrap();

    ancient_cmd()
        .current_dir(dir.path())
        .args([
            "-p0",
            "0.5",
            "--ancient-samples-generation-gap",
            "10",
            "--number-of-ancient-samples",
            "5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required unless --trajectory-input"));

    assert!(!dir.path().join("ancientSamples.txt").exists());
}

#[test]
fn test_ancient_samples_trajectory_input_conflicts_with_simulation_flags() {
    let dir = TempDir::new().unwrap();

    ancient_cmd()
        .current_dir(dir.path())
        .args([
            "--trajectory-input",
            "mssel.traj",
            "-p0",
            "0.5",
            "--ancient-samples-generation-gap",
            "10",
            "--number-of-ancient-samples",
            "5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
