use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use relief_pyramid::dataset::write_level;
use relief_pyramid::{LevelDescriptor, SampleType};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A 16x32 grid at 11.25 degrees written as `source.bin` + `.hdr`
fn write_source(dir: &Path) -> PathBuf {
    let descriptor = LevelDescriptor::global(16, 32, 11.25, SampleType::I16);
    let samples: Vec<i16> = (0..descriptor.num_samples()).map(|i| (i % 97) as i16).collect();
    write_level(dir, "source", &descriptor, &samples).expect("source level should be written").path
}

fn build_dataset(root: &Path) -> PathBuf {
    let input = write_source(root);
    let out = root.join("pyramid");
    cargo_bin_cmd!("relief")
        .arg("build")
        .arg(&input)
        .arg(&out)
        .arg("--max-dim")
        .arg("8")
        .assert()
        .success();
    out
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line should be json"))
        .collect()
}

#[test]
fn build_writes_halved_levels() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = write_source(temp.path());
    let out = temp.path().join("pyramid");

    let output = cargo_bin_cmd!("relief")
        .arg("build")
        .arg(&input)
        .arg(&out)
        .arg("--max-dim")
        .arg("8")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    let levels = value.as_array().expect("build should print an array");
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[2]["rows"], 4);
    assert_eq!(levels[2]["cols"], 8);
    assert_eq!(levels[2]["cell_size_deg"], 45.0);
    assert!(out.join("L2.bin").is_file());
    assert!(out.join("L2.hdr").is_file());
}

#[test]
fn inspect_emits_level_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let dataset = build_dataset(temp.path());

    let output = cargo_bin_cmd!("relief")
        .arg("inspect")
        .arg(&dataset)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    let first = &value[0];
    assert_eq!(first["rows"], 16);
    assert_eq!(first["cols"], 32);
    assert_eq!(first["sample_type"], "i16");
    assert_eq!(first["byte_order"], "little");
    assert_eq!(first["bounds"]["north"], 90.0);
    assert_eq!(first["bounds"]["west"], -180.0);
}

#[test]
fn simulate_draws_after_one_frame() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let dataset = build_dataset(temp.path());

    let output = cargo_bin_cmd!("relief")
        .arg("simulate")
        .arg(&dataset)
        .args(["--north", "45", "--south", "-45", "--west", "-90", "--east", "90"])
        .args(["--level", "0", "--frames", "3", "--perf-level", "0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines = json_lines(&output);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["drawn"].as_array().map(Vec::len), Some(0));
    assert_eq!(lines[1]["drawn"][0], "L0/B0/T0");
    assert_eq!(lines[1]["stats"]["transfers"], 1);

    let summary = &lines[3];
    assert_eq!(summary["disposed"], true);
    assert_eq!(summary["live_textures"], 0);
    assert_eq!(summary["live_host_buffers"], 0);
}

#[test]
fn simulate_picks_level_from_pixel_size() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let dataset = build_dataset(temp.path());

    let output = cargo_bin_cmd!("relief")
        .arg("simulate")
        .arg(&dataset)
        .args(["--north", "10", "--south", "-10", "--west", "-10", "--east", "10"])
        .args(["--pixel-size", "20", "--frames", "1", "--perf-level", "0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines = json_lines(&output);
    assert_eq!(lines[0]["level"], 1);
}

#[test]
fn simulate_requires_a_level_choice() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("relief")
        .arg("simulate")
        .arg(temp.path())
        .args(["--north", "10", "--south", "-10", "--west", "-10", "--east", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--level"));
}

#[test]
fn simulate_rejects_empty_view() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let dataset = build_dataset(temp.path());

    cargo_bin_cmd!("relief")
        .arg("simulate")
        .arg(&dataset)
        .args(["--north", "-10", "--south", "10", "--west", "-10", "--east", "10"])
        .args(["--level", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("view is empty"));
}

#[test]
fn inspect_fails_for_missing_dataset() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("relief")
        .arg("inspect")
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open dataset"));
}

#[test]
fn build_fails_for_missing_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("relief")
        .arg("build")
        .arg(temp.path().join("missing.bin"))
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("relief")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
