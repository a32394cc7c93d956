use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tmr_rs::testing;

fn tmrlab() -> Command {
    Command::cargo_bin("tmrlab").unwrap()
}

/// Command rooted at `dir` for both data and results.
fn tmrlab_in(dir: &Path) -> Command {
    let mut cmd = tmrlab();
    cmd.env_remove("TMR_DATA_DIR")
        .env_remove("TMR_RESULTS_DIR")
        .arg("--data-dir")
        .arg(dir)
        .arg("--results-dir")
        .arg(dir.join("results"));
    cmd
}

fn write_lucidity_table(dir: &Path) {
    let mut text = String::from("participant_id,had_lucid,tmr_condition\n");
    for i in 0..30 {
        let condition = if i < 15 { "bct" } else { "svp" };
        let lucid = if i < 15 { i % 3 != 0 } else { i % 4 == 0 };
        text.push_str(&format!("{},{},{}\n", i, lucid as u8, condition));
    }
    fs::write(dir.join("bct_tmr_data.csv"), text).unwrap();
}

/// Two-channel EDF with ten one-second records at 50 Hz.
fn write_edf(path: &Path) {
    let ramp: Vec<i16> = (0..500).map(|i| i as i16).collect();
    testing::write_edf(path, 50, &[("Cz", &ramp[..]), ("RESP", &ramp[..])], &[]).unwrap();
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    tmrlab()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    tmrlab()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tmrlab"));
}

#[test]
fn test_help_lists_analyses() {
    tmrlab()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chi-square"))
        .stdout(predicate::str::contains("rrv-ttest"))
        .stdout(predicate::str::contains("bct-accuracy"));
}

#[test]
fn test_stage_requires_subject() {
    tmrlab()
        .arg("stage")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--subject"));
}

// =============================================================================
// CHI-SQUARE
// =============================================================================

#[test]
fn test_chi_square_writes_results() {
    let tmp = TempDir::new().unwrap();
    write_lucidity_table(tmp.path());

    tmrlab_in(tmp.path())
        .arg("chi-square")
        .arg("--no-plot")
        .assert()
        .success()
        .stdout(predicate::str::contains("p-value"));

    let text = fs::read_to_string(tmp.path().join("results/ChiSquareAnalysisResults.csv")).unwrap();
    assert!(text.starts_with("Statistic,"));
    assert!(text.contains("DOF"));
}

#[test]
fn test_chi_square_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    write_lucidity_table(tmp.path());
    let results = tmp.path().join("results/ChiSquareAnalysisResults.csv");

    tmrlab_in(tmp.path()).arg("chi-square").arg("--no-plot").assert().success();
    let first = fs::read(&results).unwrap();
    tmrlab_in(tmp.path()).arg("chi-square").arg("--no-plot").assert().success();
    let second = fs::read(&results).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_chi_square_json() {
    let tmp = TempDir::new().unwrap();
    write_lucidity_table(tmp.path());

    let output = tmrlab_in(tmp.path())
        .arg("chi-square")
        .arg("--no-plot")
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed.get("dof").unwrap(), 1);
    assert_eq!(parsed.get("sample_size").unwrap(), 30);
}

#[test]
fn test_chi_square_json_to_file() {
    let tmp = TempDir::new().unwrap();
    write_lucidity_table(tmp.path());
    let summary = tmp.path().join("summary.json");

    tmrlab_in(tmp.path())
        .arg("chi-square")
        .arg("--no-plot")
        .arg("--json")
        .arg("--output")
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(parsed.get("sample_size").unwrap(), 30);
}

#[test]
fn test_output_requires_json() {
    tmrlab()
        .arg("chi-square")
        .arg("--output")
        .arg("summary.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--json"));
}

#[test]
fn test_chi_square_missing_input() {
    let tmp = TempDir::new().unwrap();

    tmrlab_in(tmp.path())
        .arg("chi-square")
        .arg("--no-plot")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_chi_square_explicit_input() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("elsewhere");
    fs::create_dir(&data).unwrap();
    write_lucidity_table(&data);

    tmrlab_in(tmp.path())
        .arg("chi-square")
        .arg("--input")
        .arg(data.join("bct_tmr_data.csv"))
        .arg("--no-plot")
        .assert()
        .success();
}

// =============================================================================
// BCT ACCURACY / RRV T-TEST
// =============================================================================

#[test]
fn test_bct_accuracy() {
    let tmp = TempDir::new().unwrap();
    let mut text = String::from("participant_id,acquisition_id,cycle,accuracy\n");
    for (p, (pre, post)) in [(1, 3), (2, 2), (0, 3), (2, 4)].iter().enumerate() {
        for (acq, n_correct) in [("acq-pre", pre), ("acq-post", post)] {
            for cycle in 0..5 {
                let acc = if cycle < *n_correct { "correct" } else { "undershoot" };
                text.push_str(&format!("sub-{:03},{},{},{}\n", p, acq, cycle, acc));
            }
        }
    }
    fs::write(tmp.path().join("task-bct_agg.csv"), text).unwrap();

    tmrlab_in(tmp.path())
        .arg("bct-accuracy")
        .arg("--no-plot")
        .assert()
        .success()
        .stdout(predicate::str::contains("Participants: 4"));

    assert!(tmp.path().join("results/tmr_t-test_results.csv").exists());
    assert!(tmp.path().join("results/tmr_wilcoxon_results.csv").exists());
}

#[test]
fn test_rrv_ttest() {
    let tmp = TempDir::new().unwrap();
    let results = tmp.path().join("results");
    fs::create_dir(&results).unwrap();
    for (sub, cue, uncued) in [("001", 3.0, 2.0), ("002", 2.5, 2.4), ("003", 4.0, 2.5)] {
        fs::write(
            results.join(format!("rrv_table_sub-{}_0.csv", sub)),
            format!("measure,bct,cue,uncued\nRRV_RMSSD,1.0,{},{}\n", cue, uncued),
        )
        .unwrap();
    }

    let output = tmrlab_in(tmp.path())
        .arg("rrv-ttest")
        .arg("--no-plot")
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed.get("measure").unwrap(), "RRV_RMSSD");
    assert_eq!(parsed.get("tables").unwrap(), 3);
    assert!(results.join("rrv_t-test_results.csv").exists());
}

#[test]
fn test_rrv_ttest_without_tables() {
    let tmp = TempDir::new().unwrap();

    tmrlab_in(tmp.path())
        .arg("rrv-ttest")
        .arg("--no-plot")
        .assert()
        .failure()
        .code(2);
}

// =============================================================================
// RECORDINGS
// =============================================================================

#[test]
fn test_info_edf() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sub-001_eeg.edf");
    write_edf(&path);

    tmrlab()
        .arg("info")
        .arg("--file")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample rate: 50 Hz"))
        .stdout(predicate::str::contains("Cz, RESP"));
}

#[test]
fn test_info_json() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sub-001_eeg.edf");
    write_edf(&path);

    let output = tmrlab()
        .arg("info")
        .arg("--file")
        .arg(&path)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed.get("num_channels").unwrap(), 2);
    assert_eq!(parsed.get("num_samples").unwrap(), 500);
    assert_eq!(parsed.get("file_type").unwrap(), "EDF");
}

#[test]
fn test_info_nonexistent_file() {
    tmrlab()
        .arg("info")
        .arg("--file")
        .arg("/nonexistent/sub-001.edf")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_info_unsupported_extension() {
    let tmp = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();

    tmrlab()
        .arg("info")
        .arg("--file")
        .arg(tmp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unsupported"));
}

#[test]
fn test_stage_missing_recording() {
    let tmp = TempDir::new().unwrap();

    tmrlab_in(tmp.path())
        .arg("stage")
        .arg("--subject")
        .arg("001")
        .arg("--no-plot")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_respiration_without_recordings() {
    let tmp = TempDir::new().unwrap();

    tmrlab_in(tmp.path())
        .arg("respiration")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("no subject recordings"));
}
