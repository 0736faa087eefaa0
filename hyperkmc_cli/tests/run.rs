#![allow(missing_docs)]

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::str;

#[test]
fn bare_invocation_prints_the_usage() {
    Command::cargo_bin("hyperkmc")
        .unwrap()
        .assert()
        .failure()
        .stderr(str::contains("Usage"));
}

#[test]
fn pure_host_run_reports_zero_iqe() {
    Command::cargo_bin("hyperkmc")
        .unwrap()
        .args(["run"])
        .args(["--dimensions", "6", "6", "4"])
        .args(["--proportions", "1", "0", "0"])
        .args(["--charges", "1"])
        .args(["--recombinations", "5"])
        .args(["--step-cap", "2000000"])
        .args(["--seed", "3"])
        .assert()
        .success()
        .stdout(str::contains("IQE"))
        .stdout(str::contains("mean IQE: 0.000 %"));
}

#[test]
fn replicas_are_deterministic_under_a_fixed_seed() {
    let scratch = TempDir::new().unwrap();
    for name in ["first.json", "second.json"] {
        Command::cargo_bin("hyperkmc")
            .unwrap()
            .args(["run"])
            .args(["--dimensions", "8", "8", "5"])
            .args(["--proportions", "0.84", "0.15", "0.01"])
            .args(["--charges", "2"])
            .args(["--recombinations", "20"])
            .args(["--seed", "11"])
            .args(["--replicas", "2"])
            .arg("--positions")
            .arg(scratch.child(name).path())
            .assert()
            .success();
    }
    let first = std::fs::read_to_string(scratch.child("first.json").path()).unwrap();
    let second = std::fs::read_to_string(scratch.child("second.json").path()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("electrons"));
}
