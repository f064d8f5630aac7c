//! CLI tests for the `backdate` binary

mod common;

use assert_cmd::Command;
use common::fixtures::TestRepo;
use predicates::prelude::*;

fn backdate() -> Command {
    let mut cmd = Command::cargo_bin("backdate").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_calendar_json_excludes_rest_days_and_holidays() {
    let output = backdate()
        .args([
            "calendar", "--start", "2024-01-01", "--end", "2024-01-07", "--region", "us", "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let days: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(days.len(), 7);

    let eligible: Vec<&str> = days
        .iter()
        .filter(|d| d["eligible"] == true)
        .map(|d| d["date"].as_str().unwrap())
        .collect();
    // Jan 1 is New Year's Day, Jan 7 is a Sunday
    assert_eq!(
        eligible,
        vec!["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05", "2024-01-06"]
    );
}

#[test]
fn test_calendar_rejects_reversed_range() {
    backdate()
        .args(["calendar", "--start", "2024-02-01", "--end", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("after end date"));
}

#[test]
fn test_plan_json_is_reproducible_with_seed() {
    let args = [
        "plan", "--start", "2024-01-01", "--end", "2024-01-31", "--branches", "4", "--commits",
        "10", "--seed", "42", "--json",
    ];
    let first = backdate().args(args).output().unwrap();
    let second = backdate().args(args).output().unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let plan: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    let assignments = plan["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 4);

    let total: u64 = assignments
        .iter()
        .map(|a| a["commit_count"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 10);
    assert!(
        assignments
            .iter()
            .all(|a| a["branch_name"].as_str().unwrap().starts_with("backdate/"))
    );
}

#[test]
fn test_plan_clamps_branches_to_eligible_dates() {
    // Mon 2024-01-08 .. Wed 2024-01-10: three eligible dates
    backdate()
        .args([
            "plan", "--start", "2024-01-08", "--end", "2024-01-10", "--branches", "5", "--commits",
            "6",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Branch count reduced from 5 to 3"));
}

#[test]
fn test_plan_rejects_commits_below_branches() {
    backdate()
        .args([
            "plan", "--start", "2024-01-01", "--end", "2024-01-31", "--branches", "5", "--commits",
            "2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("commit count"));
}

#[test]
fn test_run_requires_confirmation_when_not_interactive() {
    let fixture = TestRepo::new();
    backdate()
        .arg("--path")
        .arg(&fixture.work)
        .args([
            "run", "--start", "2024-01-02", "--end", "2024-01-05", "--branches", "1", "--commits",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    assert_eq!(fixture.remote_branches(), vec!["main".to_string()]);
}

#[test]
fn test_run_dry_run_reports_without_pushing() {
    let fixture = TestRepo::new();
    backdate()
        .arg("--path")
        .arg(&fixture.work)
        .args([
            "run", "--start", "2024-01-02", "--end", "2024-01-05", "--branches", "2", "--commits",
            "3", "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert_eq!(fixture.remote_branches(), vec!["main".to_string()]);
}

#[test]
fn test_run_pushes_branches_with_yes() {
    let fixture = TestRepo::new();
    backdate()
        .arg("--path")
        .arg(&fixture.work)
        .args([
            "run", "--start", "2024-01-02", "--end", "2024-01-05", "--branches", "2", "--commits",
            "3", "--seed", "1", "--yes", "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"event\":\"summary\""));

    let branches = fixture.remote_branches();
    assert_eq!(branches.len(), 3);
    assert!(branches.iter().filter(|b| b.starts_with("backdate/")).count() == 2);
}
