//! Test fixtures: real git repositories in temp directories

#![allow(dead_code)]

use backdate::repo::GitRepo;
use backdate::types::{Assignment, branch_name};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A working copy cloned from a local bare remote
pub struct TestRepo {
    /// Keeps every directory alive
    pub dir: TempDir,
    /// Bare remote
    pub remote: PathBuf,
    /// Working copy
    pub work: PathBuf,
}

/// Run git in `dir`, panicking with stderr on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Test Author"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

impl TestRepo {
    /// Bare remote plus a clone with one commit on `main`
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote.git");
        let work = dir.path().join("work");

        git(
            dir.path(),
            &["init", "--bare", "--initial-branch=main", remote.to_str().unwrap()],
        );
        git(
            dir.path(),
            &["clone", remote.to_str().unwrap(), work.to_str().unwrap()],
        );
        configure_identity(&work);
        git(&work, &["checkout", "-B", "main"]);

        std::fs::write(work.join("README.md"), "# test\n").unwrap();
        git(&work, &["add", "README.md"]);
        git(&work, &["commit", "-m", "Initial commit"]);
        git(&work, &["push", "-u", "origin", "main"]);

        Self { dir, remote, work }
    }

    /// Open the working copy
    pub fn open(&self) -> GitRepo {
        GitRepo::open(&self.work, "origin").unwrap()
    }

    /// A second clone of the remote, e.g. to simulate someone else pushing
    pub fn second_clone(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        git(
            self.dir.path(),
            &["clone", self.remote.to_str().unwrap(), path.to_str().unwrap()],
        );
        configure_identity(&path);
        path
    }

    /// Commit a file in `dir` and push the current branch
    pub fn commit_and_push(dir: &Path, file: &str, content: &str, message: &str) {
        std::fs::write(dir.join(file), content).unwrap();
        git(dir, &["add", file]);
        git(dir, &["commit", "-m", message]);
        git(dir, &["push", "origin", "HEAD"]);
    }

    /// Branch names on the remote
    pub fn remote_branches(&self) -> Vec<String> {
        git(&self.remote, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// `git log` of a remote branch in `format`
    pub fn remote_log(&self, branch: &str, format: &str) -> Vec<String> {
        git(
            &self.remote,
            &["log", &format!("--format={format}"), branch],
        )
        .lines()
        .map(ToString::to_string)
        .collect()
    }
}

/// Date helper
pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Assignment for a date
pub fn make_assignment(date: NaiveDate, commit_count: usize) -> Assignment {
    Assignment {
        date,
        branch_name: branch_name(date),
        commit_count,
    }
}
