//! Run configuration
//!
//! Assembled from command-line flags and validated before anything touches
//! the repository or the network.

use crate::error::{Error, Result};
use crate::pipeline::{ExecuteOptions, MergePolicy, ReviewOptions};
use crate::plan::WorkRequest;
use crate::types::{MergeMethod, Person};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Everything a `run` needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Working copy path
    pub path: PathBuf,
    /// Clone URL used when `path` is not a repository yet
    pub clone_url: Option<String>,
    /// Remote to push to
    pub remote: String,
    /// Base branch override
    pub base: Option<String>,
    /// First date (inclusive)
    pub start: NaiveDate,
    /// Last date (inclusive)
    pub end: NaiveDate,
    /// Region code for holidays
    pub region: String,
    /// Branch budget
    pub branches: usize,
    /// Commit budget
    pub commits: usize,
    /// RNG seed for a reproducible plan
    pub seed: Option<u64>,
    /// Holiday table override
    pub holidays: Option<PathBuf>,
    /// Commit identity override
    pub author: Option<Person>,
    /// `Co-authored-by` trailer
    pub co_author: Option<Person>,
    /// Open pull requests
    pub pr: bool,
    /// Merge pull requests once mergeable
    pub auto_merge: bool,
    /// Merge strategy
    pub merge_method: MergeMethod,
    /// Polling cadence
    pub merge_policy: MergePolicy,
    /// Report only
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub assume_yes: bool,
    /// Heartbeat interval, zero to disable
    pub heartbeat: Duration,
}

impl RunConfig {
    /// Partitioner input
    pub fn work_request(&self) -> WorkRequest {
        WorkRequest {
            start: self.start,
            end: self.end,
            region: self.region.to_uppercase(),
            branch_budget: self.branches,
            commit_budget: self.commits,
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.work_request().validate()?;

        if self.region.is_empty() || !self.region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Validation(format!(
                "region must be an alphanumeric code, got '{}'",
                self.region
            )));
        }
        if self.remote.trim().is_empty() {
            return Err(Error::Validation("remote name cannot be empty".to_string()));
        }
        if self.auto_merge && !self.pr {
            return Err(Error::Validation(
                "--auto-merge requires --pr".to_string(),
            ));
        }
        if self.merge_policy.blocked.max_attempts == 0 {
            return Err(Error::Validation(
                "merge poll attempts must be at least 1".to_string(),
            ));
        }
        if self.merge_policy.call_timeout.is_zero() {
            return Err(Error::Validation(
                "remote call timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Pipeline options for this configuration
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            base: self.base.clone(),
            co_author: self.co_author.clone(),
            delete_stale_remote: true,
            review: self.pr.then(|| ReviewOptions {
                auto_merge: self.auto_merge,
                merge_method: self.merge_method,
                policy: self.merge_policy,
            }),
            dry_run: self.dry_run,
            heartbeat: self.heartbeat,
        }
    }
}
