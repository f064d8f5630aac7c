//! Core types for backdate

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix shared by every branch backdate creates
pub const BRANCH_PREFIX: &str = "backdate/";

/// Branch name for a date
///
/// Pure function of the date: no randomness and no dependence on run order.
pub fn branch_name(date: NaiveDate) -> String {
    format!("{BRANCH_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// One unit of work: a date, its branch and how many commits to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Calendar date the commits are attributed to
    pub date: NaiveDate,
    /// Branch name derived from `date`
    pub branch_name: String,
    /// Number of commits to synthesize (always >= 1)
    pub commit_count: usize,
}

/// The complete partition of a run's budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkPlan {
    /// Assignments in chronological order
    pub assignments: Vec<Assignment>,
    /// Whether the branch budget was clamped to the eligible pool size
    pub adjusted_branches: bool,
    /// Branch budget as requested by the caller
    pub requested_branches: usize,
    /// Size of the eligible pool
    pub eligible_dates: usize,
}

impl WorkPlan {
    /// Total commits across all assignments
    pub fn total_commits(&self) -> usize {
        self.assignments.iter().map(|a| a.commit_count).sum()
    }
}

/// Local and remote presence of a branch, computed fresh per assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchState {
    /// Branch exists in the local repository
    pub exists_locally: bool,
    /// Branch exists on the remote
    pub exists_remotely: bool,
}

/// Name/email pair used for authorship and trailers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

impl Person {
    /// Parse `Name <email>` format
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, rest) = raw.split_once('<')?;
        let email = rest.strip_suffix('>')?.trim();
        let name = name.trim();
        if name.is_empty() || email.is_empty() || !email.contains('@') {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A git remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRemote {
    /// Remote name (e.g., "origin")
    pub name: String,
    /// Remote URL
    pub url: String,
}

/// A pull request / merge request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL for the PR/MR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR/MR title
    pub title: String,
}

/// Lifecycle state of a pull request as reported by the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// Open and awaiting merge
    Open,
    /// Closed without merge
    Closed,
    /// Merged
    Merged,
}

/// Mergeability snapshot of a pull request, polled from the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestState {
    /// PR/MR number
    pub number: u64,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// `None` while the remote is still computing mergeability
    pub mergeable: Option<bool>,
    /// Remote-specific reason (`clean`, `dirty`, `blocked`, `checking`, ...)
    pub mergeable_reason: Option<String>,
    /// Whether the request has been merged
    pub merged: bool,
    /// Open/closed/merged
    pub state: PrState,
}

/// Reasons that mean the head and base conflict textually
const CONFLICTING_REASONS: &[&str] = &["dirty", "conflicting", "conflict", "cannot_be_merged"];

impl PullRequestState {
    /// Collapse the raw tri-state and reason into a decision input
    pub fn mergeability(&self) -> Mergeability {
        match self.mergeable {
            Some(true) => Mergeability::Mergeable,
            None => Mergeability::Unknown,
            Some(false) => {
                let reason = self.mergeable_reason.clone().unwrap_or_default();
                if CONFLICTING_REASONS.contains(&reason.as_str()) {
                    Mergeability::Conflicting
                } else {
                    Mergeability::Blocked(reason)
                }
            }
        }
    }
}

/// Interpreted mergeability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Mergeability {
    /// Can be merged now
    Mergeable,
    /// Head and base conflict
    Conflicting,
    /// Not mergeable for another reason (checks, protection, ...)
    Blocked(String),
    /// Remote has not finished computing mergeability
    Unknown,
}

/// How a pull request is merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// Merge commit
    #[default]
    Merge,
    /// Squash into a single commit
    Squash,
    /// Rebase onto base
    Rebase,
}

impl std::str::FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "squash" => Ok(Self::Squash),
            "rebase" => Ok(Self::Rebase),
            other => Err(format!("unknown merge method: {other}")),
        }
    }
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com/gitlab.com)
    pub host: Option<String>,
}

// ============================================================================
// Per-assignment results
// ============================================================================

/// What happened to the branch itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum BranchOutcome {
    /// New local branch created
    Created,
    /// Existing local branch checked out
    Reused,
    /// Could not create or check out the branch
    Failed(String),
}

/// Commits created for an assignment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Commits requested by the plan
    pub requested: usize,
    /// Commits actually created
    pub created: usize,
    /// Error that stopped commit synthesis
    pub error: Option<String>,
}

/// Push result for an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum PushOutcome {
    /// Fast-forward push succeeded
    Pushed,
    /// Push needed the forced fallback
    ForcePushed,
    /// Not attempted (earlier step failed)
    Skipped,
    /// Push failed
    Failed(String),
}

impl PushOutcome {
    /// Whether the branch is on the remote after this step
    pub const fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed | Self::ForcePushed)
    }
}

/// Terminal state of the review lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ReviewStatus {
    /// Request exists and auto-merge was not requested
    Open,
    /// Request merged
    Merged,
    /// Lifecycle ended without a merge
    Failed(String),
}

/// Action the controller took after observing a poll result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// Issued the merge call
    Merge,
    /// Waited for checks or protection rules
    WaitBlocked,
    /// Waited for the remote to compute mergeability
    WaitUnknown,
    /// Ran automatic conflict resolution
    AutoResolve,
    /// Waited after a transient remote failure
    WaitTransient,
    /// Gave up
    GiveUp,
}

/// One entry in the merge attempt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAttempt {
    /// 1-based poll counter across the lifecycle
    pub attempt: u32,
    /// What the poll reported
    pub observed: Mergeability,
    /// What the controller did about it
    pub action: MergeAction,
    /// How long the controller waited afterwards
    #[serde(with = "duration_millis")]
    pub wait: Duration,
}

/// Review lifecycle outcome for an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrOutcome {
    /// The request, when one was found or created
    pub pr: Option<PullRequest>,
    /// Whether this run created the request
    pub created: bool,
    /// Terminal status
    pub status: ReviewStatus,
    /// Conflicts need a human
    pub requires_manual_resolution: bool,
    /// Poll/merge attempts, for diagnostics
    pub attempts: Vec<MergeAttempt>,
}

impl PrOutcome {
    /// Whether the request ended up merged
    pub fn is_merged(&self) -> bool {
        self.status == ReviewStatus::Merged
    }
}

/// Outcome of one assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Assignment date
    pub date: NaiveDate,
    /// Branch name
    pub branch_name: String,
    /// Branch step
    pub branch: BranchOutcome,
    /// Commit step
    pub commits: CommitOutcome,
    /// Push step
    pub push: PushOutcome,
    /// Review lifecycle, when enabled and reached
    pub pr: Option<PrOutcome>,
}

impl ResultRecord {
    /// Whether every attempted step succeeded
    pub fn succeeded(&self) -> bool {
        !matches!(self.branch, BranchOutcome::Failed(_))
            && self.commits.error.is_none()
            && self.push.is_pushed()
            && self
                .pr
                .as_ref()
                .is_none_or(|pr| !matches!(pr.status, ReviewStatus::Failed(_)))
    }
}

/// Aggregate of all result records for a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Records in plan order
    pub records: Vec<ResultRecord>,
    /// Whether the plan clamped the branch budget
    pub adjusted_branches: bool,
    /// Commits created across the run
    pub commits_created: usize,
    /// Local branches created
    pub branches_created: usize,
    /// Branches pushed (including forced pushes)
    pub branches_pushed: usize,
    /// Requests created
    pub prs_created: usize,
    /// Requests merged
    pub prs_merged: usize,
    /// Assignments that fully succeeded
    pub succeeded: usize,
    /// Assignments with any failure
    pub failed: usize,
    /// Assignments whose conflicts need a human
    pub requires_manual_resolution: usize,
}

impl RunSummary {
    /// Fold a finished record into the summary
    pub fn record(&mut self, record: ResultRecord) {
        self.commits_created += record.commits.created;
        if record.branch == BranchOutcome::Created {
            self.branches_created += 1;
        }
        if record.push.is_pushed() {
            self.branches_pushed += 1;
        }
        if let Some(pr) = &record.pr {
            if pr.created {
                self.prs_created += 1;
            }
            if pr.is_merged() {
                self.prs_merged += 1;
            }
            if pr.requires_manual_resolution {
                self.requires_manual_resolution += 1;
            }
        }
        if record.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.records.push(record);
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mergeable: Option<bool>, reason: Option<&str>) -> PullRequestState {
        PullRequestState {
            number: 1,
            head_ref: "backdate/2024-01-02".to_string(),
            base_ref: "main".to_string(),
            mergeable,
            mergeable_reason: reason.map(ToString::to_string),
            merged: false,
            state: PrState::Open,
        }
    }

    #[test]
    fn test_branch_name_is_pure() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(branch_name(date), "backdate/2024-01-03");
        assert_eq!(branch_name(date), branch_name(date));
    }

    #[test]
    fn test_mergeability_mapping() {
        assert_eq!(state(Some(true), Some("clean")).mergeability(), Mergeability::Mergeable);
        assert_eq!(state(Some(false), Some("dirty")).mergeability(), Mergeability::Conflicting);
        assert_eq!(
            state(Some(false), Some("cannot_be_merged")).mergeability(),
            Mergeability::Conflicting
        );
        assert_eq!(
            state(Some(false), Some("blocked")).mergeability(),
            Mergeability::Blocked("blocked".to_string())
        );
        assert_eq!(state(None, Some("unknown")).mergeability(), Mergeability::Unknown);
    }

    #[test]
    fn test_person_parse() {
        let p = Person::parse("Ada Lovelace <ada@example.com>").unwrap();
        assert_eq!(p.name, "Ada Lovelace");
        assert_eq!(p.email, "ada@example.com");
        assert_eq!(p.to_string(), "Ada Lovelace <ada@example.com>");
        assert!(Person::parse("no email").is_none());
        assert!(Person::parse("<ada@example.com>").is_none());
    }

    #[test]
    fn test_summary_counts() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let ok = ResultRecord {
            date,
            branch_name: branch_name(date),
            branch: BranchOutcome::Created,
            commits: CommitOutcome {
                requested: 2,
                created: 2,
                error: None,
            },
            push: PushOutcome::ForcePushed,
            pr: None,
        };
        let failed = ResultRecord {
            push: PushOutcome::Failed("remote hung up".to_string()),
            ..ok.clone()
        };

        let mut summary = RunSummary::default();
        summary.record(ok);
        summary.record(failed);

        assert_eq!(summary.commits_created, 4);
        assert_eq!(summary.branches_created, 2);
        assert_eq!(summary.branches_pushed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.records.len(), 2);
    }
}
