//! Progress callback trait for interface-agnostic updates
//!
//! The pipeline reports through [`ProgressCallback`] so the same run can drive
//! a styled terminal, a JSON-lines event stream, or nothing at all.

use crate::error::Error;
use crate::types::{Assignment, MergeAttempt, PullRequest, RunSummary};
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Syncing the base branch
    Preparing,
    /// Creating or reusing the date branch
    Branching,
    /// Synthesizing commits
    Committing,
    /// Pushing to the remote
    Pushing,
    /// Finding or creating the pull request
    Reviewing,
    /// Polling and merging
    Merging,
    /// Resolving conflicts with the base branch
    Resolving,
    /// Run finished
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Preparing => "Preparing base branch",
            Self::Branching => "Creating branch",
            Self::Committing => "Committing",
            Self::Pushing => "Pushing",
            Self::Reviewing => "Opening pull request",
            Self::Merging => "Merging",
            Self::Resolving => "Resolving conflicts",
            Self::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Push operation status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// Push started
    Started,
    /// Push succeeded
    Success,
    /// Push succeeded after the forced fallback
    ForcePushed,
    /// Remote already had the branch tip
    AlreadySynced,
    /// Push failed with error message
    Failed(String),
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Success => f.write_str("pushed"),
            Self::ForcePushed => f.write_str("force-pushed"),
            Self::AlreadySynced => f.write_str("already synced"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Progress callback trait
///
/// Implement this trait to receive progress updates during a run.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called before an assignment is processed (`index` is 0-based)
    async fn on_assignment_start(&self, index: usize, total: usize, assignment: &Assignment);

    /// Called when a branch is being pushed
    async fn on_push(&self, branch: &str, status: PushStatus);

    /// Called when a PR is created
    async fn on_pr_created(&self, branch: &str, pr: &PullRequest);

    /// Called when an open PR already existed
    async fn on_pr_found(&self, branch: &str, pr: &PullRequest);

    /// Called when a PR is merged
    async fn on_pr_merged(&self, branch: &str, pr: &PullRequest);

    /// Called after each poll that did not end the lifecycle
    async fn on_review_wait(&self, branch: &str, attempt: &MergeAttempt);

    /// Called when an error occurs (non-fatal)
    async fn on_error(&self, error: &Error);

    /// Called with a general status message
    async fn on_message(&self, message: &str);

    /// Called periodically while the run is in progress
    async fn on_heartbeat(&self, elapsed: Duration);

    /// Called once with the final summary
    async fn on_summary(&self, summary: &RunSummary);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _phase: Phase) {}
    async fn on_assignment_start(&self, _index: usize, _total: usize, _assignment: &Assignment) {}
    async fn on_push(&self, _branch: &str, _status: PushStatus) {}
    async fn on_pr_created(&self, _branch: &str, _pr: &PullRequest) {}
    async fn on_pr_found(&self, _branch: &str, _pr: &PullRequest) {}
    async fn on_pr_merged(&self, _branch: &str, _pr: &PullRequest) {}
    async fn on_review_wait(&self, _branch: &str, _attempt: &MergeAttempt) {}
    async fn on_error(&self, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
    async fn on_heartbeat(&self, _elapsed: Duration) {}
    async fn on_summary(&self, _summary: &RunSummary) {}
}

/// Severity of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Routine progress
    Info,
    /// Something worth attention that did not stop the run
    Warn,
    /// A step failed
    Error,
}

/// One line of the machine-readable progress stream
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Event name (`phase`, `push`, `pr_created`, ...)
    pub event: &'static str,
    /// Phase the event belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Severity
    pub level: Level,
    /// Human-readable description
    pub message: String,
    /// Branch the event concerns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProgressEvent {
    fn new(event: &'static str, level: Level, message: impl Into<String>) -> Self {
        Self {
            event,
            phase: None,
            level,
            message: message.into(),
            branch: None,
            data: None,
        }
    }

    fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    fn branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    fn data<T: Serialize>(mut self, value: &T) -> Self {
        self.data = serde_json::to_value(value).ok();
        self
    }
}

/// Writes one JSON object per event to a writer
pub struct JsonLinesProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesProgress<W> {
    /// Emit events to `out`
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: &ProgressEvent) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

#[async_trait]
impl<W: Write + Send> ProgressCallback for JsonLinesProgress<W> {
    async fn on_phase(&self, phase: Phase) {
        self.emit(&ProgressEvent::new("phase", Level::Info, phase.to_string()).phase(phase));
    }

    async fn on_assignment_start(&self, index: usize, total: usize, assignment: &Assignment) {
        let message = format!(
            "[{}/{total}] {} ({} commits)",
            index + 1,
            assignment.date,
            assignment.commit_count
        );
        self.emit(
            &ProgressEvent::new("assignment", Level::Info, message)
                .branch(&assignment.branch_name)
                .data(assignment),
        );
    }

    async fn on_push(&self, branch: &str, status: PushStatus) {
        let level = match status {
            PushStatus::Failed(_) => Level::Error,
            PushStatus::ForcePushed => Level::Warn,
            _ => Level::Info,
        };
        self.emit(
            &ProgressEvent::new("push", level, status.to_string())
                .phase(Phase::Pushing)
                .branch(branch),
        );
    }

    async fn on_pr_created(&self, branch: &str, pr: &PullRequest) {
        self.emit(
            &ProgressEvent::new("pr_created", Level::Info, format!("created #{}", pr.number))
                .phase(Phase::Reviewing)
                .branch(branch)
                .data(pr),
        );
    }

    async fn on_pr_found(&self, branch: &str, pr: &PullRequest) {
        self.emit(
            &ProgressEvent::new("pr_found", Level::Info, format!("found #{}", pr.number))
                .phase(Phase::Reviewing)
                .branch(branch)
                .data(pr),
        );
    }

    async fn on_pr_merged(&self, branch: &str, pr: &PullRequest) {
        self.emit(
            &ProgressEvent::new("pr_merged", Level::Info, format!("merged #{}", pr.number))
                .phase(Phase::Merging)
                .branch(branch)
                .data(pr),
        );
    }

    async fn on_review_wait(&self, branch: &str, attempt: &MergeAttempt) {
        let message = format!(
            "attempt {}: waiting {}ms",
            attempt.attempt,
            attempt.wait.as_millis()
        );
        self.emit(
            &ProgressEvent::new("review_wait", Level::Info, message)
                .phase(Phase::Merging)
                .branch(branch)
                .data(attempt),
        );
    }

    async fn on_error(&self, error: &Error) {
        self.emit(&ProgressEvent::new("error", Level::Error, error.to_string()));
    }

    async fn on_message(&self, message: &str) {
        self.emit(&ProgressEvent::new("message", Level::Info, message));
    }

    async fn on_heartbeat(&self, elapsed: Duration) {
        self.emit(&ProgressEvent::new(
            "heartbeat",
            Level::Info,
            format!("running for {}s", elapsed.as_secs()),
        ));
    }

    async fn on_summary(&self, summary: &RunSummary) {
        let level = if summary.failed > 0 {
            Level::Warn
        } else {
            Level::Info
        };
        let message = format!(
            "{} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        self.emit(
            &ProgressEvent::new("summary", level, message)
                .phase(Phase::Complete)
                .data(summary),
        );
    }
}
