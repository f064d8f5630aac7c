//! Run execution
//!
//! Walks the plan's assignments in order. Each assignment runs the branch
//! procedure and, when enabled, the review lifecycle; its outcome becomes one
//! [`ResultRecord`] and the loop moves on regardless of failures.

use crate::error::{Error, Result};
use crate::pipeline::backoff::Sleeper;
use crate::pipeline::branch::{BranchOptions, realize_assignment};
use crate::pipeline::review::{ReviewController, ReviewOptions, pr_title};
use crate::pipeline::{Phase, ProgressCallback};
use crate::platform::PlatformService;
use crate::repo::GitRepo;
use crate::resolve::RepoConflictResolver;
use crate::types::{Person, ResultRecord, RunSummary, WorkPlan};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Settings for one run
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Base branch override; otherwise `main`, `master`, then the current branch
    pub base: Option<String>,
    /// Optional `Co-authored-by` trailer
    pub co_author: Option<Person>,
    /// Delete same-named remote branches before recreating them
    pub delete_stale_remote: bool,
    /// Review lifecycle settings; `None` skips pull requests entirely
    pub review: Option<ReviewOptions>,
    /// Report what would happen without touching anything
    pub dry_run: bool,
    /// Interval between heartbeat events; zero disables them
    pub heartbeat: Duration,
}

/// Everything a run talks to
pub struct RunContext<'a> {
    /// Working copy
    pub repo: &'a mut GitRepo,
    /// Review platform, required when review is enabled
    pub platform: Option<&'a dyn PlatformService>,
    /// Clock used for backoff waits
    pub sleeper: &'a dyn Sleeper,
    /// Progress sink
    pub progress: &'a dyn ProgressCallback,
}

/// Pick the base branch for a run
pub fn resolve_base(repo: &GitRepo, explicit: Option<&str>) -> Result<String> {
    if let Some(base) = explicit {
        if !repo.local_branch_exists(base)? && !repo.remote_branch_exists(base)? {
            return Err(Error::RepositoryState(format!(
                "base branch '{base}' does not exist locally or on {}",
                repo.remote()
            )));
        }
        return Ok(base.to_string());
    }
    if let Some(base) = repo.default_branch()? {
        return Ok(base);
    }
    repo.current_branch()?.ok_or_else(|| {
        Error::RepositoryState("cannot determine a base branch (detached HEAD)".to_string())
    })
}

/// Execute a work plan
///
/// Run-level problems (no base branch, review enabled without a platform)
/// fail before any assignment starts. Per-assignment failures are recorded in
/// the summary.
pub async fn execute_plan(
    plan: &WorkPlan,
    ctx: RunContext<'_>,
    options: &ExecuteOptions,
) -> Result<RunSummary> {
    if options.review.is_some() && ctx.platform.is_none() {
        return Err(Error::Internal(
            "pull requests enabled without a platform service".to_string(),
        ));
    }

    let base = resolve_base(ctx.repo, options.base.as_deref())?;
    info!("Using base branch {base}");

    if options.dry_run {
        report_dry_run(plan, &base, options, ctx.progress).await;
        return Ok(RunSummary {
            adjusted_branches: plan.adjusted_branches,
            ..RunSummary::default()
        });
    }

    let progress = ctx.progress;
    let work = run_assignments(plan, ctx, options, &base);

    if options.heartbeat.is_zero() {
        return work.await;
    }

    tokio::select! {
        summary = work => summary,
        () = heartbeat(progress, options.heartbeat) => {
            Err(Error::Internal("heartbeat stopped".to_string()))
        }
    }
}

/// Emit `on_heartbeat` every `period`; never touches the repository
async fn heartbeat(progress: &dyn ProgressCallback, period: Duration) {
    let started = Instant::now();
    let mut ticks = heartbeat_ticks(started, period);
    loop {
        ticks.tick().await;
        progress.on_heartbeat(started.elapsed()).await;
    }
}

/// Ticks missed while git blocks the task are delayed, not replayed in a burst
fn heartbeat_ticks(started: Instant, period: Duration) -> Interval {
    let mut ticks = interval_at(started + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks
}

async fn run_assignments(
    plan: &WorkPlan,
    ctx: RunContext<'_>,
    options: &ExecuteOptions,
    base: &str,
) -> Result<RunSummary> {
    let RunContext {
        repo,
        platform,
        sleeper,
        progress,
    } = ctx;

    let branch_options = BranchOptions {
        base: base.to_string(),
        co_author: options.co_author.clone(),
        delete_stale_remote: options.delete_stale_remote,
    };

    let mut summary = RunSummary {
        adjusted_branches: plan.adjusted_branches,
        ..RunSummary::default()
    };
    let total = plan.assignments.len();

    for (index, assignment) in plan.assignments.iter().enumerate() {
        progress.on_assignment_start(index, total, assignment).await;

        let report = realize_assignment(repo, assignment, &branch_options, progress).await;

        let pr = match (&options.review, platform) {
            (Some(review), Some(platform)) if report.push.is_pushed() => {
                let controller = ReviewController::new(platform, sleeper, progress, review);
                let mut resolver = RepoConflictResolver::new(repo);
                Some(controller.run(assignment, base, &mut resolver).await)
            }
            _ => None,
        };

        let record = ResultRecord {
            date: assignment.date,
            branch_name: assignment.branch_name.clone(),
            branch: report.branch,
            commits: report.commits,
            push: report.push,
            pr,
        };
        if !record.succeeded() {
            warn!("Assignment for {} did not fully succeed", assignment.date);
        }
        summary.record(record);
    }

    // Leave the working copy where the run started from
    if let Err(e) = repo.checkout(base) {
        debug!("Could not return to {base}: {e}");
    }

    progress.on_phase(Phase::Complete).await;
    progress.on_summary(&summary).await;
    Ok(summary)
}

async fn report_dry_run(
    plan: &WorkPlan,
    base: &str,
    options: &ExecuteOptions,
    progress: &dyn ProgressCallback,
) {
    progress
        .on_message("Dry run - no changes will be made")
        .await;
    progress
        .on_message(&format!(
            "Would create {} branch(es) from {base} with {} commit(s):",
            plan.assignments.len(),
            plan.total_commits()
        ))
        .await;
    for assignment in &plan.assignments {
        let mut line = format!(
            "  - {} ({} commit{})",
            assignment.branch_name,
            assignment.commit_count,
            if assignment.commit_count == 1 { "" } else { "s" }
        );
        if let Some(review) = &options.review {
            line.push_str(&format!(", PR \"{}\"", pr_title(assignment.date)));
            if review.auto_merge {
                line.push_str(" then merge");
            }
        }
        progress.on_message(&line).await;
    }
    if plan.adjusted_branches {
        progress
            .on_message(&format!(
                "Branch count reduced from {} to {} ({} eligible dates)",
                plan.requested_branches,
                plan.assignments.len(),
                plan.eligible_dates
            ))
            .await;
    }
}
