//! Per-date branch, commit and push procedure

use crate::error::{Error, Result};
use crate::pipeline::{Phase, ProgressCallback, PushStatus};
use crate::repo::{ACTIVITY_LOG, CommitRecord, GitRepo, PushResult};
use crate::types::{Assignment, BranchOutcome, CommitOutcome, Person, PushOutcome};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Settings shared by every assignment of a run
#[derive(Debug, Clone)]
pub struct BranchOptions {
    /// Branch new date branches start from
    pub base: String,
    /// Optional `Co-authored-by` trailer
    pub co_author: Option<Person>,
    /// Delete a same-named remote branch before recreating it
    pub delete_stale_remote: bool,
}

/// What the branch procedure did for one assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchReport {
    /// Branch step
    pub branch: BranchOutcome,
    /// Commit step
    pub commits: CommitOutcome,
    /// Push step
    pub push: PushOutcome,
}

/// One line of the activity log
#[derive(Serialize)]
struct ActivityEntry<'a> {
    date: NaiveDate,
    branch: &'a str,
    seq: usize,
    of: usize,
    id: u64,
}

/// Noon on `date` in the local timezone
pub fn local_noon(date: NaiveDate) -> Result<DateTime<FixedOffset>> {
    let noon = date
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| Error::Internal(format!("no noon on {date}")))?;
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| Error::Validation(format!("{date} 12:00 does not exist in the local timezone")))
}

/// Run the branch procedure for one assignment
///
/// Never fails as a whole: every step's outcome lands in the report and the
/// caller moves on to the next assignment.
pub async fn realize_assignment(
    repo: &mut GitRepo,
    assignment: &Assignment,
    options: &BranchOptions,
    progress: &dyn ProgressCallback,
) -> BranchReport {
    let branch = assignment.branch_name.as_str();
    let mut report = BranchReport {
        branch: BranchOutcome::Failed(String::new()),
        commits: CommitOutcome {
            requested: assignment.commit_count,
            ..CommitOutcome::default()
        },
        push: PushOutcome::Skipped,
    };

    progress.on_phase(Phase::Preparing).await;
    if let Err(e) = prepare_base(repo, &options.base) {
        progress.on_error(&e).await;
        report.branch = BranchOutcome::Failed(e.to_string());
        return report;
    }

    match repo.branch_state(branch) {
        Ok(state) if state.exists_remotely && options.delete_stale_remote => {
            info!("Deleting stale remote branch {branch}");
            if let Err(e) = repo.delete_remote_branch(branch) {
                warn!("Could not delete remote {branch}: {e}");
                progress.on_error(&e).await;
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Could not inspect {branch}: {e}"),
    }

    progress.on_phase(Phase::Branching).await;
    report.branch = match checkout_or_create(repo, branch) {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.on_error(&e).await;
            BranchOutcome::Failed(e.to_string())
        }
    };
    if matches!(report.branch, BranchOutcome::Failed(_)) {
        return report;
    }

    progress.on_phase(Phase::Committing).await;
    if let Err(e) = synthesize_commits(repo, assignment, options, &mut report.commits) {
        progress.on_error(&e).await;
        report.commits.error = Some(e.to_string());
        if let Err(reset) = repo.discard_changes() {
            warn!("Could not discard uncommitted activity on {branch}: {reset}");
        }
        return report;
    }

    progress.on_phase(Phase::Pushing).await;
    progress.on_push(branch, PushStatus::Started).await;
    report.push = match repo.push_with_fallback(branch) {
        Ok(PushResult::Pushed) => {
            progress.on_push(branch, PushStatus::Success).await;
            PushOutcome::Pushed
        }
        Ok(PushResult::ForcePushed) => {
            progress.on_push(branch, PushStatus::ForcePushed).await;
            PushOutcome::ForcePushed
        }
        Ok(PushResult::AlreadyUpToDate) => {
            progress.on_push(branch, PushStatus::AlreadySynced).await;
            PushOutcome::Pushed
        }
        Err(e) => {
            progress
                .on_push(branch, PushStatus::Failed(e.to_string()))
                .await;
            PushOutcome::Failed(e.to_string())
        }
    };

    report
}

/// Check out the base branch and bring it up to date; pull failures are tolerated
fn prepare_base(repo: &mut GitRepo, base: &str) -> Result<()> {
    repo.checkout(base)?;
    if let Err(e) = repo.pull(base) {
        warn!("Pull of {base} failed, continuing with local state: {e}");
    }
    Ok(())
}

fn checkout_or_create(repo: &mut GitRepo, branch: &str) -> Result<BranchOutcome> {
    if repo.local_branch_exists(branch)? {
        debug!("Reusing local branch {branch}");
        repo.checkout(branch)?;
        Ok(BranchOutcome::Reused)
    } else {
        repo.checkout_new(branch)?;
        Ok(BranchOutcome::Created)
    }
}

fn synthesize_commits(
    repo: &mut GitRepo,
    assignment: &Assignment,
    options: &BranchOptions,
    outcome: &mut CommitOutcome,
) -> Result<()> {
    let timestamp = local_noon(assignment.date)?;
    let total = assignment.commit_count;

    for seq in 1..=total {
        let entry = ActivityEntry {
            date: assignment.date,
            branch: &assignment.branch_name,
            seq,
            of: total,
            id: rand::random(),
        };
        repo.append_activity(&serde_json::to_string(&entry)?)?;
        repo.stage(&[ACTIVITY_LOG])?;

        let record = CommitRecord {
            message: format!("Record activity for {} ({seq}/{total})", assignment.date),
            timestamp,
            co_author: options.co_author.clone(),
        };
        let sha = repo.commit(&record, false)?;
        debug!("Committed {sha} on {}", assignment.branch_name);
        outcome.created += 1;
    }

    Ok(())
}
