//! Styled terminal progress with a spinner

use crate::cli::style::{
    Stylize, arrow, attention, check, commit_count, cross, date, forced, link, pr_ref,
    spinner_style,
};
use anstream::{eprintln, println};
use async_trait::async_trait;
use backdate::error::Error;
use backdate::pipeline::{Phase, ProgressCallback, PushStatus};
use backdate::types::{Assignment, MergeAction, MergeAttempt, PullRequest, ReviewStatus, RunSummary};
use indicatif::ProgressBar;
use std::sync::Mutex;
use std::time::Duration;

/// CLI progress callback that prints styled lines above a spinner
pub struct CliProgress {
    spinner: ProgressBar,
    current: Mutex<String>,
}

impl CliProgress {
    /// Create progress output with a running spinner
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self {
            spinner,
            current: Mutex::new(String::new()),
        }
    }

    fn set_branch(&self, branch: &str) {
        self.spinner.set_message(branch.to_string());
        if let Ok(mut current) = self.current.lock() {
            *current = branch.to_string();
        }
    }

    fn line(&self, text: &str) {
        self.spinner.suspend(|| println!("{text}"));
    }

    fn error_line(&self, text: &str) {
        self.spinner.suspend(|| eprintln!("{text}"));
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        let branch = self.current.lock().map(|c| c.clone()).unwrap_or_default();
        self.spinner
            .set_message(format!("{branch} {}", phase.to_string().muted()));
    }

    async fn on_assignment_start(&self, index: usize, total: usize, assignment: &Assignment) {
        self.line(&format!(
            "{} [{}/{total}] {} {}",
            arrow(),
            index + 1,
            date(assignment.date),
            commit_count(assignment.commit_count)
        ));
        self.set_branch(&assignment.branch_name);
    }

    async fn on_push(&self, branch: &str, status: PushStatus) {
        match &status {
            PushStatus::Started => {}
            PushStatus::Success | PushStatus::AlreadySynced => {
                self.line(&format!("  {} Pushed {}", check(), branch.accent()));
            }
            PushStatus::ForcePushed => {
                self.line(&format!(
                    "  {} Pushed {} {}",
                    check(),
                    branch.accent(),
                    forced()
                ));
            }
            PushStatus::Failed(msg) => {
                self.error_line(&format!(
                    "  {} Failed to push {}: {}",
                    cross(),
                    branch.accent().for_stderr(),
                    msg.error()
                ));
            }
        }
    }

    async fn on_pr_created(&self, _branch: &str, pr: &PullRequest) {
        self.line(&format!(
            "  {} Created PR {} {}",
            check(),
            pr_ref(pr.number),
            link(&pr.html_url).muted()
        ));
    }

    async fn on_pr_found(&self, _branch: &str, pr: &PullRequest) {
        self.line(&format!(
            "  {} Found open PR {} {}",
            check(),
            pr_ref(pr.number),
            link(&pr.html_url).muted()
        ));
    }

    async fn on_pr_merged(&self, _branch: &str, pr: &PullRequest) {
        self.line(&format!(
            "  {} Merged PR {}",
            check(),
            pr_ref(pr.number)
        ));
    }

    async fn on_review_wait(&self, branch: &str, attempt: &MergeAttempt) {
        let what = match attempt.action {
            MergeAction::AutoResolve => "resolved conflicts, settling",
            MergeAction::WaitBlocked => "blocked, waiting",
            MergeAction::WaitUnknown => "mergeability pending, waiting",
            MergeAction::WaitTransient => "remote unavailable, retrying",
            MergeAction::Merge | MergeAction::GiveUp => "waiting",
        };
        self.spinner.set_message(format!(
            "{branch} {}",
            format!("{what} {}s (attempt {})", attempt.wait.as_secs(), attempt.attempt).muted()
        ));
    }

    async fn on_error(&self, err: &Error) {
        self.error_line(&format!("  {}: {err}", "error".error()));
    }

    async fn on_message(&self, message: &str) {
        self.line(message);
    }

    async fn on_heartbeat(&self, elapsed: Duration) {
        tracing::debug!("Still running after {}s", elapsed.as_secs());
        self.spinner.tick();
    }

    async fn on_summary(&self, summary: &RunSummary) {
        self.spinner.finish_and_clear();

        println!();
        if summary.adjusted_branches {
            println!(
                "{} Branch count was reduced to fit the eligible dates",
                attention()
            );
        }
        println!(
            "{} branch{} pushed, {} commit{} created",
            summary.branches_pushed.accent(),
            if summary.branches_pushed == 1 { "" } else { "es" },
            summary.commits_created.accent(),
            if summary.commits_created == 1 { "" } else { "s" }
        );
        if summary.prs_created > 0 || summary.prs_merged > 0 {
            println!(
                "{} PR{} created, {} merged",
                summary.prs_created.accent(),
                if summary.prs_created == 1 { "" } else { "s" },
                summary.prs_merged.accent()
            );
        }

        for record in summary.records.iter().filter(|r| !r.succeeded()) {
            let reason = record
                .pr
                .as_ref()
                .and_then(|pr| match &pr.status {
                    ReviewStatus::Failed(reason) => Some(reason.clone()),
                    _ => None,
                })
                .or_else(|| record.commits.error.clone())
                .unwrap_or_else(|| format!("{:?}", record.push));
            eprintln!("  {} {}: {reason}", cross(), record.branch_name.accent().for_stderr());
        }
        for record in summary
            .records
            .iter()
            .filter(|r| r.pr.as_ref().is_some_and(|pr| pr.requires_manual_resolution))
        {
            println!(
                "  {} {} needs manual conflict resolution",
                attention(),
                record.branch_name.accent()
            );
        }

        if summary.failed == 0 {
            println!(
                "{} {} date{} done",
                check(),
                summary.succeeded,
                if summary.succeeded == 1 { "" } else { "s" }
            );
        } else {
            eprintln!(
                "{} {} succeeded, {} failed",
                cross(),
                summary.succeeded,
                summary.failed.error()
            );
        }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
