//! Pull request lifecycle
//!
//! Drives one branch's review request from lookup to a terminal state:
//!
//! ```text
//! Searching -> Found | Creating
//!           -> Polling -> Mergeable  -> Merging -> Merged
//!                      -> Conflicted -> AutoResolve -> Polling
//!                      -> Blocked/Unknown -> Wait -> Polling
//!           -> Merged | Failed
//! ```
//!
//! Every remote call is bounded by a timeout and every wait goes through the
//! injected [`Sleeper`].

use crate::error::{Error, Result};
use crate::pipeline::backoff::{BackoffPolicy, Sleeper, retry_transient, with_timeout};
use crate::pipeline::{Phase, ProgressCallback};
use crate::platform::PlatformService;
use crate::resolve::ConflictHandler;
use crate::types::{
    Assignment, MergeAction, MergeAttempt, MergeMethod, Mergeability, PrOutcome, PrState,
    PullRequest, ReviewStatus, branch_name,
};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling cadence and ceilings for the merge loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// Not mergeable for a non-conflict reason (checks, protection)
    pub blocked: BackoffPolicy,
    /// Remote still computing mergeability
    pub unknown: BackoffPolicy,
    /// Network failures and timeouts
    pub transient: BackoffPolicy,
    /// Pause after a successful conflict resolution before polling again
    pub settle: Duration,
    /// Limit for any single remote call
    pub call_timeout: Duration,
    /// Automatic resolution attempts before asking for a human
    pub max_resolve_attempts: u32,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            blocked: BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(30), 10),
            unknown: BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(10), 15),
            transient: BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(20), 5),
            settle: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
            max_resolve_attempts: 2,
        }
    }
}

/// Review settings for a run
#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    /// Drive requests to a merge instead of leaving them open
    pub auto_merge: bool,
    /// How requests are merged
    pub merge_method: MergeMethod,
    /// Polling cadence and ceilings
    pub policy: MergePolicy,
}

/// Title of the request for a date
pub fn pr_title(date: NaiveDate) -> String {
    format!("Activity for {date}")
}

/// Body of the request for a date
pub fn pr_body(date: NaiveDate) -> String {
    format!(
        "Activity recorded for {date}.\n\nBranch: `{}`",
        branch_name(date)
    )
}

/// Per-request state machine
pub struct ReviewController<'a> {
    platform: &'a dyn PlatformService,
    sleeper: &'a dyn Sleeper,
    progress: &'a dyn ProgressCallback,
    options: &'a ReviewOptions,
}

/// Counters for one merge loop
#[derive(Default)]
struct Counters {
    polls: u32,
    blocked: u32,
    unknown: u32,
    transient: u32,
    resolves: u32,
}

impl<'a> ReviewController<'a> {
    /// Create a controller
    pub const fn new(
        platform: &'a dyn PlatformService,
        sleeper: &'a dyn Sleeper,
        progress: &'a dyn ProgressCallback,
        options: &'a ReviewOptions,
    ) -> Self {
        Self {
            platform,
            sleeper,
            progress,
            options,
        }
    }

    /// Run the lifecycle for one pushed branch
    pub async fn run(
        &self,
        assignment: &Assignment,
        base: &str,
        resolver: &mut dyn ConflictHandler,
    ) -> PrOutcome {
        let head = assignment.branch_name.as_str();
        self.progress.on_phase(Phase::Reviewing).await;

        let (pr, created) = match self.ensure_pr(assignment, base).await {
            Ok(found) => found,
            Err(e) => {
                self.progress.on_error(&e).await;
                return PrOutcome {
                    pr: None,
                    created: false,
                    status: ReviewStatus::Failed(e.to_string()),
                    requires_manual_resolution: false,
                    attempts: Vec::new(),
                };
            }
        };

        if created {
            self.progress.on_pr_created(head, &pr).await;
        } else {
            self.progress.on_pr_found(head, &pr).await;
        }

        let mut outcome = PrOutcome {
            pr: Some(pr.clone()),
            created,
            status: ReviewStatus::Open,
            requires_manual_resolution: false,
            attempts: Vec::new(),
        };

        if self.options.auto_merge {
            self.progress.on_phase(Phase::Merging).await;
            self.merge_loop(&pr, base, resolver, &mut outcome).await;
            if outcome.is_merged() {
                self.progress.on_pr_merged(head, &pr).await;
            }
        }

        outcome
    }

    /// Find the open request for head+base, creating it when absent
    ///
    /// Lookup and creation are retried together so a create that timed out
    /// after succeeding is found instead of duplicated.
    async fn ensure_pr(&self, assignment: &Assignment, base: &str) -> Result<(PullRequest, bool)> {
        let head = assignment.branch_name.as_str();
        let policy = &self.options.policy;
        let limit = policy.call_timeout;
        let title = pr_title(assignment.date);
        let body = pr_body(assignment.date);
        let (platform, title, body) = (self.platform, title.as_str(), body.as_str());

        retry_transient(
            &policy.transient,
            self.sleeper,
            "pull request lookup",
            move || async move {
                if let Some(pr) = with_timeout(limit, platform.find_open_pr(head, base)).await? {
                    debug!("Found open request #{} for {head}", pr.number);
                    return Ok((pr, false));
                }
                let pr = with_timeout(limit, platform.create_pr(head, base, title, body)).await?;
                info!("Created request #{} for {head}", pr.number);
                Ok((pr, true))
            },
        )
        .await
    }

    async fn merge_loop(
        &self,
        pr: &PullRequest,
        base: &str,
        resolver: &mut dyn ConflictHandler,
        outcome: &mut PrOutcome,
    ) {
        let policy = &self.options.policy;
        let limit = policy.call_timeout;
        let head = pr.head_ref.as_str();
        let mut n = Counters::default();

        loop {
            n.polls += 1;

            let state = match with_timeout(limit, self.platform.get_pr(pr.number)).await {
                Ok(state) => state,
                Err(e) => {
                    if self.transient_wait(&e, &mut n, Mergeability::Unknown, outcome).await {
                        continue;
                    }
                    return fail(outcome, e.to_string());
                }
            };

            if state.merged || state.state == PrState::Merged {
                outcome.status = ReviewStatus::Merged;
                return;
            }
            if state.state == PrState::Closed {
                return fail(outcome, "pull request was closed".to_string());
            }

            let observed = state.mergeability();
            match &observed {
                Mergeability::Mergeable => {
                    self.log(outcome, n.polls, observed.clone(), MergeAction::Merge, Duration::ZERO);
                    let merged = with_timeout(
                        limit,
                        self.platform.merge_pr(pr.number, self.options.merge_method),
                    )
                    .await;
                    match merged {
                        Ok(()) => {
                            outcome.status = ReviewStatus::Merged;
                            return;
                        }
                        Err(Error::MergeBlocked(reason)) => {
                            n.blocked += 1;
                            if policy.blocked.exhausted(n.blocked) {
                                return give_up(
                                    outcome,
                                    n.polls,
                                    observed,
                                    format!("not mergeable after {} attempts: {reason}", n.blocked),
                                );
                            }
                            let wait = policy.blocked.delay(n.blocked);
                            self.wait(head, outcome, n.polls, observed, MergeAction::WaitBlocked, wait)
                                .await;
                        }
                        Err(e) => {
                            if !self.transient_wait(&e, &mut n, observed, outcome).await {
                                return fail(outcome, e.to_string());
                            }
                        }
                    }
                }
                Mergeability::Conflicting => {
                    n.resolves += 1;
                    if n.resolves > policy.max_resolve_attempts {
                        outcome.requires_manual_resolution = true;
                        return give_up(
                            outcome,
                            n.polls,
                            observed,
                            format!(
                                "conflicts persisted after {} resolution attempts",
                                policy.max_resolve_attempts
                            ),
                        );
                    }

                    self.progress.on_phase(Phase::Resolving).await;
                    match resolver.resolve(head, base) {
                        Ok(report) => {
                            info!("Resolved {} file(s) on {head}", report.files.len());
                            self.wait(
                                head,
                                outcome,
                                n.polls,
                                observed,
                                MergeAction::AutoResolve,
                                policy.settle,
                            )
                            .await;
                        }
                        Err(e) => {
                            warn!("Automatic resolution of {head} failed: {e}");
                            self.progress.on_error(&e).await;
                            outcome.requires_manual_resolution = true;
                            return give_up(
                                outcome,
                                n.polls,
                                observed,
                                format!("automatic conflict resolution failed: {e}"),
                            );
                        }
                    }
                }
                Mergeability::Blocked(reason) => {
                    n.blocked += 1;
                    if policy.blocked.exhausted(n.blocked) {
                        let reason = format!("not mergeable after {} attempts ({reason})", n.blocked);
                        return give_up(outcome, n.polls, observed, reason);
                    }
                    let wait = policy.blocked.delay(n.blocked);
                    self.wait(head, outcome, n.polls, observed, MergeAction::WaitBlocked, wait)
                        .await;
                }
                Mergeability::Unknown => {
                    n.unknown += 1;
                    if policy.unknown.exhausted(n.unknown) {
                        let reason =
                            format!("mergeability still unknown after {} attempts", n.unknown);
                        return give_up(outcome, n.polls, observed, reason);
                    }
                    let wait = policy.unknown.delay(n.unknown);
                    self.wait(head, outcome, n.polls, observed, MergeAction::WaitUnknown, wait)
                        .await;
                }
            }
        }
    }

    /// Back off after a transient failure; `false` when the error is permanent
    /// or the transient budget is spent
    async fn transient_wait(
        &self,
        error: &Error,
        n: &mut Counters,
        observed: Mergeability,
        outcome: &mut PrOutcome,
    ) -> bool {
        if !error.is_transient() {
            return false;
        }
        n.transient += 1;
        let policy = &self.options.policy.transient;
        if policy.exhausted(n.transient) {
            return false;
        }
        debug!("Transient failure during merge loop: {error}");
        let head = outcome
            .pr
            .as_ref()
            .map(|pr| pr.head_ref.clone())
            .unwrap_or_default();
        self.wait(
            &head,
            outcome,
            n.polls,
            observed,
            MergeAction::WaitTransient,
            policy.delay(n.transient),
        )
        .await;
        true
    }

    async fn wait(
        &self,
        head: &str,
        outcome: &mut PrOutcome,
        attempt: u32,
        observed: Mergeability,
        action: MergeAction,
        wait: Duration,
    ) {
        let entry = self.log(outcome, attempt, observed, action, wait);
        self.progress.on_review_wait(head, &entry).await;
        self.sleeper.sleep(wait).await;
    }

    fn log(
        &self,
        outcome: &mut PrOutcome,
        attempt: u32,
        observed: Mergeability,
        action: MergeAction,
        wait: Duration,
    ) -> MergeAttempt {
        let entry = MergeAttempt {
            attempt,
            observed,
            action,
            wait,
        };
        outcome.attempts.push(entry.clone());
        entry
    }
}

fn fail(outcome: &mut PrOutcome, reason: String) {
    outcome.status = ReviewStatus::Failed(reason);
}

fn give_up(outcome: &mut PrOutcome, attempt: u32, observed: Mergeability, reason: String) {
    outcome.attempts.push(MergeAttempt {
        attempt,
        observed,
        action: MergeAction::GiveUp,
        wait: Duration::ZERO,
    });
    fail(outcome, reason);
}
