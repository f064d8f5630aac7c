//! Review lifecycle tests against a scripted platform

mod common;

use async_trait::async_trait;
use backdate::error::{Error, Result};
use backdate::pipeline::{
    BackoffPolicy, MergePolicy, NoopProgress, ReviewController, ReviewOptions, Sleeper,
};
use backdate::repo::PushResult;
use backdate::resolve::{ConflictHandler, ResolveReport};
use backdate::types::{MergeAction, MergeMethod, Mergeability, ReviewStatus};
use common::fixtures::{make_assignment, ymd};
use common::mock_platform::MockPlatformService;
use std::sync::Mutex;
use std::time::Duration;

/// Records waits instead of sleeping
#[derive(Default)]
struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Conflict handler that succeeds or fails without touching git
struct StubResolver {
    calls: Vec<(String, String)>,
    fail: bool,
}

impl StubResolver {
    const fn new(fail: bool) -> Self {
        Self {
            calls: Vec::new(),
            fail,
        }
    }
}

impl ConflictHandler for StubResolver {
    fn resolve(&mut self, head: &str, base: &str) -> Result<ResolveReport> {
        self.calls.push((head.to_string(), base.to_string()));
        if self.fail {
            return Err(Error::PartialResolution {
                files: vec!["src/lib.rs".to_string()],
            });
        }
        Ok(ResolveReport {
            files: vec!["ACTIVITY.log".to_string()],
            push: PushResult::Pushed,
        })
    }
}

fn fast_policy() -> MergePolicy {
    MergePolicy {
        blocked: BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(30), 3),
        unknown: BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(10), 4),
        transient: BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(4), 3),
        settle: Duration::from_secs(5),
        call_timeout: Duration::from_secs(30),
        max_resolve_attempts: 2,
    }
}

fn options(auto_merge: bool) -> ReviewOptions {
    ReviewOptions {
        auto_merge,
        merge_method: MergeMethod::Squash,
        policy: fast_policy(),
    }
}

#[tokio::test]
async fn test_creates_request_once_and_reuses_it() {
    let platform = MockPlatformService::github();
    let sleeper = RecordingSleeper::default();
    let opts = options(false);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let assignment = make_assignment(ymd(2024, 1, 2), 2);
    let mut resolver = StubResolver::new(false);

    let first = controller.run(&assignment, "main", &mut resolver).await;
    assert!(first.created);
    assert_eq!(first.status, ReviewStatus::Open);
    platform.assert_create_pr_called("backdate/2024-01-02", "main");

    let second = controller.run(&assignment, "main", &mut resolver).await;
    assert!(!second.created);
    assert_eq!(second.pr.as_ref().map(|p| p.number), first.pr.map(|p| p.number));
    assert_eq!(platform.get_create_pr_calls().len(), 1);

    let call = &platform.get_create_pr_calls()[0];
    assert_eq!(call.title, "Activity for 2024-01-02");
    assert!(call.body.contains("backdate/2024-01-02"));
}

#[tokio::test]
async fn test_existing_request_is_found_not_created() {
    let platform = MockPlatformService::github();
    let existing = platform.add_open_pr("backdate/2024-01-02", "main");
    let sleeper = RecordingSleeper::default();
    let opts = options(false);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(!outcome.created);
    assert_eq!(outcome.pr, Some(existing));
    assert!(platform.get_create_pr_calls().is_empty());
}

#[tokio::test]
async fn test_transient_lookup_failure_is_retried() {
    let platform = MockPlatformService::github();
    platform.fail_find_pr([
        Error::Network("connection reset".to_string()),
        Error::Timeout(Duration::from_secs(30)),
    ]);
    let sleeper = RecordingSleeper::default();
    let opts = options(false);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.created);
    assert_eq!(platform.get_find_pr_calls().len(), 3);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_permanent_create_failure_is_recorded() {
    let platform = MockPlatformService::github();
    platform.fail_create_pr("head branch does not exist");
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.pr.is_none());
    assert!(matches!(outcome.status, ReviewStatus::Failed(ref m) if m.contains("head branch")));
    assert_eq!(platform.get_create_pr_calls().len(), 1);
    assert_eq!(platform.get_pr_count(), 0);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_unknown_then_mergeable_merges() {
    let platform = MockPlatformService::github();
    platform.script_states([
        (None, Some("unknown")),
        (None, Some("unknown")),
        (Some(true), Some("clean")),
    ]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.is_merged());
    assert_eq!(platform.get_merge_calls(), vec![(1, MergeMethod::Squash)]);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    let actions: Vec<_> = outcome.attempts.iter().map(|a| a.action).collect();
    assert_eq!(
        actions,
        vec![
            MergeAction::WaitUnknown,
            MergeAction::WaitUnknown,
            MergeAction::Merge
        ]
    );
}

#[tokio::test]
async fn test_already_merged_skips_merge_call() {
    let platform = MockPlatformService::github();
    platform.add_open_pr("backdate/2024-01-02", "main");
    platform.script_merged();
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.is_merged());
    assert!(platform.get_merge_calls().is_empty());
}

#[tokio::test]
async fn test_blocked_gives_up_at_ceiling() {
    let platform = MockPlatformService::github();
    platform.script_states([(Some(false), Some("blocked"))]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert_eq!(
        outcome.status,
        ReviewStatus::Failed("not mergeable after 3 attempts (blocked)".to_string())
    );
    assert!(!outcome.requires_manual_resolution);
    assert_eq!(platform.get_pr_count(), 3);
    assert!(platform.get_merge_calls().is_empty());
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
    assert_eq!(
        outcome.attempts.last().map(|a| a.action),
        Some(MergeAction::GiveUp)
    );
}

#[tokio::test]
async fn test_merge_refused_counts_as_blocked() {
    let platform = MockPlatformService::github();
    platform.script_states([(Some(true), Some("clean"))]);
    platform.script_merge(Err(Error::MergeBlocked("required status check pending".to_string())));
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.is_merged());
    assert_eq!(platform.get_merge_calls().len(), 2);
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn test_conflict_is_resolved_then_merged() {
    let platform = MockPlatformService::github();
    platform.script_states([
        (Some(false), Some("dirty")),
        (None, Some("unknown")),
        (Some(true), Some("clean")),
    ]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 5), 3), "main", &mut resolver)
        .await;

    assert!(outcome.is_merged());
    assert!(!outcome.requires_manual_resolution);
    assert_eq!(
        resolver.calls,
        vec![("backdate/2024-01-05".to_string(), "main".to_string())]
    );
    assert_eq!(outcome.attempts[0].observed, Mergeability::Conflicting);
    assert_eq!(outcome.attempts[0].action, MergeAction::AutoResolve);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(5), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_resolver_failure_requires_manual_resolution() {
    let platform = MockPlatformService::github();
    platform.script_states([(Some(false), Some("dirty"))]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(true);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.requires_manual_resolution);
    assert!(
        matches!(outcome.status, ReviewStatus::Failed(ref m) if m.contains("automatic conflict resolution failed"))
    );
    assert_eq!(resolver.calls.len(), 1);
    assert!(platform.get_merge_calls().is_empty());
}

#[tokio::test]
async fn test_persistent_conflict_stops_after_resolve_budget() {
    let platform = MockPlatformService::github();
    platform.script_states([(Some(false), Some("dirty"))]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.requires_manual_resolution);
    assert_eq!(resolver.calls.len(), 2);
    assert_eq!(
        outcome.status,
        ReviewStatus::Failed("conflicts persisted after 2 resolution attempts".to_string())
    );
}

#[tokio::test]
async fn test_unknown_ceiling() {
    let platform = MockPlatformService::github();
    platform.script_states([(None, None)]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert_eq!(
        outcome.status,
        ReviewStatus::Failed("mergeability still unknown after 4 attempts".to_string())
    );
    assert_eq!(platform.get_pr_count(), 4);
}

#[tokio::test]
async fn test_transient_poll_failure_then_merge() {
    let platform = MockPlatformService::github();
    platform.script_state_error(Error::Network("502 from upstream".to_string()));
    platform.script_states([(Some(true), Some("clean"))]);
    let sleeper = RecordingSleeper::default();
    let opts = options(true);
    let controller = ReviewController::new(&platform, &sleeper, &NoopProgress, &opts);
    let mut resolver = StubResolver::new(false);

    let outcome = controller
        .run(&make_assignment(ymd(2024, 1, 2), 1), "main", &mut resolver)
        .await;

    assert!(outcome.is_merged());
    assert_eq!(outcome.attempts[0].action, MergeAction::WaitTransient);
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(1)]);
}
