//! Mock platform service for testing

#![allow(dead_code)]

use async_trait::async_trait;
use backdate::error::{Error, Result};
use backdate::platform::PlatformService;
use backdate::types::{
    MergeMethod, Platform, PlatformConfig, PrState, PullRequest, PullRequestState,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `create_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// Stateful mock platform service
///
/// Features:
/// - Open requests are remembered, so lookups after a create find them
/// - Scripted mergeability snapshots for `get_pr`, last one repeats
/// - Scripted results for `merge_pr`
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    open: Mutex<Vec<PullRequest>>,
    states: Mutex<VecDeque<Result<PullRequestState>>>,
    merge_results: Mutex<VecDeque<Result<()>>>,
    // Call tracking
    find_pr_calls: Mutex<Vec<(String, String)>>,
    create_pr_calls: Mutex<Vec<CreatePrCall>>,
    get_pr_calls: Mutex<Vec<u64>>,
    merge_pr_calls: Mutex<Vec<(u64, MergeMethod)>>,
    // Error injection
    find_errors: Mutex<VecDeque<Error>>,
    error_on_create_pr: Mutex<Option<String>>,
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(1),
            open: Mutex::new(Vec::new()),
            states: Mutex::new(VecDeque::new()),
            merge_results: Mutex::new(VecDeque::new()),
            find_pr_calls: Mutex::new(Vec::new()),
            create_pr_calls: Mutex::new(Vec::new()),
            get_pr_calls: Mutex::new(Vec::new()),
            merge_pr_calls: Mutex::new(Vec::new()),
            find_errors: Mutex::new(VecDeque::new()),
            error_on_create_pr: Mutex::new(None),
        }
    }

    /// Mock for a GitHub repository
    pub fn github() -> Self {
        Self::with_config(PlatformConfig {
            platform: Platform::GitHub,
            owner: "test".to_string(),
            repo: "repo".to_string(),
            host: None,
        })
    }

    // === Scripting ===

    /// Register an already open request
    pub fn add_open_pr(&self, head: &str, base: &str) -> PullRequest {
        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let pr = make_pr(number, head, base);
        self.open.lock().unwrap().push(pr.clone());
        pr
    }

    /// Queue mergeability snapshots; the last one repeats once the queue drains
    pub fn script_states(&self, states: impl IntoIterator<Item = (Option<bool>, Option<&'static str>)>) {
        let mut queue = self.states.lock().unwrap();
        for (mergeable, reason) in states {
            queue.push_back(Ok(snapshot(mergeable, reason)));
        }
    }

    /// Queue a merged snapshot
    pub fn script_merged(&self) {
        let mut state = snapshot(None, None);
        state.merged = true;
        state.state = PrState::Merged;
        self.states.lock().unwrap().push_back(Ok(state));
    }

    /// Queue an error from `get_pr`
    pub fn script_state_error(&self, error: Error) {
        self.states.lock().unwrap().push_back(Err(error));
    }

    /// Queue a result for `merge_pr`; merges succeed once the queue drains
    pub fn script_merge(&self, result: Result<()>) {
        self.merge_results.lock().unwrap().push_back(result);
    }

    /// Make the next `find_open_pr` calls fail with these errors
    pub fn fail_find_pr(&self, errors: impl IntoIterator<Item = Error>) {
        self.find_errors.lock().unwrap().extend(errors);
    }

    /// Make `create_pr` return an error
    pub fn fail_create_pr(&self, msg: &str) {
        *self.error_on_create_pr.lock().unwrap() = Some(msg.to_string());
    }

    // === Call verification methods ===

    /// Get all (head, base) pairs `find_open_pr` was called with
    pub fn get_find_pr_calls(&self) -> Vec<(String, String)> {
        self.find_pr_calls.lock().unwrap().clone()
    }

    /// Get all `create_pr` calls
    pub fn get_create_pr_calls(&self) -> Vec<CreatePrCall> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    /// Number of `get_pr` polls
    pub fn get_pr_count(&self) -> usize {
        self.get_pr_calls.lock().unwrap().len()
    }

    /// Get all `merge_pr` calls
    pub fn get_merge_calls(&self) -> Vec<(u64, MergeMethod)> {
        self.merge_pr_calls.lock().unwrap().clone()
    }

    /// Assert that `create_pr` was called with specific head and base
    pub fn assert_create_pr_called(&self, head: &str, base: &str) {
        let calls = self.get_create_pr_calls();
        assert!(
            calls.iter().any(|c| c.head == head && c.base == base),
            "Expected create_pr({head}, {base}) but got: {calls:?}"
        );
    }
}

fn make_pr(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/repo/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("PR for {head}"),
    }
}

fn snapshot(mergeable: Option<bool>, reason: Option<&str>) -> PullRequestState {
    PullRequestState {
        number: 0,
        head_ref: String::new(),
        base_ref: String::new(),
        mergeable,
        mergeable_reason: reason.map(ToString::to_string),
        merged: false,
        state: PrState::Open,
    }
}

fn clone_result<T: Clone>(result: &Result<T>) -> Result<T> {
    match result {
        Ok(v) => Ok(v.clone()),
        Err(Error::Network(m)) => Err(Error::Network(m.clone())),
        Err(Error::Timeout(d)) => Err(Error::Timeout(*d)),
        Err(Error::MergeBlocked(m)) => Err(Error::MergeBlocked(m.clone())),
        Err(e) => Err(Error::Platform(e.to_string())),
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        self.find_pr_calls
            .lock()
            .unwrap()
            .push((head.to_string(), base.to_string()));

        if let Some(error) = self.find_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        let open = self.open.lock().unwrap();
        Ok(open
            .iter()
            .find(|pr| pr.head_ref == head && pr.base_ref == base)
            .cloned())
    }

    async fn create_pr(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(CreatePrCall {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });

        if let Some(msg) = self.error_on_create_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            title: title.to_string(),
            ..make_pr(number, head, base)
        };
        self.open.lock().unwrap().push(pr.clone());
        Ok(pr)
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequestState> {
        self.get_pr_calls.lock().unwrap().push(number);

        let mut states = self.states.lock().unwrap();
        let next = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().map(clone_result)
        };
        let pr = self
            .open
            .lock()
            .unwrap()
            .iter()
            .find(|pr| pr.number == number)
            .cloned();

        match next {
            Some(Ok(state)) => Ok(PullRequestState {
                number,
                head_ref: pr.as_ref().map(|p| p.head_ref.clone()).unwrap_or_default(),
                base_ref: pr.as_ref().map(|p| p.base_ref.clone()).unwrap_or_default(),
                ..state
            }),
            Some(Err(e)) => Err(e),
            None => Err(Error::Platform(format!("no state scripted for #{number}"))),
        }
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<()> {
        self.merge_pr_calls.lock().unwrap().push((number, method));
        let result = self.merge_results.lock().unwrap().pop_front();
        match result {
            Some(result) => result,
            None => {
                self.open.lock().unwrap().retain(|pr| pr.number != number);
                Ok(())
            }
        }
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
