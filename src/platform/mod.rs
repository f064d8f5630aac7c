//! Platform services for GitHub and GitLab
//!
//! Provides a unified interface for the review operations the lifecycle
//! controller needs: lookup, creation, mergeability polling and merge.

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{detect_platform, parse_repo_info, resolve_remote};
pub use factory::create_platform_service;
pub use github::GitHubService;
pub use gitlab::{GitLabService, MAX_REDIRECTS};

use crate::error::Result;
use crate::types::{MergeMethod, PlatformConfig, PullRequest, PullRequestState};
use async_trait::async_trait;

/// Platform service trait for PR/MR operations
///
/// This trait abstracts GitHub and GitLab operations, allowing the same
/// review lifecycle to work with either platform.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find an open PR from `head` into `base`
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>>;

    /// Create a new PR
    async fn create_pr(&self, head: &str, base: &str, title: &str, body: &str)
    -> Result<PullRequest>;

    /// Fetch the current mergeability snapshot of a PR
    async fn get_pr(&self, number: u64) -> Result<PullRequestState>;

    /// Merge a PR
    ///
    /// Returns [`crate::error::Error::MergeBlocked`] when the platform refuses
    /// because the request is not mergeable right now.
    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<()>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
