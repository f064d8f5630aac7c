//! Authentication for GitHub and GitLab
//!
//! Supports CLI-based auth (gh, glab) and environment variables.

mod github;
mod gitlab;

pub use github::{GitHubAuthConfig, get_github_auth, test_github_auth};
pub use gitlab::{GitLabAuthConfig, get_gitlab_auth, test_gitlab_auth};

use reqwest::RequestBuilder;

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh or glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// How a token is presented to the GitLab API
///
/// Decided once, when the credential is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Personal/project access token in the `PRIVATE-TOKEN` header
    PrivateToken,
    /// OAuth token as `Authorization: Bearer`
    Bearer,
}

impl AuthScheme {
    /// Attach the credential to a request
    pub fn apply(self, request: RequestBuilder, token: &str) -> RequestBuilder {
        match self {
            Self::PrivateToken => request.header("PRIVATE-TOKEN", token),
            Self::Bearer => request.bearer_auth(token),
        }
    }
}
