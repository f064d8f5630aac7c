//! GitLab platform service implementation

use crate::auth::AuthScheme;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    MergeMethod, Platform, PlatformConfig, PrState, PullRequest, PullRequestState,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on followed redirects
pub const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: String,
    scheme: AuthScheme,
    api_base: String,
    config: PlatformConfig,
    project_path: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    title: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    merge_status: Option<String>,
    #[serde(default)]
    detailed_merge_status: Option<String>,
    #[serde(default)]
    has_conflicts: bool,
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct MergeMrPayload {
    squash: bool,
}

impl MergeRequest {
    fn to_pull_request(&self) -> PullRequest {
        PullRequest {
            number: self.iid,
            html_url: self.web_url.clone(),
            base_ref: self.target_branch.clone(),
            head_ref: self.source_branch.clone(),
            title: self.title.clone(),
        }
    }

    /// Tri-state mergeability and the reason behind it
    ///
    /// `detailed_merge_status` is preferred; older servers only report
    /// `merge_status`.
    fn mergeability(&self) -> (Option<bool>, Option<String>) {
        if let Some(detailed) = self.detailed_merge_status.as_deref() {
            return match detailed {
                "mergeable" => (Some(true), Some(detailed.to_string())),
                "checking" | "unchecked" | "preparing" | "approvals_syncing" => {
                    (None, Some(detailed.to_string()))
                }
                _ if self.has_conflicts => (Some(false), Some("conflict".to_string())),
                other => (Some(false), Some(other.to_string())),
            };
        }

        match self.merge_status.as_deref() {
            Some("can_be_merged") => (Some(true), Some("can_be_merged".to_string())),
            Some("cannot_be_merged") => (Some(false), Some("cannot_be_merged".to_string())),
            Some(other) => (None, Some(other.to_string())),
            None if self.has_conflicts => (Some(false), Some("conflict".to_string())),
            None => (None, None),
        }
    }

    fn to_state(&self) -> PullRequestState {
        let state = match self.state.as_deref() {
            Some("merged") => PrState::Merged,
            Some("closed" | "locked") => PrState::Closed,
            _ => PrState::Open,
        };
        let (mergeable, mergeable_reason) = self.mergeability();

        PullRequestState {
            number: self.iid,
            head_ref: self.source_branch.clone(),
            base_ref: self.target_branch.clone(),
            mergeable,
            mergeable_reason,
            merged: state == PrState::Merged,
            state,
        }
    }
}

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(
        token: String,
        scheme: AuthScheme,
        owner: String,
        repo: String,
        host: Option<String>,
    ) -> Result<Self> {
        let host = host.unwrap_or_else(|| "gitlab.com".to_string());
        let api_base = format!("https://{host}/api/v4");
        let config_host = (host != "gitlab.com").then_some(host);
        Self::with_base_url(api_base, token, scheme, owner, repo, config_host)
    }

    /// Create a service against an explicit API base URL (e.g. `http://host/api/v4`)
    pub fn with_base_url(
        api_base: String,
        token: String,
        scheme: AuthScheme,
        owner: String,
        repo: String,
        host: Option<String>,
    ) -> Result<Self> {
        let project_path = format!("{owner}/{repo}");

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            token,
            scheme,
            api_base: api_base.trim_end_matches('/').to_string(),
            config: PlatformConfig {
                platform: Platform::GitLab,
                owner,
                repo,
                host,
            },
            project_path,
        })
    }

    fn mr_url(&self, suffix: &str) -> String {
        format!(
            "{}/projects/{}/merge_requests{suffix}",
            self.api_base,
            urlencoding::encode(&self.project_path)
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        self.scheme.apply(request, &self.token)
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(Error::Network(format!("{status}: {body}")))
    } else {
        Err(Error::GitLabApi(format!("{status}: {body}")))
    }
}

#[async_trait]
impl PlatformService for GitLabService {
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        let request = self.client.get(self.mr_url("")).query(&[
            ("source_branch", head),
            ("target_branch", base),
            ("state", "opened"),
        ]);

        let mrs: Vec<MergeRequest> = check(self.authed(request).send().await?)
            .await?
            .json()
            .await?;

        Ok(mrs.first().map(MergeRequest::to_pull_request))
    }

    async fn create_pr(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let payload = CreateMrPayload {
            source_branch: head,
            target_branch: base,
            title,
            description: body,
        };
        let request = self.client.post(self.mr_url("")).json(&payload);

        let mr: MergeRequest = check(self.authed(request).send().await?)
            .await?
            .json()
            .await?;

        Ok(mr.to_pull_request())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequestState> {
        let request = self.client.get(self.mr_url(&format!("/{number}")));

        let mr: MergeRequest = check(self.authed(request).send().await?)
            .await?
            .json()
            .await?;

        Ok(mr.to_state())
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<()> {
        // Rebase-vs-merge is a project setting on GitLab; only squash is per request
        let payload = MergeMrPayload {
            squash: method == MergeMethod::Squash,
        };
        let request = self
            .client
            .put(self.mr_url(&format!("/{number}/merge")))
            .json(&payload);

        let response = self.authed(request).send().await?;
        let status = response.status();
        // 405/406: not mergeable, 409: SHA mismatch, 422: unprocessable state
        if matches!(status.as_u16(), 405 | 406 | 409 | 422) {
            let body = response.text().await.unwrap_or_default();
            debug!("Merge of !{number} refused: {status} {body}");
            return Err(Error::MergeBlocked(format!("{status}: {body}")));
        }
        check(response).await?;
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
