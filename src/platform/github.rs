//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    MergeMethod, Platform, PlatformConfig, PrState, PullRequest, PullRequestState,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::IssueState;
use octocrab::models::pulls::PullRequest as GhPullRequest;
use tracing::debug;

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        if let Some(ref h) = host {
            let base_url = format!("https://{h}/api/v3");
            builder = builder
                .base_uri(&base_url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder.build().map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                platform: Platform::GitHub,
                owner,
                repo,
                host,
            },
        })
    }
}

fn to_pull_request(pr: &GhPullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
    }
}

fn to_state(pr: &GhPullRequest) -> PullRequestState {
    let merged = pr.merged.unwrap_or(false) || pr.merged_at.is_some();
    let state = if merged {
        PrState::Merged
    } else if matches!(pr.state, Some(IssueState::Closed)) {
        PrState::Closed
    } else {
        PrState::Open
    };

    // `mergeable_state` serializes to GitHub's lowercase wire names
    let mergeable_reason = pr
        .mergeable_state
        .as_ref()
        .and_then(|s| serde_json::to_value(s).ok())
        .and_then(|v| v.as_str().map(ToString::to_string));

    PullRequestState {
        number: pr.number,
        head_ref: pr.head.ref_field.clone(),
        base_ref: pr.base.ref_field.clone(),
        mergeable: pr.mergeable,
        mergeable_reason,
        merged,
        state,
    }
}

const fn github_merge_method(method: MergeMethod) -> octocrab::params::pulls::MergeMethod {
    match method {
        MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
        MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
        MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        let head = format!("{}:{}", &self.config.owner, head);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .base(base)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        Ok(prs.items.first().map(to_pull_request))
    }

    async fn create_pr(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(title, head, base)
            .body(body)
            .send()
            .await?;

        Ok(to_pull_request(&pr))
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequestState> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;

        Ok(to_state(&pr))
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<()> {
        let result = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .merge(number)
            .method(github_merge_method(method))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // 405: not mergeable, 409: head moved underneath us
            Err(octocrab::Error::GitHub { source, .. })
                if matches!(source.status_code.as_u16(), 405 | 409) =>
            {
                debug!("Merge of #{number} refused: {}", source.message);
                Err(Error::MergeBlocked(source.message))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
