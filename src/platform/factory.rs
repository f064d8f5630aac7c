//! Platform service factory
//!
//! Creates platform services based on configuration.

use crate::auth::{get_github_auth, get_gitlab_auth};
use crate::error::Result;
use crate::platform::{GitHubService, GitLabService, PlatformService};
use crate::types::{Platform, PlatformConfig};
use tracing::debug;

/// Create a platform service from configuration
///
/// Handles authentication and client construction for both GitHub and GitLab.
pub async fn create_platform_service(
    config: &PlatformConfig,
) -> Result<Box<dyn PlatformService>> {
    match config.platform {
        Platform::GitHub => {
            let auth = get_github_auth().await?;
            debug!("Using GitHub token from {:?}", auth.source);
            Ok(Box::new(GitHubService::new(
                &auth.token,
                config.owner.clone(),
                config.repo.clone(),
                config.host.clone(),
            )?))
        }
        Platform::GitLab => {
            let auth = get_gitlab_auth(config.host.as_deref()).await?;
            debug!("Using GitLab token from {:?} ({:?})", auth.source, auth.scheme);
            Ok(Box::new(GitLabService::new(
                auth.token,
                auth.scheme,
                config.owner.clone(),
                config.repo.clone(),
                Some(auth.host),
            )?))
        }
    }
}
