//! GitLab authentication

use crate::auth::{AuthScheme, AuthSource};
use crate::error::{Error, Result};
use crate::platform::MAX_REDIRECTS;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tokio::process::Command;

/// GitLab authentication configuration
#[derive(Debug, Clone)]
pub struct GitLabAuthConfig {
    /// Authentication token
    pub token: String,
    /// Where the token was obtained from
    pub source: AuthSource,
    /// How the token is sent
    pub scheme: AuthScheme,
    /// GitLab host (e.g., "gitlab.com")
    pub host: String,
}

/// Environment variables checked for a token, in order
const TOKEN_VARS: &[(&str, AuthScheme)] = &[
    ("GITLAB_TOKEN", AuthScheme::PrivateToken),
    ("GL_TOKEN", AuthScheme::PrivateToken),
    ("GITLAB_OAUTH_TOKEN", AuthScheme::Bearer),
];

/// Get GitLab authentication
///
/// Priority:
/// 1. glab CLI (`glab auth token`)
/// 2. `GITLAB_TOKEN` environment variable
/// 3. `GL_TOKEN` environment variable
/// 4. `GITLAB_OAUTH_TOKEN` environment variable (sent as a bearer token)
pub async fn get_gitlab_auth(host: Option<&str>) -> Result<GitLabAuthConfig> {
    let host = host
        .map(String::from)
        .or_else(|| env::var("GITLAB_HOST").ok())
        .unwrap_or_else(|| "gitlab.com".to_string());

    let cli_token = get_glab_cli_token(&host).await;
    let (token, source, scheme) = resolve_token(cli_token, |name| env::var(name).ok())
        .ok_or_else(|| {
            Error::Auth(
                "No GitLab authentication found. Run `glab auth login` or set GITLAB_TOKEN"
                    .to_string(),
            )
        })?;

    Ok(GitLabAuthConfig {
        token,
        source,
        scheme,
        host,
    })
}

/// Pick a token and its scheme from the CLI result and the environment
fn resolve_token(
    cli_token: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<(String, AuthSource, AuthScheme)> {
    if let Some(token) = cli_token {
        return Some((token, AuthSource::Cli, AuthScheme::PrivateToken));
    }

    TOKEN_VARS.iter().find_map(|(name, scheme)| {
        lookup(name)
            .filter(|t| !t.trim().is_empty())
            .map(|token| (token, AuthSource::EnvVar, *scheme))
    })
}

async fn get_glab_cli_token(host: &str) -> Option<String> {
    // Check glab is available
    Command::new("glab")
        .arg("--version")
        .output()
        .await
        .ok()?;

    // Check authenticated
    let status = Command::new("glab")
        .args(["auth", "status", "--hostname", host])
        .output()
        .await
        .ok()?;

    if !status.status.success() {
        return None;
    }

    let output = Command::new("glab")
        .args(["auth", "token", "--hostname", host])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

/// Test GitLab authentication
pub async fn test_gitlab_auth(config: &GitLabAuthConfig) -> Result<String> {
    let url = format!("https://{}/api/v4/user", config.host);
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let user: GitLabUser = config
        .scheme
        .apply(client.get(&url), &config.token)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::Auth(format!("Invalid token: {e}")))?
        .json()
        .await?;

    Ok(user.username)
}
