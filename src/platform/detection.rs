//! Platform detection from remote URLs

use crate::error::{Error, Result};
use crate::types::{GitRemote, Platform, PlatformConfig};
use regex::Regex;
use std::env;

/// Detect platform (GitHub or GitLab) from a remote URL
///
/// Self-hosted instances are recognised through `GH_HOST` and `GITLAB_HOST`.
pub fn detect_platform(url: &str) -> Option<Platform> {
    detect_with_hosts(
        url,
        env::var("GH_HOST").ok().as_deref(),
        env::var("GITLAB_HOST").ok().as_deref(),
    )
}

fn detect_with_hosts(url: &str, gh_host: Option<&str>, gitlab_host: Option<&str>) -> Option<Platform> {
    let hostname = extract_hostname(url)?;

    if hostname == "github.com"
        || hostname.ends_with(".github.com")
        || gh_host.is_some_and(|h| hostname == h)
    {
        return Some(Platform::GitHub);
    }

    if hostname == "gitlab.com"
        || hostname.ends_with(".gitlab.com")
        || gitlab_host.is_some_and(|h| hostname == h)
    {
        return Some(Platform::GitLab);
    }

    None
}

/// Parse repository info (owner/repo) from a remote URL
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    let platform = detect_platform(url).ok_or(Error::NoSupportedRemotes)?;
    let hostname = extract_hostname(url);

    // SSH: git@host:owner/repo.git, HTTPS: https://host/owner/repo.git
    let pattern = Regex::new(r"^(?:git@[^:]+:|(?:https?|ssh)://[^/]+/)(.+?)(?:\.git)?/?$")
        .map_err(|e| Error::Internal(e.to_string()))?;

    let path = pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::Parse(format!("cannot parse remote URL: {url}")))?;

    // GitLab supports nested groups: everything before the last segment is the owner
    let (owner, repo) = path
        .rsplit_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| Error::Parse(format!("invalid repo path: {path}")))?;

    let default_host = match platform {
        Platform::GitHub => "github.com",
        Platform::GitLab => "gitlab.com",
    };

    Ok(PlatformConfig {
        platform,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host: hostname.filter(|h| h != default_host),
    })
}

/// Platform configuration for the named remote
pub fn resolve_remote(remotes: &[GitRemote], name: &str) -> Result<PlatformConfig> {
    let remote = remotes
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| Error::RemoteNotFound(name.to_string()))?;
    parse_repo_info(&remote.url)
}

fn extract_hostname(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("git@") {
        return rest.split(':').next().map(ToString::to_string);
    }

    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
}
