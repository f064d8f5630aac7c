//! Auth command - test and explain authentication

use crate::cli::style::{Stylize, check};
use anstream::println;
use backdate::auth::{get_github_auth, get_gitlab_auth, test_github_auth, test_gitlab_auth};
use backdate::error::Result;
use backdate::types::Platform;

/// Run the auth test command
pub async fn run_auth_test(platform: Platform) -> Result<()> {
    match platform {
        Platform::GitHub => {
            println!("Testing GitHub authentication...");
            let config = get_github_auth().await?;
            let username = test_github_auth(&config).await?;
            println!("{} Authenticated as {}", check(), username.accent());
            println!("  Token source: {:?}", config.source);
        }
        Platform::GitLab => {
            println!("Testing GitLab authentication...");
            let config = get_gitlab_auth(None).await?;
            let username = test_gitlab_auth(&config).await?;
            println!("{} Authenticated as {}", check(), username.accent());
            println!("  Token source: {:?}", config.source);
            println!("  Scheme: {:?}", config.scheme);
            println!("  Host: {}", config.host);
        }
    }
    Ok(())
}

/// Run the auth setup command (show instructions)
pub fn run_auth_setup(platform: Platform) {
    match platform {
        Platform::GitHub => {
            println!("{}", "GitHub Authentication Setup".emphasis());
            println!();
            println!("Option 1: GitHub CLI (recommended)");
            println!("  Install: https://cli.github.com/");
            println!("  Run: gh auth login");
            println!();
            println!("Option 2: Environment variable");
            println!("  Set GITHUB_TOKEN or GH_TOKEN");
            println!();
            println!("The token needs permission to push branches, open and merge pull requests.");
            println!("For GitHub Enterprise, set GH_HOST to your instance hostname.");
        }
        Platform::GitLab => {
            println!("{}", "GitLab Authentication Setup".emphasis());
            println!();
            println!("Option 1: GitLab CLI (glab)");
            println!("  Install: https://gitlab.com/gitlab-org/cli");
            println!("  Run: glab auth login");
            println!();
            println!("Option 2: Personal access token");
            println!("  Set GITLAB_TOKEN or GL_TOKEN (sent as PRIVATE-TOKEN)");
            println!();
            println!("Option 3: OAuth token");
            println!("  Set GITLAB_OAUTH_TOKEN (sent as a bearer token)");
            println!();
            println!("For self-hosted GitLab, set GITLAB_HOST to your instance hostname.");
        }
    }
}
