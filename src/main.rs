//! backdate - synthesize dated git activity
//!
//! CLI binary that plans per-day branches over a date window, commits and
//! pushes them, and optionally drives their pull requests to a merge.

use anyhow::{Result, bail};
use backdate::config::{DEFAULT_HEARTBEAT, RunConfig};
use backdate::pipeline::MergePolicy;
use backdate::types::{MergeMethod, Person, Platform};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "backdate")]
#[command(about = "Synthesize dated branch, commit and PR activity - GitHub & GitLab")]
#[command(version)]
struct Cli {
    /// Path to the git repository (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, push and optionally merge dated branches
    Run(RunArgs),

    /// Show the work plan without touching the repository
    Plan {
        #[command(flatten)]
        window: WindowArgs,

        /// RNG seed for a reproducible plan
        #[arg(long)]
        seed: Option<u64>,

        /// Show pull request titles
        #[arg(long)]
        pr: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List eligible and excluded dates
    Calendar {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: NaiveDate,

        /// Region code for holidays
        #[arg(long, default_value = "US")]
        region: String,

        /// Holiday table override (JSON)
        #[arg(long)]
        holidays: Option<PathBuf>,

        /// Print dates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Authentication management
    Auth {
        #[command(subcommand)]
        platform: AuthPlatform,
    },
}

#[derive(Args)]
struct WindowArgs {
    /// First date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    end: NaiveDate,

    /// Region code for holidays
    #[arg(long, default_value = "US")]
    region: String,

    /// Number of branches (one per date)
    #[arg(long)]
    branches: usize,

    /// Total number of commits across all branches
    #[arg(long)]
    commits: usize,

    /// Holiday table override (JSON)
    #[arg(long)]
    holidays: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    window: WindowArgs,

    /// Git remote to push to
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Clone this URL into --path when it is not a repository yet
    #[arg(long)]
    clone_url: Option<String>,

    /// Base branch (defaults to main, then master, then the current branch)
    #[arg(long)]
    base: Option<String>,

    /// Open a pull request per branch
    #[arg(long)]
    pr: bool,

    /// Merge each pull request once it is mergeable
    #[arg(long)]
    auto_merge: bool,

    /// Merge method: merge, squash or rebase
    #[arg(long, default_value = "merge")]
    merge_method: MergeMethod,

    /// Polls allowed while a pull request is blocked by checks or rules
    #[arg(long)]
    merge_attempts: Option<u32>,

    /// RNG seed for a reproducible plan
    #[arg(long)]
    seed: Option<u64>,

    /// Commit author name (requires --author-email)
    #[arg(long, requires = "author_email")]
    author_name: Option<String>,

    /// Commit author email (requires --author-name)
    #[arg(long, requires = "author_name")]
    author_email: Option<String>,

    /// Add a Co-authored-by trailer ("Name <email>")
    #[arg(long, value_parser = parse_person)]
    co_author: Option<Person>,

    /// Heartbeat interval in seconds, 0 to disable
    #[arg(long)]
    heartbeat: Option<u64>,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Emit progress as JSON lines
    #[arg(long)]
    json: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum AuthPlatform {
    /// GitHub authentication
    Github {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// GitLab authentication
    Gitlab {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Test authentication
    Test,
    /// Show authentication setup instructions
    Setup,
}

fn parse_person(raw: &str) -> std::result::Result<Person, String> {
    Person::parse(raw).ok_or_else(|| format!("expected \"Name <email>\", got \"{raw}\""))
}

impl WindowArgs {
    fn into_config(self, path: PathBuf) -> RunConfig {
        RunConfig {
            path,
            clone_url: None,
            remote: "origin".to_string(),
            base: None,
            start: self.start,
            end: self.end,
            region: self.region,
            branches: self.branches,
            commits: self.commits,
            seed: None,
            holidays: self.holidays,
            author: None,
            co_author: None,
            pr: false,
            auto_merge: false,
            merge_method: MergeMethod::default(),
            merge_policy: MergePolicy::default(),
            dry_run: false,
            assume_yes: false,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

impl RunArgs {
    fn into_config(self, path: PathBuf) -> RunConfig {
        let author = match (self.author_name, self.author_email) {
            (Some(name), Some(email)) => Some(Person { name, email }),
            _ => None,
        };
        let mut merge_policy = MergePolicy::default();
        if let Some(attempts) = self.merge_attempts {
            merge_policy.blocked.max_attempts = attempts;
        }

        RunConfig {
            clone_url: self.clone_url,
            remote: self.remote,
            base: self.base,
            seed: self.seed,
            author,
            co_author: self.co_author,
            pr: self.pr,
            auto_merge: self.auto_merge,
            merge_method: self.merge_method,
            merge_policy,
            dry_run: self.dry_run,
            assume_yes: self.yes,
            heartbeat: self
                .heartbeat
                .map_or(DEFAULT_HEARTBEAT, Duration::from_secs),
            ..self.window.into_config(path)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "backdate=debug" } else { "backdate=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Run(args) => {
            let json = args.json;
            let config = args.into_config(path);
            let summary = cli::run_run(&config, json).await?;
            if summary.failed > 0 {
                bail!(
                    "{} of {} date(s) failed",
                    summary.failed,
                    summary.records.len()
                );
            }
        }
        Commands::Plan {
            window,
            seed,
            pr,
            json,
        } => {
            let config = RunConfig {
                seed,
                pr,
                ..window.into_config(path)
            };
            cli::run_plan(&config, json)?;
        }
        Commands::Calendar {
            start,
            end,
            region,
            holidays,
            json,
        } => {
            cli::run_calendar(start, end, &region, holidays.as_deref(), json)?;
        }
        Commands::Auth { platform } => {
            let (platform, action) = match platform {
                AuthPlatform::Github { action } => (Platform::GitHub, action),
                AuthPlatform::Gitlab { action } => (Platform::GitLab, action),
            };
            match action {
                AuthAction::Test => cli::run_auth_test(platform).await?,
                AuthAction::Setup => cli::run_auth_setup(platform),
            }
        }
    }

    Ok(())
}
