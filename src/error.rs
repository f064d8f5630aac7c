//! Error types for backdate

use thiserror::Error;

/// Errors produced by planning, repository and review operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input (date range, budgets, flags)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Every date in the requested window is excluded by the calendar
    #[error("no eligible dates between {start} and {end} for region {region}")]
    EmptyPool {
        /// First date of the window
        start: String,
        /// Last date of the window
        end: String,
        /// Region code used for holiday lookup
        region: String,
    },

    /// Working copy is unusable (not a repository, missing remote, ...)
    #[error("repository error: {0}")]
    RepositoryState(String),

    /// A git command failed
    #[error("git command failed: {command}\nstderr: {stderr}")]
    Git {
        /// The command line that was run
        command: String,
        /// Captured stderr
        stderr: String,
    },

    /// Push rejected because the remote branch has diverged
    #[error("push of {branch} rejected (non-fast-forward): {details}")]
    NonFastForward {
        /// Branch that was pushed
        branch: String,
        /// Output from git
        details: String,
    },

    /// Conflict markers remained after automatic resolution
    #[error("conflict markers remain after resolution in: {}", files.join(", "))]
    PartialResolution {
        /// Paths that still contain markers
        files: Vec<String>,
    },

    /// Remote refused to merge the request (checks, protection, conflicts)
    #[error("merge blocked: {0}")]
    MergeBlocked(String),

    /// Connection-level failure talking to the remote
    #[error("network error: {0}")]
    Network(String),

    /// A remote call exceeded its time limit
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API error
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Generic platform failure
    #[error("platform error: {0}")]
    Platform(String),

    /// Authentication failure
    #[error("authentication error: {0}")]
    Auth(String),

    /// Could not parse a value
    #[error("parse error: {0}")]
    Parse(String),

    /// No remote points at a supported platform
    #[error("no supported remotes found (GitHub or GitLab)")]
    NoSupportedRemotes,

    /// Requested remote does not exist
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invariant violation inside backdate
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same operation later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::GitLabApi(err.to_string())
        }
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status >= 500 || status == 429 {
                    Self::Network(format!("{status}: {}", source.message))
                } else {
                    Self::GitHubApi(format!("{status}: {}", source.message))
                }
            }
            // Transport, decoding and URI failures never reached the API
            other => Self::Network(other.to_string()),
        }
    }
}

/// Result type alias using backdate's error
pub type Result<T> = std::result::Result<T, Error>;
