//! Working copy driver
//!
//! [`GitRepo`] is the exclusive handle on one local working copy bound to one
//! remote. Every operation shells out to `git`; operations that move HEAD,
//! touch the index or write files take `&mut self` so only one caller can
//! drive the working copy at a time.

mod git;

pub use git::parse_porcelain_conflicts;

use crate::error::{Error, Result};
use crate::types::{BRANCH_PREFIX, BranchState, GitRemote, Person};
use chrono::{DateTime, FixedOffset};
use git::{git_command, is_non_fast_forward, run_git, run_git_stdout, run_prepared};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only file that receives one line per synthesized commit
pub const ACTIVITY_LOG: &str = "ACTIVITY.log";

/// Base branch candidates, in preference order
const BASE_BRANCH_CANDIDATES: &[&str] = &["main", "master"];

/// A commit to create with an explicit historical timestamp
#[derive(Debug, Clone)]
pub struct CommitRecord {
    /// Commit subject (and optional body)
    pub message: String,
    /// Author and committer date
    pub timestamp: DateTime<FixedOffset>,
    /// Optional `Co-authored-by` trailer
    pub co_author: Option<Person>,
}

impl CommitRecord {
    /// Message including trailers
    pub fn full_message(&self) -> String {
        match &self.co_author {
            Some(person) => format!("{}\n\nCo-authored-by: {person}", self.message),
            None => self.message.clone(),
        }
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Remote updated
    Pushed,
    /// Remote updated after a non-fast-forward rejection
    ForcePushed,
    /// Remote already had this commit
    AlreadyUpToDate,
}

/// Result of merging a ref into the current branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// Merge commit created
    Merged,
    /// Nothing to merge
    AlreadyUpToDate,
    /// Merge stopped with conflicts; the working tree is mid-merge
    Conflict {
        /// Conflicted paths
        files: Vec<String>,
    },
}

/// Exclusive handle on a local git working copy
#[derive(Debug)]
pub struct GitRepo {
    workdir: PathBuf,
    remote: String,
    identity: Option<Person>,
}

impl GitRepo {
    /// Open an existing working copy and verify the remote exists
    pub fn open(path: &Path, remote: &str) -> Result<Self> {
        let canonical = path.canonicalize().map_err(|e| {
            Error::RepositoryState(format!("cannot access {}: {e}", path.display()))
        })?;

        let toplevel = run_git_stdout(&canonical, &["rev-parse", "--show-toplevel"])
            .map_err(|_| {
                Error::RepositoryState(format!("{} is not a git repository", path.display()))
            })?;

        let repo = Self {
            workdir: PathBuf::from(toplevel),
            remote: remote.to_string(),
            identity: None,
        };

        if !repo.git_remotes()?.iter().any(|r| r.name == remote) {
            return Err(Error::RepositoryState(format!(
                "remote '{remote}' is not configured in {}",
                repo.workdir.display()
            )));
        }

        debug!("Opened repository at {}", repo.workdir.display());
        Ok(repo)
    }

    /// Open `path`, cloning `url` into it first when it is not a repository
    pub fn init_or_clone(path: &Path, remote: &str, url: Option<&str>) -> Result<Self> {
        let is_repo = path.is_dir() && run_git(path, &["rev-parse", "--git-dir"]).is_ok();
        if is_repo {
            return Self::open(path, remote);
        }

        let Some(url) = url else {
            return Err(Error::RepositoryState(format!(
                "{} is not a git repository and no clone URL was given",
                path.display()
            )));
        };

        let absolute = std::path::absolute(path)?;
        let parent = absolute.parent().unwrap_or_else(|| Path::new("/"));
        std::fs::create_dir_all(parent)?;

        let target = absolute.to_string_lossy();
        debug!("Cloning {url} into {target}");
        run_git(parent, &["clone", "--origin", remote, url, &target])?;

        Self::open(path, remote)
    }

    /// Use this identity for commits instead of the repository's git config
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Person>) -> Self {
        self.identity = identity;
        self
    }

    /// Absolute path of the working tree root
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Name of the remote this handle pushes to
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// List configured remotes
    pub fn git_remotes(&self) -> Result<Vec<GitRemote>> {
        let out = run_git_stdout(&self.workdir, &["remote", "-v"])?;
        let mut remotes: Vec<GitRemote> = Vec::new();
        for line in out.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
                continue;
            };
            if !remotes.iter().any(|r| r.name == name) {
                remotes.push(GitRemote {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
        }
        Ok(remotes)
    }

    /// Current branch, `None` when HEAD is detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        let output = git_command(&self.workdir)
            .args(["symbolic-ref", "--quiet", "--short", "HEAD"])
            .output()?;
        if output.status.success() {
            Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ))
        } else {
            Ok(None)
        }
    }

    /// `main`, then `master`, locally or on the remote
    pub fn default_branch(&self) -> Result<Option<String>> {
        for candidate in BASE_BRANCH_CANDIDATES {
            if self.local_branch_exists(candidate)? || self.tracking_branch_exists(candidate)? {
                return Ok(Some((*candidate).to_string()));
            }
        }
        Ok(None)
    }

    fn ref_exists(&self, refname: &str) -> Result<bool> {
        let status = git_command(&self.workdir)
            .args(["show-ref", "--verify", "--quiet", refname])
            .status()?;
        Ok(status.success())
    }

    /// Whether `refs/heads/<name>` exists
    pub fn local_branch_exists(&self, name: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/heads/{name}"))
    }

    fn tracking_branch_exists(&self, name: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/remotes/{}/{name}", self.remote))
    }

    /// Whether the remote currently has the branch (queries the remote)
    pub fn remote_branch_exists(&self, name: &str) -> Result<bool> {
        let out = run_git_stdout(
            &self.workdir,
            &["ls-remote", "--heads", &self.remote, &format!("refs/heads/{name}")],
        )?;
        Ok(!out.is_empty())
    }

    /// Local and remote presence of a branch
    pub fn branch_state(&self, name: &str) -> Result<BranchState> {
        Ok(BranchState {
            exists_locally: self.local_branch_exists(name)?,
            exists_remotely: self.remote_branch_exists(name)?,
        })
    }

    /// Check out an existing branch
    pub fn checkout(&mut self, name: &str) -> Result<()> {
        run_git(&self.workdir, &["checkout", name])?;
        Ok(())
    }

    /// Create a branch at HEAD and check it out
    pub fn checkout_new(&mut self, name: &str) -> Result<()> {
        run_git(&self.workdir, &["checkout", "-b", name])?;
        Ok(())
    }

    /// Pull `branch` from the bound remote into the current branch
    pub fn pull(&mut self, branch: &str) -> Result<()> {
        let cmd = self.identity_command();
        run_prepared(cmd, &["pull", "--no-rebase", "--no-edit", &self.remote, branch])?;
        Ok(())
    }

    /// Fetch `branch` from the bound remote
    pub fn fetch(&mut self, branch: &str) -> Result<()> {
        run_git(&self.workdir, &["fetch", &self.remote, branch])?;
        Ok(())
    }

    /// Append one line to the activity log
    pub fn append_activity(&mut self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.workdir.join(ACTIVITY_LOG))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Drop staged and unstaged changes to tracked files
    pub fn discard_changes(&mut self) -> Result<()> {
        run_git(&self.workdir, &["reset", "--hard", "--quiet", "HEAD"])?;
        Ok(())
    }

    /// Stage paths
    pub fn stage(&mut self, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        run_git(&self.workdir, &args)?;
        Ok(())
    }

    /// Remove paths from the index and the working tree
    pub fn stage_removal(&mut self, paths: &[&str]) -> Result<()> {
        let mut args = vec!["rm", "--quiet", "--force", "--ignore-unmatch", "--"];
        args.extend_from_slice(paths);
        run_git(&self.workdir, &args)?;
        Ok(())
    }

    /// Commit the index with the record's timestamp; returns the new commit SHA
    pub fn commit(&mut self, record: &CommitRecord, skip_hooks: bool) -> Result<String> {
        let date = record.timestamp.to_rfc3339();
        let message = record.full_message();

        let mut cmd = self.identity_command();
        cmd.env("GIT_AUTHOR_DATE", &date);
        cmd.env("GIT_COMMITTER_DATE", &date);

        let mut args = vec!["commit", "--quiet", "-m", message.as_str()];
        if skip_hooks {
            args.push("--no-verify");
        }
        run_prepared(cmd, &args)?;

        run_git_stdout(&self.workdir, &["rev-parse", "HEAD"])
    }

    /// Push `branch` to the bound remote
    ///
    /// A non-fast-forward rejection is reported as [`Error::NonFastForward`].
    pub fn push(&mut self, branch: &str, force: bool) -> Result<PushResult> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut args = vec!["push", "--porcelain"];
        if force {
            args.push("--force");
        }
        args.push(&self.remote);
        args.push(&refspec);

        let output = git_command(&self.workdir).args(&args).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            if stdout.contains("[up to date]") || stderr.contains("Everything up-to-date") {
                return Ok(PushResult::AlreadyUpToDate);
            }
            return Ok(if force {
                PushResult::ForcePushed
            } else {
                PushResult::Pushed
            });
        }

        let details = format!("{}\n{}", stdout.trim(), stderr.trim());
        if is_non_fast_forward(&details) {
            return Err(Error::NonFastForward {
                branch: branch.to_string(),
                details: details.trim().to_string(),
            });
        }

        Err(Error::Git {
            command: format!("git {}", args.join(" ")),
            stderr: stderr.trim().to_string(),
        })
    }

    /// Push, retrying exactly once with `--force` on a non-fast-forward rejection
    pub fn push_with_fallback(&mut self, branch: &str) -> Result<PushResult> {
        match self.push(branch, false) {
            Err(Error::NonFastForward { details, .. }) => {
                warn!("Push of {branch} rejected, retrying with force: {details}");
                self.push(branch, true)
            }
            other => other,
        }
    }

    /// Delete `branch` on the bound remote
    ///
    /// Only branches in the `backdate/` namespace can be deleted.
    pub fn delete_remote_branch(&mut self, branch: &str) -> Result<()> {
        if !branch.starts_with(BRANCH_PREFIX) || branch.len() == BRANCH_PREFIX.len() {
            return Err(Error::Validation(format!(
                "refusing to delete {branch}: not a {BRANCH_PREFIX} branch"
            )));
        }
        run_git(&self.workdir, &["push", &self.remote, "--delete", branch])?;
        Ok(())
    }

    /// Merge `refname` into the current branch
    ///
    /// On conflict the working tree is left mid-merge for the caller to
    /// resolve or abort.
    pub fn merge(&mut self, refname: &str, message: &str) -> Result<MergeResult> {
        let args = ["merge", "--no-ff", "--no-edit", "-m", message, refname];
        let output = self.identity_command().args(args).output()?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.contains("Already up to date") || stdout.contains("Already up-to-date") {
                return Ok(MergeResult::AlreadyUpToDate);
            }
            return Ok(MergeResult::Merged);
        }

        let files = self.conflicted_files()?;
        if files.is_empty() {
            return Err(Error::Git {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(MergeResult::Conflict { files })
    }

    /// Replace a conflicted path with our side of the merge
    pub fn checkout_ours(&mut self, path: &str) -> Result<()> {
        run_git(&self.workdir, &["checkout", "--ours", "--", path])?;
        Ok(())
    }

    /// Abort an in-progress merge
    pub fn abort_merge(&mut self) -> Result<()> {
        run_git(&self.workdir, &["merge", "--abort"])?;
        Ok(())
    }

    /// Paths with unresolved conflicts
    ///
    /// Falls back to parsing `git status --porcelain` when the diff query fails.
    pub fn conflicted_files(&self) -> Result<Vec<String>> {
        match run_git_stdout(&self.workdir, &["diff", "--name-only", "--diff-filter=U"]) {
            Ok(out) => Ok(out.lines().map(ToString::to_string).collect()),
            Err(e) => {
                debug!("diff --diff-filter=U failed ({e}), parsing raw status");
                let raw = run_git_stdout(&self.workdir, &["status", "--porcelain"])?;
                Ok(parse_porcelain_conflicts(&raw))
            }
        }
    }

    /// Git command carrying the configured identity via `-c` flags
    fn identity_command(&self) -> std::process::Command {
        let mut cmd = git_command(&self.workdir);
        if let Some(identity) = &self.identity {
            cmd.arg("-c");
            cmd.arg(format!("user.name={}", identity.name));
            cmd.arg("-c");
            cmd.arg(format!("user.email={}", identity.email));
        }
        cmd
    }
}
