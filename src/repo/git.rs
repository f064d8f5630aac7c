//! Low-level git process helpers

use crate::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Create a git Command rooted at `workdir`
///
/// Terminal prompts are disabled so a missing credential fails fast instead
/// of hanging the run.
pub(crate) fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// Run git and return its output, failing on a non-zero exit
pub(crate) fn run_git(workdir: &Path, args: &[&str]) -> Result<Output> {
    let output = git_command(workdir).args(args).output()?;
    check_status(args, output)
}

/// Run git and return trimmed stdout
pub(crate) fn run_git_stdout(workdir: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a prepared command, failing on a non-zero exit
pub(crate) fn run_prepared(mut cmd: Command, args: &[&str]) -> Result<Output> {
    let output = cmd.args(args).output()?;
    check_status(args, output)
}

fn check_status(args: &[&str], output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::Git {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Whether git's push output describes a non-fast-forward rejection
pub(crate) fn is_non_fast_forward(stderr: &str) -> bool {
    stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("[rejected]")
}

/// Extract conflicted paths from `git status --porcelain` output
///
/// Unmerged entries use the two-letter codes DD, AU, UD, UA, DU, AA and UU.
pub fn parse_porcelain_conflicts(porcelain: &str) -> Vec<String> {
    const UNMERGED: &[&str] = &["DD", "AU", "UD", "UA", "DU", "AA", "UU"];

    porcelain
        .lines()
        .filter_map(|line| {
            let code = line.get(..2)?;
            let path = line.get(3..)?;
            UNMERGED
                .contains(&code)
                .then(|| path.trim().trim_matches('"').to_string())
        })
        .collect()
}
