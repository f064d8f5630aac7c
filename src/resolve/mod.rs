//! Conflict resolution
//!
//! Only two policies exist. The activity log is append-only, so both sides'
//! lines are kept (a union). Every other file keeps our side.

use crate::error::{Error, Result};
use crate::repo::{ACTIVITY_LOG, CommitRecord, GitRepo, MergeResult, PushResult};
use chrono::Local;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const MARKER_OURS: &str = "<<<<<<<";
const MARKER_BASE: &str = "|||||||";
const MARKER_SPLIT: &str = "=======";
const MARKER_THEIRS: &str = ">>>>>>>";

/// A region of a conflicted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Lines both sides agree on
    Clean(Vec<String>),
    /// One conflict hunk
    Conflict {
        /// Lines from our side
        ours: Vec<String>,
        /// Lines from their side
        theirs: Vec<String>,
    },
}

#[derive(Clone, Copy)]
enum Region {
    Clean,
    Ours,
    Base,
    Theirs,
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.strip_prefix(marker)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

/// Split conflicted file content into clean and conflict segments
///
/// Understands both two-way markers and diff3 style with a `|||||||` base
/// section; base lines are dropped.
pub fn parse_conflicts(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut clean = Vec::new();
    let mut ours = Vec::new();
    let mut theirs = Vec::new();
    let mut region = Region::Clean;

    for line in content.lines() {
        match region {
            Region::Clean if is_marker(line, MARKER_OURS) => {
                if !clean.is_empty() {
                    segments.push(Segment::Clean(std::mem::take(&mut clean)));
                }
                region = Region::Ours;
            }
            Region::Clean => clean.push(line.to_string()),
            Region::Ours if is_marker(line, MARKER_BASE) => region = Region::Base,
            Region::Ours | Region::Base if line == MARKER_SPLIT => region = Region::Theirs,
            Region::Ours => ours.push(line.to_string()),
            Region::Base => {}
            Region::Theirs if is_marker(line, MARKER_THEIRS) => {
                segments.push(Segment::Conflict {
                    ours: std::mem::take(&mut ours),
                    theirs: std::mem::take(&mut theirs),
                });
                region = Region::Clean;
            }
            Region::Theirs => theirs.push(line.to_string()),
        }
    }

    // An unterminated hunk is kept as a conflict so nothing is lost
    if !matches!(region, Region::Clean) {
        segments.push(Segment::Conflict { ours, theirs });
    }
    if !clean.is_empty() {
        segments.push(Segment::Clean(clean));
    }
    segments
}

/// Union of both sides for an append-only log
///
/// Non-blank lines only, deduplicated by trimmed content in first-seen order:
/// all clean lines first, then each hunk's ours followed by theirs.
pub fn resolve_union(content: &str) -> String {
    let segments = parse_conflicts(content);

    let clean = segments.iter().filter_map(|s| match s {
        Segment::Clean(lines) => Some(lines.iter()),
        Segment::Conflict { .. } => None,
    });
    let hunks = segments.iter().filter_map(|s| match s {
        Segment::Conflict { ours, theirs } => Some(ours.iter().chain(theirs.iter())),
        Segment::Clean(_) => None,
    });

    let mut seen = HashSet::new();
    let mut out = String::new();
    for line in clean.flatten().chain(hunks.flatten()) {
        let key = line.trim();
        if key.is_empty() || !seen.insert(key.to_string()) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Whether content still carries conflict markers
pub fn has_conflict_markers(content: &str) -> bool {
    content.lines().any(|line| {
        is_marker(line, MARKER_OURS) || is_marker(line, MARKER_THEIRS) || line == MARKER_SPLIT
    })
}

/// What an automatic resolution did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    /// Files that were conflicted and resolved
    pub files: Vec<String>,
    /// Push of the resolved branch
    pub push: PushResult,
}

/// Brings a head branch up to date with its base, resolving conflicts
pub trait ConflictHandler: Send {
    /// Merge `base` into `head`, resolve, commit and push
    fn resolve(&mut self, head: &str, base: &str) -> Result<ResolveReport>;
}

/// [`ConflictHandler`] that works in the local working copy
pub struct RepoConflictResolver<'a> {
    repo: &'a mut GitRepo,
}

impl<'a> RepoConflictResolver<'a> {
    /// Resolve conflicts in `repo`
    pub fn new(repo: &'a mut GitRepo) -> Self {
        Self { repo }
    }

    fn resolve_file(&mut self, file: &str) -> Result<()> {
        let path = self.repo.workdir().join(file);

        if file == ACTIVITY_LOG {
            if !path.exists() {
                return self.repo.stage_removal(&[file]);
            }
            let content = std::fs::read_to_string(&path)?;
            std::fs::write(&path, resolve_union(&content))?;
            return self.repo.stage(&[file]);
        }

        match self.repo.checkout_ours(file) {
            Ok(()) => self.repo.stage(&[file]),
            Err(e) => {
                // No "ours" version: the file was deleted on our side
                debug!("Keeping deletion of {file}: {e}");
                self.repo.stage_removal(&[file])
            }
        }
    }

    fn remaining_markers(&self, files: &[String]) -> Result<Vec<String>> {
        let mut remaining = Vec::new();
        for file in files {
            let path = self.repo.workdir().join(file);
            if !path.exists() {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            if has_conflict_markers(&String::from_utf8_lossy(&bytes)) {
                remaining.push(file.clone());
            }
        }
        Ok(remaining)
    }
}

impl ConflictHandler for RepoConflictResolver<'_> {
    fn resolve(&mut self, head: &str, base: &str) -> Result<ResolveReport> {
        let remote = self.repo.remote().to_string();
        let upstream = format!("{remote}/{base}");

        self.repo.checkout(head)?;
        self.repo.fetch(base)?;

        let message = format!("Merge {upstream} into {head}");
        let files = match self.repo.merge(&upstream, &message)? {
            MergeResult::Conflict { files } => files,
            MergeResult::Merged | MergeResult::AlreadyUpToDate => {
                info!("{head} merged {upstream} without conflicts");
                let push = self.repo.push_with_fallback(head)?;
                return Ok(ResolveReport {
                    files: Vec::new(),
                    push,
                });
            }
        };

        info!("Resolving {} conflicted file(s) on {head}", files.len());
        for file in &files {
            if let Err(e) = self.resolve_file(file) {
                warn!("Failed to resolve {file}: {e}");
                self.repo.abort_merge()?;
                return Err(e);
            }
        }

        let mut remaining = self.remaining_markers(&files)?;
        remaining.extend(self.repo.conflicted_files()?);
        remaining.sort();
        remaining.dedup();
        if !remaining.is_empty() {
            self.repo.abort_merge()?;
            return Err(Error::PartialResolution { files: remaining });
        }

        let record = CommitRecord {
            message,
            timestamp: Local::now().fixed_offset(),
            co_author: None,
        };
        self.repo.commit(&record, true)?;
        let push = self.repo.push_with_fallback(head)?;

        Ok(ResolveReport { files, push })
    }
}
