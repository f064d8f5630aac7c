//! Activity pipeline
//!
//! Three stages per date:
//! 1. Branch: create the date branch, synthesize commits, push
//! 2. Review: find or create the pull request
//! 3. Merge: poll mergeability, resolve conflicts, merge

pub mod backoff;
mod branch;
mod execute;
mod progress;
mod review;

pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use branch::{BranchOptions, BranchReport, local_noon, realize_assignment};
pub use execute::{ExecuteOptions, RunContext, execute_plan, resolve_base};
pub use progress::{
    JsonLinesProgress, Level, NoopProgress, Phase, ProgressCallback, ProgressEvent, PushStatus,
};
pub use review::{MergePolicy, ReviewController, ReviewOptions, pr_body, pr_title};
