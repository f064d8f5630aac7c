//! CLI commands
//!
//! Command implementations for the `backdate` binary.

mod auth;
mod calendar;
mod plan;
mod progress;
mod run;
pub mod style;

pub use auth::{run_auth_setup, run_auth_test};
pub use calendar::run_calendar;
pub use plan::run_plan;
pub use run::run_run;
