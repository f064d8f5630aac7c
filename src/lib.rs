//! backdate - synthesize dated git activity
//!
//! Partitions a date window into per-day branches, fills each with commits
//! stamped at that date, pushes them, and optionally drives the resulting
//! pull requests on GitHub or GitLab through to a merge.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod platform;
pub mod repo;
pub mod resolve;
pub mod types;

pub use error::{Error, Result};
