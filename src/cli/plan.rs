//! Plan command - show the work plan without touching a repository

use crate::cli::run::build_plan;
use crate::cli::style::{Stylize, arrow, attention};
use anstream::println;
use backdate::config::RunConfig;
use backdate::error::Result;
use backdate::pipeline::pr_title;

/// Run the plan command
pub fn run_plan(config: &RunConfig, json: bool) -> Result<()> {
    let plan = build_plan(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{} {} branch{}, {} commit{} ({} eligible date{})",
        arrow(),
        plan.assignments.len().accent(),
        if plan.assignments.len() == 1 { "" } else { "es" },
        plan.total_commits().accent(),
        if plan.total_commits() == 1 { "" } else { "s" },
        plan.eligible_dates,
        if plan.eligible_dates == 1 { "" } else { "s" }
    );
    for assignment in &plan.assignments {
        let mut line = format!(
            "  {}  {:>3} commit{}",
            assignment.branch_name.accent(),
            assignment.commit_count,
            if assignment.commit_count == 1 { " " } else { "s" }
        );
        if config.pr {
            line.push_str(&format!("  {}", pr_title(assignment.date).muted()));
        }
        println!("{line}");
    }

    if plan.adjusted_branches {
        println!();
        println!(
            "{} Branch count reduced from {} to {}",
            attention(),
            plan.requested_branches,
            plan.assignments.len()
        );
    }
    Ok(())
}
