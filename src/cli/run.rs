//! Run command - synthesize activity for a date window

use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, arrow};
use anstream::println;
use backdate::calendar::{HolidayCalendar, load_holiday_table};
use backdate::config::RunConfig;
use backdate::error::{Error, Result};
use backdate::pipeline::{
    JsonLinesProgress, ProgressCallback, RunContext, TokioSleeper, execute_plan,
};
use backdate::plan::create_work_plan;
use backdate::platform::{create_platform_service, resolve_remote};
use backdate::repo::GitRepo;
use backdate::types::{RunSummary, WorkPlan};
use dialoguer::Confirm;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::IsTerminal;
use tracing::{info, warn};

/// Build the plan for a configuration
pub fn build_plan(config: &RunConfig) -> Result<WorkPlan> {
    config.validate()?;

    let table = load_holiday_table(config.holidays.as_deref())?;
    let request = config.work_request();
    if !table.has_region(&request.region) {
        warn!(
            "Region {} not in holiday table {}; only rest days are excluded",
            request.region,
            table.version()
        );
    }
    let calendar = HolidayCalendar::new(table);

    let mut rng = config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    create_work_plan(&request, &calendar, &mut rng)
}

/// Ask before touching the remote
///
/// Remote branches named like the plan's are deleted and recreated, so a live
/// run needs explicit consent. Non-interactive sessions must pass `--yes`.
fn confirm(config: &RunConfig, plan: &WorkPlan) -> Result<()> {
    if config.dry_run || config.assume_yes {
        return Ok(());
    }
    if !std::io::stdin().is_terminal() {
        return Err(Error::Validation(
            "refusing to push without confirmation; pass --yes in non-interactive sessions"
                .to_string(),
        ));
    }

    let prompt = format!(
        "Create and push {} branch(es) with {} commit(s) to '{}'? Existing remote branches with the same names will be replaced",
        plan.assignments.len(),
        plan.total_commits(),
        config.remote
    );
    let accepted = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| Error::Internal(format!("confirmation prompt failed: {e}")))?;

    if accepted {
        Ok(())
    } else {
        Err(Error::Validation("aborted by user".to_string()))
    }
}

/// Run the run command
pub async fn run_run(config: &RunConfig, json: bool) -> Result<RunSummary> {
    let plan = build_plan(config)?;

    let mut repo = GitRepo::init_or_clone(&config.path, &config.remote, config.clone_url.as_deref())?
        .with_identity(config.author.clone());

    let platform = if config.pr {
        let platform_config = resolve_remote(&repo.git_remotes()?, &config.remote)?;
        info!(
            "Using {:?} repository {}/{}",
            platform_config.platform, platform_config.owner, platform_config.repo
        );
        Some(create_platform_service(&platform_config).await?)
    } else {
        None
    };

    if !json {
        println!(
            "{} {} branch{} over {} eligible date{}",
            arrow(),
            plan.assignments.len().accent(),
            if plan.assignments.len() == 1 { "" } else { "es" },
            plan.eligible_dates,
            if plan.eligible_dates == 1 { "" } else { "s" }
        );
    }
    confirm(config, &plan)?;

    let progress: Box<dyn ProgressCallback> = if json {
        Box::new(JsonLinesProgress::new(std::io::stdout()))
    } else {
        Box::new(CliProgress::new())
    };
    let sleeper = TokioSleeper;

    let ctx = RunContext {
        repo: &mut repo,
        platform: platform.as_deref(),
        sleeper: &sleeper,
        progress: progress.as_ref(),
    };
    execute_plan(&plan, ctx, &config.execute_options()).await
}
