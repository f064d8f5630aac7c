//! Calendar command - list eligible and excluded dates

use crate::cli::style::{Stylize, check, date, excluded};
use anstream::println;
use backdate::calendar::{Calendar, HolidayCalendar, load_holiday_table};
use backdate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct DayReport {
    date: NaiveDate,
    eligible: bool,
}

/// Run the calendar command
pub fn run_calendar(
    start: NaiveDate,
    end: NaiveDate,
    region: &str,
    holidays: Option<&Path>,
    json: bool,
) -> Result<()> {
    if start > end {
        return Err(Error::Validation(format!(
            "start date {start} is after end date {end}"
        )));
    }
    let region = region.to_uppercase();
    let table = load_holiday_table(holidays)?;
    let known = table.has_region(&region);
    let version = table.version().to_string();
    let calendar = HolidayCalendar::new(table);

    let days: Vec<DayReport> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| DayReport {
            date,
            eligible: !calendar.is_excluded(date, &region),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }

    println!(
        "Region {} (holiday table {})",
        region.accent(),
        version.muted()
    );
    if !known {
        println!("{}", "Region not in table; only rest days are excluded".muted());
    }
    for day in &days {
        let weekday = day.date.format("%a").to_string();
        if day.eligible {
            println!("  {} {} {}", check(), date(day.date), weekday.muted());
        } else {
            println!(
                "  {} {} {}",
                excluded(),
                day.date.muted(),
                weekday.muted()
            );
        }
    }

    let eligible = days.iter().filter(|d| d.eligible).count();
    println!();
    println!(
        "{} of {} date{} eligible",
        eligible.accent(),
        days.len(),
        if days.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
