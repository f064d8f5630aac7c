//! Calendar filtering
//!
//! Decides which dates are eligible for activity. Holidays come from an
//! injected, versioned table so planning stays pure and testable with fake
//! calendars.

mod table;

pub use table::{HolidayTable, load_holiday_table};

use chrono::{Datelike, NaiveDate, Weekday};

/// Exclusion policy for calendar dates
pub trait Calendar {
    /// Whether `date` is a rest day or holiday in `region`
    fn is_excluded(&self, date: NaiveDate, region: &str) -> bool;
}

/// Calendar backed by a weekly rest day and a holiday table
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    rest_day: Weekday,
    table: HolidayTable,
}

impl HolidayCalendar {
    /// Create a calendar with Sunday as the weekly rest day
    pub const fn new(table: HolidayTable) -> Self {
        Self {
            rest_day: Weekday::Sun,
            table,
        }
    }

    /// Override the weekly rest day
    #[must_use]
    pub const fn with_rest_day(mut self, rest_day: Weekday) -> Self {
        self.rest_day = rest_day;
        self
    }

    /// The holiday table in use
    pub const fn table(&self) -> &HolidayTable {
        &self.table
    }
}

impl Calendar for HolidayCalendar {
    fn is_excluded(&self, date: NaiveDate, region: &str) -> bool {
        date.weekday() == self.rest_day || self.table.is_holiday(region, date.month(), date.day())
    }
}

/// All dates in `[start, end]` that the calendar does not exclude
pub fn eligible_dates(
    calendar: &dyn Calendar,
    start: NaiveDate,
    end: NaiveDate,
    region: &str,
) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !calendar.is_excluded(*d, region))
        .collect()
}
