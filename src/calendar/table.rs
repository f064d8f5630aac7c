//! Holiday tables
//!
//! A table maps region codes to fixed month/day holidays. Tables are loaded
//! once at startup: an explicit file, the user's config directory, or the
//! built-in default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the user's config directory
const TABLE_FILE_NAME: &str = "holidays.json";

/// Version tag of the built-in table
const BUILTIN_VERSION: &str = "builtin-2024.1";

/// Fixed-date holidays per region, as `MM-DD`
const BUILTIN_HOLIDAYS: &[(&str, &[&str])] = &[
    ("US", &["01-01", "06-19", "07-04", "11-11", "12-25"]),
    ("GB", &["01-01", "12-25", "12-26"]),
    ("DE", &["01-01", "05-01", "10-03", "12-25", "12-26"]),
    ("FR", &["01-01", "05-01", "05-08", "07-14", "08-15", "11-01", "11-11", "12-25"]),
    ("JP", &["01-01", "02-11", "02-23", "04-29", "05-03", "05-04", "05-05", "11-03", "11-23"]),
    ("IN", &["01-26", "08-15", "10-02"]),
    ("CN", &["01-01", "05-01", "10-01", "10-02", "10-03"]),
    ("BR", &["01-01", "04-21", "05-01", "09-07", "10-12", "11-02", "11-15", "12-25"]),
];

/// Region code -> set of (month, day) holidays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayTable {
    version: String,
    regions: BTreeMap<String, BTreeSet<(u32, u32)>>,
}

/// On-disk representation
#[derive(Serialize, Deserialize)]
struct RawTable {
    version: String,
    regions: BTreeMap<String, Vec<String>>,
}

impl HolidayTable {
    /// Build a table from parsed parts
    pub fn new(version: &str, regions: BTreeMap<String, BTreeSet<(u32, u32)>>) -> Self {
        let regions = regions
            .into_iter()
            .map(|(code, days)| (code.to_uppercase(), days))
            .collect();
        Self {
            version: version.to_string(),
            regions,
        }
    }

    /// The table shipped with backdate
    pub fn builtin() -> Self {
        let regions = BUILTIN_HOLIDAYS
            .iter()
            .map(|(code, days)| {
                let set = days
                    .iter()
                    .filter_map(|d| parse_month_day(d).ok())
                    .collect();
                ((*code).to_string(), set)
            })
            .collect();
        Self::new(BUILTIN_VERSION, regions)
    }

    /// Parse a JSON table: `{"version": "...", "regions": {"US": ["01-01"]}}`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mut regions = BTreeMap::new();
        for (code, days) in raw.regions {
            let set = days
                .iter()
                .map(String::as_str)
                .map(parse_month_day)
                .collect::<Result<BTreeSet<_>>>()?;
            regions.insert(code, set);
        }
        Ok(Self::new(&raw.version, regions))
    }

    /// Version tag of this table
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the table knows the region
    pub fn has_region(&self, region: &str) -> bool {
        self.regions.contains_key(&region.to_uppercase())
    }

    /// Known region codes
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Whether month/day is a holiday in the region
    pub fn is_holiday(&self, region: &str, month: u32, day: u32) -> bool {
        self.regions
            .get(&region.to_uppercase())
            .is_some_and(|days| days.contains(&(month, day)))
    }
}

fn parse_month_day(raw: &str) -> Result<(u32, u32)> {
    let invalid = || Error::Parse(format!("invalid holiday '{raw}', expected MM-DD"));
    let (m, d) = raw.split_once('-').ok_or_else(invalid)?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok((month, day))
}

fn default_table_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("backdate").join(TABLE_FILE_NAME))
}

/// Load the holiday table for this run
///
/// Priority:
/// 1. `explicit` path (must exist)
/// 2. `<config dir>/backdate/holidays.json` if present
/// 3. Built-in table
pub fn load_holiday_table(explicit: Option<&Path>) -> Result<HolidayTable> {
    if let Some(path) = explicit {
        debug!("Loading holiday table from {}", path.display());
        return HolidayTable::from_json(&std::fs::read_to_string(path)?);
    }

    if let Some(path) = default_table_path().filter(|p| p.is_file()) {
        debug!("Loading holiday table from {}", path.display());
        return HolidayTable::from_json(&std::fs::read_to_string(path)?);
    }

    Ok(HolidayTable::builtin())
}
