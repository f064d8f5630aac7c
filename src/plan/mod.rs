//! Work partitioning
//!
//! Turns a date window and budgets into a concrete [`WorkPlan`]: which dates
//! get a branch and how many commits each branch receives. Both choices are
//! random so the resulting history has no fixed, inspectable pattern.

use crate::calendar::{Calendar, eligible_dates};
use crate::error::{Error, Result};
use crate::types::{Assignment, WorkPlan, branch_name};
use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Inputs to the partitioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRequest {
    /// First date of the window (inclusive)
    pub start: NaiveDate,
    /// Last date of the window (inclusive)
    pub end: NaiveDate,
    /// Region code for holiday lookup
    pub region: String,
    /// Maximum number of branches (one per date)
    pub branch_budget: usize,
    /// Total commits across all branches
    pub commit_budget: usize,
}

impl WorkRequest {
    /// Check ordering and budget constraints
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::Validation(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        if self.branch_budget == 0 {
            return Err(Error::Validation(
                "branch count must be at least 1".to_string(),
            ));
        }
        if self.commit_budget < self.branch_budget {
            return Err(Error::Validation(format!(
                "commit count ({}) must be at least the branch count ({})",
                self.commit_budget, self.branch_budget
            )));
        }
        Ok(())
    }
}

/// Build a work plan
///
/// The branch budget is clamped to the number of eligible dates instead of
/// failing; only an empty pool is an error.
pub fn create_work_plan<R: Rng + ?Sized>(
    request: &WorkRequest,
    calendar: &dyn Calendar,
    rng: &mut R,
) -> Result<WorkPlan> {
    request.validate()?;

    let pool = eligible_dates(calendar, request.start, request.end, &request.region);
    debug!(
        "Eligible pool: {} of {} days",
        pool.len(),
        (request.end - request.start).num_days() + 1
    );

    if pool.is_empty() {
        return Err(Error::EmptyPool {
            start: request.start.to_string(),
            end: request.end.to_string(),
            region: request.region.clone(),
        });
    }

    let branches = request.branch_budget.min(pool.len());
    let adjusted_branches = branches < request.branch_budget;
    if adjusted_branches {
        debug!(
            "Clamping branches from {} to {}",
            request.branch_budget, branches
        );
    }

    let mut dates: Vec<NaiveDate> = pool.choose_multiple(rng, branches).copied().collect();
    dates.sort_unstable();

    let counts = distribute_commits(request.commit_budget, branches, rng);

    let assignments = dates
        .into_iter()
        .zip(counts)
        .map(|(date, commit_count)| Assignment {
            date,
            branch_name: branch_name(date),
            commit_count,
        })
        .collect();

    Ok(WorkPlan {
        assignments,
        adjusted_branches,
        requested_branches: request.branch_budget,
        eligible_dates: pool.len(),
    })
}

/// Split `total` into `buckets` strictly positive counts
///
/// Every bucket starts at 1; the remaining credits go one at a time to a
/// uniformly random bucket, and the final vector is shuffled.
fn distribute_commits<R: Rng + ?Sized>(total: usize, buckets: usize, rng: &mut R) -> Vec<usize> {
    let mut counts = vec![1; buckets];
    for _ in 0..total.saturating_sub(buckets) {
        counts[rng.gen_range(0..buckets)] += 1;
    }
    counts.shuffle(rng);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{HolidayCalendar, HolidayTable};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{BTreeMap, BTreeSet, HashSet};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> HolidayCalendar {
        let mut regions = BTreeMap::new();
        regions.insert("XX".to_string(), BTreeSet::from([(1, 1)]));
        HolidayCalendar::new(HolidayTable::new("test", regions))
    }

    fn request(branches: usize, commits: usize) -> WorkRequest {
        WorkRequest {
            start: ymd(2024, 1, 1),
            end: ymd(2024, 1, 7),
            region: "XX".to_string(),
            branch_budget: branches,
            commit_budget: commits,
        }
    }

    #[test]
    fn test_two_branches_five_commits() {
        let mut rng = StdRng::seed_from_u64(7);
        let plan = create_work_plan(&request(2, 5), &calendar(), &mut rng).unwrap();

        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.total_commits(), 5);
        assert!(!plan.adjusted_branches);
        assert_eq!(plan.eligible_dates, 5);

        let pool: HashSet<_> = (2..=6).map(|d| ymd(2024, 1, d)).collect();
        for a in &plan.assignments {
            assert!(pool.contains(&a.date), "{} not eligible", a.date);
            assert!(a.commit_count >= 1);
            assert_eq!(a.branch_name, branch_name(a.date));
        }
        assert_ne!(plan.assignments[0].date, plan.assignments[1].date);
    }

    #[test]
    fn test_clamps_to_pool_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let req = WorkRequest {
            start: ymd(2024, 1, 1),
            end: ymd(2024, 1, 4),
            ..request(10, 12)
        };
        let plan = create_work_plan(&req, &calendar(), &mut rng).unwrap();

        assert_eq!(plan.assignments.len(), 3);
        assert!(plan.adjusted_branches);
        assert_eq!(plan.requested_branches, 10);
        assert_eq!(plan.total_commits(), 12);
    }

    #[test]
    fn test_sum_and_positivity_across_seeds() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let branches = usize::try_from(seed % 5).unwrap() + 1;
            let commits = branches + usize::try_from(seed % 17).unwrap();
            let plan = create_work_plan(&request(branches, commits), &calendar(), &mut rng)
                .unwrap();

            assert_eq!(plan.total_commits(), commits, "seed {seed}");
            assert_eq!(plan.assignments.len(), branches, "seed {seed}");
            assert!(plan.assignments.iter().all(|a| a.commit_count >= 1));
            assert!(
                plan.assignments.windows(2).all(|w| w[0].date < w[1].date),
                "assignments sorted and distinct"
            );
        }
    }

    #[test]
    fn test_same_seed_same_plan() {
        let a = create_work_plan(&request(3, 9), &calendar(), &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = create_work_plan(&request(3, 9), &calendar(), &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn test_empty_pool() {
        let req = WorkRequest {
            start: ymd(2024, 1, 7),
            end: ymd(2024, 1, 7),
            ..request(1, 1)
        };
        let err = create_work_plan(&req, &calendar(), &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::EmptyPool { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        let reversed = WorkRequest {
            start: ymd(2024, 2, 1),
            end: ymd(2024, 1, 1),
            ..request(1, 1)
        };
        assert!(matches!(
            create_work_plan(&reversed, &calendar(), &mut rng),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            create_work_plan(&request(0, 3), &calendar(), &mut rng),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            create_work_plan(&request(4, 3), &calendar(), &mut rng),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_distribute_commits_exact_budget() {
        let mut rng = StdRng::seed_from_u64(3);
        let counts = distribute_commits(4, 4, &mut rng);
        assert_eq!(counts, vec![1, 1, 1, 1]);

        let counts = distribute_commits(100, 3, &mut rng);
        assert_eq!(counts.iter().sum::<usize>(), 100);
        assert!(counts.iter().all(|c| *c >= 1));
    }
}
