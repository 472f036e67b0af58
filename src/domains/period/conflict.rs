//! Overlap rules between reporting periods.
//!
//! Periods of different granularity nest (a quarter sits inside its half and
//! its year), so their date ranges are expected to overlap. Periods of the
//! same granularity must never overlap. Containment itself is not verified.

use crate::domains::period::types::{PeriodCandidate, PeriodType, ReportingPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Conflict,
}

/// Decide whether two periods whose date ranges intersect may coexist.
///
/// Every pair of types is listed so that adding a period type fails to
/// compile until its overlap rules are decided. The year does not enter the
/// decision: same-type overlaps conflict within a year and across years.
pub fn compatibility(candidate: PeriodType, existing: PeriodType) -> Compatibility {
    use PeriodType::*;

    match (candidate, existing) {
        (Quarter, Quarter) | (Half, Half) | (Yearly, Yearly) => Compatibility::Conflict,

        (Yearly, Half) | (Half, Yearly) => Compatibility::Compatible,
        (Yearly, Quarter) | (Quarter, Yearly) => Compatibility::Compatible,
        (Half, Quarter) | (Quarter, Half) => Compatibility::Compatible,
    }
}

/// Closed date ranges intersect when each starts no later than the other ends.
pub fn ranges_intersect(candidate: &PeriodCandidate, existing: &ReportingPeriod) -> bool {
    candidate.start_date <= existing.end_date && candidate.end_date >= existing.start_date
}

/// First existing period the candidate may not overlap with, if any
pub fn find_conflict<'a>(
    candidate: &PeriodCandidate,
    overlapping: &'a [ReportingPeriod],
) -> Option<&'a ReportingPeriod> {
    overlapping.iter().find(|existing| {
        ranges_intersect(candidate, existing)
            && compatibility(candidate.period_type, existing.period_type) == Compatibility::Conflict
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::period::types::PeriodStatus;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn existing(period_type: PeriodType, number: i64, year: i64, start: NaiveDate, end: NaiveDate) -> ReportingPeriod {
        ReportingPeriod {
            period_id: Uuid::new_v4(),
            year,
            period_type,
            period_number: number,
            start_date: start,
            end_date: end,
            status: PeriodStatus::Closed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn candidate(period_type: PeriodType, number: i64, year: i64, start: NaiveDate, end: NaiveDate) -> PeriodCandidate {
        PeriodCandidate {
            period_type,
            period_number: number,
            year,
            start_date: start,
            end_date: end,
            status: PeriodStatus::Open,
        }
    }

    #[test]
    fn same_type_always_conflicts() {
        for t in [PeriodType::Quarter, PeriodType::Half, PeriodType::Yearly] {
            assert_eq!(compatibility(t, t), Compatibility::Conflict);
        }
    }

    #[test]
    fn cross_granularity_is_compatible_both_ways() {
        use PeriodType::*;
        for (a, b) in [(Yearly, Half), (Yearly, Quarter), (Half, Quarter)] {
            assert_eq!(compatibility(a, b), Compatibility::Compatible);
            assert_eq!(compatibility(b, a), Compatibility::Compatible);
        }
    }

    #[test]
    fn quarter_inside_yearly_is_not_a_conflict() {
        let year = existing(PeriodType::Yearly, 1, 2025, date(2025, 1, 1), date(2025, 12, 31));
        let q1 = candidate(PeriodType::Quarter, 1, 2025, date(2025, 1, 1), date(2025, 3, 31));
        assert!(find_conflict(&q1, &[year]).is_none());
    }

    #[test]
    fn overlapping_quarters_conflict() {
        let q1 = existing(PeriodType::Quarter, 1, 2025, date(2025, 1, 1), date(2025, 3, 31));
        let shifted = candidate(PeriodType::Quarter, 1, 2025, date(2025, 2, 1), date(2025, 4, 30));
        let found = find_conflict(&shifted, std::slice::from_ref(&q1));
        assert_eq!(found.map(|p| p.period_id), Some(q1.period_id));
    }

    #[test]
    fn overlap_across_years_still_conflicts_for_same_type() {
        let late_q4 = existing(PeriodType::Quarter, 4, 2024, date(2024, 10, 1), date(2025, 1, 15));
        let q1 = candidate(PeriodType::Quarter, 1, 2025, date(2025, 1, 1), date(2025, 3, 31));
        assert!(find_conflict(&q1, &[late_q4]).is_some());
    }

    #[test]
    fn touching_is_overlap_but_adjacent_is_not() {
        let q1 = existing(PeriodType::Quarter, 1, 2025, date(2025, 1, 1), date(2025, 3, 31));
        let adjacent = candidate(PeriodType::Quarter, 2, 2025, date(2025, 4, 1), date(2025, 6, 30));
        assert!(!ranges_intersect(&adjacent, &q1));

        let touching = candidate(PeriodType::Quarter, 2, 2025, date(2025, 3, 31), date(2025, 6, 30));
        assert!(ranges_intersect(&touching, &q1));
    }
}
