//! Date-continuity report over a symbol's files.
//!
//! Completeness is not enforced anywhere; gaps are only reported.

use crate::config::TimePeriod;
use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuityReport {
    pub symbol: String,
    pub files: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    /// Dates between `first` and `last` with no file.
    pub missing: Vec<NaiveDate>,
}

impl ContinuityReport {
    pub fn has_gaps(&self) -> bool {
        !self.missing.is_empty()
    }
}

fn step(date: NaiveDate, period: TimePeriod) -> Option<NaiveDate> {
    match period {
        TimePeriod::Daily => date.succ_opt(),
        TimePeriod::Monthly => date.checked_add_months(Months::new(1)),
    }
}

/// Build the report for one symbol from the dates its files carry.
/// Monthly dates are expected on the first of the month.
pub fn continuity<I>(symbol: &str, dates: I, period: TimePeriod) -> ContinuityReport
where
    I: IntoIterator<Item = NaiveDate>,
{
    let present: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let first = present.first().copied();
    let last = present.last().copied();

    let mut missing = Vec::new();
    if let (Some(first), Some(last)) = (first, last) {
        let mut cursor = step(first, period);
        while let Some(date) = cursor {
            if date >= last {
                break;
            }
            if !present.contains(&date) {
                missing.push(date);
            }
            cursor = step(date, period);
        }
    }

    ContinuityReport {
        symbol: symbol.to_string(),
        files: present.len(),
        first,
        last,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn contiguous_days_have_no_gaps() {
        let r = continuity("X", [d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)], TimePeriod::Daily);
        assert_eq!(r.files, 3);
        assert_eq!(r.first, Some(d(2024, 1, 1)));
        assert_eq!(r.last, Some(d(2024, 1, 3)));
        assert!(!r.has_gaps());
    }

    #[test]
    fn missing_days_are_listed() {
        let r = continuity(
            "X",
            [d(2024, 2, 27), d(2024, 3, 2), d(2024, 2, 28)],
            TimePeriod::Daily,
        );
        assert_eq!(r.missing, vec![d(2024, 2, 29), d(2024, 3, 1)]);
    }

    #[test]
    fn monthly_step_crosses_year_end() {
        let r = continuity("X", [d(2023, 11, 1), d(2024, 2, 1)], TimePeriod::Monthly);
        assert_eq!(r.missing, vec![d(2023, 12, 1), d(2024, 1, 1)]);
    }

    #[test]
    fn no_files_is_an_empty_report() {
        let r = continuity("X", Vec::new(), TimePeriod::Daily);
        assert_eq!(r.files, 0);
        assert_eq!(r.first, None);
        assert!(!r.has_gaps());
    }
}
