// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Inclusive date range used to parameterize extraction.

use crate::EtlError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` date range driving a platform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EtlError> {
        if start > end {
            return Err(EtlError::Config(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A lookback window of `days` days ending today (as supplied by the
    /// caller, since the domain layer must not read the wall clock).
    pub fn lookback(today: NaiveDate, days: i64) -> Result<Self, EtlError> {
        if days < 0 {
            return Err(EtlError::Config(format!("lookback days must be >= 0, got {days}")));
        }
        let start = today - chrono::Duration::days(days);
        Self::new(start, today)
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, EtlError> {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
        Self::new(start, end)
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(DateRange::new(start, end).is_err());
    }

    #[test]
    fn lookback_is_inclusive() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let range = DateRange::lookback(today, 3).unwrap();
        assert_eq!(range.num_days(), 4);
    }
}
