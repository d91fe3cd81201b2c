//! Trading calendar: an ordered set of trade dates.

use chrono::NaiveDate;

use super::error::SimError;

/// Compact date form used in file names, configs and result tables.
pub const COMPACT_DATE: &str = "%Y%m%d";

/// Parses `YYYYMMDD`, also accepting the dashed `YYYY-MM-DD` form.
pub fn parse_trade_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, COMPACT_DATE)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeCalendar {
    dates: Vec<NaiveDate>,
}

impl TradeCalendar {
    pub fn new(mut dates: Vec<NaiveDate>) -> Result<Self, SimError> {
        dates.sort();
        dates.dedup();
        if dates.is_empty() {
            return Err(SimError::Calendar {
                reason: "calendar has no trade dates".into(),
            });
        }
        Ok(TradeCalendar { dates })
    }

    pub fn trade_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    pub fn index_of(&self, date: NaiveDate) -> Result<usize, SimError> {
        self.dates
            .binary_search(&date)
            .map_err(|_| SimError::Calendar {
                reason: format!("{} is not a trade date", date.format(COMPACT_DATE)),
            })
    }

    /// Trade dates in `[bgn, stp)`.
    pub fn iter_range(&self, bgn: NaiveDate, stp: NaiveDate) -> Vec<NaiveDate> {
        let lo = self.dates.partition_point(|d| *d < bgn);
        let hi = self.dates.partition_point(|d| *d < stp);
        if lo >= hi {
            return Vec::new();
        }
        self.dates[lo..hi].to_vec()
    }

    /// The trade date `shift` sessions away; negative shifts go back.
    pub fn next_date(&self, date: NaiveDate, shift: i64) -> Result<NaiveDate, SimError> {
        let idx = self.index_of(date)? as i64 + shift;
        if idx < 0 || idx >= self.dates.len() as i64 {
            return Err(SimError::Calendar {
                reason: format!(
                    "shifting {} by {} leaves the calendar",
                    date.format(COMPACT_DATE),
                    shift
                ),
            });
        }
        Ok(self.dates[idx as usize])
    }

    /// Signal/execution date pairs for executions in `[bgn, stp)`.
    ///
    /// The first signal date is the session before `bgn`, so the first
    /// execution happens on `bgn` itself when it is a trade date.
    pub fn sig_exe_pairs(
        &self,
        bgn: NaiveDate,
        stp: NaiveDate,
    ) -> Result<Vec<(NaiveDate, NaiveDate)>, SimError> {
        let first = self.dates.partition_point(|d| *d < bgn);
        if first == 0 {
            return Err(SimError::Calendar {
                reason: format!(
                    "no trade date before {} to read a signal from",
                    bgn.format(COMPACT_DATE)
                ),
            });
        }
        let sig_bgn = self.dates[first - 1];
        let iter_dates = self.iter_range(sig_bgn, stp);
        Ok(iter_dates
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .collect())
    }
}
