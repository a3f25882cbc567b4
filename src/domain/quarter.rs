//! Calendar quarters.
//!
//! Every period in the crate is a calendar quarter; derived entities carry it as
//! the quarter-end date so holdings and prices join on the same key.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter {
    pub year: i32,
    pub q: u8,
}

impl Quarter {
    pub fn new(year: i32, q: u8) -> Option<Self> {
        (1..=4).contains(&q).then_some(Self { year, q })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            q: ((date.month() - 1) / 3 + 1) as u8,
        }
    }

    pub fn end_date(&self) -> NaiveDate {
        let (month, day) = match self.q {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        NaiveDate::from_ymd_opt(self.year, month, day).unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        if self.q == 4 {
            Self {
                year: self.year + 1,
                q: 1,
            }
        } else {
            Self {
                year: self.year,
                q: self.q + 1,
            }
        }
    }
}

/// Snap any date to the last day of its calendar quarter.
pub fn quarter_end(date: NaiveDate) -> NaiveDate {
    Quarter::containing(date).end_date()
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.q)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid quarter: {0} (expected YYYYQn or YYYY-MM-DD)")]
pub struct QuarterParseError(pub String);

impl FromStr for Quarter {
    type Err = QuarterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((year, q)) = s.split_once(['Q', 'q']) {
            let year: i32 = year.parse().map_err(|_| QuarterParseError(s.into()))?;
            let q: u8 = q.parse().map_err(|_| QuarterParseError(s.into()))?;
            return Quarter::new(year, q).ok_or_else(|| QuarterParseError(s.into()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Quarter::containing)
            .map_err(|_| QuarterParseError(s.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn containing_maps_months_to_quarters() {
        assert_eq!(Quarter::containing(d(2024, 1, 1)).q, 1);
        assert_eq!(Quarter::containing(d(2024, 3, 31)).q, 1);
        assert_eq!(Quarter::containing(d(2024, 4, 1)).q, 2);
        assert_eq!(Quarter::containing(d(2024, 9, 30)).q, 3);
        assert_eq!(Quarter::containing(d(2024, 12, 31)).q, 4);
    }

    #[test]
    fn end_dates() {
        assert_eq!(Quarter::new(2024, 1).unwrap().end_date(), d(2024, 3, 31));
        assert_eq!(Quarter::new(2024, 2).unwrap().end_date(), d(2024, 6, 30));
        assert_eq!(Quarter::new(2024, 3).unwrap().end_date(), d(2024, 9, 30));
        assert_eq!(Quarter::new(2024, 4).unwrap().end_date(), d(2024, 12, 31));
    }

    #[test]
    fn next_rolls_over_year() {
        assert_eq!(
            Quarter::new(2023, 4).unwrap().next(),
            Quarter::new(2024, 1).unwrap()
        );
        assert_eq!(
            Quarter::new(2024, 2).unwrap().next(),
            Quarter::new(2024, 3).unwrap()
        );
    }

    #[test]
    fn quarter_end_snaps_mid_quarter_dates() {
        assert_eq!(quarter_end(d(2024, 5, 17)), d(2024, 6, 30));
        assert_eq!(quarter_end(d(2024, 6, 30)), d(2024, 6, 30));
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert!(Quarter::new(2024, 0).is_none());
        assert!(Quarter::new(2024, 5).is_none());
    }

    #[test]
    fn parse_and_display() {
        let q: Quarter = "2024Q3".parse().unwrap();
        assert_eq!(q, Quarter::new(2024, 3).unwrap());
        assert_eq!(q.to_string(), "2024Q3");

        let q: Quarter = "2024-11-02".parse().unwrap();
        assert_eq!(q, Quarter::new(2024, 4).unwrap());

        assert!("2024Q9".parse::<Quarter>().is_err());
        assert!("garbage".parse::<Quarter>().is_err());
    }
}
