use std::fmt::Display;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::utils::time::{date_to_file_name, format_log_date};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Start {start} is after end {end}")]
    Reversed { start: String, end: String },
    #[error("{0} is not a valid year")]
    InvalidYear(i32),
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Reversed {
                start: format_log_date(start),
                end: format_log_date(end),
            });
        }
        Ok(Self { start, end })
    }

    /// `1/1/YEAR..=12/31/YEAR`, what a bare year stands for.
    pub fn year(year: i32) -> Result<Self, RangeError> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(RangeError::InvalidYear(year))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(RangeError::InvalidYear(year))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Every day from start to end, both included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while({
            let end = self.end;
            move |d| *d <= end
        })
    }

    /// Calendar years touched by the range, in order.
    pub fn years_spanned(&self) -> Vec<i32> {
        (self.start.year()..=self.end.year()).collect()
    }

    /// Stable artifact name, `res_1-1-2023_12-31-2023.csv`. Exports and cleaned tables of the same
    /// range share it.
    pub fn file_name(&self) -> String {
        format!(
            "res_{}_{}.csv",
            date_to_file_name(self.start),
            date_to_file_name(self.end)
        )
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            format_log_date(self.start),
            format_log_date(self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DateRange, RangeError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_shorthand_matches_explicit_range() {
        let explicit = DateRange::new(date(2022, 1, 1), date(2022, 12, 31)).unwrap();
        assert_eq!(DateRange::year(2022).unwrap(), explicit);
        assert_eq!(explicit.days().count(), 365);
        assert_eq!(explicit.years_spanned(), vec![2022]);
        assert_eq!(DateRange::year(2024).unwrap().days().count(), 366);
    }

    #[test]
    fn test_days_are_inclusive() {
        let range = DateRange::new(date(2023, 12, 30), date(2024, 1, 2)).unwrap();
        let days = range.days().collect::<Vec<_>>();
        assert_eq!(
            days,
            vec![
                date(2023, 12, 30),
                date(2023, 12, 31),
                date(2024, 1, 1),
                date(2024, 1, 2)
            ]
        );
        assert_eq!(range.years_spanned(), vec![2023, 2024]);
    }

    #[test]
    fn test_single_day() {
        let range = DateRange::new(date(2023, 5, 1), date(2023, 5, 1)).unwrap();
        assert_eq!(range.days().collect::<Vec<_>>(), vec![date(2023, 5, 1)]);
    }

    #[test]
    fn test_reversed_range() {
        assert!(matches!(
            DateRange::new(date(2023, 5, 2), date(2023, 5, 1)),
            Err(RangeError::Reversed { .. })
        ));
    }

    #[test]
    fn test_file_name() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 3)).unwrap();
        assert_eq!(range.file_name(), "res_1-1-2023_1-3-2023.csv");
        assert_eq!(range.to_string(), "1/1/2023 - 1/3/2023");
    }
}
