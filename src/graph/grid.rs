use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::utils::time::format_log_date;

pub const DAYS_IN_ROW: usize = 31;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PivotError {
    #[error("`{0}` is not a column of this table")]
    UnknownColumn(String),
    #[error("{0} appears more than once")]
    DuplicateDate(String),
    #[error("There is nothing to draw")]
    Empty,
}

/// Row of a calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

/// Highlighted cell, drawn with an outline and a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub row: usize,
    pub day: usize,
    pub label: String,
}

/// Day of month on one axis and month on the other. Only months that have at least one value get
/// a row. Cells without a value stay empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    rows: Vec<MonthKey>,
    cells: Vec<[Option<u32>; DAYS_IN_ROW]>,
    multi_year: bool,
}

impl CalendarGrid {
    /// Pivots `(date, value)` pairs. With `multi_year` the row labels carry the year.
    pub fn pivot(
        entries: impl IntoIterator<Item = (NaiveDate, u32)>,
        multi_year: bool,
    ) -> Result<Self, PivotError> {
        let mut months = BTreeMap::<MonthKey, [Option<u32>; DAYS_IN_ROW]>::new();
        for (date, value) in entries {
            let key = MonthKey {
                year: date.year(),
                month: date.month(),
            };
            let row = months.entry(key).or_insert([None; DAYS_IN_ROW]);
            let cell = &mut row[date.day0() as usize];
            if cell.is_some() {
                return Err(PivotError::DuplicateDate(format_log_date(date)));
            }
            *cell = Some(value);
        }
        if months.is_empty() {
            return Err(PivotError::Empty);
        }

        let (rows, cells) = months.into_iter().unzip();
        Ok(Self {
            rows,
            cells,
            multi_year,
        })
    }

    pub fn rows(&self) -> &[MonthKey] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn value(&self, row: usize, day: usize) -> Option<u32> {
        self.cells.get(row).and_then(|r| r.get(day)).copied().flatten()
    }

    /// Every filled cell as `(row, day index, value)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, days)| {
            days.iter()
                .enumerate()
                .filter_map(move |(day, value)| value.map(|v| (row, day, v)))
        })
    }

    pub fn max_value(&self) -> u32 {
        self.cells().map(|(_, _, v)| v).max().unwrap_or_default()
    }

    /// Position of `date`, if the grid has a row for its month.
    pub fn locate(&self, date: NaiveDate) -> Option<(usize, usize)> {
        let key = MonthKey {
            year: date.year(),
            month: date.month(),
        };
        self.rows
            .binary_search(&key)
            .ok()
            .map(|row| (row, date.day0() as usize))
    }

    /// Month numbers. Multi year grids prefix January and the first row with the year, for
    /// example `2022 - 1`.
    pub fn row_labels(&self) -> Vec<String> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, key)| {
                if self.multi_year && (i == 0 || key.month == 1) {
                    format!("{} - {}", key.year, key.month)
                } else {
                    key.month.to_string()
                }
            })
            .collect()
    }
}

/// Smallest near-square grid for `count` maps, as `(rows, cols)`. Columns are `ceil(sqrt(count))`
/// and rows the fewest that still fit every map.
pub fn grid_shape(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let mut cols = 1;
    while cols * cols < count {
        cols += 1;
    }
    let rows = count.div_ceil(cols);
    (rows, cols)
}

/// Row-major positions for `count` maps inside [grid_shape].
pub fn grid_positions(count: usize) -> impl Iterator<Item = (usize, usize)> {
    let (_, cols) = grid_shape(count);
    (0..count).map(move |i| (i / cols, i % cols))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{grid_positions, grid_shape, CalendarGrid, MonthKey, PivotError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_grid_shape() {
        assert_eq!(grid_shape(0), (0, 0));
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(2), (1, 2));
        assert_eq!(grid_shape(3), (2, 2));
        assert_eq!(grid_shape(4), (2, 2));
        assert_eq!(grid_shape(5), (2, 3));
        assert_eq!(grid_shape(7), (3, 3));
        assert_eq!(grid_shape(10), (3, 4));
    }

    #[test]
    fn test_grid_shape_is_tight() {
        for n in 1..200 {
            let (rows, cols) = grid_shape(n);
            assert!(rows * cols >= n);
            assert!((rows - 1) * cols < n);
        }
    }

    #[test]
    fn test_positions_fill_rows_first() {
        let positions = grid_positions(5).collect::<Vec<_>>();
        assert_eq!(positions, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_pivot_single_year() {
        let grid = CalendarGrid::pivot(
            [(date(2023, 1, 1), 2), (date(2023, 1, 31), 1), (date(2023, 3, 5), 4)],
            false,
        )
        .unwrap();
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.value(0, 0), Some(2));
        assert_eq!(grid.value(0, 30), Some(1));
        assert_eq!(grid.value(0, 1), None);
        assert_eq!(grid.value(1, 4), Some(4));
        assert_eq!(grid.max_value(), 4);
        assert_eq!(grid.row_labels(), vec!["1", "3"]);
        assert_eq!(grid.locate(date(2023, 3, 5)), Some((1, 4)));
        assert_eq!(grid.locate(date(2023, 2, 5)), None);
        assert_eq!(grid.locate(date(2022, 3, 5)), None);
    }

    #[test]
    fn test_pivot_multi_year_labels() {
        let grid = CalendarGrid::pivot(
            [
                (date(2022, 11, 1), 1),
                (date(2022, 12, 1), 1),
                (date(2023, 1, 1), 1),
                (date(2023, 2, 1), 1),
            ],
            true,
        )
        .unwrap();
        assert_eq!(
            grid.rows()[2],
            MonthKey {
                year: 2023,
                month: 1
            }
        );
        assert_eq!(grid.row_labels(), vec!["2022 - 11", "12", "2023 - 1", "2"]);
    }

    #[test]
    fn test_pivot_rejects_duplicates() {
        let result = CalendarGrid::pivot([(date(2023, 1, 1), 1), (date(2023, 1, 1), 2)], false);
        assert_eq!(result, Err(PivotError::DuplicateDate("1/1/2023".into())));
        assert_eq!(
            CalendarGrid::pivot(std::iter::empty(), false),
            Err(PivotError::Empty)
        );
    }
}
