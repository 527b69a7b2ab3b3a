use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};

use crate::store::entities::LogDate;

use super::grid::{CalendarGrid, Mark};

/// Labels for dates worth highlighting, read from a `{"M/D/YYYY": "label"}` file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotableDays(BTreeMap<LogDate, String>);

impl NotableDays {
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(contents)?))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?;
        Self::from_json(&contents).with_context(|| format!("Failed to parse {path:?}"))
    }

    /// Marks for the days that have a cell in `grid`. Other days are ignored.
    pub fn marks(&self, grid: &CalendarGrid) -> Vec<Mark> {
        self.0
            .iter()
            .filter_map(|(date, label)| {
                grid.locate(date.0)
                    .filter(|(row, day)| grid.value(*row, *day).is_some())
                    .map(|(row, day)| Mark {
                        row,
                        day,
                        label: label.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::graph::grid::{CalendarGrid, Mark};

    use super::NotableDays;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    #[test]
    fn test_marks_only_cover_drawn_days() {
        let notable = NotableDays::from_json(
            r#"{"1/2/2023": "trip", "3/1/2023": "later", "1/30/2023": "empty"}"#,
        )
        .unwrap();

        let grid = CalendarGrid::pivot([(date(1, 1), 1), (date(1, 2), 3)], false).unwrap();
        assert_eq!(
            notable.marks(&grid),
            vec![Mark {
                row: 0,
                day: 1,
                label: "trip".into()
            }]
        );
    }

    #[test]
    fn test_invalid_contents() {
        assert!(NotableDays::from_json(r#"{"yesterday": "x"}"#).is_err());
        assert!(NotableDays::from_json("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(NotableDays::load(&dir.path().join("missing.json"))
            .await
            .is_err());
    }
}
