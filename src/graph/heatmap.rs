use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;
use tracing::{debug, instrument};

use crate::export::clean::CleanedTable;

use super::{
    canvas::{draw_calendar, draw_scale, CalendarStyle},
    grid::{CalendarGrid, Mark, PivotError},
    notable::NotableDays,
    palette,
    terminal,
};

/// Upper end of the colour scale when the data covers a single year.
pub const SINGLE_YEAR_SCALE: u32 = 5;

const WIDTH: u32 = 1100;
const ROW_HEIGHT: u32 = 30;
const CHROME_HEIGHT: u32 = 110;
const SCALE_HEIGHT: u32 = 70;

/// Daily `Resolutions Met` counts laid out as a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heatmap {
    pub title: String,
    pub grid: CalendarGrid,
    pub scale_max: u32,
    pub marks: Vec<Mark>,
}

impl Heatmap {
    /// Day of month against month for a single year, against year and month otherwise. The
    /// colour scale is fixed for a single year and follows the data for several.
    pub fn build(
        table: &CleanedTable,
        years_spanned: usize,
        notable: Option<&NotableDays>,
    ) -> Result<Self, PivotError> {
        let multi_year = years_spanned > 1;
        let grid = CalendarGrid::pivot(
            table.rows.iter().map(|row| (row.date, row.met() as u32)),
            multi_year,
        )?;
        let scale_max = if multi_year {
            grid.max_value()
        } else {
            SINGLE_YEAR_SCALE
        };
        let marks = notable.map(|n| n.marks(&grid)).unwrap_or_default();

        Ok(Self {
            title: table.title(),
            grid,
            scale_max,
            marks,
        })
    }

    pub fn color(&self, value: u32) -> RGBColor {
        palette::heat(value, self.scale_max)
    }

    /// Saves the heatmap as an svg, replacing whatever was at `path`.
    #[instrument(skip(self))]
    pub fn render(&self, path: &Path) -> Result<()> {
        let height = CHROME_HEIGHT + ROW_HEIGHT * self.grid.row_count() as u32 + SCALE_HEIGHT;
        let root = SVGBackend::new(path, (WIDTH, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let (calendar, scale) = root.split_vertically((height - SCALE_HEIGHT) as i32);
        let color_of = |v| self.color(v);
        draw_calendar(
            &calendar,
            &self.grid,
            &self.title,
            CalendarStyle::LARGE,
            &color_of,
            &self.marks,
        )?;
        draw_scale(&scale, self.scale_max, &color_of)?;
        root.present()?;

        debug!(
            "Rendered {} months with {} notable days",
            self.grid.row_count(),
            self.marks.len()
        );
        Ok(())
    }

    pub fn to_terminal(&self) -> String {
        terminal::render_calendar(&self.grid, &self.title, &|v| self.color(v), &self.marks)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::{
        export::clean::CleanedTable,
        graph::{grid::Mark, notable::NotableDays},
    };

    use super::{Heatmap, SINGLE_YEAR_SCALE};

    const SINGLE_YEAR: &str = "date,exercise,writing\n\
                               1/1/2023,1,R\n\
                               1/2/2023,0,0\n\
                               2/1/2023,1,0\n";

    const TWO_YEARS: &str = "date,exercise,writing,floss\n\
                             12/31/2022,1,R,1\n\
                             1/1/2023,1,0,0\n";

    #[test]
    fn test_single_year_scale_is_fixed() {
        let table = CleanedTable::from_reader(SINGLE_YEAR.as_bytes()).unwrap();
        let heatmap = Heatmap::build(&table, 1, None).unwrap();
        assert_eq!(heatmap.scale_max, SINGLE_YEAR_SCALE);
        assert_eq!(heatmap.title, "1/1/2023 - 2/1/2023");
        assert_eq!(heatmap.grid.row_labels(), vec!["1", "2"]);
        assert_eq!(heatmap.grid.value(0, 0), Some(2));
        assert_eq!(heatmap.grid.value(0, 1), Some(0));
        assert_eq!(heatmap.grid.value(1, 0), Some(1));
    }

    #[test]
    fn test_multi_year_scale_follows_data() {
        let table = CleanedTable::from_reader(TWO_YEARS.as_bytes()).unwrap();
        let heatmap = Heatmap::build(&table, 2, None).unwrap();
        assert_eq!(heatmap.scale_max, 3);
        assert_eq!(heatmap.grid.row_labels(), vec!["2022 - 12", "2023 - 1"]);
    }

    #[test]
    fn test_notable_days_become_marks() {
        let table = CleanedTable::from_reader(SINGLE_YEAR.as_bytes()).unwrap();
        let notable = NotableDays::from_json(r#"{"2/1/2023": "moved"}"#).unwrap();
        let heatmap = Heatmap::build(&table, 1, Some(&notable)).unwrap();
        assert_eq!(
            heatmap.marks,
            vec![Mark {
                row: 1,
                day: 0,
                label: "moved".into()
            }]
        );
    }

    #[test]
    fn test_render_overwrites_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heatmap.svg");
        std::fs::write(&path, "old").unwrap();

        let table = CleanedTable::from_reader(SINGLE_YEAR.as_bytes()).unwrap();
        let heatmap = Heatmap::build(&table, 1, None).unwrap();
        heatmap.render(&path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("1/1/2023 - 2/1/2023"));
    }
}
