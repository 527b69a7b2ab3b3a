use std::{collections::BTreeMap, path::Path, str::FromStr};

use anyhow::{bail, Result};
use plotters::prelude::*;
use tracing::{instrument, warn};

use crate::export::clean::{Cell, CleanedTable};

use super::{
    canvas::{draw_calendar, draw_legend, CalendarStyle},
    grid::{grid_shape, CalendarGrid, PivotError},
    palette, terminal,
};

const CELL_WIDTH: u32 = 560;
const ROW_HEIGHT: u32 = 18;
const CHROME_HEIGHT: u32 = 60;
const LEGEND_LINE: u32 = 14;

/// Which columns get a minimap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    All,
    Binary,
    NonBinary,
    Named(Vec<String>),
}

impl FromStr for ColumnSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "binary" => Ok(Self::Binary),
            "nonbinary" => Ok(Self::NonBinary),
            _ => {
                let names = s
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect::<Vec<_>>();
                if names.is_empty() {
                    Err("Expected column names, `all`, `binary`, or `nonbinary`".into())
                } else {
                    Ok(Self::Named(names))
                }
            }
        }
    }
}

impl ColumnSelection {
    /// Column names to draw. `kinds` tells which resolutions are binary, columns it doesn't know
    /// are classified by their values. Named columns are kept as typed, unknown ones fail later.
    pub fn resolve(&self, table: &CleanedTable, kinds: &BTreeMap<String, bool>) -> Vec<String> {
        let is_binary = |index: usize, name: &String| {
            kinds
                .get(name)
                .copied()
                .unwrap_or_else(|| table.is_binary_column(index))
        };
        let filtered = |binary: bool| -> Vec<String> {
            table
                .columns
                .iter()
                .enumerate()
                .filter(|(i, name)| is_binary(*i, *name) == binary)
                .map(|(_, name)| name.clone())
                .collect()
        };
        match self {
            Self::All => table.columns.clone(),
            Self::Binary => filtered(true),
            Self::NonBinary => filtered(false),
            Self::Named(names) => names.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinimapKind {
    Binary,
    /// Category labels, index `i` is drawn with [palette::category] of `i`.
    Categorical(Vec<String>),
}

/// Calendar of a single resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minimap {
    pub column: String,
    pub grid: CalendarGrid,
    pub kind: MinimapKind,
}

impl Minimap {
    /// Met or missed columns keep `0`/`1`. Any other column gets one small integer per distinct
    /// value, `0` staying the missed days.
    pub fn build(table: &CleanedTable, column: &str, multi_year: bool) -> Result<Self, PivotError> {
        let index = table
            .column_index(column)
            .ok_or_else(|| PivotError::UnknownColumn(column.to_string()))?;
        let values = table
            .rows
            .iter()
            .filter_map(|row| row.cells.get(index).map(|cell| (row.date, cell)));

        let (grid, kind) = if table.is_binary_column(index) {
            let grid = CalendarGrid::pivot(
                values.map(|(date, cell)| (date, cell.as_number() as u32)),
                multi_year,
            )?;
            (grid, MinimapKind::Binary)
        } else {
            let mut categories = values
                .clone()
                .map(|(_, cell)| cell.clone())
                .collect::<Vec<_>>();
            categories.push(Cell::Missed);
            categories.sort();
            categories.dedup();

            let grid = CalendarGrid::pivot(
                values.map(|(date, cell)| {
                    let position = categories.iter().position(|c| c == cell);
                    (date, position.unwrap_or_default() as u32)
                }),
                multi_year,
            )?;
            let labels = categories
                .iter()
                .map(|cell| match cell {
                    Cell::Missed => "none".to_string(),
                    other => other.to_csv(),
                })
                .collect();
            (grid, MinimapKind::Categorical(labels))
        };

        Ok(Self {
            column: column.to_string(),
            grid,
            kind,
        })
    }

    pub fn color(&self, value: u32) -> RGBColor {
        match self.kind {
            MinimapKind::Binary => palette::binary(value),
            MinimapKind::Categorical(_) => palette::category(value),
        }
    }

    pub fn legend(&self) -> Vec<(String, RGBColor)> {
        match &self.kind {
            MinimapKind::Binary => vec![],
            MinimapKind::Categorical(labels) => labels
                .iter()
                .enumerate()
                .map(|(i, label)| (label.clone(), palette::category(i as u32)))
                .collect(),
        }
    }

    pub fn to_terminal(&self) -> String {
        let mut out =
            terminal::render_calendar(&self.grid, &self.column, &|v| self.color(v), &[]);
        let legend = self.legend();
        if !legend.is_empty() {
            out.push_str(&terminal::render_legend(&legend));
            out.push('\n');
        }
        out
    }
}

/// Minimaps that could be built, plus the columns that couldn't with the reason.
#[derive(Debug, Default)]
pub struct MinimapSet {
    pub maps: Vec<Minimap>,
    pub failed: Vec<(String, PivotError)>,
    /// Number of requested columns, which sizes the layout.
    pub requested: usize,
}

impl MinimapSet {
    /// Builds a map for every column. A column that fails is reported and skipped, the rest are
    /// still drawn.
    pub fn build(table: &CleanedTable, columns: &[String], years_spanned: usize) -> Self {
        let multi_year = years_spanned > 1;
        let mut set = Self {
            requested: columns.len(),
            ..Default::default()
        };
        for column in columns {
            match Minimap::build(table, column, multi_year) {
                Ok(map) => set.maps.push(map),
                Err(e) => {
                    warn!("Skipping minimap for {column}: {e}");
                    set.failed.push((column.clone(), e));
                }
            }
        }
        set
    }

    /// Lays the maps out row by row in the near-square grid for the requested count. Cells that
    /// end up without a map are left blank.
    #[instrument(skip(self))]
    pub fn render(&self, path: &Path) -> Result<()> {
        if self.maps.is_empty() {
            bail!("None of the selected columns could be drawn");
        }
        let (rows, cols) = grid_shape(self.requested.max(self.maps.len()));
        let tallest = self
            .maps
            .iter()
            .map(|m| m.grid.row_count() as u32 * ROW_HEIGHT + m.legend().len() as u32 * LEGEND_LINE)
            .max()
            .unwrap_or_default();
        let cell_height = CHROME_HEIGHT + tallest;

        let root = SVGBackend::new(path, (CELL_WIDTH * cols as u32, cell_height * rows as u32))
            .into_drawing_area();
        root.fill(&WHITE)?;

        for (area, map) in root.split_evenly((rows, cols)).iter().zip(&self.maps) {
            let legend = map.legend();
            let legend_height = legend.len() as u32 * LEGEND_LINE;
            let (calendar, legend_area) =
                area.split_vertically((cell_height - legend_height) as i32);
            draw_calendar(
                &calendar,
                &map.grid,
                &map.column,
                CalendarStyle::SMALL,
                &|v| map.color(v),
                &[],
            )?;
            draw_legend(&legend_area, &legend)?;
        }
        root.present()?;
        Ok(())
    }
}
