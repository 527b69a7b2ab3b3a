use std::{fmt::Write as _, io::Read, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, instrument};

use crate::utils::time::{format_log_date, parse_log_date};

use super::{encode_record, DATE_COLUMN};

pub const MONTH_COLUMN: &str = "Month";
pub const DAY_COLUMN: &str = "Day";
pub const YEAR_COLUMN: &str = "Year";
pub const MET_COLUMN: &str = "Resolutions Met";
pub const BOOL_SUFFIX: &str = "_bool";

/// Normalized value of one resolution on one day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    Missed,
    Met,
    Code(String),
}

impl Cell {
    /// Falsy encodings (`0`, `0.0`, `False`, empty) become [Cell::Missed], `True` and `1`
    /// become [Cell::Met]. Anything else is a categorical value and is kept as is.
    pub fn normalize(raw: &str) -> Cell {
        match raw.trim() {
            "" | "0" | "0.0" | "False" | "false" | "FALSE" => Cell::Missed,
            "1" | "1.0" | "True" | "true" | "TRUE" => Cell::Met,
            other => Cell::Code(other.to_string()),
        }
    }

    /// Codes count as met no matter which code was logged.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Cell::Missed)
    }

    pub fn as_number(&self) -> u8 {
        u8::from(self.is_truthy())
    }

    pub fn to_csv(&self) -> String {
        match self {
            Cell::Missed => "0".into(),
            Cell::Met => "1".into(),
            Cell::Code(code) => code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedRow {
    pub date: NaiveDate,
    pub cells: Vec<Cell>,
}

impl CleanedRow {
    /// Value of the `Resolutions Met` column.
    pub fn met(&self) -> usize {
        self.cells.iter().filter(|c| c.is_truthy()).count()
    }
}

/// Export table with normalized cells. Derived columns are computed on write and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTable {
    pub columns: Vec<String>,
    pub rows: Vec<CleanedRow>,
}

impl CleanedTable {
    /// Reads either a raw export or an already cleaned table. Derived columns of a cleaned table
    /// are dropped, they are recomputed on write.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().from_reader(reader);
        let headers = reader.headers()?.clone();
        let names = headers.iter().collect::<Vec<_>>();

        let date_index = names
            .iter()
            .position(|h| h.eq_ignore_ascii_case(DATE_COLUMN))
            .ok_or_else(|| anyhow!("Table has no `{DATE_COLUMN}` column"))?;

        let is_derived = |name: &str| {
            [MONTH_COLUMN, DAY_COLUMN, YEAR_COLUMN, MET_COLUMN].contains(&name)
                || name
                    .strip_suffix(BOOL_SUFFIX)
                    .is_some_and(|base| names.contains(&base))
        };
        let value_indices = names
            .iter()
            .enumerate()
            .filter(|(i, name)| *i != date_index && !is_derived(name))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let columns = value_indices
            .iter()
            .map(|i| names[*i].to_string())
            .collect::<Vec<_>>();

        let mut rows = vec![];
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let raw_date = record.get(date_index).unwrap_or_default();
            let date = parse_log_date(raw_date)
                .ok_or_else(|| anyhow!("Invalid date `{raw_date}` on row {}", line + 1))?;
            let cells = value_indices
                .iter()
                .map(|i| Cell::normalize(record.get(*i).unwrap_or_default()))
                .collect();
            rows.push(CleanedRow { date, cells });
        }

        Ok(Self { columns, rows })
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?;
        Self::from_reader(contents.as_slice()).with_context(|| format!("Failed to parse {path:?}"))
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.columns.len() * 2 + 5);
        header.push(DATE_COLUMN.to_string());
        header.extend(self.columns.iter().cloned());
        header.extend([MONTH_COLUMN, DAY_COLUMN, YEAR_COLUMN, MET_COLUMN].map(String::from));
        header.extend(self.columns.iter().map(|c| format!("{c}{BOOL_SUFFIX}")));
        header
    }

    /// Raw values first, then the parsed date parts, `Resolutions Met`, and a `<col>_bool` column
    /// per resolution.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = encode_record(self.header())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.columns.len() * 2 + 5);
            record.push(format_log_date(row.date));
            record.extend(row.cells.iter().map(Cell::to_csv));
            record.push(row.date.month().to_string());
            record.push(row.date.day().to_string());
            record.push(row.date.year().to_string());
            record.push(row.met().to_string());
            record.extend(row.cells.iter().map(|c| c.as_number().to_string()));
            buffer.extend(encode_record(&record)?);
        }
        Ok(buffer)
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_csv_bytes()?)
            .await
            .with_context(|| format!("Failed to write {path:?}"))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Columns that only ever hold met or missed values.
    pub fn is_binary_column(&self, index: usize) -> bool {
        self.rows
            .iter()
            .all(|row| !matches!(row.cells.get(index), Some(Cell::Code(_))))
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years = self.rows.iter().map(|r| r.date.year()).collect::<Vec<_>>();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// `FIRST - LAST` in the order rows were written.
    pub fn title(&self) -> String {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => format!(
                "{} - {}",
                format_log_date(first.date),
                format_log_date(last.date)
            ),
            _ => String::new(),
        }
    }

    /// Header plus the first `limit` rows, tab separated.
    pub fn preview(&self, limit: usize) -> String {
        let mut out = self.header().join("\t");
        out.push('\n');
        for row in self.rows.iter().take(limit) {
            let _ = write!(out, "{}", format_log_date(row.date));
            for cell in &row.cells {
                let _ = write!(out, "\t{}", cell.to_csv());
            }
            let _ = write!(
                out,
                "\t{}\t{}\t{}\t{}",
                row.date.month(),
                row.date.day(),
                row.date.year(),
                row.met()
            );
            for cell in &row.cells {
                let _ = write!(out, "\t{}", cell.as_number());
            }
            out.push('\n');
        }
        out
    }
}

/// Cleans the export at `source` into `target`. The source file is left untouched.
#[instrument]
pub async fn clean_export(source: &Path, target: &Path) -> Result<CleanedTable> {
    if source == target {
        bail!("Cleaning would overwrite its own source {source:?}");
    }
    let table = CleanedTable::read(source).await?;
    table.write(target).await?;
    debug!(
        "Cleaned {} rows with {} columns",
        table.rows.len(),
        table.columns.len()
    );
    Ok(table)
}
