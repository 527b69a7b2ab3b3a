//! Turns the store into csv files. [csv_export] dumps raw values day by day, [clean] derives the
//! columns the graphs are drawn from.

pub mod clean;
pub mod csv_export;
pub mod range;

use anyhow::{anyhow, Result};

pub const DATE_COLUMN: &str = "date";

/// Encodes a single csv line, terminator included.
fn encode_record<I, T>(record: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(record)?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to encode csv record: {}", e.error()))
}
