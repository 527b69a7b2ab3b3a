use std::{
    path::{Path, PathBuf},
    pin::pin,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::{stream, Stream, StreamExt};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, instrument, trace};

use crate::{
    store::entities::{ResolutionId, ResolutionStore},
    utils::time::format_log_date,
};

use super::{encode_record, range::DateRange, DATE_COLUMN};

#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Written {
        path: PathBuf,
        columns: Vec<ResolutionId>,
        rows: usize,
    },
    /// No resolution has a single entry in the range, nothing was written.
    NoData,
}

/// Resolutions with at least one entry inside `range`, in store order.
pub fn export_columns(store: &ResolutionStore, range: &DateRange) -> Vec<ResolutionId> {
    store
        .iter()
        .filter(|(_, r)| r.has_data_between(range.start(), range.end()))
        .map(|(id, _)| id.clone())
        .collect()
}

/// One export row. Days without an entry are written as `0`, same as an explicit `false`.
pub fn export_row(store: &ResolutionStore, columns: &[ResolutionId], day: NaiveDate) -> Vec<String> {
    let mut row = Vec::with_capacity(columns.len() + 1);
    row.push(format_log_date(day));
    for id in columns {
        let cell = store
            .get(id)
            .and_then(|r| r.value_on(day))
            .map(|v| v.export_cell());
        match cell {
            Some(cell) => {
                trace!("Data found for {id} on {day}");
                row.push(cell)
            }
            None => row.push("0".into()),
        }
    }
    row
}

/// Writes `range` into a csv at `path`, overwriting any previous file. Rows are appended one day
/// at a time, so an interrupted export still leaves every finished day on disk.
#[instrument(skip(store))]
pub async fn export_csv(
    store: &ResolutionStore,
    range: DateRange,
    path: &Path,
) -> Result<ExportOutcome> {
    let columns = export_columns(store, &range);
    if columns.is_empty() {
        info!("No data between {range}");
        return Ok(ExportOutcome::NoData);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {path:?}"))?;

    let header = std::iter::once(DATE_COLUMN).chain(columns.iter().map(|c| c.as_str()));
    file.write_all(&encode_record(header)?).await?;

    let mut rows = 0;
    let mut days = pin!(date_range(range));
    while let Some(day) = days.next().await {
        let row = export_row(store, &columns, day);
        file.write_all(&encode_record(&row)?).await?;
        rows += 1;
    }
    file.flush().await?;

    debug!("Exported {rows} rows with {} columns", columns.len());
    Ok(ExportOutcome::Written {
        path: path.to_path_buf(),
        columns,
        rows,
    })
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(range: DateRange) -> impl Stream<Item = NaiveDate> {
    stream::iter(range.days())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use futures::StreamExt;
    use tempfile::tempdir;

    use crate::{
        export::range::DateRange,
        store::entities::{LogValue, Resolution, ResolutionId, ResolutionStore},
    };

    use super::{date_range, export_columns, export_csv, export_row, ExportOutcome};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn id(value: &str) -> ResolutionId {
        ResolutionId::parse(value).unwrap()
    }

    fn test_store() -> ResolutionStore {
        let mut store = ResolutionStore::new();

        let mut exercise = Resolution::new("exercise".into(), day(1, 1), None, true);
        exercise.data.insert(day(1, 1).into(), LogValue::Done(true));
        exercise.data.insert(day(1, 2).into(), LogValue::Done(false));
        store.insert(id("exercise"), exercise);

        let mut writing = Resolution::new("writing".into(), day(1, 1), None, false);
        writing.data.insert(day(1, 2).into(), LogValue::Codes("R,F".into()));
        store.insert(id("writing"), writing);

        let mut floss = Resolution::new("floss".into(), day(1, 1), Some(day(1, 31)), true);
        floss.data.insert(day(2, 5).into(), LogValue::Done(true));
        store.insert(id("floss"), floss);

        store
    }

    #[tokio::test]
    async fn test_date_range_stream() {
        let range = DateRange::new(day(1, 30), day(2, 2)).unwrap();
        let days = date_range(range).collect::<Vec<_>>().await;
        assert_eq!(days, vec![day(1, 30), day(1, 31), day(2, 1), day(2, 2)]);
    }

    #[test]
    fn test_columns_need_data_in_range() {
        let store = test_store();
        let january = DateRange::new(day(1, 1), day(1, 31)).unwrap();
        assert_eq!(
            export_columns(&store, &january),
            vec![id("exercise"), id("writing")]
        );

        let february = DateRange::new(day(2, 1), day(2, 28)).unwrap();
        assert_eq!(export_columns(&store, &february), vec![id("floss")]);

        let march = DateRange::new(day(3, 1), day(3, 31)).unwrap();
        assert!(export_columns(&store, &march).is_empty());
    }

    #[test]
    fn test_missing_entry_is_zero() {
        let store = test_store();
        let columns = vec![id("exercise"), id("writing")];
        assert_eq!(export_row(&store, &columns, day(1, 1)), vec!["1/1/2023", "1", "0"]);
        assert_eq!(export_row(&store, &columns, day(1, 2)), vec!["1/2/2023", "0", "R,F"]);
        assert_eq!(export_row(&store, &columns, day(1, 3)), vec!["1/3/2023", "0", "0"]);
    }

    #[tokio::test]
    async fn test_export_writes_every_day() -> Result<()> {
        let dir = tempdir()?;
        let store = test_store();
        let range = DateRange::new(day(1, 1), day(1, 3))?;
        let path = dir.path().join("exports").join(range.file_name());

        let outcome = export_csv(&store, range, &path).await?;
        assert_eq!(
            outcome,
            ExportOutcome::Written {
                path: path.clone(),
                columns: vec![id("exercise"), id("writing")],
                rows: 3,
            }
        );

        let written = std::fs::read_to_string(&path)?;
        assert_eq!(
            written,
            "date,exercise,writing\n1/1/2023,1,0\n1/2/2023,0,\"R,F\"\n1/3/2023,0,0\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_days_past_expiration_are_kept() -> Result<()> {
        let dir = tempdir()?;
        let range = DateRange::new(day(2, 1), day(2, 28))?;
        let path = dir.path().join(range.file_name());
        export_csv(&test_store(), range, &path).await?;

        let written = std::fs::read_to_string(&path)?;
        let rows = written.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(written.lines().next(), Some("date,floss"));
        assert_eq!(rows.len(), 28);
        for (i, row) in rows.iter().enumerate() {
            let expected = if i == 4 { "1" } else { "0" };
            assert_eq!(*row, format!("2/{}/2023,{expected}", i + 1));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_export_without_data_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let range = DateRange::new(day(6, 1), day(6, 30))?;
        let path = dir.path().join(range.file_name());
        assert_eq!(
            export_csv(&test_store(), range, &path).await?,
            ExportOutcome::NoData
        );
        assert!(!path.exists());
        Ok(())
    }
}
