use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::{
    export::{
        clean::{clean_export, CleanedTable},
        csv_export::{export_csv, ExportOutcome},
        range::DateRange,
    },
    graph::{
        heatmap::Heatmap,
        minimap::{ColumnSelection, MinimapSet},
        notable::NotableDays,
    },
    store::{
        entities::{LogValue, Resolution, ResolutionId},
        resolution_storage::ResolutionStorage,
    },
    tracker::{LogEntry, NewResolution, Tracker, TrackerError},
    utils::{dir::AppPaths, time::format_log_date},
};

use super::{
    input::{
        parse_codes, parse_date, parse_expiration, parse_id, parse_optional_id, parse_selection,
        parse_text, parse_yes_no, CodeAnswer, YearEdge,
    },
    prompt::{ask, Prompter},
};

const CODE_INSTRUCTIONS: &str = "Enter an existing or new detail code, a comma-separated list of \
                                 existing detail codes, or 'N' for no.";
const START_PROMPT: &str = "Start date (M/D/YYYY, year, or today):";
const END_PROMPT: &str = "End date (M/D/YYYY, year, or today):";
const PREVIEW_ROWS: usize = 5;

/// Everything a flow needs besides the prompter.
pub struct App<S: ResolutionStorage> {
    pub tracker: Tracker<S>,
    pub paths: AppPaths,
}

impl<S: ResolutionStorage> App<S> {
    pub fn new(tracker: Tracker<S>, paths: AppPaths) -> Self {
        Self { tracker, paths }
    }
}

/// Asks about every active resolution for one day and saves all answers at once.
#[instrument(skip(app, prompter))]
pub async fn log_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    date: Option<NaiveDate>,
) -> Result<()> {
    let today = app.tracker.today();
    let date = match date {
        Some(date) => date,
        None => ask(prompter, "What day are you logging? (M/D/YYYY or today)", |a| {
            parse_date(a, today, YearEdge::Start)
        })?,
    };

    let active = app.tracker.active().await?;
    if active.is_empty() {
        prompter.say("There are no active resolutions to log");
        return Ok(());
    }
    prompter.say(&format!("Logging {}", format_log_date(date)));

    let mut entries = Vec::with_capacity(active.len());
    for (id, resolution) in active.iter() {
        let entry = if resolution.is_binary {
            let done = ask(
                prompter,
                &format!("{id}: {}? (Y/N)", resolution.description),
                parse_yes_no,
            )?;
            LogEntry::new(id.clone(), LogValue::Done(done))
        } else {
            ask_codes(prompter, id, resolution)?
        };
        entries.push(entry);
    }

    let summary = app.tracker.log(date, entries).await?;
    for rejected in &summary.rejected {
        prompter.say(&rejected.to_string());
    }
    prompter.say(&format!(
        "Saved {} entries for {}",
        summary.saved.len(),
        format_log_date(date)
    ));
    Ok(())
}

/// Categorical answer. Codes without a description are described on the spot.
fn ask_codes(
    prompter: &mut dyn Prompter,
    id: &ResolutionId,
    resolution: &Resolution,
) -> Result<LogEntry> {
    prompter.say(&format!("{id}: {}", resolution.description));
    for (code, description) in &resolution.detail_codes {
        prompter.say(&format!("{code} - {description}"));
    }

    let codes = match ask(prompter, CODE_INSTRUCTIONS, parse_codes)? {
        CodeAnswer::NotDone => return Ok(LogEntry::new(id.clone(), LogValue::Done(false))),
        CodeAnswer::Codes(codes) => codes,
    };

    let mut entry = LogEntry::new(id.clone(), LogValue::from_codes(&codes));
    for code in codes
        .iter()
        .filter(|c| !resolution.detail_codes.contains_key(*c))
    {
        prompter.say(&format!("`{code}` is not defined yet, but we can add it now"));
        let description = ask(
            prompter,
            &format!("What activity does `{code}` stand for?"),
            parse_text,
        )?;
        entry.new_codes.insert(*code, description);
    }
    Ok(entry)
}

/// Creates a resolution. The draft is shown before saving, declining starts over.
#[instrument(skip(app, prompter))]
pub async fn add_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
) -> Result<ResolutionId> {
    let today = app.tracker.today();
    loop {
        let id = ask(prompter, "Resolution id (snake_case):", parse_id)?;
        if app.tracker.all().await?.contains(&id) {
            prompter.say(&TrackerError::Duplicate(id).to_string());
            continue;
        }
        let description = ask(prompter, "What is the resolution?", parse_text)?;
        let expiration = ask(
            prompter,
            "When does it expire? (M/D/YYYY, year, or never)",
            |a| parse_expiration(a, today),
        )?;
        let is_binary = ask(prompter, "Is it a yes or no resolution? (Y/N)", parse_yes_no)?;

        let draft = app
            .tracker
            .draft(NewResolution {
                id,
                description,
                expiration,
                is_binary,
            })
            .await?;
        prompter.say(&draft.preview());

        if ask(prompter, "Does this look right? (Y/N)", parse_yes_no)? {
            let id = draft.id.clone();
            app.tracker.commit(draft).await?;
            prompter.say(&format!("Added `{id}`"));
            return Ok(id);
        }
        prompter.say("Okay, let's try this again.");
    }
}

/// Toggles `id`, or keeps asking which resolution to toggle until an empty answer.
#[instrument(skip(app, prompter))]
pub async fn toggle_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    id: Option<ResolutionId>,
) -> Result<()> {
    if let Some(id) = id {
        return toggle_one(app, prompter, &id).await;
    }

    loop {
        let store = app.tracker.all().await?;
        if store.is_empty() {
            prompter.say("There are no resolutions yet");
            return Ok(());
        }
        for (id, resolution) in store.iter() {
            prompter.say(&format!("* {id}: {}", resolution.is_active));
        }
        let answer = ask(
            prompter,
            "Which resolution would you like to toggle? (empty to stop)",
            parse_optional_id,
        )?;
        let Some(id) = answer else {
            return Ok(());
        };
        toggle_one(app, prompter, &id).await?;
    }
}

async fn toggle_one<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    id: &ResolutionId,
) -> Result<()> {
    match app.tracker.toggle(id).await {
        Ok(active) => {
            let state = if active { "active" } else { "inactive" };
            prompter.say(&format!("`{id}` is now {state}"));
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<TrackerError>(), Some(TrackerError::NotFound(_))) => {
            prompter.say(&e.to_string());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn list_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let store = app.tracker.all().await?;
    if store.is_empty() {
        prompter.say("There are no resolutions yet");
    }
    for (id, resolution) in store.iter() {
        prompter.say(&describe(id, resolution));
    }
    Ok(())
}

fn describe(id: &ResolutionId, resolution: &Resolution) -> String {
    let mut text = format!(
        "{id} ({}, {}): {}\n  created {}, expires {}, {} days logged",
        if resolution.is_binary { "yes/no" } else { "codes" },
        if resolution.is_active { "active" } else { "inactive" },
        resolution.description,
        resolution.creation_date,
        resolution
            .expiration_date
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".into()),
        resolution.data.len(),
    );
    for (code, description) in &resolution.detail_codes {
        text.push_str(&format!("\n  {code} - {description}"));
    }
    text
}

#[derive(Debug, Default, Clone)]
pub struct ExportRequest {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Overwrite an existing export without asking.
    pub force: bool,
}

/// Exports a date range to csv. Returns the written file.
#[instrument(skip(app, prompter))]
pub async fn export_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    request: ExportRequest,
) -> Result<Option<PathBuf>> {
    let range = ask_range(prompter, app.tracker.today(), request.start, request.end)?;
    let path = app.paths.export_csv(&range);
    if path.exists()
        && !request.force
        && !ask(prompter, "Save over existing file? (Y/N)", parse_yes_no)?
    {
        prompter.say("Keeping the existing file");
        return Ok(None);
    }

    let store = app.tracker.all().await?;
    match export_csv(&store, range, &path).await? {
        ExportOutcome::Written {
            path,
            columns,
            rows,
        } => {
            prompter.say(&format!(
                "Saved {rows} days of {} resolutions to {}",
                columns.len(),
                path.display()
            ));
            Ok(Some(path))
        }
        ExportOutcome::NoData => {
            prompter.say(&no_data(&range));
            Ok(None)
        }
    }
}

fn no_data(range: &DateRange) -> String {
    format!(
        "Found no data from {} to {}",
        format_log_date(range.start()),
        format_log_date(range.end())
    )
}

/// Uses the given ends and asks for missing ones. A reversed range is asked again, unless both
/// ends were given.
fn ask_range(
    prompter: &mut dyn Prompter,
    today: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateRange> {
    loop {
        let first = match start {
            Some(date) => date,
            None => ask(prompter, START_PROMPT, |a| {
                parse_date(a, today, YearEdge::Start)
            })?,
        };
        let last = match end {
            Some(date) => date,
            None => ask(prompter, END_PROMPT, |a| parse_date(a, today, YearEdge::End))?,
        };
        match DateRange::new(first, last) {
            Ok(range) => return Ok(range),
            Err(e) if start.is_some() && end.is_some() => return Err(e.into()),
            Err(e) => prompter.say(&format!("Invalid input: {e}")),
        }
    }
}

/// Where the graphed table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSource {
    /// Export and clean the range first.
    Range(DateRange),
    /// An existing cleaned csv.
    File(PathBuf),
}

/// Without a source every choice is asked for. With one, only the given options are used.
#[derive(Debug, Default, Clone)]
pub struct GraphRequest {
    pub source: Option<GraphSource>,
    pub notable: Option<String>,
    pub minimaps: Option<ColumnSelection>,
}

/// Export, clean, then draw the heatmap and optionally minimaps.
#[instrument(skip(app, prompter))]
pub async fn graph_flow<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    request: GraphRequest,
) -> Result<()> {
    let interactive = request.source.is_none();
    let source = match request.source {
        Some(source) => source,
        None => ask_graph_source(prompter, app.tracker.today())?,
    };
    let Some((table, years_spanned)) = load_table(app, prompter, source, interactive).await?
    else {
        return Ok(());
    };

    let notable_name = if request.notable.is_some() || !interactive {
        request.notable
    } else if ask(prompter, "Overlay notable days? (Y/N)", parse_yes_no)? {
        Some(ask(prompter, "Name of the notable days file:", parse_text)?)
    } else {
        None
    };
    let notable = match notable_name {
        Some(name) => load_notable(app, prompter, &name).await,
        None => None,
    };

    let heatmap = Heatmap::build(&table, years_spanned, notable.as_ref())?;
    let heatmap_path = app.paths.heatmap();
    heatmap.render(&heatmap_path)?;
    prompter.say(&heatmap.to_terminal());
    prompter.say(&format!("Saved heatmap to {}", heatmap_path.display()));

    let selection = if request.minimaps.is_some() || !interactive {
        request.minimaps
    } else if ask(prompter, "Draw minimaps? (Y/N)", parse_yes_no)? {
        prompter.say(&table.preview(PREVIEW_ROWS));
        Some(ask(
            prompter,
            "Which columns? (comma separated, all, binary, or nonbinary)",
            parse_selection,
        )?)
    } else {
        None
    };
    if let Some(selection) = selection {
        draw_minimaps(app, prompter, &table, &selection, years_spanned).await?;
    }
    Ok(())
}

fn ask_graph_source(prompter: &mut dyn Prompter, today: NaiveDate) -> Result<GraphSource> {
    loop {
        let start = ask(
            prompter,
            "Start date (M/D/YYYY, year, today, or `file` to load a cleaned csv):",
            |a| {
                if a.eq_ignore_ascii_case("file") {
                    Ok(None)
                } else {
                    parse_date(a, today, YearEdge::Start).map(Some)
                }
            },
        )?;
        let Some(start) = start else {
            let path = ask(prompter, "Path of the cleaned csv:", parse_text)?;
            return Ok(GraphSource::File(PathBuf::from(path)));
        };
        let end = ask(prompter, END_PROMPT, |a| parse_date(a, today, YearEdge::End))?;
        match DateRange::new(start, end) {
            Ok(range) => return Ok(GraphSource::Range(range)),
            Err(e) => prompter.say(&format!("Invalid input: {e}")),
        }
    }
}

/// Cleaned table and the number of years it's drawn over. `None` when the range has no data.
async fn load_table<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    source: GraphSource,
    interactive: bool,
) -> Result<Option<(CleanedTable, usize)>> {
    let range = match source {
        GraphSource::File(path) => {
            let table = CleanedTable::read(&path).await?;
            let years = table.years().len();
            return Ok(Some((table, years)));
        }
        GraphSource::Range(range) => range,
    };

    let cleaned = app.paths.cleaned_csv(&range);
    let years = range.years_spanned().len();
    if interactive {
        if let Ok(metadata) = tokio::fs::metadata(&cleaned).await {
            let modified = metadata
                .modified()
                .map(|t| {
                    DateTime::<Local>::from(t)
                        .format("%-m/%-d/%Y %H:%M")
                        .to_string()
                })
                .unwrap_or_else(|_| "at an unknown time".into());
            prompter.say(&format!(
                "A cleaned table for {range} already exists, last modified {modified}"
            ));
            if !ask(prompter, "Regenerate it? (Y/N)", parse_yes_no)? {
                return Ok(Some((CleanedTable::read(&cleaned).await?, years)));
            }
        }
    }

    let export = app.paths.export_csv(&range);
    if interactive
        && export.exists()
        && !ask(prompter, "Save over existing file? (Y/N)", parse_yes_no)?
    {
        prompter.say("Keeping the existing file");
        let table = clean_export(&export, &cleaned).await?;
        return Ok(Some((table, years)));
    }

    let store = app.tracker.all().await?;
    match export_csv(&store, range, &export).await? {
        ExportOutcome::NoData => {
            prompter.say(&no_data(&range));
            Ok(None)
        }
        ExportOutcome::Written { .. } => {
            let table = clean_export(&export, &cleaned).await?;
            info!("Cleaned table saved to {cleaned:?}");
            Ok(Some((table, years)))
        }
    }
}

/// A missing or broken file is reported and the overlay skipped.
async fn load_notable<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    name: &str,
) -> Option<NotableDays> {
    let path = app.paths.notable_days(name);
    match NotableDays::load(&path).await {
        Ok(days) => Some(days),
        Err(e) => {
            warn!("Couldn't load notable days {e:?}");
            prompter.say(&format!("Skipping notable days: {e:#}"));
            None
        }
    }
}

async fn draw_minimaps<S: ResolutionStorage>(
    app: &App<S>,
    prompter: &mut dyn Prompter,
    table: &CleanedTable,
    selection: &ColumnSelection,
    years_spanned: usize,
) -> Result<()> {
    let kinds = app
        .tracker
        .all()
        .await?
        .iter()
        .map(|(id, r)| (id.to_string(), r.is_binary))
        .collect::<BTreeMap<_, _>>();
    let columns = selection.resolve(table, &kinds);
    let set = MinimapSet::build(table, &columns, years_spanned);
    for (column, e) in &set.failed {
        prompter.say(&format!("Couldn't draw `{column}`: {e}"));
    }
    if set.maps.is_empty() {
        prompter.say("No minimaps to draw");
        return Ok(());
    }

    let path = app.paths.minimaps();
    set.render(&path)?;
    for map in &set.maps {
        prompter.say(&map.to_terminal());
    }
    prompter.say(&format!("Saved minimaps to {}", path.display()));
    Ok(())
}
