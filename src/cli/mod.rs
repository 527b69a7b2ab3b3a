pub mod flows;
pub mod input;
pub mod menu;
pub mod prompt;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    export::range::DateRange,
    graph::minimap::ColumnSelection,
    store::{entities::ResolutionId, resolution_storage::JsonResolutionStorage},
    tracker::Tracker,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, AppPaths},
        logging::{enable_logging, LogOptions, CLI_PREFIX},
    },
};

use flows::{
    add_flow, export_flow, graph_flow, list_flow, log_flow, toggle_flow, App, ExportRequest,
    GraphRequest, GraphSource,
};
use input::{parse_date, YearEdge};
use menu::run_menu;
use prompt::{is_interrupt, Interrupt, Prompter, StdinPrompter};

#[derive(Parser, Debug)]
#[command(name = "resolve", version, long_about = None)]
#[command(about = "Track daily resolutions, export them to csv and draw calendar heatmaps")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(
        long,
        env = "RESOLVE_DIR",
        global = true,
        help = "Application directory. By default uses $XDG_DATA_HOME/resolve or $HOME/.local/share/resolve"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Level of logged messages, for example debug or trace. Falls back to RUST_LOG, then info"
    )]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Interactive menu. Used when no command is given")]
    Menu,
    #[command(about = "Log a day for every active resolution")]
    Log {
        #[arg(long, help = "Logged day, for example \"today\", \"yesterday\", \"1/15/2023\"")]
        date: Option<String>,
    },
    #[command(about = "Create a resolution")]
    Add,
    #[command(about = "Activate or deactivate resolutions")]
    Toggle {
        #[arg(
            value_parser = ResolutionId::lookup,
            help = "Resolution to toggle. Without it resolutions are listed and asked for"
        )]
        id: Option<ResolutionId>,
    },
    #[command(about = "List every resolution")]
    List,
    #[command(about = "Export a date range to csv")]
    Export {
        #[arg(long, help = "First exported day. A bare year means January 1st")]
        start: Option<String>,
        #[arg(long, help = "Last exported day. A bare year means December 31st")]
        end: Option<String>,
        #[arg(long, help = "Overwrite an existing export without asking")]
        force: bool,
    },
    #[command(about = "Draw a heatmap, and optionally minimaps, of a date range")]
    Graph {
        #[arg(long, requires = "end", conflicts_with = "file", help = "First drawn day")]
        start: Option<String>,
        #[arg(long, requires = "start", help = "Last drawn day")]
        end: Option<String>,
        #[arg(long, help = "Cleaned csv to draw instead of exporting a range")]
        file: Option<PathBuf>,
        #[arg(long, help = "Name of a notable days file inside the application directory")]
        notable: Option<String>,
        #[arg(long, help = "Columns to draw minimaps for: names separated by commas, all, binary, or nonbinary")]
        minimaps: Option<ColumnSelection>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let root = match args.dir {
        Some(dir) => dir,
        None => create_application_default_path()?,
    };
    let paths = AppPaths::new(root);
    paths.ensure_layout()?;

    let options = LogOptions {
        level: args
            .log_filter
            .or_else(|| args.log.then_some(LevelFilter::TRACE)),
        console: args.log,
    };
    let _guard = enable_logging(CLI_PREFIX, &paths.logs_dir(), options)?;
    debug!("Using {:?}", paths.root());

    let storage = JsonResolutionStorage::new(paths.store());
    let app = App::new(Tracker::new(storage, Box::new(DefaultClock)), paths);
    let mut prompter = StdinPrompter::new();

    let result = run_command(&app, &mut prompter, args.command.unwrap_or(Commands::Menu)).await;
    match result {
        Err(e) if is_interrupt(&e, Interrupt::Quit) => {
            prompter.say("Goodbye!");
            Ok(())
        }
        Err(e) if is_interrupt(&e, Interrupt::Menu) => Ok(()),
        other => other,
    }
}

async fn run_command(
    app: &App<JsonResolutionStorage>,
    prompter: &mut dyn Prompter,
    command: Commands,
) -> Result<()> {
    let today = app.tracker.today();
    let date = |value: Option<String>, edge| -> Result<Option<NaiveDate>> {
        value
            .map(|v| parse_date(&v, today, edge).with_context(|| format!("Invalid date `{v}`")))
            .transpose()
    };

    match command {
        Commands::Menu => run_menu(app, prompter).await,
        Commands::Log { date: day } => {
            log_flow(app, prompter, date(day, YearEdge::Start)?).await
        }
        Commands::Add => add_flow(app, prompter).await.map(|_| ()),
        Commands::Toggle { id } => toggle_flow(app, prompter, id).await,
        Commands::List => list_flow(app, prompter).await,
        Commands::Export { start, end, force } => {
            let request = ExportRequest {
                start: date(start, YearEdge::Start)?,
                end: date(end, YearEdge::End)?,
                force,
            };
            export_flow(app, prompter, request).await.map(|_| ())
        }
        Commands::Graph {
            start,
            end,
            file,
            notable,
            minimaps,
        } => {
            let source = match (file, date(start, YearEdge::Start)?, date(end, YearEdge::End)?) {
                (Some(file), _, _) => Some(GraphSource::File(file)),
                (None, Some(start), Some(end)) => {
                    Some(GraphSource::Range(DateRange::new(start, end)?))
                }
                _ => None,
            };
            let request = GraphRequest {
                source,
                notable,
                minimaps,
            };
            graph_flow(app, prompter, request).await
        }
    }
}
