use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::{non_blocking::WorkerGuard, rolling::Rotation};
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";

const MAX_LOG_FILES: usize = 5;
const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Overrides `RUST_LOG`.
    pub level: Option<LevelFilter>,
    /// Echo logs to stdout. Off by default so that prompts stay readable.
    pub console: bool,
}

/// Installs the global subscriber. Logs always go into a daily rotated file inside `logs_dir`.
/// The returned guard flushes the file writer when dropped, keep it alive until exit.
pub fn enable_logging(prefix: &str, logs_dir: &Path, options: LogOptions) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .build(logs_dir)?;
    let (file, guard) = tracing_appender::non_blocking(appender);

    let console = options.console;
    let stdout = std::io::stdout.with_filter(move |_| console);

    let level = resolve_level(options.level, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(&level))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(file))
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// An explicit level wins over the environment, which wins over [DEFAULT_LEVEL].
fn resolve_level(level: Option<LevelFilter>, env: Option<String>) -> String {
    level
        .map(|v| v.to_string())
        .or(env.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LEVEL.into())
}

/// Only this crate logs, dependencies stay quiet.
fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "{}={level}",
        env!("CARGO_PKG_NAME").replace("-", "_"),
    ))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
