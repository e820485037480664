use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_FILE: &str = "crawler.log";

const OWN_TARGETS: &[&str] = &["doccrawl", "doccrawl_core", "doccrawl_client"];

/// Filter directives: `level` for our own crates, at most `warn` for dependencies.
pub fn directives(level: Level) -> String {
    let base = if level < Level::WARN { level } else { Level::WARN };
    let mut out = base.as_str().to_ascii_lowercase();
    for target in OWN_TARGETS {
        out.push_str(&format!(",{target}={}", level.as_str().to_ascii_lowercase()));
    }
    out
}

/// Console level from the verbosity flags.
pub fn console_level(quiet: bool, verbose: bool) -> Level {
    if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

/// Install two layers: stderr at `console` (overridable with `RUST_LOG`) and
/// `<log_dir>/crawler.log` at INFO without ANSI colours.
///
/// Returns the log file path.
pub fn init(console: Level, log_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(console)));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(directives(Level::INFO)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}
