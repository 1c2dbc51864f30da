//! Stderr logger tagged by pipeline stage.
//!
//! Each line reads `[elapsed LEVEL stage] message`, where the stage is the
//! last segment of the record target (`locator`, `estimator`, `control`, ...),
//! so a cycle's capture, match, projection and press can be told apart.
//! With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` instead.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

/// Crates whose records are shown at the requested level; others are capped
/// at `warn`.
const WORKSPACE_CRATES: [&str; 4] = ["jumpcal", "jumpcal_core", "jumpcal_locator", "jumpcal_trajectory"];

/// Short stage label for a record target: its last path segment.
fn stage(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn is_workspace_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    WORKSPACE_CRATES.contains(&krate)
}

fn format_line(elapsed: f64, level: Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!("[{:7.3}s {:>5} {:<10}] {}", elapsed, level, stage(target), args)
}

struct StageLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let limit = if is_workspace_target(metadata.target()) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        };
        metadata.level() <= limit
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr(), "{line}");
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StageLogger> = OnceLock::new();

/// Install the stage logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StageLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// `RUST_LOG`-style directives enabling the workspace crates at `level`.
pub fn workspace_directives(level: LevelFilter) -> String {
    let level = level.to_string().to_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(WORKSPACE_CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Install a `tracing-subscriber`; `RUST_LOG` overrides `level`.
///
/// Span close events carry per-stage timings (`calibrate_scale`, `estimate`).
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(workspace_directives(level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
