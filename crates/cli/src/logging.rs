//! Subscriber setup: stderr always, plus a per-session log file when configured.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_stderr() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Logs to stderr and to `trade_monitor_YYYYMMDD_HHMMSS.log` under `dir`.
/// Returns the log file path.
pub fn init_session(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let path = dir.join(session_file_name(chrono::Local::now().naive_local()));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();

    Ok(path)
}

fn session_file_name(now: chrono::NaiveDateTime) -> String {
    format!("trade_monitor_{}.log", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_session_start() {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 10, 28)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(session_file_name(start), "trade_monitor_20251028_090507.log");
    }
}
