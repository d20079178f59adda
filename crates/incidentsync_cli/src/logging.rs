//! Tracing subscriber setup.

use crate::settings::LoggingSettings;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Number of daily log files kept on disk.
const KEPT_LOG_FILES: usize = 3;

/// Keeps the file writer alive; dropping it flushes pending log lines.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Resolves the filter directive: `RUST_LOG` first, then `--verbose`, then
/// the configured level.
///
/// Returns the directive and, if the configured level was unusable, a warning
/// to emit once the subscriber is installed.
fn filter_directive(
    configured: &str,
    verbose: bool,
    env: Option<String>,
) -> (String, Option<String>) {
    if let Some(env) = env.filter(|e| !e.trim().is_empty() && EnvFilter::try_new(e).is_ok()) {
        return (env, None);
    }
    if verbose {
        return ("debug".to_string(), None);
    }
    match LevelFilter::from_str(configured.trim()) {
        Ok(level) => (level.to_string().to_lowercase(), None),
        Err(_) => (
            "info".to_string(),
            Some(format!("unknown log level {configured:?}; using info")),
        ),
    }
}

/// Installs the global subscriber.
pub fn init(
    settings: &LoggingSettings,
    verbose: bool,
) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    let (directive, warning) =
        filter_directive(&settings.level, verbose, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive)?;

    let console = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let mut guard = None;
    let file = match settings
        .directory
        .as_deref()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("incidentsync")
                .filename_suffix("log")
                .max_log_files(KEPT_LOG_FILES)
                .build(dir)?;
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used() {
        assert_eq!(filter_directive("warn", false, None), ("warn".to_string(), None));
        assert_eq!(filter_directive(" DEBUG ", false, None).0, "debug");
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let (directive, warning) = filter_directive("chatty", false, None);
        assert_eq!(directive, "info");
        assert!(warning.unwrap().contains("chatty"));
    }

    #[test]
    fn verbose_and_env_take_precedence() {
        assert_eq!(filter_directive("warn", true, None).0, "debug");
        assert_eq!(
            filter_directive("warn", true, Some("incidentsync_engine=trace".into())).0,
            "incidentsync_engine=trace"
        );
    }
}
