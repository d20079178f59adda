//! Configuration file loading.
//!
//! The file is TOML. Required values missing from it are fatal; the poll
//! intervals are lenient and fall back to their defaults with a warning.

use incidentsync_engine::{
    poll_interval, EngineConfig, HttpIncidentSource, HttpTicketSink, RetryConfig, SinkConfig,
    SourceConfig, SyncContext, SyncResult, TransportConfig, DEFAULT_FORWARD_INTERVAL,
    DEFAULT_RETRY_INTERVAL, DEFAULT_SOURCE_API_VERSION,
};
use incidentsync_protocol::{TicketBuilder, DEFAULT_ISSUE_TYPE};
use incidentsync_state::{FileCursorStore, FileFailureSet};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed values.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required value is missing or empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A value is present but unusable.
    #[error("invalid setting `{key}`: {message}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    source: RawSource,
    sink: RawSink,
    state: RawState,
    polling: RawPolling,
    transport: RawTransport,
    logging: LoggingSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSource {
    url: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    accept_invalid_certs: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSink {
    url: Option<String>,
    user: Option<String>,
    api_token: Option<String>,
    project_key: Option<String>,
    issue_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawState {
    cursor_file: Option<PathBuf>,
    failure_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPolling {
    forward_interval_secs: Option<toml::Value>,
    retry_interval_secs: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawTransport {
    timeout_secs: u64,
    connect_timeout_secs: u64,
    max_attempts: u32,
}

impl Default for RawTransport {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level name (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Also log to the console.
    pub console: bool,
    /// Directory for daily-rotated log files; `None` disables file logging.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            directory: Some(PathBuf::from("logs")),
        }
    }
}

/// Validated configuration.
#[derive(Debug)]
pub struct Settings {
    /// Incident source connection.
    pub source: SourceConfig,
    /// Ticket sink connection.
    pub sink: SinkConfig,
    /// Sink project key.
    pub project_key: String,
    /// Sink issue type.
    pub issue_type: String,
    /// Cursor file path.
    pub cursor_file: PathBuf,
    /// Failure file path.
    pub failure_file: PathBuf,
    /// Loop timing.
    pub engine: EngineConfig,
    /// Timeouts and backoff.
    pub transport: TransportConfig,
    /// Logging setup.
    pub logging: LoggingSettings,
    /// Problems that were tolerated while loading; logged once logging is up.
    pub warnings: Vec<String>,
}

impl Settings {
    /// Reads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content)?;
        let mut warnings = Vec::new();

        let source_url = url("source.url", raw.source.url)?;
        let api_key = required("source.api_key", raw.source.api_key)?;
        let api_version = raw
            .source
            .api_version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_API_VERSION.to_string());
        let source = SourceConfig::new(source_url, api_key)
            .with_api_version(api_version)
            .with_accept_invalid_certs(raw.source.accept_invalid_certs);

        let sink = SinkConfig::new(
            url("sink.url", raw.sink.url)?,
            required("sink.user", raw.sink.user)?,
            required("sink.api_token", raw.sink.api_token)?,
        );
        let project_key = required("sink.project_key", raw.sink.project_key)?;
        let issue_type = raw
            .sink
            .issue_type
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string());

        let cursor_file = required_path("state.cursor_file", raw.state.cursor_file)?;
        let failure_file = required_path("state.failure_file", raw.state.failure_file)?;
        if cursor_file == failure_file {
            return Err(ConfigError::Invalid {
                key: "state.failure_file",
                message: "must differ from state.cursor_file".to_string(),
            });
        }

        let engine = EngineConfig::new()
            .with_forward_interval(interval_setting(
                "polling.forward_interval_secs",
                raw.polling.forward_interval_secs.as_ref(),
                DEFAULT_FORWARD_INTERVAL,
                &mut warnings,
            ))
            .with_retry_interval(interval_setting(
                "polling.retry_interval_secs",
                raw.polling.retry_interval_secs.as_ref(),
                DEFAULT_RETRY_INTERVAL,
                &mut warnings,
            ));

        if raw.transport.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "transport.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        let transport = TransportConfig::new()
            .with_timeout(Duration::from_secs(raw.transport.timeout_secs))
            .with_connect_timeout(Duration::from_secs(raw.transport.connect_timeout_secs.max(1)))
            .with_retry(RetryConfig::new(raw.transport.max_attempts));

        Ok(Self {
            source,
            sink,
            project_key,
            issue_type,
            cursor_file,
            failure_file,
            engine,
            transport,
            logging: raw.logging,
            warnings,
        })
    }

    /// Logs the effective configuration with secrets redacted.
    pub fn log_summary(&self) {
        info!(source = ?self.source, "incident source");
        info!(sink = ?self.sink, project = %self.project_key, issue_type = %self.issue_type, "ticket sink");
        info!(
            cursor_file = %self.cursor_file.display(),
            failure_file = %self.failure_file.display(),
            "state files"
        );
        info!(
            forward_interval_secs = self.engine.forward_interval.as_secs(),
            retry_interval_secs = self.engine.retry_interval.as_secs(),
            timeout_secs = self.transport.timeout.as_secs(),
            max_attempts = self.transport.retry.max_attempts,
            "timing"
        );
    }

    /// Returns the payload builder.
    pub fn ticket_builder(&self) -> TicketBuilder {
        TicketBuilder::new(&self.project_key).with_issue_type(&self.issue_type)
    }

    /// Opens the cursor store.
    pub fn cursor_store(&self) -> FileCursorStore {
        FileCursorStore::open(&self.cursor_file)
    }

    /// Opens the failure set.
    pub fn failure_store(&self) -> FileFailureSet {
        FileFailureSet::open(&self.failure_file)
    }

    /// Builds HTTP adapters and file stores into a loop context.
    ///
    /// Must be called outside of an async runtime.
    pub fn build_context(&self) -> SyncResult<SyncContext> {
        let source = HttpIncidentSource::new(self.source.clone(), &self.transport)?;
        let sink = HttpTicketSink::new(self.sink.clone(), &self.transport)?;
        Ok(SyncContext::new(
            Arc::new(source),
            Arc::new(sink),
            Arc::new(self.cursor_store()),
            Arc::new(self.failure_store()),
            self.ticket_builder(),
        )
        .with_config(self.engine.clone()))
    }
}

/// Settings pointing at state files under `dir`, for command tests.
#[cfg(test)]
pub(crate) fn test_settings(dir: &Path) -> Settings {
    let content = format!(
        r#"
        [source]
        url = "https://siem.example.com/api/siem/offenses"
        api_key = "k"
        [sink]
        url = "https://jira.example.com/rest/api/2/issue"
        user = "u"
        api_token = "t"
        project_key = "SEC"
        [state]
        cursor_file = {cursor:?}
        failure_file = {failures:?}
        "#,
        cursor = dir.join("cursor.txt").display().to_string(),
        failures = dir.join("failed_offenses.txt").display().to_string(),
    );
    match Settings::from_toml_str(&content) {
        Ok(settings) => settings,
        Err(e) => panic!("test settings invalid: {e}"),
    }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn required_path(key: &'static str, value: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn url(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let url = required(key, value)?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            message: format!("{url:?} is not an http(s) URL"),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Reads a poll interval that may be an integer or a numeric string.
fn interval_setting(
    key: &str,
    value: Option<&toml::Value>,
    default: Duration,
    warnings: &mut Vec<String>,
) -> Duration {
    let seconds = match value {
        None => return default,
        Some(toml::Value::Integer(secs)) => Some(*secs),
        Some(toml::Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let interval = poll_interval(seconds, default);
    if seconds.map_or(true, |secs| secs < 1) {
        warnings.push(format!(
            "{key} = {} is not a positive whole number of seconds; using {}s",
            value.map_or_else(String::new, |v| v.to_string()),
            default.as_secs()
        ));
    }
    interval
}
