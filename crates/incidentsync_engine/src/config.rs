//! Configuration for the sync engine.

use std::fmt;
use std::time::Duration;

/// Default forward-loop poll interval.
pub const DEFAULT_FORWARD_INTERVAL: Duration = Duration::from_secs(5);
/// Default retry-loop poll interval.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1800);
/// Shortest poll interval either loop accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default source API version header.
pub const DEFAULT_SOURCE_API_VERSION: &str = "20.0";

/// Turns a configured interval in seconds into a poll interval.
///
/// Missing values and values below one second fall back to `default`.
pub fn poll_interval(seconds: Option<i64>, default: Duration) -> Duration {
    match seconds {
        Some(secs) if secs >= MIN_POLL_INTERVAL.as_secs() as i64 => {
            Duration::from_secs(secs as u64)
        }
        _ => default,
    }
}

/// Loop timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sleep between forward cycles.
    pub forward_interval: Duration,
    /// Sleep between reconciliation cycles.
    pub retry_interval: Duration,
}

impl EngineConfig {
    /// Creates a configuration with the default intervals.
    pub fn new() -> Self {
        Self {
            forward_interval: DEFAULT_FORWARD_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Sets the forward interval, clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_forward_interval(mut self, interval: Duration) -> Self {
        self.forward_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets the retry interval, clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeouts and backoff for every source and sink call.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Backoff for transient failures of a single call.
    pub retry: RetryConfig,
}

impl TransportConfig {
    /// Creates a transport configuration with default timeouts.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for transport-level retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap jitter source derived from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Connection settings for the incident source.
#[derive(Clone)]
pub struct SourceConfig {
    /// Incidents endpoint, e.g. `https://siem/api/siem/offenses`.
    pub url: String,
    /// API key sent in the `SEC` header.
    pub api_key: String,
    /// Value of the `Version` header.
    pub api_version: String,
    /// Accept self-signed or otherwise invalid TLS certificates.
    pub accept_invalid_certs: bool,
}

impl SourceConfig {
    /// Creates a source configuration.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_SOURCE_API_VERSION.to_string(),
            accept_invalid_certs: false,
        }
    }

    /// Sets the API version header value.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Allows invalid TLS certificates.
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Connection settings for the ticket sink.
#[derive(Clone)]
pub struct SinkConfig {
    /// Create-issue endpoint, e.g. `https://jira/rest/api/2/issue`.
    pub url: String,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth API token.
    pub api_token: String,
}

impl SinkConfig {
    /// Creates a sink configuration.
    pub fn new(url: impl Into<String>, user: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            api_token: api_token.into(),
        }
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("api_token", &"<redacted>")
            .finish()
    }
}
