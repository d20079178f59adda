//! HTTP adapters for the incident source and the ticket sink.
//!
//! Both adapters use a blocking `reqwest` client. They must be constructed
//! and dropped outside of an async context; the supervisor runs the loops on
//! blocking threads for that reason.

use crate::config::{RetryConfig, SinkConfig, SourceConfig, TransportConfig};
use crate::error::{SyncError, SyncResult};
use crate::transport::{IncidentSource, TicketSink};
use incidentsync_protocol::{CreatedTicket, Incident, IncidentQuery, TicketPayload};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Which side of the bridge an error came from.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Source,
    Sink,
}

impl Endpoint {
    fn error(self, message: String, retryable: bool) -> SyncError {
        match (self, retryable) {
            (Endpoint::Source, true) => SyncError::source_retryable(message),
            (Endpoint::Source, false) => SyncError::source_fatal(message),
            (Endpoint::Sink, true) => SyncError::sink_retryable(message),
            (Endpoint::Sink, false) => SyncError::sink_fatal(message),
        }
    }
}

fn build_client(transport: &TransportConfig, accept_invalid_certs: bool) -> SyncResult<Client> {
    Client::builder()
        .timeout(transport.timeout)
        .connect_timeout(transport.connect_timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))
}

fn map_transport_error(endpoint: Endpoint, err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else {
        endpoint.error(err.to_string(), true)
    }
}

/// Maps a non-2xx response to an error.
fn status_error(endpoint: Endpoint, status: StatusCode, body: &str) -> SyncError {
    let message = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::AuthenticationFailed(message),
        StatusCode::TOO_MANY_REQUESTS => endpoint.error(message, true),
        s if s.is_server_error() => endpoint.error(message, true),
        _ => endpoint.error(message, false),
    }
}

/// Sends a request, reads the body and maps failures.
fn send(endpoint: Endpoint, request: RequestBuilder) -> SyncResult<(StatusCode, String)> {
    let response: Response = request
        .send()
        .map_err(|e| map_transport_error(endpoint, e))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| map_transport_error(endpoint, e))?;
    Ok((status, body))
}

/// Runs `call` until it succeeds, fails permanently, or runs out of attempts.
fn with_backoff<T>(
    retry: &RetryConfig,
    what: &str,
    mut call: impl FnMut() -> SyncResult<T>,
) -> SyncResult<T> {
    let mut attempt = 0;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                attempt += 1;
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    request = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Incident source backed by the SIEM REST API.
pub struct HttpIncidentSource {
    config: SourceConfig,
    retry: RetryConfig,
    client: Client,
}

impl HttpIncidentSource {
    /// Creates a new source adapter.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the HTTP client cannot be built.
    pub fn new(config: SourceConfig, transport: &TransportConfig) -> SyncResult<Self> {
        let client = build_client(transport, config.accept_invalid_certs)?;
        Ok(Self {
            config,
            retry: transport.retry.clone(),
            client,
        })
    }

    /// Returns the configured endpoint.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("SEC", &self.config.api_key)
            .header("Version", &self.config.api_version)
            .header("Accept", "application/json")
    }
}

impl IncidentSource for HttpIncidentSource {
    fn query(&self, query: &IncidentQuery) -> SyncResult<Vec<Incident>> {
        let filter = query.filter();
        debug!(filter = %filter, range = %query.range.header_value(), "querying incident source");

        with_backoff(&self.retry, "query", || {
            let request = self
                .get(&self.config.url)
                .header("Range", query.range.header_value())
                .query(&[("filter", filter.as_str()), ("sort", query.sort())]);

            let (status, body) = send(Endpoint::Source, request)?;
            if !status.is_success() {
                return Err(status_error(Endpoint::Source, status, &body));
            }
            Ok(Incident::decode_list(&body)?)
        })
    }

    fn fetch(&self, id: u64) -> SyncResult<Option<Incident>> {
        let url = format!("{}/{id}", self.config.url.trim_end_matches('/'));
        debug!(incident_id = id, "fetching incident");

        with_backoff(&self.retry, "fetch", || {
            let (status, body) = send(Endpoint::Source, self.get(&url))?;
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(status_error(Endpoint::Source, status, &body));
            }
            Ok(Some(Incident::decode(&body)?))
        })
    }
}

/// Ticket sink backed by the issue tracker's REST API.
pub struct HttpTicketSink {
    config: SinkConfig,
    retry: RetryConfig,
    client: Client,
}

impl HttpTicketSink {
    /// Creates a new sink adapter.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the HTTP client cannot be built.
    pub fn new(config: SinkConfig, transport: &TransportConfig) -> SyncResult<Self> {
        let client = build_client(transport, false)?;
        Ok(Self {
            config,
            retry: transport.retry.clone(),
            client,
        })
    }

    /// Returns the configured endpoint.
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl TicketSink for HttpTicketSink {
    fn create_ticket(&self, payload: &TicketPayload) -> SyncResult<CreatedTicket> {
        with_backoff(&self.retry, "create_ticket", || {
            let request = self
                .client
                .post(&self.config.url)
                .basic_auth(&self.config.user, Some(&self.config.api_token))
                .header("Accept", "application/json")
                .json(payload);

            let (status, body) = send(Endpoint::Sink, request)?;
            if !status.is_success() {
                return Err(status_error(Endpoint::Sink, status, &body));
            }
            Ok(CreatedTicket::decode(&body)?)
        })
    }
}
