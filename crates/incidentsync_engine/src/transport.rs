//! Source and sink abstractions.

use crate::error::{SyncError, SyncResult};
use incidentsync_protocol::{CreatedTicket, Incident, IncidentQuery, TicketPayload};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Read access to the incident source.
///
/// This trait abstracts the network layer so the loops can be driven by the
/// HTTP adapter in production and by [`MockSource`] in tests.
pub trait IncidentSource: Send + Sync {
    /// Lists incidents matching `query`, in the source's sort order.
    fn query(&self, query: &IncidentQuery) -> SyncResult<Vec<Incident>>;

    /// Fetches the current state of one incident.
    ///
    /// Returns `Ok(None)` if the source reports that the incident does not
    /// exist.
    fn fetch(&self, id: u64) -> SyncResult<Option<Incident>>;
}

/// Write access to the ticket sink.
pub trait TicketSink: Send + Sync {
    /// Creates a ticket.
    fn create_ticket(&self, payload: &TicketPayload) -> SyncResult<CreatedTicket>;
}

/// An in-memory incident source for testing.
///
/// Queries behave like the real source: status filter, `id > after_id`,
/// ascending by creation time, truncated to the requested range.
#[derive(Debug, Default)]
pub struct MockSource {
    incidents: Mutex<BTreeMap<u64, Incident>>,
    query_override: Mutex<Option<Vec<Incident>>>,
    query_error: Mutex<Option<String>>,
    fetch_failures: Mutex<BTreeSet<u64>>,
    queries: Mutex<Vec<IncidentQuery>>,
    fetches: Mutex<Vec<u64>>,
}

impl MockSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding `incidents`.
    pub fn with_incidents(incidents: impl IntoIterator<Item = Incident>) -> Self {
        let source = Self::new();
        for incident in incidents {
            source.insert(incident);
        }
        source
    }

    /// Adds or replaces an incident. Records without an id are ignored.
    pub fn insert(&self, incident: Incident) {
        if let Some(id) = incident.id {
            self.incidents.lock().insert(id, incident);
        }
    }

    /// Removes an incident so fetches report it as missing.
    pub fn remove(&self, id: u64) {
        self.incidents.lock().remove(&id);
    }

    /// Makes every query return `incidents` verbatim.
    pub fn set_query_override(&self, incidents: Vec<Incident>) {
        *self.query_override.lock() = Some(incidents);
    }

    /// Makes every query fail with a retryable source error.
    pub fn set_query_error(&self, message: Option<&str>) {
        *self.query_error.lock() = message.map(str::to_string);
    }

    /// Makes fetches of `id` fail with a retryable source error.
    pub fn fail_fetch(&self, id: u64) {
        self.fetch_failures.lock().insert(id);
    }

    /// Returns every query received so far.
    pub fn queries(&self) -> Vec<IncidentQuery> {
        self.queries.lock().clone()
    }

    /// Returns every fetched id so far.
    pub fn fetches(&self) -> Vec<u64> {
        self.fetches.lock().clone()
    }
}

impl IncidentSource for MockSource {
    fn query(&self, query: &IncidentQuery) -> SyncResult<Vec<Incident>> {
        self.queries.lock().push(query.clone());

        if let Some(message) = self.query_error.lock().clone() {
            return Err(SyncError::source_retryable(message));
        }
        if let Some(incidents) = self.query_override.lock().clone() {
            return Ok(incidents);
        }

        let mut matching: Vec<Incident> = self
            .incidents
            .lock()
            .values()
            .filter(|i| i.status == Some(query.status))
            .filter(|i| i.id.is_some_and(|id| id > query.after_id))
            .cloned()
            .collect();
        matching.sort_by_key(|i| (i.creation_time.unwrap_or(i64::MAX), i.id));
        matching.truncate(query.range.item_count());
        Ok(matching)
    }

    fn fetch(&self, id: u64) -> SyncResult<Option<Incident>> {
        self.fetches.lock().push(id);

        if self.fetch_failures.lock().contains(&id) {
            return Err(SyncError::source_retryable(format!(
                "fetch of incident {id} failed"
            )));
        }
        Ok(self.incidents.lock().get(&id).cloned())
    }
}

/// An in-memory ticket sink for testing.
#[derive(Debug, Default)]
pub struct MockSink {
    fail_ids: Mutex<BTreeSet<u64>>,
    fail_all: Mutex<bool>,
    created: Mutex<Vec<TicketPayload>>,
    calls: AtomicU64,
}

impl MockSink {
    /// Creates a sink that accepts every ticket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes tickets for `id` fail.
    pub fn fail_for(&self, id: u64) {
        self.fail_ids.lock().insert(id);
    }

    /// Lets tickets for `id` succeed again.
    pub fn recover(&self, id: u64) {
        self.fail_ids.lock().remove(&id);
    }

    /// Makes every ticket fail, or succeed again.
    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock() = fail;
    }

    /// Returns the payloads of every created ticket.
    pub fn created(&self) -> Vec<TicketPayload> {
        self.created.lock().clone()
    }

    /// Returns the incident ids of every created ticket.
    pub fn created_ids(&self) -> Vec<u64> {
        self.created.lock().iter().map(|t| t.incident_id).collect()
    }

    /// Returns the number of create calls, successful or not.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TicketSink for MockSink {
    fn create_ticket(&self, payload: &TicketPayload) -> SyncResult<CreatedTicket> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_all.lock() || self.fail_ids.lock().contains(&payload.incident_id) {
            return Err(SyncError::sink_retryable(format!(
                "sink rejected ticket for incident {}",
                payload.incident_id
            )));
        }

        let mut created = self.created.lock();
        created.push(payload.clone());
        let seq = created.len();
        Ok(CreatedTicket {
            id: Some(format!("{}", 10_000 + seq)),
            key: Some(format!("{}-{seq}", payload.project_key)),
            link: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incidentsync_protocol::{IncidentStatus, TicketBuilder};

    fn incident(id: u64, status: IncidentStatus, created: i64) -> Incident {
        Incident::new(id, status)
            .with_description(format!("incident {id}"))
            .with_times(created, created)
    }

    #[test]
    fn mock_source_query_semantics() {
        let source = MockSource::with_incidents([
            incident(12, IncidentStatus::Open, 300),
            incident(10, IncidentStatus::Open, 100),
            incident(11, IncidentStatus::Closed, 50),
            incident(9, IncidentStatus::Open, 10),
        ]);

        let result = source.query(&IncidentQuery::open_after(9)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, Some(10));
        assert_eq!(source.queries().len(), 1);
    }

    #[test]
    fn mock_source_fetch() {
        let source = MockSource::with_incidents([incident(1, IncidentStatus::Open, 0)]);
        assert!(source.fetch(1).unwrap().is_some());
        assert!(source.fetch(2).unwrap().is_none());

        source.fail_fetch(1);
        assert!(source.fetch(1).unwrap_err().is_retryable());
        assert_eq!(source.fetches(), vec![1, 2, 1]);
    }

    #[test]
    fn mock_source_query_error() {
        let source = MockSource::new();
        source.set_query_error(Some("connection refused"));
        assert!(source.query(&IncidentQuery::open_after(0)).is_err());

        source.set_query_error(None);
        assert!(source.query(&IncidentQuery::open_after(0)).unwrap().is_empty());
    }

    #[test]
    fn mock_sink_failures() {
        let sink = MockSink::new();
        let builder = TicketBuilder::new("SEC");
        let ticket = builder
            .build(&incident(3, IncidentStatus::Open, 0))
            .unwrap();

        sink.fail_for(3);
        assert!(sink.create_ticket(&ticket).is_err());

        sink.recover(3);
        let created = sink.create_ticket(&ticket).unwrap();
        assert_eq!(created.label(), "SEC-1");
        assert_eq!(sink.created_ids(), vec![3]);
        assert_eq!(sink.calls(), 2);
    }
}
