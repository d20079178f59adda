//! Incident records from the incident source.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    /// Active and actionable.
    Open,
    /// Hidden by an analyst; no longer actionable.
    Hidden,
    /// Closed; no longer actionable.
    Closed,
    /// Any status this build does not know about.
    #[serde(other)]
    Unknown,
}

impl IncidentStatus {
    /// Returns the wire name used in source filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "OPEN",
            IncidentStatus::Hidden => "HIDDEN",
            IncidentStatus::Closed => "CLOSED",
            IncidentStatus::Unknown => "UNKNOWN",
        }
    }

    /// Returns true if a ticket should still be created for this status.
    pub fn is_actionable(&self) -> bool {
        matches!(self, IncidentStatus::Open)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incident (offense) as returned by the incident source.
///
/// Every field is optional on the wire. Which fields are *required* is decided
/// by the consumer: the ticket builder rejects records missing an id, a
/// description or either timestamp. Fields this type does not model are kept
/// in [`Incident::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Source-assigned id, strictly increasing in creation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IncidentStatus>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source-specific incident type (usually numeric).
    #[serde(
        default,
        rename = "offense_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub incident_type: Option<Value>,
    /// Creation time, epoch milliseconds.
    #[serde(default, rename = "start_time", skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    /// Last update time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_time: Option<i64>,
    /// Source endpoints, in source order.
    #[serde(
        default,
        rename = "source_address_ids",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_endpoints: Option<Vec<Value>>,
    /// Destination endpoints, in source order.
    #[serde(
        default,
        rename = "destination_address_ids",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_endpoints: Option<Vec<Value>>,
    /// Everything else the source sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Incident {
    /// Creates an incident with just an id and status.
    pub fn new(id: u64, status: IncidentStatus) -> Self {
        Self {
            id: Some(id),
            status: Some(status),
            ..Self::default()
        }
    }

    /// Decodes a single incident from a JSON body.
    pub fn decode(body: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Decodes a JSON array of incidents.
    pub fn decode_list(body: &str) -> ProtocolResult<Vec<Self>> {
        Ok(serde_json::from_str(body)?)
    }

    /// Returns true if the incident is currently open.
    ///
    /// A record without a status is treated as not open.
    pub fn is_open(&self) -> bool {
        self.status.is_some_and(|s| s.is_actionable())
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the incident type.
    pub fn with_incident_type(mut self, incident_type: impl Into<Value>) -> Self {
        self.incident_type = Some(incident_type.into());
        self
    }

    /// Sets both timestamps (epoch milliseconds).
    pub fn with_times(mut self, creation_ms: i64, last_updated_ms: i64) -> Self {
        self.creation_time = Some(creation_ms);
        self.last_updated_time = Some(last_updated_ms);
        self
    }

    /// Sets the source and destination endpoint lists.
    pub fn with_endpoints<S, D>(mut self, sources: S, destinations: D) -> Self
    where
        S: IntoIterator,
        S::Item: Into<Value>,
        D: IntoIterator,
        D::Item: Into<Value>,
    {
        self.source_endpoints = Some(sources.into_iter().map(Into::into).collect());
        self.destination_endpoints = Some(destinations.into_iter().map(Into::into).collect());
        self
    }
}
