//! Ticket payloads for the ticket sink.

use crate::error::{ProtocolError, ProtocolResult};
use crate::incident::Incident;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use serde_json::Value;

/// Issue type used when none is configured.
pub const DEFAULT_ISSUE_TYPE: &str = "Task";

/// Upper bound the sink enforces on summaries.
const MAX_SUMMARY_CHARS: usize = 255;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A ticket ready to be sent to the sink.
///
/// Derived solely from one [`Incident`]; never persisted. Serialises to the
/// sink's create-issue body:
///
/// ```json
/// {"fields": {"project": {"key": "SEC"}, "summary": "...",
///             "description": "...", "issuetype": {"name": "Task"}}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPayload {
    /// The incident this ticket describes. Not sent to the sink.
    pub incident_id: u64,
    /// Sink project key.
    pub project_key: String,
    /// One-line summary.
    pub summary: String,
    /// Multi-line description.
    pub description: String,
    /// Sink issue type name.
    pub issue_type: String,
}

impl Serialize for TicketPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            fields: Fields<'a>,
        }
        #[derive(serde::Serialize)]
        struct Fields<'a> {
            project: Key<'a>,
            summary: &'a str,
            description: &'a str,
            issuetype: Name<'a>,
        }
        #[derive(serde::Serialize)]
        struct Key<'a> {
            key: &'a str,
        }
        #[derive(serde::Serialize)]
        struct Name<'a> {
            name: &'a str,
        }

        Body {
            fields: Fields {
                project: Key {
                    key: &self.project_key,
                },
                summary: &self.summary,
                description: &self.description,
                issuetype: Name {
                    name: &self.issue_type,
                },
            },
        }
        .serialize(serializer)
    }
}

/// The sink's answer to a successful create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreatedTicket {
    /// Sink-internal id.
    #[serde(default)]
    pub id: Option<String>,
    /// Human-facing key, e.g. `SEC-42`.
    #[serde(default)]
    pub key: Option<String>,
    /// API link to the ticket.
    #[serde(default, rename = "self")]
    pub link: Option<String>,
}

impl CreatedTicket {
    /// Decodes the sink's JSON response.
    pub fn decode(body: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Best label for log lines: key, else id, else `"?"`.
    pub fn label(&self) -> &str {
        self.key
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("?")
    }
}

/// Builds [`TicketPayload`]s from incidents.
///
/// The builder is pure: it never performs I/O and the same incident always
/// produces the same payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBuilder {
    project_key: String,
    issue_type: String,
}

impl TicketBuilder {
    /// Creates a builder for the given sink project.
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
        }
    }

    /// Sets the issue type.
    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }

    /// Returns the project key.
    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    /// Builds the ticket for `incident`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedIncident`] if `id`, `description`,
    /// `start_time` or `last_updated_time` is missing, and
    /// [`ProtocolError::InvalidTimestamp`] if a timestamp is out of range.
    /// Missing endpoint lists and incident type are rendered empty.
    pub fn build(&self, incident: &Incident) -> ProtocolResult<TicketPayload> {
        let id = incident.id.ok_or(ProtocolError::MalformedIncident {
            id: None,
            field: "id",
        })?;
        let missing = |field| ProtocolError::MalformedIncident { id: Some(id), field };

        let description = incident
            .description
            .as_deref()
            .ok_or_else(|| missing("description"))?;
        let start = incident
            .creation_time
            .ok_or_else(|| missing("start_time"))?;
        let updated = incident
            .last_updated_time
            .ok_or_else(|| missing("last_updated_time"))?;

        let start = render_millis("start_time", start)?;
        let updated = render_millis("last_updated_time", updated)?;
        let incident_type = incident
            .incident_type
            .as_ref()
            .map(render_value)
            .unwrap_or_default();

        let body = format!(
            "Offense ID: {id}\n\
             Offense Description: {description}\n\
             Offense Type: {incident_type}\n\
             Source IPs: {sources}\n\
             Destination IPs: {destinations}\n\
             Start Time: {start}\n\
             Last Updated: {updated}\n",
            sources = join_endpoints(incident.source_endpoints.as_deref()),
            destinations = join_endpoints(incident.destination_endpoints.as_deref()),
        );

        Ok(TicketPayload {
            incident_id: id,
            project_key: self.project_key.clone(),
            summary: summary_line(id, description),
            description: body,
            issue_type: self.issue_type.clone(),
        })
    }
}

/// `QRadar Offense <id>: <description>` on one line, capped at the sink limit.
fn summary_line(id: u64, description: &str) -> String {
    let flat = description.split_whitespace().collect::<Vec<_>>().join(" ");
    let summary = format!("QRadar Offense {id}: {flat}");
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        summary
    } else {
        summary.chars().take(MAX_SUMMARY_CHARS).collect()
    }
}

fn render_millis(field: &'static str, millis: i64) -> ProtocolResult<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|ts| ts.format(TIME_FORMAT).to_string())
        .ok_or(ProtocolError::InvalidTimestamp { field, millis })
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join_endpoints(endpoints: Option<&[Value]>) -> String {
    endpoints
        .unwrap_or_default()
        .iter()
        .map(render_value)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::IncidentStatus;
    use serde_json::json;

    fn full_incident() -> Incident {
        Incident::new(101, IncidentStatus::Open)
            .with_description("Multiple Login Failures for the Same User\n")
            .with_incident_type(3)
            .with_times(1_700_000_000_000, 1_700_000_360_000)
            .with_endpoints(["10.0.0.1", "10.0.0.2"], [json!(7)])
    }

    #[test]
    fn build_full_ticket() {
        let ticket = TicketBuilder::new("SEC").build(&full_incident()).unwrap();

        assert_eq!(ticket.incident_id, 101);
        assert_eq!(ticket.project_key, "SEC");
        assert_eq!(ticket.issue_type, "Task");
        assert_eq!(
            ticket.summary,
            "QRadar Offense 101: Multiple Login Failures for the Same User"
        );
        assert_eq!(
            ticket.description,
            "Offense ID: 101\n\
             Offense Description: Multiple Login Failures for the Same User\n\n\
             Offense Type: 3\n\
             Source IPs: 10.0.0.1, 10.0.0.2\n\
             Destination IPs: 7\n\
             Start Time: 2023-11-14 22:13:20\n\
             Last Updated: 2023-11-14 22:19:20\n"
        );
    }

    #[test]
    fn missing_optional_fields_render_empty() {
        let incident = Incident::new(5, IncidentStatus::Open)
            .with_description("Port scan")
            .with_times(0, 0);

        let ticket = TicketBuilder::new("SEC").build(&incident).unwrap();
        assert!(ticket.description.contains("Offense Type: \n"));
        assert!(ticket.description.contains("Source IPs: \n"));
        assert!(ticket.description.contains("Destination IPs: \n"));
        assert!(ticket.description.contains("Start Time: 1970-01-01 00:00:00\n"));
    }

    #[test]
    fn missing_required_fields_fail() {
        let builder = TicketBuilder::new("SEC");

        let mut no_id = full_incident();
        no_id.id = None;
        assert!(matches!(
            builder.build(&no_id),
            Err(ProtocolError::MalformedIncident {
                id: None,
                field: "id"
            })
        ));

        let mut no_description = full_incident();
        no_description.description = None;
        assert!(matches!(
            builder.build(&no_description),
            Err(ProtocolError::MalformedIncident {
                id: Some(101),
                field: "description"
            })
        ));

        let mut no_update = full_incident();
        no_update.last_updated_time = None;
        assert!(matches!(
            builder.build(&no_update),
            Err(ProtocolError::MalformedIncident {
                field: "last_updated_time",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_timestamp_fails() {
        let incident = full_incident().with_times(i64::MAX, 0);
        assert!(matches!(
            TicketBuilder::new("SEC").build(&incident),
            Err(ProtocolError::InvalidTimestamp {
                field: "start_time",
                ..
            })
        ));
    }

    #[test]
    fn long_summary_is_capped() {
        let incident = full_incident().with_description("x".repeat(400));
        let ticket = TicketBuilder::new("SEC").build(&incident).unwrap();
        assert_eq!(ticket.summary.chars().count(), 255);
    }

    #[test]
    fn payload_wire_shape() {
        let ticket = TicketBuilder::new("SEC")
            .with_issue_type("Incident")
            .build(&full_incident())
            .unwrap();
        let body = serde_json::to_value(&ticket).unwrap();

        assert_eq!(body["fields"]["project"]["key"], "SEC");
        assert_eq!(body["fields"]["issuetype"]["name"], "Incident");
        assert_eq!(body["fields"]["summary"], ticket.summary.as_str());
        assert!(body.get("incident_id").is_none());
        assert!(body["fields"].get("incident_id").is_none());
    }

    #[test]
    fn created_ticket_decode() {
        let created =
            CreatedTicket::decode(r#"{"id":"10001","key":"SEC-42","self":"https://jira/rest/api/2/issue/10001"}"#)
                .unwrap();
        assert_eq!(created.label(), "SEC-42");

        let bare = CreatedTicket::decode("{}").unwrap();
        assert_eq!(bare.label(), "?");
    }
}
