//! Error types for protocol handling.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding records or building ticket payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A field required to build a ticket is missing.
    #[error("incident {} is missing required field `{field}`", display_id(.id))]
    MalformedIncident {
        /// The incident id, if the record carried one.
        id: Option<u64>,
        /// Name of the missing field, as it appears on the wire.
        field: &'static str,
    },

    /// An epoch-milliseconds value cannot be represented as a date.
    #[error("field `{field}` holds an out-of-range timestamp: {millis}")]
    InvalidTimestamp {
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        millis: i64,
    },

    /// The body is not the JSON shape we expected.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_id(id: &Option<u64>) -> String {
    id.map_or_else(|| "<unknown>".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let err = ProtocolError::MalformedIncident {
            id: Some(12),
            field: "description",
        };
        assert_eq!(
            err.to_string(),
            "incident 12 is missing required field `description`"
        );

        let err = ProtocolError::MalformedIncident {
            id: None,
            field: "id",
        };
        assert!(err.to_string().contains("<unknown>"));
    }
}
