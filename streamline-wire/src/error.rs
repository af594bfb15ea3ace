use thiserror::Error;

/// Failures that can occur while constructing, mutating, or serialising the
/// message and payload data model.
#[derive(Debug, Error)]
pub enum WireError {
    /// A mutating call landed on a message or payload that was already frozen.
    #[error("frozen violation: cannot {operation} on a frozen message")]
    FrozenViolation {
        /// The operation that was attempted, for diagnostics.
        operation: &'static str,
    },

    /// A timer region was opened twice with the same name before being closed.
    #[error("timer '{name}' is already open on this message")]
    TimerAlreadyOpen {
        /// The timer name that collided.
        name: String,
    },

    /// No serializer was available for a payload: neither the payload's own
    /// `serialize` implementation, nor a caller-supplied encoder, applied.
    #[error("payload of type {payload_type} is not serializable")]
    Unserializable {
        /// The payload variant name, for diagnostics.
        payload_type: &'static str,
    },

    /// `serde_json` failed to render an otherwise-serializable value.
    #[error("failed to serialize message to JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A [`crate::Draft`] was asked to set a field its target payload type does
    /// not declare.
    #[error("field '{field}' is not valid for payload type {payload_type}")]
    UnknownDraftField {
        /// The payload type the draft was building.
        payload_type: &'static str,
        /// The rejected field name.
        field: String,
    },

    /// A [`crate::Draft`] was compiled without all the fields its target
    /// payload type requires.
    #[error("draft for payload type {payload_type} is missing field '{field}'")]
    IncompleteDraft {
        /// The payload type the draft was building.
        payload_type: &'static str,
        /// The missing field name.
        field: &'static str,
    },
}
