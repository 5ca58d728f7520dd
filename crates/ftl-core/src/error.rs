use thiserror::Error;

use crate::EventKind;

/// Precondition violations on the completion gate. Each one means a caller
/// broke the one-event/one-decision-per-cycle contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("a finished event is already waiting on this gate")]
    EventAlreadyWaiting,
    #[error("a decision is already pending on this gate")]
    DecisionAlreadyPending,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{kind} event is missing field `{key}`")]
    MissingField { kind: EventKind, key: String },
    #[error("{kind} event has malformed field `{key}`: {source}")]
    MalformedField {
        kind: EventKind,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode field `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
