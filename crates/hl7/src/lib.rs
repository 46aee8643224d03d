//! Pipe-delimited segment message support for the clinical relay.
//!
//! This crate provides the **wire model** and **format helpers** for legacy
//! ADT messages exchanged between the front desk and the registry:
//! - decoding raw segment text into a [`SegmentMessage`]
//! - rendering a [`SegmentMessage`] back into segment text
//! - typed views over the admit and discharge triggers
//! - the two-field ACK/NACK reply pair
//!
//! This crate does not know about patients, stores or capacity rules. Callers
//! translate the typed views into domain entities themselves.

pub mod ack;
pub mod adt;
pub mod message;

pub use ack::{AckCode, Acknowledgment};
pub use adt::{AdmitPatient, DischargePatient};
pub use message::{Delimiters, Header, Segment, SegmentMessage, TriggerEvent};

/// Errors returned by the `hl7` codec crate.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Hl7Error {
    #[error("empty message")]
    Empty,

    #[error("message does not start with an MSH segment")]
    MissingHeader,

    #[error("invalid encoding characters: {0}")]
    InvalidEncoding(String),

    #[error("invalid segment at line {line}: {reason}")]
    InvalidSegment { line: usize, reason: String },

    #[error("no trigger event in MSH-9")]
    MissingTrigger,

    #[error("missing {0} segment")]
    MissingSegment(&'static str),

    #[error("expected trigger {expected}, got {actual}")]
    UnexpectedTrigger {
        expected: &'static str,
        actual: String,
    },

    #[error("invalid acknowledgment: {0}")]
    InvalidAcknowledgment(String),
}

/// Type alias for Results that can fail with an [`Hl7Error`].
pub type Hl7Result<T> = Result<T, Hl7Error>;
