//! ACK/NACK replies for inbound segment messages.
//!
//! An ACK only means the message was accepted locally. It is produced before and
//! independently of any relay to the next hop.

use crate::error::{CoreError, ValidationError};
use hl7::{Acknowledgment, TriggerEvent};

pub const REASON_CAPACITY_EXCEEDED: &str = "Too many patients";
pub const REASON_PARSE_ERROR: &str = "ParseError";
pub const REASON_PATIENT_NOT_FOUND: &str = "Patient not found";
pub const REASON_INVALID_PATIENT_ID: &str = "Invalid patient ID";
pub const REASON_UNKNOWN_TRIGGER: &str = "Unknown trigger event";
pub const REASON_UNKNOWN_PATIENT: &str = "Unknown patient reference";
pub const REASON_PROCESSING_ERROR: &str = "Processing error";

/// Positive reply naming the trigger that was handled, for example `ACK|A01 received`.
pub fn accepted(trigger: &TriggerEvent) -> Acknowledgment {
    Acknowledgment::ack(format!("{} received", trigger.code()))
}

/// Negative reply for a failed segment message.
pub fn rejected(err: &CoreError) -> Acknowledgment {
    Acknowledgment::nack(rejection_reason(err))
}

fn rejection_reason(err: &CoreError) -> &'static str {
    match err {
        CoreError::Decode(_) => REASON_PARSE_ERROR,
        CoreError::Admission(_) => REASON_CAPACITY_EXCEEDED,
        CoreError::Validation(validation) => match validation {
            ValidationError::PatientNotFound(_) => REASON_PATIENT_NOT_FOUND,
            ValidationError::InvalidPatientId(_) => REASON_INVALID_PATIENT_ID,
            ValidationError::UnknownTrigger(_) => REASON_UNKNOWN_TRIGGER,
            ValidationError::UnknownPatient(_) => REASON_UNKNOWN_PATIENT,
            ValidationError::BadSubjectReference(_)
            | ValidationError::MissingField(_)
            | ValidationError::UnsupportedResource(_) => REASON_PARSE_ERROR,
        },
        CoreError::Store(_) | CoreError::InvalidConfig(_) => REASON_PROCESSING_ERROR,
    }
}
