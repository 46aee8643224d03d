//! Error taxonomy for the relay core.
//!
//! Every variant is recoverable. Hop services turn them into ACK/NACK replies or
//! 4xx bodies; none of them abort the process.

use crate::domain::PatientId;

/// Malformed wire payload in either format.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("segment message: {0}")]
    Segment(#[from] hl7::Hl7Error),

    #[error("resource: {0}")]
    Resource(#[from] fhir::FhirError),
}

/// Well-formed payload that is semantically invalid.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid patient id: '{0}'")]
    InvalidPatientId(String),

    #[error("patient {0} not found")]
    PatientNotFound(PatientId),

    #[error("subject references unknown patient {0}")]
    UnknownPatient(PatientId),

    #[error("subject reference must look like 'Patient/<id>', got '{0}'")]
    BadSubjectReference(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unsupported resource type: {0}")]
    UnsupportedResource(String),

    #[error("unknown trigger event: {0}")]
    UnknownTrigger(String),
}

/// Business-rule rejection at admission time.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("patient capacity of {capacity} reached ({current} registered)")]
    CapacityExceeded { capacity: usize, current: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<hl7::Hl7Error> for CoreError {
    fn from(err: hl7::Hl7Error) -> Self {
        CoreError::Decode(DecodeError::Segment(err))
    }
}

impl From<fhir::FhirError> for CoreError {
    fn from(err: fhir::FhirError) -> Self {
        CoreError::Decode(DecodeError::Resource(err))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
