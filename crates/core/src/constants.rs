//! Constants used throughout the relay core crate.
//!
//! Defaults for configuration, the fixed reply and placeholder strings, and the
//! route paths each hop calls on the next.

/// Default ceiling on live patients checked at admission time.
pub const DEFAULT_PATIENT_CAPACITY: usize = 10;

/// Default front desk listen address.
pub const DEFAULT_FRONT_DESK_ADDR: &str = "0.0.0.0:8080";

/// Default registry listen address.
pub const DEFAULT_REGISTRY_ADDR: &str = "0.0.0.0:8081";

/// Default practitioner endpoint listen address.
pub const DEFAULT_PRACTITIONER_ADDR: &str = "0.0.0.0:8082";

/// Default base URL the front desk and practitioner use to reach the registry.
pub const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:8081";

/// Default base URL the registry relays encounters to.
pub const DEFAULT_PRACTITIONER_URL: &str = "http://127.0.0.1:8082";

/// Default per-request timeout for relayed calls, in milliseconds.
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 5_000;

/// Default number of relay attempts. One attempt means no retry.
pub const DEFAULT_RELAY_MAX_ATTEMPTS: u32 = 1;

/// Default delay before the first retry, in milliseconds. Doubled per retry.
pub const DEFAULT_RELAY_BACKOFF_MS: u64 = 200;

/// Tracing target for raw segment traffic.
pub const HL7_LOG_TARGET: &str = "hl7";

/// Placeholder for a missing patient name.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// Placeholder for a missing practitioner or patient reference.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for a missing visit reason.
pub const REASON_NOT_SPECIFIED: &str = "not specified";

/// Prefix of an encounter subject reference.
pub const PATIENT_REFERENCE_PREFIX: &str = "Patient/";

/// Sending application written into MSH-3 by the front desk.
pub const SENDING_APPLICATION: &str = "ReceptionApp";

/// Sending facility written into MSH-4 by the front desk.
pub const SENDING_FACILITY: &str = "Reception";

/// Registry route accepting segment messages.
pub const HL7_PATH: &str = "/hl7";

/// Registry route accepting single resources.
pub const FHIR_PATH: &str = "/fhir";

/// Encounter route: bundle export on the registry, inbound relay on the practitioner.
pub const ENCOUNTER_PATH: &str = "/fhir/encounter";

/// Practitioner route receiving relayed patients.
pub const PATIENT_PATH: &str = "/fhir/patient";
