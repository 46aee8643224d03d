//! # Relay Core
//!
//! Translation, admission control and relay engine for the three-hop clinical relay:
//! front desk, central registry and practitioner endpoint.
//!
//! This crate contains:
//! - domain entities and the store interfaces with in-memory implementations
//! - the translator between segment messages, resources and domain entities
//! - admission control, ACK/NACK generation, the read cache and the event broadcaster
//! - the relay forwarder and the three hop services built on top of them
//!
//! **No API concerns**: HTTP routing, WebSocket upgrades and OpenAPI docs belong in
//! `api-rest`.

pub mod ack;
pub mod admission;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod front_desk;
pub mod practitioner;
pub mod registry;
pub mod relay;
pub mod store;
pub mod translator;

pub use admission::AdmissionControl;
pub use broadcast::{Event, EventBroadcaster, Topic, VisitPayload};
pub use cache::{CacheState, ReadCache};
pub use config::{CoreConfig, ListenAddrs, RetryPolicy};
pub use domain::{CacheEntry, NewPatient, NewVisit, Patient, PatientId, Visit, VisitId, VisitStatus};
pub use error::{
    AdmissionError, CoreError, CoreResult, DecodeError, StoreError, StoreResult, ValidationError,
};
pub use front_desk::{
    DischargeRequest, EncounterRequest, FrontDeskError, FrontDeskService, RegisterRequest,
};
pub use practitioner::PractitionerService;
pub use registry::{RegistryService, ResourceOutcome};
pub use relay::{RelayError, RelayForwarder};
pub use store::{InMemoryPatientStore, InMemoryVisitStore, PatientStore, VisitStore};
