//! Central registry hop.
//!
//! Owns the patient and visit stores. Segment messages are admitted or discharged
//! here and answered with ACK/NACK. Admitted patients and recorded encounters are
//! translated to resources and relayed to the practitioner endpoint; the relay
//! outcome never changes the local result.

use crate::ack;
use crate::admission::AdmissionControl;
use crate::broadcast::{Event, EventBroadcaster, VisitPayload};
use crate::config::CoreConfig;
use crate::constants::{ENCOUNTER_PATH, HL7_LOG_TARGET, PATIENT_PATH};
use crate::domain::{NewPatient, Patient, PatientId, Visit, VisitId};
use crate::error::{CoreResult, ValidationError};
use crate::relay::RelayForwarder;
use crate::store::{PatientStore, VisitStore};
use crate::translator;
use chrono::Utc;
use fhir::{Bundle, EncounterResource, Resource};
use hl7::{Acknowledgment, AdmitPatient, DischargePatient, SegmentMessage, TriggerEvent};
use std::sync::Arc;

/// Result of an accepted resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceOutcome {
    Patient(PatientId),
    Visit(VisitId),
}

#[derive(Clone)]
pub struct RegistryService {
    cfg: Arc<CoreConfig>,
    patients: Arc<dyn PatientStore>,
    visits: Arc<dyn VisitStore>,
    admission: AdmissionControl,
    relay: RelayForwarder,
    events: EventBroadcaster,
}

impl RegistryService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        patients: Arc<dyn PatientStore>,
        visits: Arc<dyn VisitStore>,
        relay: RelayForwarder,
        events: EventBroadcaster,
    ) -> Self {
        let admission = AdmissionControl::new(cfg.patient_capacity());
        Self {
            cfg,
            patients,
            visits,
            admission,
            relay,
            events,
        }
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Segment messages
    // ------------------------------------------------------------------------

    /// Handle one inbound segment message and produce its reply.
    ///
    /// Never fails: every error becomes a NACK with a specific reason.
    pub async fn handle_segment(&self, raw: &str) -> Acknowledgment {
        tracing::info!(target: HL7_LOG_TARGET, message = %raw.replace('\r', "\n"), "received segment message");

        let reply = match self.process_segment(raw).await {
            Ok(trigger) => ack::accepted(&trigger),
            Err(err) => {
                tracing::warn!(error = %err, "segment message rejected");
                ack::rejected(&err)
            }
        };

        tracing::info!(target: HL7_LOG_TARGET, reply = %reply, "sent acknowledgment");
        reply
    }

    async fn process_segment(&self, raw: &str) -> CoreResult<TriggerEvent> {
        let message = SegmentMessage::parse(raw)?;

        match message.trigger() {
            TriggerEvent::Admit => {
                let view = AdmitPatient::from_message(&message)?;
                let new = translator::patient_from_admit(&view, Utc::now().date_naive());
                self.admit(new).await?;
            }
            TriggerEvent::Discharge => {
                let view = DischargePatient::from_message(&message)?;
                let id = translator::patient_id_from_discharge(&view)?;
                self.discharge(id)?;
            }
            TriggerEvent::Other(code) => {
                return Err(ValidationError::UnknownTrigger(code.clone()).into());
            }
        }

        Ok(message.trigger().clone())
    }

    /// Admit a patient through admission control, relay it and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Admission`] at capacity, or a store error. A relay
    /// failure is logged only.
    pub async fn admit(&self, new: NewPatient) -> CoreResult<Patient> {
        let current = self.patients.count()?;
        self.admission.try_admit(current)?;

        let patient = self.patients.save(new)?;
        tracing::info!(
            patient_id = patient.id,
            count = current + 1,
            capacity = self.admission.capacity(),
            "patient admitted"
        );

        self.relay_patient(&patient).await;
        self.events.emit(Event::NewPatient {
            patient: patient.clone(),
        });
        Ok(patient)
    }

    async fn relay_patient(&self, patient: &Patient) {
        let resource = Resource::Patient(translator::patient_to_resource(patient));
        let url = format!("{}{}", self.cfg.practitioner_url(), PATIENT_PATH);
        self.relay.forward_best_effort(&resource, &url).await;
    }

    /// Remove a patient and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PatientNotFound`] if no patient has this id; the
    /// store is left unchanged.
    pub fn discharge(&self, id: PatientId) -> CoreResult<()> {
        if !self.patients.delete_by_id(id)? {
            return Err(ValidationError::PatientNotFound(id).into());
        }
        tracing::info!(patient_id = id, "patient discharged");

        self.events.emit(Event::DeletePatient { id });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    /// Handle one inbound resource.
    ///
    /// Patients are stored directly, without admission control. Both patients and
    /// encounters are relayed to the practitioner after they are stored; a relay
    /// failure is logged and does not affect the result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError`] if the body does not decode, the resource type is
    /// not Patient or Encounter, or the encounter subject does not resolve.
    pub async fn handle_resource(&self, body: &str) -> CoreResult<ResourceOutcome> {
        match Resource::parse(body)? {
            Resource::Patient(resource) => {
                let new = translator::patient_from_resource(&resource, Utc::now().date_naive());
                let patient = self.patients.save(new)?;
                tracing::info!(patient_id = patient.id, "patient stored from resource");

                self.relay_patient(&patient).await;
                let id = patient.id;
                self.events.emit(Event::NewPatient { patient });
                Ok(ResourceOutcome::Patient(id))
            }
            Resource::Encounter(resource) => {
                let visit = self.record_encounter(&resource)?;
                let relayed = Resource::Encounter(translator::visit_to_encounter(&visit));
                let url = format!("{}{}", self.cfg.practitioner_url(), ENCOUNTER_PATH);
                self.relay.forward_best_effort(&relayed, &url).await;
                Ok(ResourceOutcome::Visit(visit.id))
            }
            other => {
                Err(ValidationError::UnsupportedResource(other.resource_type().to_string()).into())
            }
        }
    }

    /// Translate and store an encounter, then announce the visit.
    ///
    /// An encounter whose `id` names a stored visit of the same patient updates that
    /// visit's status (last write wins); every other field of the visit is kept.
    /// Any other encounter creates a new visit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPatient`] if the subject is not a stored
    /// patient; no visit is created.
    pub fn record_encounter(&self, resource: &EncounterResource) -> CoreResult<Visit> {
        let new = translator::visit_from_encounter(resource, Utc::now())?;
        if self.patients.find_by_id(new.patient_id)?.is_none() {
            return Err(ValidationError::UnknownPatient(new.patient_id).into());
        }

        let updated = match self.existing_visit(resource, new.patient_id)? {
            Some(id) => self.visits.update_status(id, new.status)?,
            None => None,
        };

        let visit = match updated {
            Some(visit) => {
                tracing::info!(visit_id = visit.id, status = %visit.status, "visit status updated");
                visit
            }
            None => {
                let visit = self.visits.save(new)?;
                tracing::info!(
                    visit_id = visit.id,
                    patient_id = visit.patient_id,
                    doctor = %visit.doctor_name,
                    status = %visit.status,
                    "visit recorded"
                );
                visit
            }
        };

        self.events.emit(Event::NewVisit {
            visit: VisitPayload::Record(visit.clone()),
        });
        Ok(visit)
    }

    fn existing_visit(
        &self,
        resource: &EncounterResource,
        patient_id: PatientId,
    ) -> CoreResult<Option<VisitId>> {
        let Some(id) = resource.id.as_deref().and_then(|raw| raw.trim().parse().ok()) else {
            return Ok(None);
        };
        Ok(self
            .visits
            .find_by_id(id)?
            .filter(|visit| visit.patient_id == patient_id)
            .map(|visit| visit.id))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Every stored visit as an encounter bundle, for practitioner resync.
    ///
    /// # Errors
    ///
    /// Returns a store error if the visits cannot be read.
    pub fn encounter_bundle(&self) -> CoreResult<Bundle> {
        let entries = self
            .visits
            .find_all()?
            .iter()
            .map(|visit| Resource::Encounter(translator::visit_to_encounter(visit)))
            .collect();
        Ok(Bundle::new(entries))
    }

    /// # Errors
    ///
    /// Returns a store error if the visits cannot be read.
    pub fn visits_for_doctor(&self, doctor_name: &str) -> CoreResult<Vec<Visit>> {
        Ok(self.visits.find_by_doctor_name(doctor_name)?)
    }

    /// # Errors
    ///
    /// Returns a store error if the patients cannot be read.
    pub fn list_patients(&self) -> CoreResult<Vec<Patient>> {
        Ok(self.patients.find_all()?)
    }
}

impl std::fmt::Debug for RegistryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryService")
            .field("admission", &self.admission)
            .field("practitioner_url", &self.cfg.practitioner_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Topic;
    use crate::config::RetryPolicy;
    use crate::domain::VisitStatus;
    use crate::error::CoreError;
    use crate::store::{InMemoryPatientStore, InMemoryVisitStore};
    use axum::{http::StatusCode, routing::post, Router};
    use chrono::NaiveDate;
    use std::time::Duration;

    const ANNA_A01: &str = "MSH|^~\\&|ReceptionApp|Reception|||20240501090000||ADT^A01|1|P|2.3\r\
                            EVN|A01|20240501090000\r\
                            PID|1||||Ivanova^Anna||19900501";

    struct Fixture {
        registry: RegistryService,
        patients: Arc<InMemoryPatientStore>,
        visits: Arc<InMemoryVisitStore>,
    }

    fn fixture() -> Fixture {
        // Nothing listens on port 9 locally, so relays fail fast.
        fixture_for("http://127.0.0.1:9")
    }

    fn fixture_for(practitioner_url: &str) -> Fixture {
        let cfg = CoreConfig::default()
            .with_practitioner_url(practitioner_url)
            .expect("valid url");
        let relay =
            RelayForwarder::new(Duration::from_millis(500), RetryPolicy::none()).expect("client");
        let patients = Arc::new(InMemoryPatientStore::new());
        let visits = Arc::new(InMemoryVisitStore::new());
        let registry = RegistryService::new(
            Arc::new(cfg),
            patients.clone(),
            visits.clone(),
            relay,
            EventBroadcaster::new(),
        );
        Fixture {
            registry,
            patients,
            visits,
        }
    }

    fn seed(patients: &InMemoryPatientStore, n: usize) {
        for i in 0..n {
            patients
                .save(NewPatient {
                    first_name: format!("Seed{i}"),
                    last_name: "Patient".into(),
                    birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date"),
                })
                .expect("seed");
        }
    }

    fn discharge(id: &str) -> String {
        format!("MSH|^~\\&|ReceptionApp|Reception|||20240501||ADT^A23|2|P|2.3\rPID|1|{id}")
    }

    #[tokio::test]
    async fn test_admit_anna_announces_new_patient() {
        let f = fixture();
        seed(&f.patients, 4);
        let mut events = f.registry.events().subscribe(Topic::Patients);

        let reply = f.registry.handle_segment(ANNA_A01).await;

        assert_eq!(reply.render(), "ACK|A01 received");
        assert_eq!(f.patients.count().expect("count"), 5);

        let patient = match events.try_recv().expect("event published") {
            Event::NewPatient { patient } => patient,
            other => panic!("expected NewPatient, got {other:?}"),
        };
        assert_eq!(patient.id, 5);
        assert_eq!(patient.first_name, "Anna");
        assert_eq!(patient.last_name, "Ivanova");
        assert_eq!(
            patient.birth_date,
            NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date")
        );
    }

    #[tokio::test]
    async fn test_admission_is_acknowledged_when_practitioner_is_unreachable() {
        let f = fixture();
        let mut events = f.registry.events().subscribe(Topic::Patients);

        let reply = f.registry.handle_segment(ANNA_A01).await;

        assert_eq!(reply.render(), "ACK|A01 received");
        assert_eq!(f.patients.count().expect("count"), 1);
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_admitted_patient_is_relayed_as_resource() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let router = Router::new().route(
            PATIENT_PATH,
            post(move |body: String| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::OK
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        let f = fixture_for(&format!("http://{addr}"));
        let raw = ANNA_A01.replace("Ivanova^Anna", "Ivanova^Anna\\F\\Maria");
        assert!(f.registry.handle_segment(&raw).await.is_ack());

        let body = rx.recv().await.expect("relayed body");
        let resource = fhir::Patient::parse(&body).expect("patient resource");
        assert_eq!(resource.id.as_deref(), Some("1"));
        assert_eq!(resource.family.as_deref(), Some("Ivanova"));
        assert_eq!(resource.given, vec!["Anna|Maria".to_string()]);
        assert_eq!(resource.birth_date.as_deref(), Some("1990-05-01"));
    }

    #[tokio::test]
    async fn test_eleventh_admission_is_refused() {
        let f = fixture();
        seed(&f.patients, 10);

        let reply = f.registry.handle_segment(ANNA_A01).await;
        assert_eq!(reply.render(), "NACK|Too many patients");
        assert_eq!(f.patients.count().expect("count"), 10);
    }

    #[tokio::test]
    async fn test_tenth_admission_is_accepted() {
        let f = fixture();
        seed(&f.patients, 9);

        assert!(f.registry.handle_segment(ANNA_A01).await.is_ack());
        assert_eq!(f.patients.count().expect("count"), 10);
    }

    #[tokio::test]
    async fn test_missing_trigger_is_a_parse_error_without_side_effects() {
        let f = fixture();
        let mut events = f.registry.events().subscribe(Topic::Patients);

        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT|1|P|2.3\rPID|1||||Ivanova^Anna";
        assert_eq!(f.registry.handle_segment(raw).await.render(), "NACK|ParseError");
        assert_eq!(f.patients.count().expect("count"), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_garbage_is_a_parse_error() {
        let f = fixture();
        assert_eq!(f.registry.handle_segment("HELLO").await.render(), "NACK|ParseError");
        assert_eq!(f.registry.handle_segment("").await.render(), "NACK|ParseError");
    }

    #[tokio::test]
    async fn test_unknown_trigger_is_flagged() {
        let f = fixture();
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A08|1|P|2.3\rPID|1|5";
        assert_eq!(
            f.registry.handle_segment(raw).await.render(),
            "NACK|Unknown trigger event"
        );
    }

    #[tokio::test]
    async fn test_discharge_removes_and_announces() {
        let f = fixture();
        seed(&f.patients, 2);
        let mut events = f.registry.events().subscribe(Topic::Patients);

        assert_eq!(
            f.registry.handle_segment(&discharge("2")).await.render(),
            "ACK|A23 received"
        );
        assert_eq!(f.patients.count().expect("count"), 1);
        assert_eq!(
            events.try_recv().expect("event"),
            Event::DeletePatient { id: 2 }
        );
    }

    #[tokio::test]
    async fn test_discharge_of_unknown_id_leaves_store_unchanged() {
        let f = fixture();
        seed(&f.patients, 3);
        let before = f.patients.find_all().expect("all");

        assert_eq!(
            f.registry.handle_segment(&discharge("42")).await.render(),
            "NACK|Patient not found"
        );
        assert_eq!(f.patients.find_all().expect("all"), before);
    }

    #[tokio::test]
    async fn test_discharge_with_non_numeric_id() {
        let f = fixture();
        assert_eq!(
            f.registry.handle_segment(&discharge("abc")).await.render(),
            "NACK|Invalid patient ID"
        );
    }

    #[tokio::test]
    async fn test_encounter_for_unknown_patient_creates_no_visit() {
        let f = fixture();
        let body = r#"{"resourceType":"Encounter","subject":{"reference":"Patient/7"}}"#;

        let err = f.registry.handle_resource(body).await.expect_err("unknown patient");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::UnknownPatient(7))
        ));
        assert_eq!(f.visits.count().expect("count"), 0);
    }

    #[tokio::test]
    async fn test_encounter_is_recorded_even_when_relay_fails() {
        let f = fixture();
        seed(&f.patients, 1);
        let mut events = f.registry.events().subscribe(Topic::Visits);

        let body = r#"{
            "resourceType": "Encounter",
            "status": "in-progress",
            "subject": {"reference": "Patient/1"},
            "participant": [{"individual": {"display": "Dr. House"}}],
            "period": {"start": "2024-05-01T10:00:00Z"},
            "reasonCode": [{"text": "Cough"}]
        }"#;
        let outcome = f.registry.handle_resource(body).await.expect("recorded");
        assert_eq!(outcome, ResourceOutcome::Visit(1));

        let visits = f.registry.visits_for_doctor("DR. HOUSE").expect("query");
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].status, VisitStatus::InProgress);
        assert_eq!(visits[0].reason, "Cough");
        assert!(matches!(
            events.try_recv(),
            Ok(Event::NewVisit {
                visit: VisitPayload::Record(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_patient_resource_is_stored_without_capacity_check() {
        let f = fixture();
        seed(&f.patients, 10);

        let body = r#"{"resourceType":"Patient","name":[{"family":"Doe","given":["Jane"]}],"birthDate":"1985-02-03"}"#;
        let outcome = f.registry.handle_resource(body).await.expect("stored");
        assert_eq!(outcome, ResourceOutcome::Patient(11));
    }

    #[tokio::test]
    async fn test_other_resources_are_rejected() {
        let f = fixture();
        let err = f
            .registry
            .handle_resource(r#"{"resourceType":"Observation"}"#)
            .await
            .expect_err("unsupported");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::UnsupportedResource(t)) if t == "Observation"
        ));

        let err = f
            .registry
            .handle_resource(r#"{"status":"planned"}"#)
            .await
            .expect_err("missing resourceType");
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn test_encounter_with_known_id_updates_status() {
        let f = fixture();
        seed(&f.patients, 2);
        let first = f
            .registry
            .record_encounter(&EncounterResource {
                subject: Some("Patient/1".into()),
                participant_display: Some("Dr. House".into()),
                reason_text: Some("Cough".into()),
                status: Some("planned".into()),
                ..Default::default()
            })
            .expect("record");

        let updated = f
            .registry
            .record_encounter(&EncounterResource {
                id: Some(first.id.to_string()),
                subject: Some("Patient/1".into()),
                participant_display: Some("Dr. Wilson".into()),
                status: Some("finished".into()),
                ..Default::default()
            })
            .expect("update");

        assert_eq!(updated.id, first.id);
        assert_eq!(updated.status, VisitStatus::Finished);
        assert_eq!(updated.doctor_name, "Dr. House");
        assert_eq!(updated.reason, "Cough");
        assert_eq!(f.visits.count().expect("count"), 1);

        // Unknown ids and ids of another patient's visit create new visits.
        for (id, patient) in [("42", 1), ("1", 2)] {
            let visit = f
                .registry
                .record_encounter(&EncounterResource {
                    id: Some(id.into()),
                    subject: Some(format!("Patient/{patient}")),
                    ..Default::default()
                })
                .expect("record");
            assert_ne!(visit.id, first.id);
        }
        assert_eq!(f.visits.count().expect("count"), 3);
        assert_eq!(
            f.visits.find_by_id(first.id).expect("find").map(|v| v.status),
            Some(VisitStatus::Finished)
        );
    }

    #[test]
    fn test_encounter_bundle_lists_every_visit() {
        let f = fixture();
        seed(&f.patients, 2);
        for (patient, doctor) in [(1, "Dr. A"), (2, "Dr. B")] {
            f.registry
                .record_encounter(&EncounterResource {
                    subject: Some(format!("Patient/{patient}")),
                    participant_display: Some(doctor.into()),
                    ..Default::default()
                })
                .expect("record");
        }

        let bundle = f.registry.encounter_bundle().expect("bundle");
        let subjects: Vec<_> = bundle
            .encounters()
            .filter_map(|e| e.subject.clone())
            .collect();
        assert_eq!(subjects, vec!["Patient/1", "Patient/2"]);
    }
}
