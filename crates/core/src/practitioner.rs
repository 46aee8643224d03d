//! Practitioner endpoint hop.
//!
//! Serves the read cache. The cache is filled by a full bundle pull from the
//! registry at startup (and on demand), then extended by each relayed encounter.
//! Relayed patients are announced but not cached.

use crate::broadcast::{Event, EventBroadcaster, VisitPayload};
use crate::cache::{CacheState, ReadCache};
use crate::config::CoreConfig;
use crate::constants::ENCOUNTER_PATH;
use crate::domain::{CacheEntry, Patient};
use crate::error::{CoreResult, ValidationError};
use crate::relay::{RelayError, RelayForwarder};
use crate::translator;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct PractitionerService {
    cfg: Arc<CoreConfig>,
    cache: Arc<ReadCache>,
    relay: RelayForwarder,
    events: EventBroadcaster,
}

impl PractitionerService {
    pub fn new(cfg: Arc<CoreConfig>, relay: RelayForwarder, events: EventBroadcaster) -> Self {
        Self {
            cfg,
            cache: Arc::new(ReadCache::new()),
            relay,
            events,
        }
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Pull every encounter from the registry and replace the cache.
    ///
    /// Returns the number of entries now cached.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the registry cannot be reached or the reply is not a
    /// bundle. The cache is left as it was.
    pub async fn sync(&self) -> Result<usize, RelayError> {
        let url = format!("{}{}", self.cfg.registry_url(), ENCOUNTER_PATH);
        let bundle = self.relay.fetch_bundle(&url).await?;

        let entries: Vec<CacheEntry> = bundle
            .encounters()
            .map(translator::cache_entry_from_encounter)
            .collect();
        let skipped = bundle.entries.len() - entries.len();
        let count = entries.len();

        self.cache.replace_all(entries);
        tracing::info!(url = %url, count, skipped, "visit cache synced");
        Ok(count)
    }

    /// Startup sync. A failure is logged and the cache stays uninitialized.
    pub async fn sync_on_startup(&self) {
        if let Err(err) = self.sync().await {
            tracing::error!(error = %err, "initial visit sync failed; cache left uninitialized");
        }
    }

    /// Append a relayed encounter to the cache and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Decode`] if the body is not an encounter.
    pub fn receive_encounter(&self, body: &str) -> CoreResult<CacheEntry> {
        let encounter = fhir::Encounter::parse(body)?;
        let entry = translator::cache_entry_from_encounter(&encounter);

        self.cache.append(entry.clone());
        tracing::info!(
            patient = %entry.patient_ref,
            doctor = %entry.doctor_name,
            date = %entry.visit_date,
            "visit received"
        );

        self.events.emit(Event::NewVisit {
            visit: VisitPayload::Entry(entry.clone()),
        });
        Ok(entry)
    }

    /// Accept a patient relayed by the registry and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Decode`] if the body is not a patient, or a
    /// validation error if it carries no numeric registry id.
    pub fn receive_patient(&self, body: &str) -> CoreResult<Patient> {
        let resource = fhir::Patient::parse(body)?;
        let id = resource
            .id
            .as_deref()
            .ok_or(ValidationError::MissingField("id"))
            .and_then(translator::parse_patient_id)?;
        let patient =
            translator::patient_from_resource(&resource, Utc::now().date_naive()).with_id(id);

        tracing::info!(patient_id = patient.id, "patient received");
        self.events.emit(Event::NewPatient {
            patient: patient.clone(),
        });
        Ok(patient)
    }

    /// Snapshot of cached visits, optionally for one doctor.
    pub fn visits(&self, doctor_name: Option<&str>) -> Vec<CacheEntry> {
        self.cache.snapshot(doctor_name)
    }
}

impl std::fmt::Debug for PractitionerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PractitionerService")
            .field("registry_url", &self.cfg.registry_url())
            .field("cache", &self.cache.state())
            .finish()
    }
}
