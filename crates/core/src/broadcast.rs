//! Change notifications fanned out to subscribers.
//!
//! One tokio broadcast channel per topic. Publishing never waits: with no
//! subscribers the event is dropped, and a subscriber that falls behind the buffer
//! loses the oldest events. Late subscribers get no replay and are expected to pull
//! a full snapshot when they connect.

use crate::domain::{CacheEntry, Patient, PatientId, Visit};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events buffered per topic for slow receivers.
const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Patients,
    Visits,
}

impl Topic {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "patients" => Some(Topic::Patients),
            "visits" => Some(Topic::Visits),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Patients => "patients",
            Topic::Visits => "visits",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast payload, serialised as `{"event": "NEW_PATIENT", "patient": {...}}` etc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    NewPatient { patient: Patient },
    DeletePatient { id: PatientId },
    NewVisit { visit: VisitPayload },
}

/// The registry announces stored visits; the practitioner announces cache entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VisitPayload {
    Record(Visit),
    Entry(CacheEntry),
}

impl Event {
    /// Topic this event belongs on.
    pub fn topic(&self) -> Topic {
        match self {
            Event::NewPatient { .. } | Event::DeletePatient { .. } => Topic::Patients,
            Event::NewVisit { .. } => Topic::Visits,
        }
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    patients: broadcast::Sender<Event>,
    visits: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (patients, _) = broadcast::channel(capacity);
        let (visits, _) = broadcast::channel(capacity);
        Self { patients, visits }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Patients => &self.patients,
            Topic::Visits => &self.visits,
        }
    }

    /// Send `event` to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers reached, 0 when nobody is listening.
    pub fn publish(&self, topic: Topic, event: Event) -> usize {
        let reached = self.sender(topic).send(event).unwrap_or_default();
        tracing::debug!(topic = %topic, reached, "event published");
        reached
    }

    /// Publish on the event's own topic.
    pub fn emit(&self, event: Event) -> usize {
        self.publish(event.topic(), event)
    }

    /// Receive events published on `topic` from now on.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("patients", &self.subscriber_count(Topic::Patients))
            .field("visits", &self.subscriber_count(Topic::Visits))
            .finish()
    }
}
