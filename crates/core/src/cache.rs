//! Practitioner-side read cache of flattened visits.
//!
//! The entry list sits behind an `Arc` and is copied on write. A snapshot clones the
//! `Arc` under a short read lock and filters outside it, so a reader never observes
//! a half-applied `replace_all` and never holds up the next `append`.
//!
//! Entries are never removed individually. The list only shrinks through
//! `replace_all`.

use crate::domain::CacheEntry;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// No full sync has completed yet.
    Uninitialized,
    /// At least one full sync has completed.
    Synced,
}

#[derive(Debug)]
struct CacheInner {
    state: CacheState,
    entries: Arc<Vec<CacheEntry>>,
}

#[derive(Debug)]
pub struct ReadCache {
    inner: RwLock<CacheInner>,
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                state: CacheState::Uninitialized,
                entries: Arc::new(Vec::new()),
            }),
        }
    }

    /// Replace every entry and mark the cache synced.
    pub fn replace_all(&self, entries: Vec<CacheEntry>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries = Arc::new(entries);
        inner.state = CacheState::Synced;
    }

    pub fn append(&self, entry: CacheEntry) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut inner.entries).push(entry);
    }

    /// Point-in-time copy of the entries, in insertion order.
    ///
    /// With a doctor name, only entries whose doctor matches case-insensitively are
    /// returned.
    pub fn snapshot(&self, doctor_name: Option<&str>) -> Vec<CacheEntry> {
        let entries = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&inner.entries)
        };

        match doctor_name {
            Some(name) => {
                let wanted = name.trim().to_lowercase();
                entries
                    .iter()
                    .filter(|entry| entry.doctor_name.to_lowercase() == wanted)
                    .cloned()
                    .collect()
            }
            None => entries.as_ref().clone(),
        }
    }

    pub fn state(&self) -> CacheState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(doctor: &str, patient: &str) -> CacheEntry {
        CacheEntry {
            patient_ref: patient.into(),
            doctor_name: doctor.into(),
            visit_date: "2024-05-01".into(),
            status: "planned".into(),
            reason: "Checkup".into(),
        }
    }

    #[test]
    fn test_starts_uninitialized_and_empty() {
        let cache = ReadCache::new();
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace_then_append_yields_only_the_appended_entry() {
        let cache = ReadCache::new();
        cache.replace_all(vec![entry("Dr. A", "Patient/1"), entry("Dr. B", "Patient/2")]);
        cache.append(entry("Dr. C", "Patient/3"));

        let x = entry("Dr. X", "Patient/9");
        cache.replace_all(Vec::new());
        cache.append(x.clone());

        assert_eq!(cache.snapshot(None), vec![x]);
        assert_eq!(cache.state(), CacheState::Synced);
    }

    #[test]
    fn test_snapshot_is_not_a_live_view() {
        let cache = ReadCache::new();
        cache.append(entry("Dr. A", "Patient/1"));

        let before = cache.snapshot(None);
        cache.append(entry("Dr. A", "Patient/2"));

        assert_eq!(before.len(), 1);
        assert_eq!(cache.snapshot(None).len(), 2);
    }

    #[test]
    fn test_snapshot_filters_doctor_case_insensitively() {
        let cache = ReadCache::new();
        cache.replace_all(vec![
            entry("Dr. House", "Patient/1"),
            entry("Dr. Wilson", "Patient/2"),
            entry("dr. house", "Patient/3"),
        ]);

        let refs: Vec<_> = cache
            .snapshot(Some("DR. HOUSE"))
            .into_iter()
            .map(|e| e.patient_ref)
            .collect();
        assert_eq!(refs, vec!["Patient/1", "Patient/3"]);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let cache = Arc::new(ReadCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.append(entry("Dr. A", &format!("Patient/{t}{i}")));
                        let _ = cache.snapshot(Some("Dr. A"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(cache.len(), 400);
    }
}
