//! Store interfaces and the in-memory implementations.
//!
//! Hop services take stores as `Arc<dyn ...>` so the persistence technology stays
//! outside the core. The in-memory stores assign sequential ids starting at 1.
//!
//! `count` and `save` take the lock separately. Admission control reads the count
//! and then saves, so two concurrent admissions can both pass the capacity check.

use crate::domain::{NewPatient, NewVisit, Patient, PatientId, Visit, VisitId, VisitStatus};
use crate::error::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

pub trait PatientStore: Send + Sync {
    /// Persist a new patient and return it with its assigned id.
    fn save(&self, patient: NewPatient) -> StoreResult<Patient>;

    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<Patient>>;

    /// All patients, ordered by id.
    fn find_all(&self) -> StoreResult<Vec<Patient>>;

    fn count(&self) -> StoreResult<usize>;

    /// Remove a patient. Returns `false` if no patient had that id.
    fn delete_by_id(&self, id: PatientId) -> StoreResult<bool>;
}

pub trait VisitStore: Send + Sync {
    /// Persist a new visit and return it with its assigned id.
    fn save(&self, visit: NewVisit) -> StoreResult<Visit>;

    fn find_by_id(&self, id: VisitId) -> StoreResult<Option<Visit>>;

    /// All visits, ordered by id.
    fn find_all(&self) -> StoreResult<Vec<Visit>>;

    fn count(&self) -> StoreResult<usize>;

    /// Remove a visit. Returns `false` if no visit had that id.
    fn delete_by_id(&self, id: VisitId) -> StoreResult<bool>;

    /// Visits whose doctor name matches case-insensitively, ordered by id. The
    /// query is trimmed first.
    fn find_by_doctor_name(&self, doctor_name: &str) -> StoreResult<Vec<Visit>>;

    /// Overwrite the status of a stored visit. Returns `None` if no visit had that id.
    fn update_status(&self, id: VisitId, status: VisitStatus) -> StoreResult<Option<Visit>>;
}

/// Map keyed by a sequentially assigned id.
#[derive(Debug)]
struct Table<T> {
    rows: RwLock<BTreeMap<u64, T>>,
    next_id: AtomicU64,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert_with(&self, build: impl FnOnce(u64) -> T) -> StoreResult<T> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = build(id);
        rows.insert(id, row.clone());
        Ok(row)
    }

    fn get(&self, id: u64) -> StoreResult<Option<T>> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn update(&self, id: u64, change: impl FnOnce(&mut T)) -> StoreResult<Option<T>> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get_mut(&id).map(|row| {
            change(row);
            row.clone()
        }))
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> StoreResult<Vec<T>> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.values().filter(|row| keep(row)).cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.len())
    }

    fn remove(&self, id: u64) -> StoreResult<bool> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.remove(&id).is_some())
    }
}

#[derive(Debug)]
pub struct InMemoryPatientStore {
    table: Table<Patient>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }
}

impl Default for InMemoryPatientStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatientStore for InMemoryPatientStore {
    fn save(&self, patient: NewPatient) -> StoreResult<Patient> {
        self.table.insert_with(|id| patient.with_id(id))
    }

    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        self.table.get(id)
    }

    fn find_all(&self) -> StoreResult<Vec<Patient>> {
        self.table.filtered(|_| true)
    }

    fn count(&self) -> StoreResult<usize> {
        self.table.len()
    }

    fn delete_by_id(&self, id: PatientId) -> StoreResult<bool> {
        self.table.remove(id)
    }
}

#[derive(Debug)]
pub struct InMemoryVisitStore {
    table: Table<Visit>,
}

impl InMemoryVisitStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }
}

impl Default for InMemoryVisitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitStore for InMemoryVisitStore {
    fn save(&self, visit: NewVisit) -> StoreResult<Visit> {
        self.table.insert_with(|id| visit.with_id(id))
    }

    fn find_by_id(&self, id: VisitId) -> StoreResult<Option<Visit>> {
        self.table.get(id)
    }

    fn find_all(&self) -> StoreResult<Vec<Visit>> {
        self.table.filtered(|_| true)
    }

    fn count(&self) -> StoreResult<usize> {
        self.table.len()
    }

    fn delete_by_id(&self, id: VisitId) -> StoreResult<bool> {
        self.table.remove(id)
    }

    fn find_by_doctor_name(&self, doctor_name: &str) -> StoreResult<Vec<Visit>> {
        let wanted = doctor_name.trim().to_lowercase();
        self.table
            .filtered(|visit| visit.doctor_name.to_lowercase() == wanted)
    }

    fn update_status(&self, id: VisitId, status: VisitStatus) -> StoreResult<Option<Visit>> {
        self.table.update(id, |visit| visit.status = status)
    }
}
