//! Patient-count ceiling checked before each admission.
//!
//! The check runs against a count the caller has just read from the store. The
//! subsequent insert is a separate step, so concurrent admissions can overshoot the
//! ceiling; the limit is best effort.

use crate::constants::DEFAULT_PATIENT_CAPACITY;
use crate::error::AdmissionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionControl {
    capacity: usize,
}

impl AdmissionControl {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allow one more patient if `current_count` is below capacity.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::CapacityExceeded`] once `current_count` reaches capacity.
    pub fn try_admit(&self, current_count: usize) -> Result<(), AdmissionError> {
        if current_count >= self.capacity {
            return Err(AdmissionError::CapacityExceeded {
                capacity: self.capacity,
                current: current_count,
            });
        }
        Ok(())
    }
}

impl Default for AdmissionControl {
    fn default() -> Self {
        Self::new(DEFAULT_PATIENT_CAPACITY)
    }
}
