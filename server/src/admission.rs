//! Admission control: a capacity-bounded gate on concurrent sessions.
//!
//! Every accepted connection holds one slot for the lifetime of its session.
//! Slots are owned semaphore permits, so a slot is released exactly once no
//! matter how its session ends, and a failed acquire holds nothing.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, TryAcquireError};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("server is at capacity")]
    CapacityExceeded,
    #[error("admission gate is closed")]
    Closed,
}

/// One admitted session's slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Bounds the number of concurrently admitted sessions.
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> AdmissionController {
        AdmissionController {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a slot until `wait` elapses.
    ///
    /// A deadline of zero degenerates to [`try_acquire`](Self::try_acquire).
    pub async fn acquire(&self, wait: Duration) -> Result<AdmissionSlot, AdmissionError> {
        match tokio::time::timeout(wait, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(AdmissionSlot { _permit: permit }),
            Ok(Err(_)) => Err(AdmissionError::Closed),
            Err(_) => Err(AdmissionError::CapacityExceeded),
        }
    }

    /// Takes a slot immediately or reports the gate full.
    pub fn try_acquire(&self) -> Result<AdmissionSlot, AdmissionError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionSlot { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(AdmissionError::CapacityExceeded),
            Err(TryAcquireError::Closed) => Err(AdmissionError::Closed),
        }
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured slot count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
