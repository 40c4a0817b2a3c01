use crate::error::{IntakeError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds how many payment simulations run at once.
///
/// One gate is built per process and cloned into every submission path, so
/// the synchronous path and the queue consumer draw from the same slots.
/// Acquiring a saturated gate waits without a timeout.
#[derive(Debug, Clone)]
pub struct CapacityGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot of a [`CapacityGate`]. Dropping it frees the slot, including
/// when the holder unwinds from a panic.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl CapacityGate {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(IntakeError::validation(
                "capacity gate needs at least one slot",
            ));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub async fn acquire(&self) -> GatePermit {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("capacity gate semaphore is never closed");
        GatePermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
