//! Concurrency gate for render sessions
//!
//! Bounds how many renders run against the shared browser at once. Waiters
//! queue fairly on the semaphore; a permit is released when dropped.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Concurrency gate is closed")]
pub struct GateClosed;

/// Admission slot held for the duration of one render
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot; fails only after [`close`](Self::close)
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Reject current waiters and every later acquire
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
