//! Shared sample storage for concurrent probe workers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::Sample;

/// Thread-safe, append-only sample collector.
///
/// Cloning yields another handle to the same storage. Workers only append;
/// the owning scheduler reads after every worker has been joined.
#[derive(Clone, Default)]
pub struct SampleCollector {
    samples: Arc<Mutex<Vec<Sample>>>,
}

impl SampleCollector {
    /// Create a collector pre-sized for `expected` samples.
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::with_capacity(expected))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        // Pushed samples are never mutated, so a poisoned vector is still consistent.
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// Copy of everything collected so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().clone()
    }

    /// Take the collected samples, leaving the collector empty.
    pub fn drain(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.lock())
    }
}
