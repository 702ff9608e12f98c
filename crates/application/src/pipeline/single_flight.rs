//! Single-flight execution: concurrent callers share one in-flight operation.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// At most one operation runs at a time; callers arriving while it runs
/// await it and receive a clone of its outcome.
///
/// The pending operation is an explicit shared handle, installed and
/// cleared under a lock that is never held across an await point.
#[derive(Debug)]
pub struct SingleFlight<T> {
    slot: Mutex<Option<Arc<OnceCell<T>>>>,
}

impl<T: Clone> SingleFlight<T> {
    /// Creates an idle single-flight group.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Runs `operation` unless a flight is already pending, in which case the
    /// pending flight's outcome is awaited instead.
    ///
    /// Once the flight resolves, the next call starts a fresh one.
    pub async fn run<F, Fut>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let flight = {
            let mut slot = self.slot.lock();
            Arc::clone(slot.get_or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let outcome = flight.get_or_init(operation).await.clone();

        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|pending| Arc::ptr_eq(pending, &flight))
        {
            *slot = None;
        }

        outcome
    }

    /// Returns true while a flight is pending.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
