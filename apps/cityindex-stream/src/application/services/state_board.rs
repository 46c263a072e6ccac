//! Aggregated connection state and its observers.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::errors::panic_message;
use crate::domain::streaming::{AdapterSet, ConnectionState, StateSnapshot};
use crate::infrastructure::metrics;

/// Callback receiving the full snapshot after every transition.
pub type StateObserver = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

/// Handle returned by [`StateBoard::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

/// Current state of every connection plus the observers to notify.
#[derive(Default)]
pub struct StateBoard {
    snapshot: Mutex<StateSnapshot>,
    observers: Mutex<BTreeMap<u64, StateObserver>>,
    next_id: AtomicU64,
}

impl StateBoard {
    /// Empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: StateObserver) -> ObserverToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().insert(id, observer);
        ObserverToken(id)
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, token: ObserverToken) -> bool {
        self.observers.lock().remove(&token.0).is_some()
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot.lock().clone()
    }

    /// Record a transition and notify every observer with the full
    /// snapshot. Repeating the current state is not a transition.
    ///
    /// Returns `true` if observers were notified.
    pub fn publish(&self, adapter_set: AdapterSet, state: ConnectionState) -> bool {
        let snapshot = {
            let mut current = self.snapshot.lock();
            if !current.set(adapter_set, state) {
                return false;
            }
            current.clone()
        };

        tracing::info!(adapter_set = %adapter_set, state = %state, "Connection state changed");
        metrics::set_connection_state(adapter_set, state);

        let observers: Vec<_> = self.observers.lock().values().cloned().collect();
        for observer in observers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(&snapshot))) {
                tracing::error!(
                    adapter_set = %adapter_set,
                    panic = %panic_message(&*payload),
                    "State observer panicked"
                );
            }
        }
        true
    }
}

impl std::fmt::Debug for StateBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBoard")
            .field("snapshot", &*self.snapshot.lock())
            .field("observers", &self.observers.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_observer(_: &StateSnapshot) {
        panic!("observer failure");
    }

    #[test]
    fn observers_receive_full_snapshot() {
        let board = StateBoard::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        board.subscribe(Arc::new(move |snapshot: &StateSnapshot| {
            sink.lock().push(snapshot.clone());
        }));

        board.publish(AdapterSet::Streaming, ConnectionState::Connected);
        board.publish(AdapterSet::Account, ConnectionState::Connecting);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 2);
        assert_eq!(
            seen[1].get(AdapterSet::Streaming),
            Some(ConnectionState::Connected)
        );
    }

    #[test]
    fn repeated_state_is_not_published() {
        let board = StateBoard::new();
        assert!(board.publish(AdapterSet::Trading, ConnectionState::Connecting));
        assert!(!board.publish(AdapterSet::Trading, ConnectionState::Connecting));
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let board = StateBoard::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);

        board.subscribe(Arc::new(failing_observer));
        board.subscribe(Arc::new(move |_: &StateSnapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        board.publish(AdapterSet::Streaming, ConnectionState::Connecting);
        board.publish(AdapterSet::Streaming, ConnectionState::Connected);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribed_observer_is_not_called() {
        let board = StateBoard::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);

        let token = board.subscribe(Arc::new(move |_: &StateSnapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(board.unsubscribe(token));
        assert!(!board.unsubscribe(token));

        board.publish(AdapterSet::Streaming, ConnectionState::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
