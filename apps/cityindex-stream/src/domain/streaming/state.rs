//! Connection state and the aggregated snapshot published to observers.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::AdapterSet;

/// Lifecycle state of one pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    /// Session establishment in progress.
    Connecting,
    /// Session established, tables live.
    Connected,
    /// Waiting for the backoff delay before a new session attempt.
    Reconnecting,
    /// Connection lost or failed to establish.
    Disconnected,
}

impl ConnectionState {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    /// Numeric value exported on the connection state gauge.
    #[must_use]
    pub const fn gauge_value(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Reconnecting => 2.0,
            Self::Connected => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of every known connection, keyed by adapter set.
///
/// Observers always receive the whole snapshot rather than the delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    states: BTreeMap<AdapterSet, ConnectionState>,
}

impl StateSnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition. Returns `false` if the state was unchanged.
    pub fn set(&mut self, adapter_set: AdapterSet, state: ConnectionState) -> bool {
        self.states.insert(adapter_set, state) != Some(state)
    }

    /// State of one adapter set, if a connection was ever requested for it.
    #[must_use]
    pub fn get(&self, adapter_set: AdapterSet) -> Option<ConnectionState> {
        self.states.get(&adapter_set).copied()
    }

    /// Iterate over `(adapter set, state)` pairs in adapter-set order.
    pub fn iter(&self) -> impl Iterator<Item = (AdapterSet, ConnectionState)> + '_ {
        self.states.iter().map(|(set, state)| (*set, *state))
    }

    /// True when every known connection is connected.
    #[must_use]
    pub fn all_connected(&self) -> bool {
        self.states
            .values()
            .all(|state| *state == ConnectionState::Connected)
    }

    /// Number of adapter sets tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no connection has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_changes_only() {
        let mut snapshot = StateSnapshot::new();
        assert!(snapshot.set(AdapterSet::Streaming, ConnectionState::Connecting));
        assert!(!snapshot.set(AdapterSet::Streaming, ConnectionState::Connecting));
        assert!(snapshot.set(AdapterSet::Streaming, ConnectionState::Connected));
        assert_eq!(
            snapshot.get(AdapterSet::Streaming),
            Some(ConnectionState::Connected)
        );
        assert_eq!(snapshot.get(AdapterSet::Account), None);
    }

    #[test]
    fn all_connected_requires_every_set() {
        let mut snapshot = StateSnapshot::new();
        snapshot.set(AdapterSet::Streaming, ConnectionState::Connected);
        snapshot.set(AdapterSet::Account, ConnectionState::Reconnecting);
        assert!(!snapshot.all_connected());

        snapshot.set(AdapterSet::Account, ConnectionState::Connected);
        assert!(snapshot.all_connected());
        assert_eq!(snapshot.len(), 2);
    }
}
