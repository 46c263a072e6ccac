//! Subscription Bookkeeping
//!
//! Pure listener accounting for one channel category: which listeners are
//! attached to which channel key.
//!
//! # Design
//!
//! The book tracks:
//! - the listener set per normalized [`ChannelKey`]
//! - when a key gains its first listener (a table must be created)
//! - when a key loses its last listener (the table must be deleted)
//!
//! A key exists in the book if and only if its listener set is non-empty,
//! so many listeners on one key share a single upstream table. The book
//! does no locking and no I/O; the owning registry wraps it in a lock and
//! acts on the returned [`SubscriptionChange`] outside that lock.

use std::collections::{BTreeMap, HashMap};

use crate::domain::streaming::ChannelKey;

// =============================================================================
// Types
// =============================================================================

/// Opaque listener identifier, unique within a registry.
pub type ListenerId = u64;

/// Effect of a book mutation on the upstream table for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// First listener on the key; the table must be created.
    Created,
    /// Listener added to or removed from a key that stays live.
    Unchanged,
    /// Last listener left; the table must be deleted.
    Removed,
    /// Listener was not registered on the key; nothing happened.
    NotFound,
}

impl SubscriptionChange {
    /// True if the upstream table must be created or deleted.
    #[must_use]
    pub const fn needs_upstream(self) -> bool {
        matches!(self, Self::Created | Self::Removed)
    }
}

// =============================================================================
// Listener Book
// =============================================================================

/// Listener sets keyed by channel key.
///
/// Listeners are kept in registration order; [`ListenerBook::snapshot`]
/// returns them in that order.
///
/// # Example
///
/// ```rust
/// use cityindex_stream::domain::streaming::ChannelKey;
/// use cityindex_stream::domain::subscription::{ListenerBook, SubscriptionChange};
///
/// let mut book = ListenerBook::new();
/// let key = ChannelKey::new("PRICE.154297");
///
/// // First listener creates the table
/// assert_eq!(book.add(&key, 1, "a"), SubscriptionChange::Created);
///
/// // Second listener shares it
/// assert_eq!(book.add(&key, 2, "b"), SubscriptionChange::Unchanged);
///
/// // Removing one keeps the table
/// assert_eq!(book.remove(&key, 1), SubscriptionChange::Unchanged);
///
/// // Removing the last deletes it
/// assert_eq!(book.remove(&key, 2), SubscriptionChange::Removed);
/// assert!(book.is_empty());
/// ```
#[derive(Debug)]
pub struct ListenerBook<L> {
    entries: HashMap<ChannelKey, BTreeMap<ListenerId, L>>,
    listener_total: usize,
}

impl<L> Default for ListenerBook<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> ListenerBook<L> {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            listener_total: 0,
        }
    }

    /// Attach a listener to a key.
    ///
    /// Adding an id already registered on the key replaces the listener
    /// without changing the count.
    pub fn add(&mut self, key: &ChannelKey, id: ListenerId, listener: L) -> SubscriptionChange {
        let created = !self.entries.contains_key(key);
        let listeners = self.entries.entry(key.clone()).or_default();

        if listeners.insert(id, listener).is_none() {
            self.listener_total += 1;
        }

        if created {
            SubscriptionChange::Created
        } else {
            SubscriptionChange::Unchanged
        }
    }

    /// Detach a listener from a key.
    ///
    /// Unknown keys and unknown ids are a no-op returning
    /// [`SubscriptionChange::NotFound`].
    pub fn remove(&mut self, key: &ChannelKey, id: ListenerId) -> SubscriptionChange {
        let Some(listeners) = self.entries.get_mut(key) else {
            return SubscriptionChange::NotFound;
        };

        if listeners.remove(&id).is_none() {
            return SubscriptionChange::NotFound;
        }
        self.listener_total -= 1;

        if listeners.is_empty() {
            self.entries.remove(key);
            SubscriptionChange::Removed
        } else {
            SubscriptionChange::Unchanged
        }
    }

    /// True if the key has at least one listener.
    #[must_use]
    pub fn contains_key(&self, key: &ChannelKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of listeners on a key.
    #[must_use]
    pub fn listener_count(&self, key: &ChannelKey) -> usize {
        self.entries.get(key).map_or(0, BTreeMap::len)
    }

    /// All keys with live listeners.
    #[must_use]
    pub fn keys(&self) -> Vec<ChannelKey> {
        let mut keys: Vec<_> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            channel_count: self.entries.len(),
            listener_count: self.listener_total,
        }
    }

    /// True if no key has listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Clone> ListenerBook<L> {
    /// Copy of the listeners on a key, in registration order.
    #[must_use]
    pub fn snapshot(&self, key: &ChannelKey) -> Vec<L> {
        self.entries
            .get(key)
            .map(|listeners| listeners.values().cloned().collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Keys with a live subscription.
    pub channel_count: usize,
    /// Listeners across all keys.
    pub listener_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
