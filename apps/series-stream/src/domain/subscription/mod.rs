//! Subscriber Registry
//!
//! Tracks the live set of connected observers. The registry is generic over
//! the handle type so the domain stays free of transport details; the
//! broadcaster instantiates it with shared subscriber sinks.
//!
//! # Design
//!
//! - `attach` issues a fresh, process-unique `SubscriberId`
//! - `detach` is idempotent
//! - `snapshot` copies the membership so delivery never iterates a live view
//!
//! Accept, broadcast and disconnect paths all touch the registry from
//! different tasks, so every operation goes through one `RwLock`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for an attached subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Raw numeric id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Subscriber Registry
// =============================================================================

/// Thread-safe set of attached subscribers.
///
/// # Example
///
/// ```rust
/// use series_stream::domain::subscription::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::new();
///
/// let first = registry.attach("first");
/// let second = registry.attach("second");
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot, vec![(first, "first"), (second, "second")]);
///
/// assert!(registry.detach(first));
/// assert!(!registry.detach(first));
/// assert_eq!(registry.len(), 1);
/// ```
pub struct SubscriberRegistry<H> {
    next_id: AtomicU64,
    subscribers: RwLock<BTreeMap<SubscriberId, H>>,
}

impl<H> Default for SubscriberRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SubscriberRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a subscriber. Never fails.
    pub fn attach(&self, handle: H) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().insert(id, handle);
        id
    }

    /// Remove a subscriber.
    ///
    /// Returns `true` if the subscriber was present.
    pub fn detach(&self, id: SubscriberId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Whether `id` is currently attached.
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether no subscribers are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl<H: Clone> SubscriberRegistry<H> {
    /// Point-in-time copy of the membership, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SubscriberId, H)> {
        self.subscribers
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }
}

impl<H> fmt::Debug for SubscriberRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn attach_issues_distinct_ids() {
        let registry = SubscriberRegistry::new();

        let a = registry.attach(1);
        let b = registry.attach(2);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn detach_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let id = registry.attach("x");

        assert!(registry.detach(id));
        assert!(!registry.detach(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn detach_unknown_id_is_noop() {
        let registry: SubscriberRegistry<&str> = SubscriberRegistry::new();
        let other = SubscriberRegistry::new();
        let foreign = other.attach("y");

        assert!(!registry.detach(foreign));
    }

    #[test]
    fn ids_are_not_reused_after_detach() {
        let registry = SubscriberRegistry::new();
        let first = registry.attach(());
        registry.detach(first);

        let second = registry.attach(());
        assert!(second > first);
    }

    #[test]
    fn snapshot_is_not_a_live_view() {
        let registry = SubscriberRegistry::new();
        let a = registry.attach("a");
        registry.attach("b");

        let snapshot = registry.snapshot();
        registry.detach(a);
        registry.attach("c");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], (a, "a"));
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(a));
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let registry = SubscriberRegistry::new();
        let ids: Vec<_> = (0..10).map(|i| registry.attach(i)).collect();

        let snapshot_ids: Vec<_> = registry.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(snapshot_ids, ids);
    }

    #[test]
    fn concurrent_attach_and_detach() {
        let registry = Arc::new(SubscriberRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..500 {
                        let id = registry.attach(t * 1_000 + i);
                        if i % 2 == 0 {
                            assert!(registry.detach(id));
                        } else {
                            kept.push(id);
                        }
                        let _ = registry.snapshot();
                    }
                    kept
                })
            })
            .collect();

        let kept: HashSet<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(kept.len(), 8 * 250);
        assert_eq!(registry.len(), kept.len());
        assert!(kept.iter().all(|id| registry.contains(*id)));
    }
}
