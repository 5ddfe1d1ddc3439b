//! Subscription registry for live topics.
//!
//! Widgets register a callback per topic and keep the returned
//! [`Subscription`] to remove it again. Registrations are independent of the
//! connection: they survive reconnects and can be removed after the channel
//! has shut down.

use crate::envelope::Envelope;
use crate::topic::Topic;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// A listener callback.
pub type Listener = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Identifier of a listener registration.
pub type ListenerId = u64;

/// One registered listener.
pub(crate) struct Registration {
    pub(crate) id: ListenerId,
    active: AtomicBool,
    callback: Listener,
}

impl Registration {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn call(&self, envelope: &Envelope) {
        (self.callback)(envelope);
    }

    /// Returns `true` if this call deactivated the registration.
    fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

/// Per-topic listener registry.
pub struct SubscriptionRegistry {
    /// Listeners per topic, in registration order.
    topics: DashMap<Topic, Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register `callback` for `topic`.
    ///
    /// The listener stays registered until [`Subscription::unsubscribe`] is
    /// called or the registry is cleared. Dropping the handle alone does not
    /// remove it; use [`Subscription::into_guard`] for that.
    pub fn subscribe<F>(self: &Arc<Self>, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.subscribe_listener(topic, Arc::new(callback))
    }

    /// Register an already shared listener.
    pub fn subscribe_listener(self: &Arc<Self>, topic: Topic, callback: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Arc::new(Registration {
            id,
            active: AtomicBool::new(true),
            callback,
        });

        let count = {
            let mut listeners = self.topics.entry(topic).or_default();
            listeners.push(registration.clone());
            listeners.len()
        };

        debug!(topic = %topic, listener = id, listeners = count, "Listener subscribed");

        Subscription {
            id,
            topic,
            registration,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove a listener. Returns `true` if it was registered.
    fn remove(&self, topic: Topic, id: ListenerId) -> bool {
        let removed = match self.topics.get_mut(&topic) {
            Some(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|r| r.id != id);
                before != listeners.len()
            }
            None => false,
        };

        if removed {
            // Drop empty topic entries so stats stay meaningful.
            self.topics.remove_if(&topic, |_, listeners| listeners.is_empty());
            debug!(topic = %topic, listener = id, "Listener unsubscribed");
        }
        removed
    }

    /// Listeners of `topic` at this instant.
    ///
    /// The returned vector is detached from the registry, so callers may
    /// invoke listeners that subscribe or unsubscribe without deadlocking.
    pub(crate) fn snapshot(&self, topic: Topic) -> Vec<Arc<Registration>> {
        self.topics
            .get(&topic)
            .map(|listeners| listeners.clone())
            .unwrap_or_default()
    }

    /// Number of listeners registered for `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map(|l| l.len()).unwrap_or(0)
    }

    /// Drop every registration. Outstanding handles become inactive.
    pub fn clear(&self) {
        for entry in self.topics.iter() {
            for registration in entry.value() {
                registration.deactivate();
            }
        }
        self.topics.clear();
        trace!("Registry cleared");
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let per_topic: HashMap<Topic, usize> = self
            .topics
            .iter()
            .map(|e| (*e.key(), e.value().len()))
            .collect();
        RegistryStats {
            total_listeners: per_topic.values().sum(),
            per_topic,
        }
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Listener count per topic with at least one listener.
    pub per_topic: HashMap<Topic, usize>,
    /// Total number of listeners.
    pub total_listeners: usize,
}

/// Handle to one listener registration.
pub struct Subscription {
    id: ListenerId,
    topic: Topic,
    registration: Arc<Registration>,
    registry: Weak<SubscriptionRegistry>,
}

impl Subscription {
    /// Get the listener id.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Get the topic.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Whether the listener still receives envelopes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }

    /// Remove the listener.
    ///
    /// Takes effect immediately, including for a dispatch pass that is in
    /// progress. Safe to call repeatedly and after the registry is gone.
    /// Returns `true` only for the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.registration.deactivate() {
            return false;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.topic, self.id);
        }
        true
    }

    /// Convert into a guard that unsubscribes when dropped.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Unsubscribes its listener on drop.
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
    /// Get the underlying subscription.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Envelope) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move |_: &Envelope| {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        let (_, cb) = counter();

        let sub = registry.subscribe(Topic::Activity, cb);
        assert_eq!(registry.listener_count(Topic::Activity), 1);
        assert!(sub.is_active());

        assert!(sub.unsubscribe());
        assert_eq!(registry.listener_count(Topic::Activity), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let (_, a) = counter();
        let (_, b) = counter();

        let first = registry.subscribe(Topic::Notification, a);
        let _second = registry.subscribe(Topic::Notification, b);

        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        // The other listener is untouched by the repeated call.
        assert_eq!(registry.listener_count(Topic::Notification), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = SubscriptionRegistry::new();
        let (_, cb) = counter();
        let sub = registry.subscribe(Topic::Stats, cb);
        drop(registry);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_guard_unsubscribes_on_drop() {
        let registry = SubscriptionRegistry::new();
        let (_, cb) = counter();

        let guard = registry.subscribe(Topic::Activity, cb).into_guard();
        assert_eq!(guard.subscription().topic(), Topic::Activity);
        assert_eq!(registry.listener_count(Topic::Activity), 1);
        drop(guard);
        assert_eq!(registry.listener_count(Topic::Activity), 0);
    }

    #[test]
    fn test_dropping_plain_handle_keeps_listener() {
        let registry = SubscriptionRegistry::new();
        let (_, cb) = counter();
        drop(registry.subscribe(Topic::Activity, cb));
        assert_eq!(registry.listener_count(Topic::Activity), 1);
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let registry = SubscriptionRegistry::new();
        let ids: Vec<ListenerId> = (0..3)
            .map(|_| registry.subscribe(Topic::Activity, |_: &Envelope| {}).id())
            .collect();

        let snapshot: Vec<ListenerId> = registry
            .snapshot(Topic::Activity)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(snapshot, ids);
    }

    #[test]
    fn test_clear_deactivates_handles() {
        let registry = SubscriptionRegistry::new();
        let (hits, cb) = counter();
        let sub = registry.subscribe(Topic::Activity, cb);
        let held = registry.snapshot(Topic::Activity);

        registry.clear();

        assert!(!sub.is_active());
        assert!(!held[0].is_active());
        assert_eq!(registry.stats().total_listeners, 0);
        assert!(!sub.unsubscribe());

        // A detached snapshot still refuses to deliver to cleared listeners.
        let env = Envelope::new(Topic::Activity, "new_activity", Value::Null);
        if held[0].is_active() {
            held[0].call(&env);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stats() {
        let registry = SubscriptionRegistry::new();
        let _a = registry.subscribe(Topic::Activity, |_: &Envelope| {});
        let _b = registry.subscribe(Topic::Activity, |_: &Envelope| {});
        let _c = registry.subscribe(Topic::Stats, |_: &Envelope| {});

        let stats = registry.stats();
        assert_eq!(stats.total_listeners, 3);
        assert_eq!(stats.per_topic.get(&Topic::Activity), Some(&2));
        assert_eq!(stats.per_topic.get(&Topic::Notification), None);
    }
}
