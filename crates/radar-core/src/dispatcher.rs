//! Topic dispatcher.
//!
//! Translates named server pushes into [`Envelope`]s and invokes every
//! listener registered for the envelope's topic.

use crate::envelope::Envelope;
use crate::registry::SubscriptionRegistry;
use crate::topic::Topic;
use radar_protocol::{events, Frame};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Result of dispatching one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Topic the envelope went to.
    pub topic: Topic,
    /// Listeners that returned normally.
    pub delivered: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherStats {
    /// Envelopes dispatched.
    pub envelopes: u64,
    /// Listener invocations that panicked.
    pub listener_failures: u64,
}

/// Fans inbound events out to registered listeners.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    envelopes: AtomicU64,
    listener_failures: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            envelopes: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
        }
    }

    /// Get the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Build the envelope for an inbound message.
    ///
    /// Returns `None` for unrecognized names and for update messages that do
    /// not carry a string `type` and a `data` field.
    #[must_use]
    pub fn route(name: &str, data: Value) -> Option<Envelope> {
        let topic = Topic::for_message(name)?;

        match name {
            events::ACTIVITY_UPDATE | events::STATS_UPDATE => {
                let Value::Object(mut body) = data else {
                    debug!(message = %name, "Update without object body, ignoring");
                    return None;
                };
                let Some(Value::String(kind)) = body.remove("type") else {
                    debug!(message = %name, "Update without type, ignoring");
                    return None;
                };
                let Some(payload) = body.remove("data") else {
                    debug!(message = %name, kind = %kind, "Update without data, ignoring");
                    return None;
                };
                Some(Envelope::new(topic, name, payload).with_kind(kind))
            }
            _ => Some(Envelope::new(topic, name, data)),
        }
    }

    /// Dispatch an inbound message by name.
    ///
    /// Returns `None` if the message was not recognized.
    pub fn dispatch(&self, name: &str, data: Value) -> Option<DispatchOutcome> {
        match Self::route(name, data) {
            Some(envelope) => Some(self.publish(&envelope)),
            None => {
                if name == events::CONNECTED {
                    debug!("Server confirmed connection");
                } else {
                    trace!(message = %name, "Unrecognized message, ignoring");
                }
                None
            }
        }
    }

    /// Dispatch the payload of an `event` frame. Other frames are ignored.
    pub fn dispatch_frame(&self, frame: Frame) -> Option<DispatchOutcome> {
        match frame {
            Frame::Event { name, data } => self.dispatch(&name, data),
            _ => None,
        }
    }

    /// Invoke every current listener of the envelope's topic.
    ///
    /// Listeners run synchronously in registration order. A panicking
    /// listener is logged and skipped; it stays registered.
    pub fn publish(&self, envelope: &Envelope) -> DispatchOutcome {
        let listeners = self.registry.snapshot(envelope.topic);
        let mut outcome = DispatchOutcome {
            topic: envelope.topic,
            delivered: 0,
            failed: 0,
        };

        for listener in &listeners {
            // Unsubscribed earlier in this pass.
            if !listener.is_active() {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener.call(envelope))) {
                Ok(()) => outcome.delivered += 1,
                Err(panic) => {
                    outcome.failed += 1;
                    error!(
                        topic = %envelope.topic,
                        listener = listener.id,
                        envelope = envelope.id,
                        reason = %panic_message(panic.as_ref()),
                        "Listener panicked"
                    );
                }
            }
        }

        self.envelopes.fetch_add(1, Ordering::Relaxed);
        if outcome.failed > 0 {
            self.listener_failures
                .fetch_add(outcome.failed as u64, Ordering::Relaxed);
        }

        trace!(
            topic = %envelope.topic,
            message = %envelope.name,
            delivered = outcome.delivered,
            "Dispatched envelope"
        );
        outcome
    }

    /// Get dispatcher statistics.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            envelopes: self.envelopes.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Subscription;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn setup() -> (Arc<SubscriptionRegistry>, Dispatcher) {
        let registry = SubscriptionRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        (registry, dispatcher)
    }

    fn counting(registry: &Arc<SubscriptionRegistry>, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = registry.subscribe(topic, move |_: &Envelope| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_fan_out_by_topic() {
        let (registry, dispatcher) = setup();
        let activity: Vec<_> = (0..3).map(|_| counting(&registry, Topic::Activity)).collect();
        let (notification_hits, _n) = counting(&registry, Topic::Notification);

        let outcome = dispatcher
            .dispatch("new_activity", json!({"id": "a1"}))
            .unwrap();

        assert_eq!(outcome.topic, Topic::Activity);
        assert_eq!(outcome.delivered, 3);
        for (hits, _) in &activity {
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
        assert_eq!(notification_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_activity_scenario() {
        let (registry, dispatcher) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = registry.subscribe(Topic::Activity, move |env: &Envelope| {
            s.lock()
                .unwrap()
                .push((env.payload()["id"].clone(), env.name.clone()));
        });

        dispatcher.dispatch("new_activity", json!({"id": "a1", "type": "shop_registered"}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (json!("a1"), "new_activity".to_string()));
    }

    #[test]
    fn test_activity_update_passes_kind_through() {
        let env = Dispatcher::route(
            "activity_update",
            json!({"type": "shop_verified", "data": {"id": "a9"}}),
        )
        .unwrap();
        assert_eq!(env.topic, Topic::Activity);
        assert_eq!(env.kind(), Some("shop_verified"));
        assert_eq!(env.payload(), &json!({"id": "a9"}));
    }

    #[test]
    fn test_stats_update_passes_kind_and_value() {
        let env = Dispatcher::route(
            "stats_update",
            json!({"type": "offer_count", "data": {"totalOffers": 12}}),
        )
        .unwrap();
        assert_eq!(env.topic, Topic::Stats);
        assert_eq!(env.kind(), Some("offer_count"));
        assert_eq!(env.payload()["totalOffers"], 12);
    }

    #[test]
    fn test_malformed_updates_are_ignored() {
        assert!(Dispatcher::route("stats_update", json!({"data": 1})).is_none());
        assert!(Dispatcher::route("stats_update", json!({"type": 3, "data": 1})).is_none());
        assert!(Dispatcher::route("activity_update", json!({"type": "x"})).is_none());
        assert!(Dispatcher::route("activity_update", json!("oops")).is_none());
    }

    #[test]
    fn test_unrecognized_messages_are_ignored() {
        let (registry, dispatcher) = setup();
        let (hits, _sub) = counting(&registry, Topic::Activity);

        assert!(dispatcher.dispatch("connected", json!({"ok": true})).is_none());
        assert!(dispatcher.dispatch("order_placed", json!({})).is_none());
        assert!(dispatcher.dispatch_frame(Frame::ping()).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.stats().envelopes, 0);
    }

    #[test]
    fn test_dispatch_frame() {
        let (registry, dispatcher) = setup();
        let (hits, _sub) = counting(&registry, Topic::Notification);

        let outcome = dispatcher
            .dispatch_frame(Frame::event("notification", json!({"id": "n1", "title": "t"})))
            .unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (registry, dispatcher) = setup();
        let bad = registry.subscribe(Topic::Activity, |_: &Envelope| panic!("widget crashed"));
        let (hits, _good) = counting(&registry, Topic::Activity);

        let outcome = dispatcher.dispatch("new_activity", json!({"id": "a1"})).unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Still registered, and still isolated on the next envelope.
        assert!(bad.is_active());
        dispatcher.dispatch("new_activity", json!({"id": "a2"}));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.stats().listener_failures, 2);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let (registry, dispatcher) = setup();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let self_hits = Arc::new(AtomicUsize::new(0));

        let (s, h) = (slot.clone(), self_hits.clone());
        let sub = registry.subscribe(Topic::Activity, move |_: &Envelope| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = s.lock().unwrap().as_ref() {
                me.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);
        let (other_hits, _other) = counting(&registry, Topic::Activity);

        let outcome = dispatcher.dispatch("new_activity", json!({})).unwrap();
        assert_eq!(outcome.delivered, 2);
        assert_eq!(other_hits.load(Ordering::SeqCst), 1);

        dispatcher.dispatch("new_activity", json!({}));
        assert_eq!(self_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.listener_count(Topic::Activity), 1);
    }

    #[test]
    fn test_listener_removed_mid_pass_is_not_invoked() {
        let (registry, dispatcher) = setup();
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = victim_slot.clone();
        let _killer = registry.subscribe(Topic::Activity, move |_: &Envelope| {
            if let Some(victim) = v.lock().unwrap().as_ref() {
                victim.unsubscribe();
            }
        });
        let (victim_hits, victim) = counting(&registry, Topic::Activity);
        *victim_slot.lock().unwrap() = Some(victim);

        let outcome = dispatcher.dispatch("new_activity", json!({})).unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(victim_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_can_subscribe_during_dispatch() {
        let (registry, dispatcher) = setup();
        let added = Arc::new(Mutex::new(Vec::new()));

        let (r, a) = (registry.clone(), added.clone());
        let _spawner = registry.subscribe(Topic::Activity, move |_: &Envelope| {
            a.lock().unwrap().push(r.subscribe(Topic::Activity, |_: &Envelope| {}));
        });

        let outcome = dispatcher.dispatch("new_activity", json!({})).unwrap();
        // The listener added during the pass is not part of it.
        assert_eq!(outcome.delivered, 1);
        assert_eq!(registry.listener_count(Topic::Activity), 2);
    }

    #[test]
    fn test_in_order_delivery() {
        let (registry, dispatcher) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        let _sub = registry.subscribe(Topic::Activity, move |env: &Envelope| {
            o.lock().unwrap().push(env.payload()["id"].as_str().unwrap_or_default().to_string());
        });

        for id in ["a1", "a2", "a3"] {
            dispatcher.dispatch("new_activity", json!({ "id": id }));
        }
        assert_eq!(*order.lock().unwrap(), vec!["a1", "a2", "a3"]);
    }
}
