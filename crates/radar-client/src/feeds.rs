//! Consumer-side views over the live topics.
//!
//! These are the state holders a dashboard widget keeps: the most recent
//! activities, the current value of each stats counter, and an unread
//! notification badge. Each attaches to an [`EventChannel`] with a single
//! subscription.

use crate::channel::EventChannel;
use radar_core::{Activity, Notification, StatsKind, StatsUpdate, Subscription};
use radar_protocol::events;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded list of recent activities, newest first.
#[derive(Debug)]
pub struct ActivityFeed {
    capacity: usize,
    items: Mutex<VecDeque<Activity>>,
}

impl ActivityFeed {
    /// Create a feed that keeps at most `capacity` activities.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Follow the activity topic of `channel`.
    pub fn attach(self: &Arc<Self>, channel: &EventChannel) -> Subscription {
        let feed = Arc::clone(self);
        channel.subscribe_activities(move |activity, name| feed.apply(activity, name))
    }

    /// Apply one activity message.
    ///
    /// `new_activity` is prepended. `activity_update` replaces the entry with
    /// the same id in place and is ignored for activities no longer shown.
    pub fn apply(&self, activity: Activity, name: &str) {
        if name == events::ACTIVITY_UPDATE {
            let mut items = lock(&self.items);
            if let Some(existing) = items.iter_mut().find(|a| a.id == activity.id) {
                *existing = activity;
            } else {
                trace!(activity = %activity.id, "Update for activity not in feed");
            }
        } else {
            self.push(activity);
        }
    }

    /// Prepend an activity, evicting the oldest past capacity.
    pub fn push(&self, activity: Activity) {
        if self.capacity == 0 {
            return;
        }
        let mut items = lock(&self.items);
        items.push_front(activity);
        items.truncate(self.capacity);
    }

    /// Current activities, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Activity> {
        lock(&self.items).iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Latest value of every stats counter seen.
#[derive(Debug, Default)]
pub struct LiveStats {
    counters: Mutex<HashMap<StatsKind, i64>>,
}

impl LiveStats {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Follow the stats topic of `channel`.
    pub fn attach(self: &Arc<Self>, channel: &EventChannel) -> Subscription {
        let stats = Arc::clone(self);
        channel.subscribe_stats(move |update| stats.apply(&update))
    }

    /// Record an update. Updates without a numeric value are ignored.
    pub fn apply(&self, update: &StatsUpdate) {
        match update.value() {
            Some(value) => {
                lock(&self.counters).insert(update.kind.clone(), value);
            }
            None => trace!(kind = %update.kind.as_str(), "Stats update without value"),
        }
    }

    /// Latest value for `kind`.
    #[must_use]
    pub fn get(&self, kind: &StatsKind) -> Option<i64> {
        lock(&self.counters).get(kind).copied()
    }

    /// All counters, sorted by kind name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        let mut all: Vec<_> = lock(&self.counters)
            .iter()
            .map(|(kind, value)| (kind.as_str().to_string(), *value))
            .collect();
        all.sort();
        all
    }
}

/// Unread notification counter with the latest notification.
#[derive(Debug, Default)]
pub struct NotificationBadge {
    unread: AtomicUsize,
    latest: Mutex<Option<Notification>>,
}

impl NotificationBadge {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Follow the notification topic of `channel`.
    pub fn attach(self: &Arc<Self>, channel: &EventChannel) -> Subscription {
        let badge = Arc::clone(self);
        channel.subscribe_notifications(move |notification| badge.apply(notification))
    }

    pub fn apply(&self, notification: Notification) {
        self.unread.fetch_add(1, Ordering::Relaxed);
        *lock(&self.latest) = Some(notification);
    }

    #[must_use]
    pub fn unread(&self) -> usize {
        self.unread.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn latest(&self) -> Option<Notification> {
        lock(&self.latest).clone()
    }

    /// Reset the unread count.
    pub fn mark_read(&self) {
        self.unread.store(0, Ordering::Relaxed);
    }
}
