//! Per-correlation-id status subscriptions.
//!
//! Handlers are invoked outside the subscriber lock, so a handler may
//! subscribe or unsubscribe without deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use swarm_core::{CorrelationId, StatusUpdate};

/// Callback invoked with each status update for a correlation id.
pub type StatusHandler = Arc<dyn Fn(&StatusUpdate) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct NotificationBus {
    subscribers: Mutex<HashMap<CorrelationId, HashMap<SubscriptionId, StatusHandler>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("topics", &self.subscribers.lock().len())
            .finish()
    }
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, id: CorrelationId, handler: F) -> SubscriptionId
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        let sub = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .lock()
            .entry(id)
            .or_default()
            .insert(sub, Arc::new(handler));
        sub
    }

    /// Returns false if the subscription was not found.
    pub fn unsubscribe(&self, id: &CorrelationId, sub: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(handlers) = subscribers.get_mut(id) else {
            return false;
        };
        let removed = handlers.remove(&sub).is_some();
        if handlers.is_empty() {
            subscribers.remove(id);
        }
        removed
    }

    /// Deliver `update` to every handler of `id`. Returns how many ran.
    pub fn publish(&self, id: &CorrelationId, update: &StatusUpdate) -> usize {
        let handlers: Vec<StatusHandler> = match self.subscribers.lock().get(id) {
            Some(handlers) => handlers.values().cloned().collect(),
            None => return 0,
        };
        for handler in &handlers {
            handler(update);
        }
        handlers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, id: &CorrelationId) -> usize {
        self.subscribers.lock().get(id).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::TxHash;

    #[test]
    fn test_publish_reaches_only_matching_id() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        bus.subscribe(CorrelationId::from("a"), move |u| sink.lock().push(*u));

        let hash = TxHash::repeat_byte(9);
        assert_eq!(bus.publish(&CorrelationId::from("a"), &StatusUpdate::Confirmed(hash)), 1);
        assert_eq!(bus.publish(&CorrelationId::from("b"), &StatusUpdate::Failed), 0);
        assert_eq!(*seen.lock(), vec![StatusUpdate::Confirmed(hash)]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = NotificationBus::new();
        let id = CorrelationId::from("a");
        let first = bus.subscribe(id.clone(), |_| {});
        let second = bus.subscribe(id.clone(), |_| {});
        assert_eq!(bus.subscriber_count(&id), 2);

        assert!(bus.unsubscribe(&id, first));
        assert!(!bus.unsubscribe(&id, first));
        assert_eq!(bus.publish(&id, &StatusUpdate::Failed), 1);

        assert!(bus.unsubscribe(&id, second));
        assert_eq!(bus.subscriber_count(&id), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let bus = Arc::new(NotificationBus::new());
        let id = CorrelationId::from("self");
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let (bus2, id2, slot2) = (bus.clone(), id.clone(), slot.clone());
        let sub = bus.subscribe(id.clone(), move |_| {
            if let Some(sub) = *slot2.lock() {
                bus2.unsubscribe(&id2, sub);
            }
        });
        *slot.lock() = Some(sub);

        assert_eq!(bus.publish(&id, &StatusUpdate::Expired), 1);
        assert_eq!(bus.subscriber_count(&id), 0);
    }
}
