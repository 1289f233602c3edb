//! Change broadcast between sessions sharing one medium.

use chrono::{DateTime, Utc};
use pricing_core::PriceTable;
use std::sync::{Arc, Mutex, MutexGuard};

/// Published after every successful save; carries the full new table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableChanged {
    pub table: PriceTable,
    pub last_updated: DateTime<Utc>,
    pub updated_by: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type ChangeHandler = Box<dyn Fn(&TableChanged) + Send + Sync>;

/// Transport for change notifications. Publishing happens after the save
/// completes; delivery order follows publish order.
pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
    fn publish(&self, event: &TableChanged);

    /// Pick up changes saved by other processes. Transports that deliver on
    /// publish have nothing to do here.
    fn poll(&self) {}
}

type SharedHandler = Arc<dyn Fn(&TableChanged) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, SharedHandler)>,
}

/// In-process broadcast. Clones share one subscriber list.
#[derive(Clone, Default)]
pub struct LocalBroadcast {
    inner: Arc<Mutex<Subscribers>>,
}

impl LocalBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }

    // A handler that panicked must not take the broadcast down with it.
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChangeNotifier for LocalBroadcast {
    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        let mut subs = self.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.handlers.push((id, Arc::from(handler)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().handlers.retain(|(h, _)| *h != id);
    }

    fn publish(&self, event: &TableChanged) {
        // Handlers run outside the lock so they may subscribe or publish themselves.
        let handlers: Vec<SharedHandler> =
            self.lock().handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(event);
        }
    }
}
