//! Change notification through the shared medium itself, for stores that do
//! not share a process or a [`LocalBroadcast`].

use crate::config::StoreConfig;
use crate::medium::KeyValueStore;
use crate::notify::{ChangeHandler, ChangeNotifier, LocalBroadcast, SubscriptionId, TableChanged};
use crate::record;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Announces local saves immediately and, on [`ChangeNotifier::poll`], any
/// record on the medium newer than the last one seen.
pub struct MediumWatch {
    medium: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    local: LocalBroadcast,
    seen: Mutex<Option<DateTime<Utc>>>,
}

impl MediumWatch {
    /// Watch `config.storage_key` on `medium`, starting from what is stored now.
    pub fn new(medium: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        let seen = record::read(medium.as_ref(), &config).map(|r| r.last_updated);
        Self {
            medium,
            config,
            local: LocalBroadcast::new(),
            seen: Mutex::new(seen),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.local.subscriber_count()
    }

    fn seen(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChangeNotifier for MediumWatch {
    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        self.local.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.local.unsubscribe(id);
    }

    fn publish(&self, event: &TableChanged) {
        *self.seen() = Some(event.last_updated);
        self.local.publish(event);
    }

    fn poll(&self) {
        let Some(record) = record::read(self.medium.as_ref(), &self.config) else {
            return;
        };
        {
            let mut seen = self.seen();
            if *seen == Some(record.last_updated) {
                return;
            }
            *seen = Some(record.last_updated);
        }
        debug!(updated_by = ?record.updated_by, "picked up price table saved elsewhere");
        self.local.publish(&TableChanged {
            table: record.data,
            last_updated: record.last_updated,
            updated_by: record.updated_by,
        });
    }
}
