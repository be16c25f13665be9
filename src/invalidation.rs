//! Collection-scoped invalidation fan-out.
//!
//! Each page owns one [`InvalidationBus`]. List and stats bindings subscribe
//! to the collections they read; a successful mutation publishes an
//! [`Invalidation`] for the collection it touched.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use metrics::counter;
use tracing::debug;

use crate::query::Collection;

/// Emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub collection: Collection,
    /// The mutation changed the item count, so existing cursors are void.
    pub reset_pagination: bool,
}

/// Receives invalidations for a collection.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self, event: &Invalidation);
}

/// Subscribers are held weakly; dropping a binding unsubscribes it.
#[derive(Default)]
pub struct InvalidationBus {
    subscribers: Mutex<BTreeMap<Collection, Vec<Weak<dyn Invalidate>>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Collection, Vec<Weak<dyn Invalidate>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, collection: Collection, subscriber: Arc<dyn Invalidate>) {
        self.lock()
            .entry(collection)
            .or_default()
            .push(Arc::downgrade(&subscriber));
    }

    /// Live subscriber count for `collection`.
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.lock()
            .get(&collection)
            .map(|subs| subs.iter().filter(|s| s.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Notify every live subscriber of `event.collection`. Returns how many were notified.
    pub fn publish(&self, event: &Invalidation) -> usize {
        // Upgrade under the lock, call outside it so subscribers may re-enter the bus.
        let live: Vec<Arc<dyn Invalidate>> = {
            let mut subscribers = self.lock();
            let Some(subs) = subscribers.get_mut(&event.collection) else {
                return 0;
            };
            subs.retain(|s| s.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in &live {
            subscriber.invalidate(event);
        }

        counter!("list_invalidations_total", "collection" => event.collection.name())
            .increment(1);
        debug!(
            collection = %event.collection,
            reset_pagination = event.reset_pagination,
            notified = live.len(),
            "published invalidation"
        );
        live.len()
    }
}
