//! Per-page wiring of list controllers, stats bindings and mutations.
//!
//! A [`PageScope`] owns the invalidation bus for one page. Everything it hands
//! out is subscribed to that bus, so a mutation run through
//! [`PageScope::mutations`] refreshes every list and stats binding of the
//! touched collection on the same page.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::api::CollectionApi;
use crate::config::{AppConfig, CacheConfig};
use crate::invalidation::InvalidationBus;
use crate::list::{ListBinding, ListController, StatsBinding};
use crate::mutation::MutationController;
use crate::query::Collection;

pub struct PageScope {
    api: Arc<dyn CollectionApi>,
    bus: Arc<InvalidationBus>,
    mutations: MutationController,
    cache: CacheConfig,
    page_size: u32,
}

impl PageScope {
    pub fn new(api: Arc<dyn CollectionApi>, config: &AppConfig) -> Self {
        let bus = Arc::new(InvalidationBus::new());
        Self {
            mutations: MutationController::new(Arc::clone(&api), Arc::clone(&bus)),
            api,
            bus,
            cache: config.cache.clone(),
            page_size: config.page_size,
        }
    }

    /// Override the page size used by lists created afterwards.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn list<T>(&self, collection: Collection) -> Arc<ListController<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let binding = ListBinding::new(Arc::clone(&self.api), collection, &self.cache);
        let controller = Arc::new(ListController::new(binding, self.page_size));
        self.bus.subscribe(collection, controller.clone());
        controller
    }

    pub fn stats<S>(&self, collection: Collection) -> Arc<StatsBinding<S>>
    where
        S: DeserializeOwned + Send + Sync + 'static,
    {
        let stats = Arc::new(StatsBinding::new(
            Arc::clone(&self.api),
            collection,
            &self.cache,
        ));
        self.bus.subscribe(collection, stats.clone());
        stats
    }

    pub fn mutations(&self) -> &MutationController {
        &self.mutations
    }
}
