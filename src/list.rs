//! # List Bindings
//!
//! [`ListBinding`] ties one collection to the query cache and tracks which
//! query the view is currently showing. [`ListController`] layers cursor
//! pagination, search and filters over it and is what a page talks to.
//!
//! A binding only ever exposes data for its current query key. A response for
//! a key that has since been replaced is dropped on arrival, even when it
//! resolves after the newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use scopeguard::ScopeGuard;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::api::CollectionApi;
use crate::cache::QueryCache;
use crate::config::CacheConfig;
use crate::cursor::PaginationState;
use crate::error::ClientError;
use crate::invalidation::{Invalidate, Invalidation};
use crate::query::{Collection, ListFilters, ListQuery, ListResult, QueryKey};
use crate::table::ServerSide;

/// What a page renders for one list.
pub struct ListView<T> {
    /// Query the view belongs to; `None` before the first load.
    pub key: Option<QueryKey>,
    pub data: Option<Arc<ListResult<T>>>,
    pub is_loading: bool,
    pub error: Option<ClientError>,
}

impl<T> Clone for ListView<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: self.data.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

impl<T> Default for ListView<T> {
    fn default() -> Self {
        Self {
            key: None,
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> std::fmt::Debug for ListView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListView")
            .field("key", &self.key)
            .field("items", &self.data.as_ref().map(|d| d.items.len()))
            .field("is_loading", &self.is_loading)
            .field("error", &self.error)
            .finish()
    }
}

impl<T> ListView<T> {
    pub fn items(&self) -> &[T] {
        self.data.as_ref().map(|d| d.items.as_slice()).unwrap_or(&[])
    }

    pub fn has_more(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.has_more)
    }
}

pub struct ListBinding<T> {
    api: Arc<dyn CollectionApi>,
    collection: Collection,
    cache: QueryCache<ListResult<T>>,
    view: Mutex<ListView<T>>,
}

impl<T> ListBinding<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(api: Arc<dyn CollectionApi>, collection: Collection, cache: &CacheConfig) -> Self {
        Self {
            api,
            collection,
            cache: QueryCache::new(cache.ttl(), cache.capacity),
            view: Mutex::new(ListView::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListView<T>> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn cache(&self) -> &QueryCache<ListResult<T>> {
        &self.cache
    }

    pub fn view(&self) -> ListView<T> {
        self.lock().clone()
    }

    /// Make `query` current and resolve it from cache or network.
    ///
    /// The returned view is the binding's view after this call. When a newer
    /// query became current while this one was in flight, that newer view is
    /// returned untouched and this result is discarded.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn load(&self, query: ListQuery) -> ListView<T> {
        let key = query.key();
        let previous = {
            let mut view = self.lock();
            let previous = view.clone();
            if view.key.as_ref() != Some(&key) {
                view.data = self.cache.last_known(&key);
                view.error = None;
                view.key = Some(key.clone());
            }
            view.is_loading = true;
            previous
        };

        // Dropped before completion: put back what the view showed before.
        let started = self.cache.generation();
        let abandoned = scopeguard::guard(previous, |mut previous| {
            let mut view = self.lock();
            if view.key.as_ref() != Some(&key) {
                return;
            }
            if self.cache.generation() != started {
                previous.data = None;
            }
            debug!(key = %key, "list load abandoned; view restored");
            *view = previous;
        });

        // A fetch that raced an invalidation may carry pre-mutation rows; run it once more.
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            let generation = self.cache.generation();
            let api = Arc::clone(&self.api);
            let query = query.clone();
            let result = self
                .cache
                .get_or_fetch(&key, || async move {
                    let page = api.fetch_page(&query).await?;
                    page.map_items(serde_json::from_value::<T>)
                        .map_err(ClientError::from)
                })
                .await;
            if attempts >= 2 || self.cache.generation() == generation {
                break result;
            }
            debug!(key = %key, "invalidated while fetching; refetching");
        };
        let _ = ScopeGuard::into_inner(abandoned);

        let mut view = self.lock();
        if view.key.as_ref() != Some(&key) {
            counter!("list_stale_responses_total", "collection" => self.collection.name())
                .increment(1);
            debug!(key = %key, "response for superseded query discarded");
            return view.clone();
        }

        view.is_loading = false;
        match result {
            Ok(fetched) => {
                view.data = Some(fetched.value);
                view.error = None;
            }
            Err(err) => {
                warn!(error = %err, "list fetch failed");
                if let Some(last) = self.cache.last_known(&key) {
                    view.data = Some(last);
                }
                view.error = Some(err);
            }
        }
        view.clone()
    }
}

impl<T> Invalidate for ListBinding<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn invalidate(&self, _event: &Invalidation) {
        let dropped = self.cache.invalidate_all();
        self.lock().data = None;
        debug!(collection = %self.collection, dropped, "list cache invalidated");
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone)]
pub enum Navigation<T> {
    Loaded(ListView<T>),
    /// Nothing to do: a fetch is in flight or there is no page in that direction.
    Ignored,
}

impl<T> Navigation<T> {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Navigation::Ignored)
    }

    pub fn into_view(self) -> Option<ListView<T>> {
        match self {
            Navigation::Loaded(view) => Some(view),
            Navigation::Ignored => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ListParams {
    pagination: PaginationState,
    filters: ListFilters,
    search: Option<String>,
}

/// Paginated, filterable view of one collection.
pub struct ListController<T> {
    binding: ListBinding<T>,
    page_size: u32,
    params: Mutex<ListParams>,
}

impl<T> ListController<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(binding: ListBinding<T>, page_size: u32) -> Self {
        Self {
            binding,
            page_size: page_size.max(1),
            params: Mutex::new(ListParams::default()),
        }
    }

    fn params(&self) -> MutexGuard<'_, ListParams> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn binding(&self) -> &ListBinding<T> {
        &self.binding
    }

    pub fn view(&self) -> ListView<T> {
        self.binding.view()
    }

    pub fn pagination(&self) -> PaginationState {
        self.params().pagination.clone()
    }

    pub fn is_first_page(&self) -> bool {
        self.params().pagination.is_first_page()
    }

    pub fn has_more(&self) -> bool {
        self.binding.view().has_more()
    }

    /// The query for the current cursor, filters and search term.
    pub fn current_query(&self) -> ListQuery {
        let params = self.params();
        ListQuery::new(self.binding.collection(), self.page_size)
            .with_cursor(params.pagination.current_cursor().cloned())
            .with_filters(params.filters.clone())
            .with_search(params.search.clone())
    }

    pub async fn load(&self) -> ListView<T> {
        self.binding.load(self.current_query()).await
    }

    /// Same as [`load`](Self::load); fresh entries are still served from cache.
    pub async fn refresh(&self) -> ListView<T> {
        self.load().await
    }

    pub async fn next_page(&self) -> Navigation<T> {
        let view = self.binding.view();
        if view.is_loading {
            return Navigation::Ignored;
        }
        let next = view.data.as_ref().and_then(|d| d.next_page_cursor());
        self.navigate(|params| params.pagination.go_next(next)).await
    }

    pub async fn prev_page(&self) -> Navigation<T> {
        if self.binding.view().is_loading {
            return Navigation::Ignored;
        }
        self.navigate(|params| params.pagination.go_prev()).await
    }

    pub async fn first_page(&self) -> Navigation<T> {
        if self.binding.view().is_loading {
            return Navigation::Ignored;
        }
        self.navigate(|params| {
            if params.pagination.is_first_page() {
                return false;
            }
            params.pagination.reset();
            true
        })
        .await
    }

    /// Replace the search term and return to page 1.
    pub async fn set_search(&self, search: Option<String>) -> ListView<T> {
        self.restart(|params| params.search = search).await
    }

    /// Replace the filters and return to page 1.
    pub async fn set_filters(&self, filters: ListFilters) -> ListView<T> {
        self.restart(|params| params.filters = filters.normalized()).await
    }

    /// Replace filters and search term together and return to page 1.
    pub async fn set_criteria(&self, filters: ListFilters, search: Option<String>) -> ListView<T> {
        self.restart(|params| {
            params.filters = filters.normalized();
            params.search = search;
        })
        .await
    }

    async fn navigate(&self, step: impl FnOnce(&mut ListParams) -> bool) -> Navigation<T> {
        let previous = {
            let mut params = self.params();
            let previous = params.clone();
            if !step(&mut params) {
                return Navigation::Ignored;
            }
            previous
        };
        Navigation::Loaded(self.load_or_revert(previous).await)
    }

    // Old cursors belong to the previous result set.
    async fn restart(&self, update: impl FnOnce(&mut ListParams)) -> ListView<T> {
        let previous = {
            let mut params = self.params();
            let previous = params.clone();
            update(&mut params);
            params.pagination.reset();
            previous
        };
        self.load_or_revert(previous).await
    }

    /// Load the current params; if the caller drops the load first, the
    /// params go back to `previous` unless something else changed them since.
    async fn load_or_revert(&self, previous: ListParams) -> ListView<T> {
        let applied = self.params().clone();
        let revert = scopeguard::guard(previous, |previous| {
            let mut params = self.params();
            if *params == applied {
                *params = previous;
            }
        });
        let view = self.load().await;
        let _ = ScopeGuard::into_inner(revert);
        view
    }

    /// Paging state for a server-side table over the current view.
    pub fn server_side(&self) -> ServerSide {
        let view = self.binding.view();
        let params = self.params();
        ServerSide {
            search_query: params.search.clone().unwrap_or_default(),
            has_more: view.has_more(),
            can_go_prev: params.pagination.can_go_prev(),
            is_first_page: params.pagination.is_first_page(),
            is_loading: view.is_loading,
            current_page_size: view.items().len(),
        }
    }
}

impl<T> Invalidate for ListController<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn invalidate(&self, event: &Invalidation) {
        if event.reset_pagination {
            self.params().pagination.reset();
        }
        self.binding.invalidate(event);
    }
}

/// Cached aggregate stats for a collection.
pub struct StatsBinding<S> {
    api: Arc<dyn CollectionApi>,
    collection: Collection,
    cache: QueryCache<S>,
}

impl<S> StatsBinding<S>
where
    S: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(api: Arc<dyn CollectionApi>, collection: Collection, cache: &CacheConfig) -> Self {
        Self {
            api,
            collection,
            cache: QueryCache::new(cache.ttl(), cache.capacity),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn load(&self) -> Result<Arc<S>, ClientError> {
        let path = self
            .collection
            .stats_path()
            .ok_or_else(|| ClientError::InvalidRequest {
                message: format!("{} has no stats endpoint", self.collection),
            })?;
        let key = QueryKey::for_path(path);
        let api = Arc::clone(&self.api);
        let collection = self.collection;
        let fetched = self
            .cache
            .get_or_fetch(&key, || async move {
                let raw = api.fetch_stats(collection).await?;
                Ok::<S, ClientError>(serde_json::from_value(raw)?)
            })
            .await?;
        Ok(fetched.value)
    }
}

impl<S> Invalidate for StatsBinding<S>
where
    S: DeserializeOwned + Send + Sync + 'static,
{
    fn invalidate(&self, _event: &Invalidation) {
        self.cache.invalidate_all();
    }
}
