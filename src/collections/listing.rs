//! Paginated, searchable, sortable view over one collection.
//!
//! Every state change that affects the visible window goes through
//! [`ListingController::refresh`]. Each refresh takes a generation number;
//! a response is applied only if no newer refresh started while it was in
//! flight, so a slow stale page can never overwrite a newer one.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::schema::{field_schema, FieldDescriptor};
use super::source::{DataSource, PageRequest, SortCriterion, SortDirection};
use super::CollectionRegistry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Page size must be at least 1")]
    InvalidPageSize,

    #[error("Failed to load entries: {0}")]
    DataSource(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingState {
    pub active_collection: String,
    /// 1-based
    pub page_index: usize,
    pub page_size: usize,
    pub total_records: u64,
    pub search_query: String,
    pub sort: SortCriterion,
    pub visible_fields: Vec<FieldDescriptor>,
    pub items: Vec<Value>,
    /// Zero-based offset `items` were fetched at. Lags `page_index` after a failed fetch.
    pub items_offset: u64,
}

impl ListingState {
    fn new(collection: &str, page_size: usize) -> Self {
        Self {
            active_collection: collection.to_string(),
            page_index: 1,
            page_size,
            total_records: 0,
            search_query: String::new(),
            sort: SortCriterion::default(),
            visible_fields: field_schema(collection),
            items: Vec::new(),
            items_offset: 0,
        }
    }

    /// Never less than 1, even for an empty collection.
    pub fn total_pages(&self) -> usize {
        let size = self.page_size.max(1) as u64;
        (self.total_records.div_ceil(size) as usize).max(1)
    }

    /// 1-based position of the first and last record in `items`, `None` when empty.
    pub fn visible_range(&self) -> Option<(u64, u64)> {
        if self.items.is_empty() {
            return None;
        }
        let first = self.items_offset + 1;
        Some((first, first + self.items.len() as u64 - 1))
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            collection: self.active_collection.clone(),
            page_index: self.page_index,
            page_size: self.page_size,
            search: self.search_query.clone(),
            sort: self.sort.clone(),
        }
    }
}

pub struct ListingController {
    registry: Arc<CollectionRegistry>,
    source: Arc<dyn DataSource>,
    strict_collections: bool,
    state: RwLock<ListingState>,
    generation: AtomicU64,
}

impl ListingController {
    /// Starts on `initial_collection` with no items loaded; call
    /// [`refresh`](Self::refresh) for the first page.
    pub fn new(
        registry: Arc<CollectionRegistry>,
        source: Arc<dyn DataSource>,
        initial_collection: &str,
        page_size: usize,
    ) -> Self {
        Self {
            registry,
            source,
            strict_collections: false,
            state: RwLock::new(ListingState::new(initial_collection, page_size.max(1))),
            generation: AtomicU64::new(0),
        }
    }

    /// Reject slugs the registry does not know instead of showing fallback data.
    pub fn with_strict_collections(mut self, strict: bool) -> Self {
        self.strict_collections = strict;
        self
    }

    pub fn state(&self) -> ListingState {
        self.state.read().clone()
    }

    pub fn active_collection(&self) -> String {
        self.state.read().active_collection.clone()
    }

    pub fn total_pages(&self) -> usize {
        self.state.read().total_pages()
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    pub async fn select_collection(&self, slug: &str) -> Result<(), ListingError> {
        if self.strict_collections && !self.registry.contains(slug) {
            return Err(ListingError::UnknownCollection(slug.to_string()));
        }

        {
            let mut state = self.state.write();
            state.active_collection = slug.to_string();
            state.page_index = 1;
            state.visible_fields = field_schema(slug);
        }
        debug!(collection = slug, "Selected collection");

        self.refresh().await
    }

    /// Out-of-range pages are accepted and simply come back empty.
    pub async fn set_page(&self, page_index: usize) -> Result<(), ListingError> {
        self.state.write().page_index = page_index;
        self.refresh().await
    }

    pub async fn set_page_size(&self, page_size: usize) -> Result<(), ListingError> {
        if page_size == 0 {
            return Err(ListingError::InvalidPageSize);
        }
        {
            let mut state = self.state.write();
            state.page_size = page_size;
            state.page_index = 1;
        }
        self.refresh().await
    }

    pub async fn set_search(&self, query: &str) -> Result<(), ListingError> {
        {
            let mut state = self.state.write();
            state.search_query = query.to_string();
            state.page_index = 1;
        }
        self.refresh().await
    }

    /// An empty field clears the sort.
    pub async fn set_sort(&self, field: &str, direction: SortDirection) -> Result<(), ListingError> {
        self.state.write().sort = SortCriterion::new(field, direction);
        self.refresh().await
    }

    /// Re-fetch the current window. On failure the previous items stay visible.
    pub async fn refresh(&self) -> Result<(), ListingError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = self.state.read().page_request();

        let result = self.source.fetch_page(&request).await;

        let mut state = self.state.write();
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(
                collection = %request.collection,
                page = request.page_index,
                "Discarding stale page response"
            );
            return Ok(());
        }

        match result {
            Ok(mut page) => {
                page.items.truncate(request.page_size);
                state.items = page.items;
                state.items_offset = request.offset() as u64;
                state.total_records = page.total_records;
                debug!(
                    collection = %request.collection,
                    page = request.page_index,
                    total = state.total_records,
                    "Loaded page"
                );
                Ok(())
            }
            Err(e) => {
                warn!(collection = %request.collection, error = %e, "Failed to load entries");
                Err(ListingError::DataSource(format!("{:#}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::source::{Page, RegistryDataSource, DEFAULT_ENTRY_COUNT};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn controller(initial: &str) -> ListingController {
        let registry = Arc::new(CollectionRegistry::with_defaults());
        let source = Arc::new(RegistryDataSource::new(registry.clone()));
        ListingController::new(registry, source, initial, 10)
    }

    fn ids(state: &ListingState) -> Vec<u64> {
        state.items.iter().filter_map(|r| r["id"].as_u64()).collect()
    }

    #[tokio::test]
    async fn test_initial_refresh() {
        let listing = controller("blog-posts");
        listing.refresh().await.unwrap();

        let state = listing.state();
        assert_eq!(state.page_index, 1);
        assert_eq!(state.total_records, 45);
        assert_eq!(state.items.len(), 10);
        assert_eq!(state.visible_fields[0].key, "title");
        assert_eq!(listing.total_pages(), 5);
        assert_eq!(state.visible_range(), Some((1, 10)));
    }

    #[tokio::test]
    async fn test_products_page_two() {
        let listing = controller("blog-posts");
        listing.select_collection("products").await.unwrap();
        listing.set_page(2).await.unwrap();

        let state = listing.state();
        assert_eq!(state.total_records, 128);
        assert_eq!(ids(&state), (11..=20).collect::<Vec<_>>());
        assert_eq!(listing.total_pages(), 13);
        assert_eq!(state.visible_range(), Some((11, 20)));
    }

    #[tokio::test]
    async fn test_window_length_matches_total() {
        let listing = controller("products");
        for (page_size, page_index) in [(10, 1), (10, 13), (10, 14), (25, 6), (7, 19), (128, 1)] {
            listing.set_page_size(page_size).await.unwrap();
            listing.set_page(page_index).await.unwrap();

            let state = listing.state();
            let offset = ((page_index - 1) * page_size) as u64;
            let expected = (page_size as u64).min(state.total_records.saturating_sub(offset));
            assert_eq!(state.items.len() as u64, expected, "size {page_size} page {page_index}");
        }
    }

    #[tokio::test]
    async fn test_changes_reset_page_index() {
        let listing = controller("products");

        listing.set_page(5).await.unwrap();
        listing.set_search("product").await.unwrap();
        assert_eq!(listing.state().page_index, 1);

        listing.set_page(3).await.unwrap();
        listing.set_page_size(25).await.unwrap();
        assert_eq!(listing.state().page_index, 1);

        listing.set_page(2).await.unwrap();
        listing.select_collection("authors").await.unwrap();
        assert_eq!(listing.state().page_index, 1);
    }

    #[tokio::test]
    async fn test_sort_keeps_page_index() {
        let listing = controller("products");
        listing.set_page(4).await.unwrap();
        listing.set_sort("price", SortDirection::Descending).await.unwrap();

        let state = listing.state();
        assert_eq!(state.page_index, 4);
        assert_eq!(state.sort.field, "price");
        assert_eq!(state.items.len(), 10);
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let listing = controller("products");
        listing.refresh().await.unwrap();

        assert_eq!(listing.set_page_size(0).await, Err(ListingError::InvalidPageSize));
        assert_eq!(listing.state().page_size, 10);
    }

    #[tokio::test]
    async fn test_unknown_collection_falls_back() {
        let listing = controller("blog-posts");
        listing.select_collection("unknown-slug").await.unwrap();

        let state = listing.state();
        let keys: Vec<&str> = state.visible_fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "id", "status", "createdAt"]);
        assert_eq!(state.total_records, DEFAULT_ENTRY_COUNT);
        assert_eq!(listing.total_pages(), 5);
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_unknown_collection() {
        let listing = controller("blog-posts").with_strict_collections(true);
        listing.refresh().await.unwrap();

        let err = listing.select_collection("unknown-slug").await.unwrap_err();
        assert_eq!(err, ListingError::UnknownCollection("unknown-slug".to_string()));
        assert_eq!(listing.active_collection(), "blog-posts");
    }

    #[tokio::test]
    async fn test_registry_edits_visible_on_refresh() {
        let listing = controller("events");
        listing.refresh().await.unwrap();
        assert_eq!(listing.state().total_records, 8);

        listing.registry().set_entry_count("events", 3);
        listing.refresh().await.unwrap();
        assert_eq!(listing.state().total_records, 3);
        assert_eq!(listing.total_pages(), 1);
    }

    #[test]
    fn test_total_pages_minimum_one() {
        let mut state = ListingState::new("faq", 10);
        assert_eq!(state.total_pages(), 1);
        state.total_records = 10;
        assert_eq!(state.total_pages(), 1);
        state.total_records = 11;
        assert_eq!(state.total_pages(), 2);
        assert_eq!(state.visible_range(), None);
    }

    struct FlakySource {
        inner: RegistryDataSource,
        failing: AtomicBool,
    }

    #[async_trait]
    impl DataSource for FlakySource {
        async fn fetch_page(&self, request: &PageRequest) -> anyhow::Result<Page> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            self.inner.fetch_page(request).await
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_items() {
        let registry = Arc::new(CollectionRegistry::with_defaults());
        let source = Arc::new(FlakySource {
            inner: RegistryDataSource::new(registry.clone()),
            failing: AtomicBool::new(false),
        });
        let listing = ListingController::new(registry, source.clone(), "products", 10);
        listing.refresh().await.unwrap();
        let before = listing.state();

        source.failing.store(true, Ordering::SeqCst);
        let err = listing.set_page(2).await.unwrap_err();
        assert!(matches!(err, ListingError::DataSource(ref msg) if msg.contains("connection reset")));

        let after = listing.state();
        assert_eq!(after.items, before.items);
        assert_eq!(after.total_records, 128);
        assert_eq!(after.page_index, 2);
        assert_eq!(after.visible_range(), Some((1, 10)));

        source.failing.store(false, Ordering::SeqCst);
        listing.refresh().await.unwrap();
        assert_eq!(listing.state().visible_range(), Some((11, 20)));
    }

    /// Holds page 2 until released; every other page answers immediately.
    struct GatedSource {
        inner: RegistryDataSource,
        release: Notify,
    }

    #[async_trait]
    impl DataSource for GatedSource {
        async fn fetch_page(&self, request: &PageRequest) -> anyhow::Result<Page> {
            if request.page_index == 2 {
                self.release.notified().await;
            }
            self.inner.fetch_page(request).await
        }
    }

    #[tokio::test]
    async fn test_stale_response_discarded() {
        let registry = Arc::new(CollectionRegistry::with_defaults());
        let source = Arc::new(GatedSource {
            inner: RegistryDataSource::new(registry.clone()),
            release: Notify::new(),
        });
        let listing = ListingController::new(registry, source.clone(), "products", 10);

        let slow = listing.set_page(2);
        let fast = async {
            listing.set_page(3).await.unwrap();
            source.release.notify_one();
        };
        let (slow_result, _) = tokio::join!(slow, fast);
        slow_result.unwrap();

        let state = listing.state();
        assert_eq!(state.page_index, 3);
        assert_eq!(ids(&state), (21..=30).collect::<Vec<_>>());
    }
}
