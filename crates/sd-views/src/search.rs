//! Debounced provider and procedure search

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sd_core::{CategoryId, EntityId, SelectionStore};
use sd_data::schema::{ProcedureSummary, ProviderSummary};
use sd_data::{CollectionSource, Keyed, RemoteError};

use crate::loader::Fetcher;

/// Called with the key of the picked result
pub type OnSelect = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
    pub min_len: usize,
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            min_len: 2,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchState<T> {
    pub query: String,
    pub results: Vec<T>,
    /// Whether the result dropdown is shown
    pub open: bool,
    pub loading: bool,
    pub error: Option<RemoteError>,
    epoch: u64,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            open: false,
            loading: false,
            error: None,
            epoch: 0,
        }
    }
}

/// Search input with a debounced result dropdown.
///
/// Each keystroke restarts the debounce timer; only the query typed last is
/// sent, and a result for an older query is discarded.
pub struct SearchBox<T> {
    name: String,
    state: Arc<Mutex<SearchState<T>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    fetch: Fetcher<String, Vec<T>>,
    on_select: OnSelect,
    config: SearchConfig,
    runtime: Handle,
}

impl<T> SearchBox<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        fetch: Fetcher<String, Vec<T>>,
        on_select: OnSelect,
        config: SearchConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(SearchState::default())),
            pending: Mutex::new(None),
            fetch,
            on_select,
            config,
            runtime,
        }
    }

    /// The input text changed
    pub fn input(&self, text: &str) {
        let query = text.trim().to_string();
        let epoch = {
            let mut state = self.state.lock();
            state.query = text.to_string();
            state.epoch += 1;
            state.error = None;
            if query.chars().count() < self.config.min_len {
                state.results.clear();
                state.open = false;
                state.loading = false;
                None
            } else {
                state.loading = true;
                Some(state.epoch)
            }
        };

        let mut pending = self.pending.lock();
        if let Some(timer) = pending.take() {
            timer.abort();
        }
        let Some(epoch) = epoch else {
            return;
        };

        let state = self.state.clone();
        let fetch = self.fetch.clone();
        let delay = self.config.debounce;
        let name = self.name.clone();
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(search = %name, %query, "searching");
            let result = fetch(query).await;

            let mut state = state.lock();
            if state.epoch != epoch {
                return;
            }
            state.loading = false;
            match result {
                Ok(results) => {
                    state.open = !results.is_empty();
                    state.results = results;
                }
                Err(err) => {
                    warn!(search = %name, error = %err, "search failed");
                    state.open = false;
                    state.results.clear();
                    state.error = Some(err);
                }
            }
        }));
    }

    /// Pick a result and close the dropdown
    pub fn select(&self, key: &str) {
        (self.on_select)(key);
        self.clear();
    }

    pub fn clear(&self) {
        if let Some(timer) = self.pending.lock().take() {
            timer.abort();
        }
        let mut state = self.state.lock();
        let epoch = state.epoch + 1;
        *state = SearchState {
            epoch,
            ..SearchState::default()
        };
    }

    pub fn snapshot(&self) -> SearchState<T> {
        self.state.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }
}

pub fn provider_search(
    source: Arc<dyn CollectionSource>,
    store: Arc<SelectionStore>,
    config: SearchConfig,
    runtime: Handle,
) -> SearchBox<ProviderSummary> {
    let limit = config.limit;
    SearchBox::new(
        "provider search",
        Arc::new(move |query: String| {
            let source = source.clone();
            async move { source.search_providers(&query, limit).await }.boxed()
        }),
        Arc::new(move |npi: &str| store.set_focused_entity(Some(EntityId::from(npi)))),
        config,
        runtime,
    )
}

pub fn procedure_search(
    source: Arc<dyn CollectionSource>,
    store: Arc<SelectionStore>,
    config: SearchConfig,
    runtime: Handle,
) -> SearchBox<ProcedureSummary> {
    let limit = config.limit;
    SearchBox::new(
        "procedure search",
        Arc::new(move |query: String| {
            let source = source.clone();
            async move { source.search_procedures(&query, limit).await }.boxed()
        }),
        Arc::new(move |code: &str| store.set_focused_category(Some(CategoryId::from(code)))),
        config,
        runtime,
    )
}
