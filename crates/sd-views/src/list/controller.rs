//! Async driver for a [`ListState`]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sd_core::events::events::{FetchFailed, StaleResponseDropped};
use sd_core::{EventBus, ViewId};
use sd_data::{Keyed, RemoteError, Sort};

use super::{Applied, ListFilter, ListQuery, ListState, PageRequest};

/// Fetches one page of a collection
#[async_trait]
pub trait PageSource<R>: Send + Sync {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<R>, RemoteError>;
}

/// Owns one list's state and issues its page requests on the runtime.
///
/// Requests are never cancelled; superseded responses are discarded by
/// epoch when they arrive.
pub struct ListController<R> {
    id: ViewId,
    name: String,
    state: Arc<Mutex<ListState<R>>>,
    source: Arc<dyn PageSource<R>>,
    events: Option<Arc<EventBus>>,
    runtime: Handle,
}

impl<R> ListController<R>
where
    R: Keyed + Clone + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn PageSource<R>>,
        sort: Sort,
        limit: usize,
        runtime: Handle,
    ) -> Self {
        Self {
            id: ViewId::new_v4(),
            name: name.into(),
            state: Arc::new(Mutex::new(ListState::new(sort, limit))),
            source,
            events: None,
            runtime,
        }
    }

    /// Publish fetch failures and dropped responses on `events`
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the filter. Reloads from offset 0 only when it differs from the
    /// current one; `None` deactivates the list.
    pub fn set_filter(&self, filter: Option<ListFilter>) -> Option<JoinHandle<()>> {
        let request = {
            let mut state = self.state.lock();
            if state.filter() == filter.as_ref() {
                return None;
            }
            let sort = state.sort();
            state.restart(filter, sort)
        };
        request.map(|r| self.spawn(r))
    }

    /// Change the ordering. The list is reloaded from the service; loaded
    /// records are never re-sorted locally.
    pub fn set_sort(&self, sort: Sort) -> Option<JoinHandle<()>> {
        let request = {
            let mut state = self.state.lock();
            if state.sort() == sort {
                return None;
            }
            let filter = state.filter().cloned();
            state.restart(filter, sort)
        };
        request.map(|r| self.spawn(r))
    }

    /// Reload the current query from offset 0
    pub fn refresh(&self) -> Option<JoinHandle<()>> {
        let request = {
            let mut state = self.state.lock();
            let filter = state.filter().cloned();
            let sort = state.sort();
            state.restart(filter, sort)
        };
        request.map(|r| self.spawn(r))
    }

    /// Fetch the next page. No-op while another load is in flight or when
    /// the collection is exhausted.
    pub fn load_more(&self) -> Option<JoinHandle<()>> {
        let request = self.state.lock().begin_load_more();
        request.map(|r| self.spawn(r))
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ListState<R> {
        self.state.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        let state = self.state.lock();
        state.is_loading() || state.is_loading_more()
    }

    fn spawn(&self, request: PageRequest) -> JoinHandle<()> {
        let state = self.state.clone();
        let source = self.source.clone();
        let events = self.events.clone();
        let view_id = self.id;
        let name = self.name.clone();

        debug!(
            view = %name,
            epoch = request.epoch,
            offset = request.query.offset,
            kind = ?request.kind,
            "fetching page"
        );

        self.runtime.spawn(async move {
            let result = source.fetch_page(&request.query).await;
            let applied = state.lock().apply(request.epoch, request.kind, result);

            match applied {
                Applied::Replaced { count } => {
                    debug!(view = %name, count, "page loaded");
                }
                Applied::Appended { added, duplicates } => {
                    debug!(view = %name, added, duplicates, "page appended");
                }
                Applied::Stale { current_epoch } => {
                    debug!(view = %name, epoch = request.epoch, current_epoch, "dropping stale page");
                    if let Some(events) = events {
                        events.publish(StaleResponseDropped {
                            view_id,
                            epoch: request.epoch,
                            current_epoch,
                        });
                    }
                }
                Applied::Failed(err) => {
                    warn!(view = %name, error = %err, "page fetch failed");
                    if let Some(events) = events {
                        events.publish(FetchFailed {
                            view_id,
                            view_name: name,
                            endpoint: err.endpoint().to_string(),
                            status: err.status(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        })
    }
}
