//! Incremental, offset-paginated lists
//!
//! A list is driven by a [`ListQuery`]. Changing the filter or the sort
//! resets the list to offset 0 and bumps its epoch; responses tagged with an
//! older epoch are dropped so a slow page can never overwrite newer results.

mod bindings;
mod controller;

pub use bindings::{
    procedure_providers_filter, provider_procedures_filter, rankings_filter, ProcedureProviders,
    ProviderProcedures, SelectionBoundList, TopProcedures, TopProviders,
};
pub use controller::{ListController, PageSource};

use ahash::AHashSet;

use sd_core::{CategoryId, EntityId, Region};
use sd_data::{Keyed, Page, RemoteError, Sort};

/// Which records a list shows, independent of ordering and paging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub region: Option<Region>,
    pub entity: Option<EntityId>,
    pub category: Option<CategoryId>,
    pub flagged_only: bool,
}

/// One page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub sort: Sort,
    pub offset: usize,
    pub limit: usize,
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First page after a reset; replaces the records
    Initial,
    /// Next page; appends to the records
    More,
}

/// A query tagged with the epoch it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub epoch: u64,
    pub kind: FetchKind,
    pub query: ListQuery,
}

/// What applying a response did to the list
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Replaced { count: usize },
    Appended { added: usize, duplicates: usize },
    Failed(RemoteError),
    /// Response belonged to a superseded query and was ignored
    Stale { current_epoch: u64 },
}

/// Paging state of one list.
///
/// `has_more` is derived from the raw page length before deduplication, so
/// a page made only of duplicates still allows another load.
#[derive(Debug, Clone)]
pub struct ListState<R> {
    records: Vec<R>,
    seen: AHashSet<String>,
    filter: Option<ListFilter>,
    sort: Sort,
    limit: usize,
    has_more: bool,
    loading: bool,
    loading_more: bool,
    epoch: u64,
    error: Option<RemoteError>,
}

impl<R: Keyed + Clone> ListState<R> {
    /// An inactive list. Nothing is fetched until a filter is set.
    pub fn new(sort: Sort, limit: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: AHashSet::new(),
            filter: None,
            sort,
            limit: limit.max(1),
            has_more: false,
            loading: false,
            loading_more: false,
            epoch: 0,
            error: None,
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn filter(&self) -> Option<&ListFilter> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Offset the next page will be requested from
    pub fn offset(&self) -> usize {
        self.records.len()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    /// Replace filter and sort and start over from offset 0.
    ///
    /// Returns the initial page request, or `None` when the list became
    /// inactive (its records are cleared either way).
    pub fn restart(&mut self, filter: Option<ListFilter>, sort: Sort) -> Option<PageRequest> {
        self.epoch += 1;
        self.filter = filter;
        self.sort = sort;
        self.records.clear();
        self.seen.clear();
        self.error = None;
        self.has_more = false;
        self.loading_more = false;
        self.loading = self.filter.is_some();

        let filter = self.filter.clone()?;
        Some(PageRequest {
            epoch: self.epoch,
            kind: FetchKind::Initial,
            query: ListQuery {
                filter,
                sort: self.sort,
                offset: 0,
                limit: self.limit,
            },
        })
    }

    /// Request the next page, unless one is already in flight, the initial
    /// load hasn't finished, or the collection is exhausted.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if !self.has_more || self.loading || self.loading_more {
            return None;
        }
        let filter = self.filter.clone()?;
        self.loading_more = true;
        Some(PageRequest {
            epoch: self.epoch,
            kind: FetchKind::More,
            query: ListQuery {
                filter,
                sort: self.sort,
                offset: self.records.len(),
                limit: self.limit,
            },
        })
    }

    /// Apply a response to the request issued under `epoch`
    pub fn apply(
        &mut self,
        epoch: u64,
        kind: FetchKind,
        result: Result<Vec<R>, RemoteError>,
    ) -> Applied {
        let pending = match kind {
            FetchKind::Initial => self.loading,
            FetchKind::More => self.loading_more,
        };
        if epoch != self.epoch || !pending {
            return Applied::Stale {
                current_epoch: self.epoch,
            };
        }

        match (kind, result) {
            (FetchKind::Initial, Ok(page)) => {
                self.loading = false;
                self.has_more = page.len() >= self.limit;
                self.records.clear();
                self.seen.clear();
                let (added, _) = self.extend(page);
                Applied::Replaced { count: added }
            }
            (FetchKind::More, Ok(page)) => {
                self.loading_more = false;
                self.has_more = page.len() >= self.limit;
                let (added, duplicates) = self.extend(page);
                Applied::Appended { added, duplicates }
            }
            (FetchKind::Initial, Err(err)) => {
                self.loading = false;
                self.has_more = false;
                self.records.clear();
                self.seen.clear();
                self.error = Some(err.clone());
                Applied::Failed(err)
            }
            (FetchKind::More, Err(err)) => {
                // Keep what was already loaded.
                self.loading_more = false;
                self.error = Some(err.clone());
                Applied::Failed(err)
            }
        }
    }

    fn extend(&mut self, page: Vec<R>) -> (usize, usize) {
        let mut added = 0;
        let mut duplicates = 0;
        for record in page {
            if self.seen.insert(record.key().to_string()) {
                self.records.push(record);
                added += 1;
            } else {
                duplicates += 1;
            }
        }
        (added, duplicates)
    }
}
