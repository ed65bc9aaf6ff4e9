//! Lists bound to collection endpoints and to the selection

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use sd_core::{Selection, SelectionChange, SelectionField, SelectionSubscriber};
use sd_data::schema::{ProcedureProvider, ProcedureSummary, ProviderProcedure, ProviderSummary};
use sd_data::{CollectionSource, Keyed, RemoteError};

use super::{ListController, ListFilter, ListQuery, PageSource};

/// Provider ranking. With `flagged_only` the ranking is served from the
/// exclusion-list endpoint instead.
pub struct TopProviders(pub Arc<dyn CollectionSource>);

#[async_trait]
impl PageSource<ProviderSummary> for TopProviders {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<ProviderSummary>, RemoteError> {
        let region = query.filter.region.as_ref();
        if query.filter.flagged_only {
            let page = self.0.excluded_providers(region, query.sort, query.page()).await?;
            return Ok(page.providers.into_iter().map(ProviderSummary::from).collect());
        }
        self.0.top_providers(region, query.sort, query.page()).await
    }
}

pub struct TopProcedures(pub Arc<dyn CollectionSource>);

#[async_trait]
impl PageSource<ProcedureSummary> for TopProcedures {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<ProcedureSummary>, RemoteError> {
        self.0.top_procedures(query.sort, query.page()).await
    }
}

/// Procedures billed by the focused provider
pub struct ProviderProcedures(pub Arc<dyn CollectionSource>);

#[async_trait]
impl PageSource<ProviderProcedure> for ProviderProcedures {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<ProviderProcedure>, RemoteError> {
        match &query.filter.entity {
            Some(id) => self.0.provider_procedures(id, query.sort, query.page()).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Providers billing the focused procedure, within the selected region
pub struct ProcedureProviders(pub Arc<dyn CollectionSource>);

#[async_trait]
impl PageSource<ProcedureProvider> for ProcedureProviders {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<ProcedureProvider>, RemoteError> {
        match &query.filter.category {
            Some(code) => {
                self.0
                    .procedure_providers(code, query.filter.region.as_ref(), query.sort, query.page())
                    .await
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Rankings follow the region and the flagged-only filter
pub fn rankings_filter(selection: &Selection) -> Option<ListFilter> {
    Some(ListFilter {
        region: selection.region.clone(),
        flagged_only: selection.aux.show_only_flagged,
        ..Default::default()
    })
}

/// Active only while a provider is focused
pub fn provider_procedures_filter(selection: &Selection) -> Option<ListFilter> {
    selection.focused_entity().map(|id| ListFilter {
        entity: Some(id.clone()),
        ..Default::default()
    })
}

/// Active only while a procedure is focused
pub fn procedure_providers_filter(selection: &Selection) -> Option<ListFilter> {
    selection.focused_category().map(|code| ListFilter {
        region: selection.region.clone(),
        category: Some(code.clone()),
        ..Default::default()
    })
}

/// A [`ListController`] whose filter is derived from the selection
pub struct SelectionBoundList<R> {
    list: ListController<R>,
    derive: fn(&Selection) -> Option<ListFilter>,
    fields: &'static [SelectionField],
}

impl<R> SelectionBoundList<R>
where
    R: Keyed + Clone + Send + Sync + 'static,
{
    pub fn new(
        list: ListController<R>,
        derive: fn(&Selection) -> Option<ListFilter>,
        fields: &'static [SelectionField],
    ) -> Self {
        Self { list, derive, fields }
    }

    pub fn list(&self) -> &ListController<R> {
        &self.list
    }

    /// Bring the list in line with `selection`
    pub fn sync(&self, selection: &Selection) -> Option<JoinHandle<()>> {
        self.list.set_filter((self.derive)(selection))
    }
}

impl<R> SelectionSubscriber for SelectionBoundList<R>
where
    R: Keyed + Clone + Send + Sync + 'static,
{
    fn depends_on(&self) -> &[SelectionField] {
        self.fields
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        self.sync(&change.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::{CategoryId, EntityId, Focus, Region, SelectionStore};
    use sd_data::sources::memory::Dataset;
    use sd_data::{MemorySource, Sort};
    use tokio::runtime::Handle;

    fn demo() -> Arc<dyn CollectionSource> {
        Arc::new(MemorySource::new(Dataset::demo()))
    }

    #[test]
    fn test_filters_follow_focus() {
        let mut selection = Selection::new(Some(Region::from("TX")), Focus::Entity(EntityId::from("1")));
        assert!(provider_procedures_filter(&selection).is_some());
        assert!(procedure_providers_filter(&selection).is_none());

        selection.focus = Focus::Category(CategoryId::from("T1019"));
        let filter = procedure_providers_filter(&selection).unwrap();
        assert_eq!(filter.region, Some(Region::from("TX")));
        assert!(provider_procedures_filter(&selection).is_none());

        selection.aux.show_only_flagged = true;
        assert!(rankings_filter(&selection).unwrap().flagged_only);
    }

    #[tokio::test]
    async fn test_flagged_rankings_use_exclusion_list() {
        let list = ListController::new(
            "top providers",
            Arc::new(TopProviders(demo())),
            Sort::default(),
            25,
            Handle::current(),
        );
        let filter = ListFilter {
            flagged_only: true,
            ..Default::default()
        };
        list.set_filter(Some(filter)).unwrap().await.unwrap();

        let state = list.snapshot();
        assert!(!state.records().is_empty());
        assert!(state.records().iter().all(|p| p.is_excluded == Some(true)));
    }

    #[tokio::test]
    async fn test_bound_list_follows_store() {
        let store = SelectionStore::default();
        let bound = Arc::new(SelectionBoundList::new(
            ListController::new(
                "procedure providers",
                Arc::new(ProcedureProviders(demo())),
                Sort::default(),
                25,
                Handle::current(),
            ),
            procedure_providers_filter,
            &[SelectionField::Category, SelectionField::Region],
        ));
        store.add_subscriber(bound.clone());
        assert!(bound.sync(&store.get()).is_none());

        store.set_focused_category(Some(CategoryId::from("T1019")));
        store.set_region(Some(Region::from("TX")));
        while bound.list().is_loading() {
            tokio::task::yield_now().await;
        }

        let state = bound.list().snapshot();
        assert!(!state.records().is_empty());
        assert!(state
            .records()
            .iter()
            .all(|p| p.state.as_deref() == Some("TX")));

        store.set_focused_category(None);
        assert!(bound.list().snapshot().filter().is_none());
        assert!(bound.list().snapshot().records().is_empty());
    }
}
