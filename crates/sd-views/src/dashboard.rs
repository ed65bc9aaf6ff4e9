//! Dashboard wiring: one store, one address, every view subscribed

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::info;

use sd_core::events::events::SelectionChanged;
use sd_core::{
    EventBus, NavigationHistory, SelectionChange, SelectionField, SelectionStore,
    SelectionSubscriber, UrlSync,
};
use sd_data::schema::{Overview, ProcedureSummary, ProviderSummary};
use sd_data::{CollectionSource, Sort};

use crate::detail::{ProcedurePanel, ProviderPanel};
use crate::list::{rankings_filter, ListController, SelectionBoundList, TopProcedures, TopProviders};
use crate::loader::SingleLoader;
use crate::map::MapController;
use crate::reimbursement::ReimbursementChart;
use crate::search::{procedure_search, provider_search, SearchBox, SearchConfig};
use crate::timeseries::TimeSeriesView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Page size of every paginated list
    pub page_size: usize,
    pub map_base_limit: usize,
    pub map_overlay_limit: usize,
    /// Bars in the reimbursement chart
    pub reimbursement_limit: usize,
    pub search: SearchConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            map_base_limit: 5000,
            map_overlay_limit: 2000,
            reimbursement_limit: 25,
            search: SearchConfig::default(),
        }
    }
}

/// Republishes selection changes on the event bus
struct SelectionRelay {
    events: Arc<EventBus>,
}

impl SelectionSubscriber for SelectionRelay {
    fn on_selection_change(&self, change: &SelectionChange) {
        self.events.publish(SelectionChanged {
            change: change.clone(),
        });
    }
}

pub struct Dashboard<H: NavigationHistory> {
    store: Arc<SelectionStore>,
    events: Arc<EventBus>,
    _relay: Arc<SelectionRelay>,
    url: Arc<UrlSync<H>>,
    overview: SingleLoader<(), Overview>,
    top_providers: Arc<SelectionBoundList<ProviderSummary>>,
    top_procedures: Arc<SelectionBoundList<ProcedureSummary>>,
    provider_panel: Arc<ProviderPanel>,
    procedure_panel: Arc<ProcedurePanel>,
    timeseries: Arc<TimeSeriesView>,
    map: Arc<MapController>,
    reimbursement: Arc<ReimbursementChart>,
    provider_search: SearchBox<ProviderSummary>,
    procedure_search: SearchBox<ProcedureSummary>,
}

impl<H: NavigationHistory + 'static> Dashboard<H> {
    /// Build every view, seed the selection from `history`'s current
    /// address, and issue the initial loads.
    pub fn new(
        source: Arc<dyn CollectionSource>,
        history: H,
        config: DashboardConfig,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let store = Arc::new(SelectionStore::default());
        let relay = Arc::new(SelectionRelay {
            events: events.clone(),
        });
        store.add_subscriber(relay.clone());

        let overview_source = source.clone();
        let overview = SingleLoader::new(
            "overview",
            Arc::new(move |()| {
                let source = overview_source.clone();
                async move { source.overview().await }.boxed()
            }),
            runtime.clone(),
        )
        .with_events(events.clone());

        let top_providers = Arc::new(SelectionBoundList::new(
            ListController::new(
                "top providers",
                Arc::new(TopProviders(source.clone())),
                Sort::default(),
                config.page_size,
                runtime.clone(),
            )
            .with_events(events.clone()),
            rankings_filter,
            &[SelectionField::Region, SelectionField::AuxFilters],
        ));
        let top_procedures = Arc::new(SelectionBoundList::new(
            ListController::new(
                "top procedures",
                Arc::new(TopProcedures(source.clone())),
                Sort::default(),
                config.page_size,
                runtime.clone(),
            )
            .with_events(events.clone()),
            |_| Some(Default::default()),
            &[],
        ));
        let provider_panel = Arc::new(ProviderPanel::new(
            source.clone(),
            config.page_size,
            events.clone(),
            runtime.clone(),
        ));
        let procedure_panel = Arc::new(ProcedurePanel::new(
            source.clone(),
            config.page_size,
            events.clone(),
            runtime.clone(),
        ));
        let timeseries = Arc::new(TimeSeriesView::new(source.clone(), events.clone(), runtime.clone()));
        let map = Arc::new(MapController::new(
            store.clone(),
            source.clone(),
            config.map_base_limit,
            config.map_overlay_limit,
            events.clone(),
            runtime.clone(),
        ));

        let reimbursement = Arc::new(ReimbursementChart::new(
            source.clone(),
            config.reimbursement_limit,
            config.search,
            events.clone(),
            runtime.clone(),
        ));

        store.add_subscriber(top_providers.clone());
        store.add_subscriber(top_procedures.clone());
        store.add_subscriber(provider_panel.clone());
        store.add_subscriber(procedure_panel.clone());
        store.add_subscriber(timeseries.clone());
        store.add_subscriber(map.clone());
        store.add_subscriber(reimbursement.clone());

        let provider_search =
            provider_search(source.clone(), store.clone(), config.search, runtime.clone());
        let procedure_search = procedure_search(source, store.clone(), config.search, runtime);

        let url = UrlSync::install(store.clone(), history, events.clone());
        info!(address = %url.current(), "dashboard ready");

        let dashboard = Self {
            store,
            events,
            _relay: relay,
            url,
            overview,
            top_providers,
            top_procedures,
            provider_panel,
            procedure_panel,
            timeseries,
            map,
            reimbursement,
            provider_search,
            procedure_search,
        };
        dashboard.sync_all();
        dashboard
    }
}

impl<H: NavigationHistory> Dashboard<H> {
    /// Bring every view in line with the current selection. Views whose
    /// query is unchanged don't refetch.
    fn sync_all(&self) {
        let selection = self.store.get();
        self.overview.set_key(Some(()));
        self.top_providers.sync(&selection);
        self.top_procedures.sync(&selection);
        self.provider_panel.sync(&selection);
        self.procedure_panel.sync(&selection);
        self.timeseries.sync(&selection);
        self.map.sync(&selection);
        self.reimbursement.sync(&selection);
    }

    pub fn store(&self) -> &Arc<SelectionStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn url(&self) -> &Arc<UrlSync<H>> {
        &self.url
    }

    pub fn overview(&self) -> &SingleLoader<(), Overview> {
        &self.overview
    }

    pub fn top_providers(&self) -> &ListController<ProviderSummary> {
        self.top_providers.list()
    }

    pub fn top_procedures(&self) -> &ListController<ProcedureSummary> {
        self.top_procedures.list()
    }

    pub fn provider_panel(&self) -> &ProviderPanel {
        &self.provider_panel
    }

    pub fn procedure_panel(&self) -> &ProcedurePanel {
        &self.procedure_panel
    }

    pub fn timeseries(&self) -> &TimeSeriesView {
        &self.timeseries
    }

    pub fn map(&self) -> &MapController {
        &self.map
    }

    pub fn reimbursement(&self) -> &ReimbursementChart {
        &self.reimbursement
    }

    pub fn provider_search(&self) -> &SearchBox<ProviderSummary> {
        &self.provider_search
    }

    pub fn procedure_search(&self) -> &SearchBox<ProcedureSummary> {
        &self.procedure_search
    }

    /// True when no view has a request in flight
    pub fn is_idle(&self) -> bool {
        !(self.overview.is_loading()
            || self.top_providers().is_loading()
            || self.top_procedures().is_loading()
            || self.provider_panel.is_loading()
            || self.procedure_panel.is_loading()
            || self.timeseries.is_loading()
            || self.map.is_loading()
            || self.reimbursement.is_loading()
            || self.provider_search.is_loading()
            || self.procedure_search.is_loading())
    }

    /// Wait until every view has settled
    pub async fn settled(&self) {
        while !self.is_idle() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
