//! Average reimbursement per claim for one procedure
//!
//! The chart picks its procedure through its own search box, independently
//! of the shared focus, and follows the dashboard region for the state
//! benchmark. Changing the sort direction refetches from the service; loaded
//! bars are never reordered locally.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use sd_core::{
    CategoryId, EventBus, Region, Selection, SelectionChange, SelectionField, SelectionSubscriber,
};
use sd_data::schema::{ProcedureAvgReimbursement, ProcedureSummary};
use sd_data::{CollectionSource, SortDir};

use crate::loader::{Loadable, SingleLoader};
use crate::search::{SearchBox, SearchConfig};

/// Results shown in the chart's procedure dropdown
pub const REIMBURSEMENT_SEARCH_LIMIT: usize = 8;

/// What the bars are loaded for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimbursementQuery {
    pub code: CategoryId,
    pub region: Option<Region>,
    pub dir: SortDir,
}

#[derive(Debug, Clone, Default)]
struct Controls {
    code: Option<CategoryId>,
    label: Option<String>,
    region: Option<Region>,
    dir: SortDir,
}

impl Controls {
    fn query(&self) -> Option<ReimbursementQuery> {
        Some(ReimbursementQuery {
            code: self.code.clone()?,
            region: self.region.clone(),
            dir: self.dir,
        })
    }
}

struct Bars {
    controls: Mutex<Controls>,
    loader: SingleLoader<ReimbursementQuery, ProcedureAvgReimbursement>,
}

impl Bars {
    /// Apply `f` and move the loader to the resulting query. The controls
    /// stay locked until the loader has the new key, so concurrent updates
    /// land in order.
    fn update(&self, f: impl FnOnce(&mut Controls)) -> Option<JoinHandle<()>> {
        let mut controls = self.controls.lock();
        f(&mut controls);
        self.loader.set_key(controls.query())
    }
}

/// Snapshot of the chart for rendering
#[derive(Debug, Clone)]
pub struct ReimbursementState {
    pub code: Option<CategoryId>,
    /// `CODE - description` of the picked procedure
    pub label: Option<String>,
    pub dir: SortDir,
    pub bars: Loadable<ReimbursementQuery, ProcedureAvgReimbursement>,
}

pub struct ReimbursementChart {
    bars: Arc<Bars>,
    search: SearchBox<ProcedureSummary>,
}

impl ReimbursementChart {
    pub fn new(
        source: Arc<dyn CollectionSource>,
        limit: usize,
        search: SearchConfig,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let bar_source = source.clone();
        let loader = SingleLoader::new(
            "reimbursement chart",
            Arc::new(move |query: ReimbursementQuery| {
                let source = bar_source.clone();
                async move {
                    source
                        .procedure_avg_reimbursement(
                            &query.code,
                            query.region.as_ref(),
                            query.dir,
                            limit,
                        )
                        .await
                }
                .boxed()
            }),
            runtime.clone(),
        )
        .with_events(events);

        let bars = Arc::new(Bars {
            controls: Mutex::new(Controls::default()),
            loader,
        });

        let picked = bars.clone();
        let search_limit = REIMBURSEMENT_SEARCH_LIMIT;
        let search = SearchBox::new(
            "reimbursement search",
            Arc::new(move |query: String| {
                let source = source.clone();
                async move { source.search_procedures(&query, search_limit).await }.boxed()
            }),
            Arc::new(move |code: &str| {
                picked.update(|c| {
                    c.code = Some(CategoryId::from(code));
                    c.label = None;
                });
            }),
            SearchConfig {
                limit: search_limit,
                ..search
            },
            runtime,
        );

        Self { bars, search }
    }

    pub fn search(&self) -> &SearchBox<ProcedureSummary> {
        &self.search
    }

    /// Chart the procedure `code`. The label comes from the matching search
    /// result when there is one.
    pub fn select(&self, code: &str) {
        let label = self
            .search
            .snapshot()
            .results
            .iter()
            .find(|p| p.hcpcs_code == code)
            .map(|p| {
                let description = p.description.as_deref().unwrap_or(p.hcpcs_code.as_str());
                format!("{} - {description}", p.hcpcs_code)
            });
        self.search.select(code);
        if label.is_some() {
            self.bars.controls.lock().label = label;
        }
    }

    /// Show the highest (`Desc`) or lowest (`Asc`) averages. A change
    /// discards the loaded bars and fetches again.
    pub fn set_sort(&self, dir: SortDir) -> Option<JoinHandle<()>> {
        self.bars.update(|c| c.dir = dir)
    }

    /// Stop charting
    pub fn clear(&self) {
        self.bars.update(|c| {
            c.code = None;
            c.label = None;
        });
    }

    pub fn sync(&self, selection: &Selection) {
        let region = selection.region.clone();
        self.bars.update(|c| c.region = region);
    }

    pub fn snapshot(&self) -> ReimbursementState {
        let controls = self.bars.controls.lock().clone();
        ReimbursementState {
            label: controls
                .label
                .or_else(|| controls.code.as_ref().map(|c| c.to_string())),
            code: controls.code,
            dir: controls.dir,
            bars: self.bars.loader.snapshot(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.bars.loader.is_loading() || self.search.is_loading()
    }
}

impl SelectionSubscriber for ReimbursementChart {
    fn depends_on(&self) -> &[SelectionField] {
        &[SelectionField::Region]
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        self.sync(&change.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::SelectionStore;
    use sd_data::sources::memory::Dataset;
    use sd_data::MemorySource;
    use std::time::Duration;

    fn chart() -> ReimbursementChart {
        ReimbursementChart::new(
            Arc::new(MemorySource::new(Dataset::demo())),
            25,
            SearchConfig::default(),
            Arc::new(EventBus::new()),
            Handle::current(),
        )
    }

    async fn settle(chart: &ReimbursementChart) {
        while chart.is_loading() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn averages(state: &ReimbursementState) -> Vec<f64> {
        state
            .bars
            .value
            .as_ref()
            .map(|v| v.providers.iter().map(|p| p.avg_per_claim).collect())
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_then_select_charts_the_procedure() {
        let chart = chart();
        chart.search().input("T1019");
        settle(&chart).await;
        let results = chart.search().snapshot().results;
        assert!(!results.is_empty());
        assert!(results.len() <= REIMBURSEMENT_SEARCH_LIMIT);

        chart.select("T1019");
        settle(&chart).await;

        let state = chart.snapshot();
        assert_eq!(state.code, Some(CategoryId::from("T1019")));
        assert!(state.label.unwrap().starts_with("T1019 - Personal care"));
        assert!(chart.search().snapshot().query.is_empty());

        let bars = state.bars.value.unwrap();
        assert!(bars.national_avg.is_some());
        assert!(bars.state_avg.is_none());
        let avgs: Vec<f64> = bars.providers.iter().map(|p| p.avg_per_claim).collect();
        assert!(avgs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_sort_change_discards_bars_and_refetches() {
        let chart = chart();
        chart.select("T1019");
        settle(&chart).await;
        let highest = averages(&chart.snapshot());
        assert!(!highest.is_empty());

        let task = chart.set_sort(SortDir::Asc).unwrap();
        let pending = chart.snapshot();
        assert!(pending.bars.value.is_none());
        assert!(pending.bars.loading);

        task.await.unwrap();
        let lowest = averages(&chart.snapshot());
        assert!(lowest.windows(2).all(|w| w[0] <= w[1]));
        assert!(lowest[0] <= *highest.last().unwrap());

        assert!(chart.set_sort(SortDir::Asc).is_none());
    }

    #[tokio::test]
    async fn test_sort_without_procedure_does_not_fetch() {
        let chart = chart();
        assert!(chart.set_sort(SortDir::Asc).is_none());
        let state = chart.snapshot();
        assert_eq!(state.dir, SortDir::Asc);
        assert!(state.bars.key.is_none());
    }

    #[tokio::test]
    async fn test_region_adds_state_benchmark() {
        let chart = chart();
        let chart = Arc::new(chart);
        let store = Arc::new(SelectionStore::default());
        store.add_subscriber(chart.clone());

        chart.select("T1019");
        store.set_region(Some(Region::from("TX")));
        settle(&chart).await;

        let state = chart.snapshot();
        assert_eq!(state.bars.key.and_then(|q| q.region), Some(Region::from("TX")));
        let bars = state.bars.value.unwrap();
        assert!(bars.state_avg.is_some());
        assert!(bars.providers.iter().all(|p| p.state.as_deref() == Some("TX")));

        chart.clear();
        assert!(chart.snapshot().bars.key.is_none());
    }
}
