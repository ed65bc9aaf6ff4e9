//! Monthly spending series for the current selection

use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use sd_core::{CategoryId, EntityId, EventBus, Region, Selection, SelectionChange, SelectionField};
use sd_core::SelectionSubscriber;
use sd_data::schema::MonthlyData;
use sd_data::CollectionSource;

use crate::loader::{Fetcher, Loadable, SingleLoader};

/// Which series the chart shows. Precedence is provider, then procedure,
/// then state, then national.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesScope {
    National,
    Region(Region),
    Entity(EntityId),
    Category(CategoryId),
}

impl SeriesScope {
    pub fn for_selection(selection: &Selection) -> Self {
        if let Some(id) = selection.focused_entity() {
            SeriesScope::Entity(id.clone())
        } else if let Some(code) = selection.focused_category() {
            SeriesScope::Category(code.clone())
        } else if let Some(region) = &selection.region {
            SeriesScope::Region(region.clone())
        } else {
            SeriesScope::National
        }
    }

    pub fn title(&self) -> String {
        match self {
            SeriesScope::National => "National monthly spending".to_string(),
            SeriesScope::Region(region) => format!("{region} monthly spending"),
            SeriesScope::Entity(id) => format!("Provider {id} monthly spending"),
            SeriesScope::Category(code) => format!("{code} monthly spending"),
        }
    }
}

fn fetcher(source: Arc<dyn CollectionSource>) -> Fetcher<SeriesScope, Vec<MonthlyData>> {
    Arc::new(move |scope: SeriesScope| {
        let source = source.clone();
        async move {
            match scope {
                SeriesScope::National => source.national_timeseries().await,
                SeriesScope::Region(region) => {
                    let rows = source.state_timeseries(Some(&region)).await?;
                    Ok(rows
                        .into_iter()
                        .filter(|row| row.state == region.as_str())
                        .map(|row| row.data)
                        .collect())
                }
                SeriesScope::Entity(id) => source.provider_timeseries(&id).await,
                SeriesScope::Category(code) => source.procedure_timeseries(&code).await,
            }
        }
        .boxed()
    })
}

/// Time-series chart model
pub struct TimeSeriesView {
    loader: SingleLoader<SeriesScope, Vec<MonthlyData>>,
}

impl TimeSeriesView {
    pub fn new(source: Arc<dyn CollectionSource>, events: Arc<EventBus>, runtime: Handle) -> Self {
        Self {
            loader: SingleLoader::new("time series", fetcher(source), runtime).with_events(events),
        }
    }

    pub fn sync(&self, selection: &Selection) -> Option<JoinHandle<()>> {
        self.loader.set_key(Some(SeriesScope::for_selection(selection)))
    }

    pub fn snapshot(&self) -> Loadable<SeriesScope, Vec<MonthlyData>> {
        self.loader.snapshot()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }
}

impl SelectionSubscriber for TimeSeriesView {
    fn depends_on(&self) -> &[SelectionField] {
        &[SelectionField::Region, SelectionField::Entity, SelectionField::Category]
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        self.sync(&change.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::Focus;
    use sd_data::sources::memory::Dataset;
    use sd_data::MemorySource;

    #[test]
    fn test_scope_precedence() {
        let tx = Some(Region::from("TX"));
        assert_eq!(SeriesScope::for_selection(&Selection::default()), SeriesScope::National);
        assert_eq!(
            SeriesScope::for_selection(&Selection::new(tx.clone(), Focus::None)),
            SeriesScope::Region(Region::from("TX"))
        );
        assert_eq!(
            SeriesScope::for_selection(&Selection::new(tx.clone(), Focus::Category("T1019".into()))),
            SeriesScope::Category("T1019".into())
        );
        assert_eq!(
            SeriesScope::for_selection(&Selection::new(tx, Focus::Entity("1".into()))),
            SeriesScope::Entity("1".into())
        );
    }

    #[tokio::test]
    async fn test_region_series_is_one_state() {
        let source = Arc::new(MemorySource::new(Dataset::demo()));
        let national = source.national_timeseries().await.unwrap();

        let view = TimeSeriesView::new(source, Arc::new(EventBus::new()), Handle::current());
        view.sync(&Selection::new(Some(Region::from("CA")), Focus::None))
            .unwrap()
            .await
            .unwrap();

        let series = view.snapshot().value.unwrap();
        assert_eq!(series.len(), national.len());
        let ca: f64 = series.iter().map(|m| m.total_paid).sum();
        let all: f64 = national.iter().map(|m| m.total_paid).sum();
        assert!(ca > 0.0 && ca < all);
    }
}
