//! Detail panels for the focused provider or procedure

use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;

use sd_core::{CategoryId, EntityId, EventBus, Selection, SelectionChange, SelectionField};
use sd_core::SelectionSubscriber;
use sd_data::schema::{ProcedureDetail, ProcedureProvider, ProviderDetail, ProviderProcedure};
use sd_data::{CollectionSource, Sort};

use crate::list::{
    procedure_providers_filter, provider_procedures_filter, ListController, ProcedureProviders,
    ProviderProcedures,
};
use crate::loader::{Loadable, SingleLoader};

/// Detail and billed procedures of the focused provider
pub struct ProviderPanel {
    detail: SingleLoader<EntityId, ProviderDetail>,
    procedures: ListController<ProviderProcedure>,
}

impl ProviderPanel {
    pub fn new(
        source: Arc<dyn CollectionSource>,
        page_size: usize,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let fetch_source = source.clone();
        let detail = SingleLoader::new(
            "provider detail",
            Arc::new(move |id: EntityId| {
                let source = fetch_source.clone();
                async move { source.provider_detail(&id).await }.boxed()
            }),
            runtime.clone(),
        )
        .with_events(events.clone());

        let procedures = ListController::new(
            "provider procedures",
            Arc::new(ProviderProcedures(source)),
            Sort::default(),
            page_size,
            runtime,
        )
        .with_events(events);

        Self { detail, procedures }
    }

    pub fn sync(&self, selection: &Selection) {
        self.detail.set_key(selection.focused_entity().cloned());
        self.procedures.set_filter(provider_procedures_filter(selection));
    }

    pub fn detail(&self) -> Loadable<EntityId, ProviderDetail> {
        self.detail.snapshot()
    }

    pub fn procedures(&self) -> &ListController<ProviderProcedure> {
        &self.procedures
    }

    pub fn is_loading(&self) -> bool {
        self.detail.is_loading() || self.procedures.is_loading()
    }
}

impl SelectionSubscriber for ProviderPanel {
    fn depends_on(&self) -> &[SelectionField] {
        &[SelectionField::Entity]
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        self.sync(&change.current);
    }
}

/// Detail and billing providers of the focused procedure. The provider list
/// is narrowed to the selected region.
pub struct ProcedurePanel {
    detail: SingleLoader<CategoryId, ProcedureDetail>,
    providers: ListController<ProcedureProvider>,
}

impl ProcedurePanel {
    pub fn new(
        source: Arc<dyn CollectionSource>,
        page_size: usize,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let fetch_source = source.clone();
        let detail = SingleLoader::new(
            "procedure detail",
            Arc::new(move |code: CategoryId| {
                let source = fetch_source.clone();
                async move { source.procedure_detail(&code).await }.boxed()
            }),
            runtime.clone(),
        )
        .with_events(events.clone());

        let providers = ListController::new(
            "procedure providers",
            Arc::new(ProcedureProviders(source)),
            Sort::default(),
            page_size,
            runtime,
        )
        .with_events(events);

        Self { detail, providers }
    }

    pub fn sync(&self, selection: &Selection) {
        self.detail.set_key(selection.focused_category().cloned());
        self.providers.set_filter(procedure_providers_filter(selection));
    }

    pub fn detail(&self) -> Loadable<CategoryId, ProcedureDetail> {
        self.detail.snapshot()
    }

    pub fn providers(&self) -> &ListController<ProcedureProvider> {
        &self.providers
    }

    pub fn is_loading(&self) -> bool {
        self.detail.is_loading() || self.providers.is_loading()
    }
}

impl SelectionSubscriber for ProcedurePanel {
    fn depends_on(&self) -> &[SelectionField] {
        &[SelectionField::Category, SelectionField::Region]
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        self.sync(&change.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::{Focus, Region};
    use sd_data::sources::memory::Dataset;
    use sd_data::MemorySource;

    async fn settle(panel: &ProcedurePanel) {
        while panel.is_loading() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_procedure_panel_detail_and_providers() {
        let panel = ProcedurePanel::new(
            Arc::new(MemorySource::new(Dataset::demo())),
            25,
            Arc::new(EventBus::new()),
            Handle::current(),
        );
        panel.sync(&Selection::new(Some(Region::from("NY")), Focus::Category("T1019".into())));
        settle(&panel).await;

        let detail = panel.detail().value.unwrap();
        assert_eq!(detail.hcpcs_code, "T1019");
        let providers = panel.providers().snapshot();
        assert!(providers.records().iter().all(|p| p.state.as_deref() == Some("NY")));

        panel.sync(&Selection::default());
        assert!(panel.detail().value.is_none());
        assert!(panel.providers().snapshot().records().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_shows_error() {
        let panel = ProviderPanel::new(
            Arc::new(MemorySource::new(Dataset::demo())),
            25,
            Arc::new(EventBus::new()),
            Handle::current(),
        );
        panel.sync(&Selection::new(None, Focus::Entity("0000000000".into())));
        while panel.is_loading() {
            tokio::task::yield_now().await;
        }

        let detail = panel.detail();
        assert_eq!(detail.error.and_then(|e| e.status()), Some(404));
        // the procedures list is a separate fetch and simply comes back empty
        assert!(panel.procedures().snapshot().error().is_none());
    }
}
