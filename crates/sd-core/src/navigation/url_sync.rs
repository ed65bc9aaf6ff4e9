//! Two-way synchronization between the selection and the navigable address

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{MemoryHistory, NavigableAddress, NavigationHistory};
use crate::events::{events::Navigated, EventBus};
use crate::selection::{
    ChangeOrigin, SelectionChange, SelectionField, SelectionStore, SelectionSubscriber,
};

const ADDRESSED_FIELDS: &[SelectionField] = &[
    SelectionField::Region,
    SelectionField::Entity,
    SelectionField::Category,
];

/// Keeps a [`NavigationHistory`] and a [`SelectionStore`] consistent.
///
/// State -> address: user mutations push a new history entry when the
/// address changes. Address -> state: [`UrlSync::on_navigate`] replaces the
/// selection with origin `Navigation`, which this subscriber ignores, so
/// traversal never pushes.
pub struct UrlSync<H: NavigationHistory> {
    store: Arc<SelectionStore>,
    history: Mutex<H>,
    events: Arc<EventBus>,
}

impl<H: NavigationHistory + 'static> UrlSync<H> {
    /// Seed the store from the history's current address and start syncing
    pub fn install(store: Arc<SelectionStore>, history: H, events: Arc<EventBus>) -> Arc<Self> {
        let sync = Arc::new(Self {
            store,
            history: Mutex::new(history),
            events,
        });
        sync.on_navigate();
        sync.store.add_subscriber(sync.clone());
        sync
    }
}

impl<H: NavigationHistory> UrlSync<H> {
    /// Apply the history's current address to the store. Call after any
    /// externally triggered navigation (back, forward, pasted link).
    pub fn on_navigate(&self) {
        let address = self.history.lock().current();
        let mut selection = address.to_selection();
        // Not part of the address, so traversal keeps the live value.
        selection.aux = self.store.get().aux;

        info!(%address, "applying navigation");
        self.store.replace(selection, ChangeOrigin::Navigation);
        self.events.publish(Navigated {
            address: address.to_string(),
            pushed: false,
        });
    }

    /// Current address of the underlying history
    pub fn current(&self) -> NavigableAddress {
        self.history.lock().current()
    }

    /// Number of history entries
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Run `f` against the history while holding its lock
    pub fn with_history<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.history.lock())
    }
}

impl UrlSync<MemoryHistory> {
    /// Step back and re-sync. Returns false at the first entry.
    pub fn back(&self) -> bool {
        let moved = self.history.lock().back().is_some();
        if moved {
            self.on_navigate();
        }
        moved
    }

    /// Step forward and re-sync. Returns false at the last entry.
    pub fn forward(&self) -> bool {
        let moved = self.history.lock().forward().is_some();
        if moved {
            self.on_navigate();
        }
        moved
    }
}

impl<H: NavigationHistory> SelectionSubscriber for UrlSync<H> {
    fn depends_on(&self) -> &[SelectionField] {
        ADDRESSED_FIELDS
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        if change.origin == ChangeOrigin::Navigation {
            return;
        }

        let address = NavigableAddress::from_selection(&change.current);
        let mut history = self.history.lock();
        if history.current() == address {
            debug!(%address, "address unchanged, not pushing");
            return;
        }
        history.push(address.clone());
        drop(history);

        info!(%address, "pushed history entry");
        self.events.publish(Navigated {
            address: address.to_string(),
            pushed: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CategoryId, EntityId, Region};
    use crate::selection::{Focus, Selection};

    fn setup(href: &str) -> (Arc<SelectionStore>, Arc<UrlSync<MemoryHistory>>) {
        let store = Arc::new(SelectionStore::default());
        let history = MemoryHistory::new(NavigableAddress::parse(href));
        let sync = UrlSync::install(store.clone(), history, Arc::new(EventBus::new()));
        (store, sync)
    }

    #[test]
    fn test_initial_address_seeds_store_without_push() {
        let (store, sync) = setup("/provider/1234567890?state=TX");

        assert_eq!(
            store.get(),
            Selection::new(Some(Region::from("TX")), Focus::Entity("1234567890".into()))
        );
        assert_eq!(sync.history_len(), 1);
    }

    #[test]
    fn test_focus_category_scenario() {
        let (store, sync) = setup("/provider/1234567890?state=TX");

        store.set_focused_category(Some(CategoryId::from("A1234")));

        let sel = store.get();
        assert_eq!(sel.region, Some(Region::from("TX")));
        assert!(sel.focused_entity().is_none());
        assert_eq!(sel.focused_category(), Some(&CategoryId::from("A1234")));
        assert_eq!(sync.current().to_string(), "/procedure/A1234?state=TX");
        assert_eq!(sync.history_len(), 2);
    }

    #[test]
    fn test_same_address_does_not_push() {
        let (store, sync) = setup("/");

        store.set_region(Some("CA".into()));
        store.set_region(Some("CA".into()));
        store.set_aux_filter(true);

        assert_eq!(sync.history_len(), 2);
    }

    #[test]
    fn test_back_and_forward_do_not_grow_history() {
        let (store, sync) = setup("/");
        store.set_focused_entity(Some(EntityId::from("1")));
        store.set_focused_entity(Some(EntityId::from("2")));
        assert_eq!(sync.history_len(), 3);

        assert!(sync.back());
        assert_eq!(store.get().focused_entity(), Some(&EntityId::from("1")));
        assert!(sync.back());
        assert_eq!(store.get(), Selection::default());
        assert!(!sync.back());

        assert!(sync.forward());
        assert_eq!(store.get().focused_entity(), Some(&EntityId::from("1")));
        assert_eq!(sync.history_len(), 3);
    }

    #[test]
    fn test_navigation_keeps_aux_filter() {
        let (store, sync) = setup("/");
        store.set_region(Some("TX".into()));
        store.set_aux_filter(true);

        assert!(sync.back());
        let sel = store.get();
        assert!(sel.region.is_none());
        assert!(sel.aux.show_only_flagged);
    }

    #[test]
    fn test_navigated_events_are_published() {
        let store = Arc::new(SelectionStore::default());
        let events = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe::<Navigated>(crate::events::handler_from_fn(move |event| {
            if let Some(nav) = event.as_any().downcast_ref::<Navigated>() {
                sink.lock().push((nav.address.clone(), nav.pushed));
            }
        }));

        let _sync = UrlSync::install(store.clone(), MemoryHistory::default(), events);
        store.set_region(Some("TX".into()));

        assert_eq!(
            *seen.lock(),
            vec![("/".to_string(), false), ("/?state=TX".to_string(), true)]
        );
    }
}
