//! Selection state store

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, info};

use super::{ChangeOrigin, Focus, Selection, SelectionChange, SelectionSubscriber};
use crate::ids::{CategoryId, EntityId, Region};

/// Changes waiting to be delivered, oldest first
#[derive(Default)]
struct Dispatch {
    delivering: bool,
    queue: VecDeque<SelectionChange>,
}

/// Clears the delivering flag when the delivery loop exits, unwinding
/// included
struct Delivering<'a>(&'a RefCell<Dispatch>);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().delivering = false;
    }
}

/// Single source of truth for the dashboard selection.
///
/// Every mutation goes through one of the setters (or `replace`). Mutations
/// and their notifications are serialized: a mutation from another thread
/// waits until the current one has been delivered to every subscriber, and a
/// mutation made by a subscriber is queued and delivered after the change it
/// is reacting to. Subscribers therefore always see changes in the order
/// they were applied, and the last `current` they see is what `get` returns.
/// Empty ids and regions are treated as unset.
pub struct SelectionStore {
    state: Arc<RwLock<Selection>>,
    subscribers: Arc<RwLock<Vec<Weak<dyn SelectionSubscriber>>>>,
    dispatch: ReentrantMutex<RefCell<Dispatch>>,
}

impl SelectionStore {
    /// Create a store holding `initial`
    pub fn new(initial: Selection) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial.without_empty_ids())),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            dispatch: ReentrantMutex::new(RefCell::new(Dispatch::default())),
        }
    }

    /// Current selection
    pub fn get(&self) -> Selection {
        self.state.read().clone()
    }

    /// Set or clear the region. Focus is untouched.
    pub fn set_region(&self, region: Option<Region>) {
        let region = region.filter(|r| !r.is_empty());
        self.mutate(ChangeOrigin::User, |s| s.region = region);
    }

    /// Focus a provider. A non-null id clears any focused procedure; `None`
    /// only clears a focused provider.
    pub fn set_focused_entity(&self, id: Option<EntityId>) {
        let id = id.filter(|id| !id.is_empty());
        self.mutate(ChangeOrigin::User, |s| match id {
            Some(id) => s.focus = Focus::Entity(id),
            None => {
                if matches!(s.focus, Focus::Entity(_)) {
                    s.focus = Focus::None;
                }
            }
        });
    }

    /// Focus a procedure. Symmetric to [`Self::set_focused_entity`].
    pub fn set_focused_category(&self, id: Option<CategoryId>) {
        let id = id.filter(|id| !id.is_empty());
        self.mutate(ChangeOrigin::User, |s| match id {
            Some(id) => s.focus = Focus::Category(id),
            None => {
                if matches!(s.focus, Focus::Category(_)) {
                    s.focus = Focus::None;
                }
            }
        });
    }

    /// Toggle the flagged-only filter
    pub fn set_aux_filter(&self, show_only_flagged: bool) {
        self.mutate(ChangeOrigin::User, |s| s.aux.show_only_flagged = show_only_flagged);
    }

    /// Replace the whole selection
    pub fn replace(&self, selection: Selection, origin: ChangeOrigin) {
        let selection = selection.without_empty_ids();
        self.mutate(origin, |s| *s = selection);
    }

    /// Back to the overview: everything cleared
    pub fn reset(&self) {
        self.replace(Selection::default(), ChangeOrigin::User);
    }

    /// Add a subscriber. The store only keeps a weak reference.
    pub fn add_subscriber(&self, subscriber: Arc<dyn SelectionSubscriber>) {
        self.subscribers.write().push(Arc::downgrade(&subscriber));
    }

    fn mutate(&self, origin: ChangeOrigin, f: impl FnOnce(&mut Selection)) {
        let dispatch = self.dispatch.lock();

        let (previous, current) = {
            let mut state = self.state.write();
            let previous = state.clone();
            f(&mut state);
            (previous, state.clone())
        };

        let fields = previous.changed_fields(&current);
        if fields.is_empty() {
            debug!(?origin, "selection unchanged");
            return;
        }

        info!(?origin, ?fields, selection = ?current, "selection changed");
        {
            let mut pending = dispatch.borrow_mut();
            pending.queue.push_back(SelectionChange {
                previous,
                current,
                origin,
                fields,
            });
            if pending.delivering {
                // A subscriber on this thread mutated; the outer loop delivers it.
                return;
            }
            pending.delivering = true;
        }

        let _delivering = Delivering(&*dispatch);
        loop {
            let next = dispatch.borrow_mut().queue.pop_front();
            match next {
                Some(change) => self.notify_subscribers(&change),
                None => break,
            }
        }
    }

    fn notify_subscribers(&self, change: &SelectionChange) {
        // Collect live subscribers first so callbacks may re-enter the store.
        let live: Vec<Arc<dyn SelectionSubscriber>> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in live {
            if change.touches_any(subscriber.depends_on()) {
                subscriber.on_selection_change(change);
            }
        }
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new(Selection::default())
    }
}
