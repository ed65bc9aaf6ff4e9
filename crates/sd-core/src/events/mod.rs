use std::sync::Arc;
use parking_lot::RwLock;
use ahash::AHashMap;

/// Identifier for a view (list, panel, map layer) that publishes events
pub type ViewId = uuid::Uuid;

/// System-wide event bus.
///
/// Handlers run outside the bus lock, so a handler may publish or
/// subscribe again.
pub struct EventBus {
    handlers: Arc<RwLock<AHashMap<std::any::TypeId, Vec<Arc<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &dyn Event);
}

/// Common dashboard events
pub mod events {
    use super::{Event, ViewId};
    use crate::selection::SelectionChange;

    /// The shared selection changed
    #[derive(Debug, Clone)]
    pub struct SelectionChanged {
        pub change: SelectionChange,
    }

    /// The navigable address changed
    #[derive(Debug, Clone)]
    pub struct Navigated {
        pub address: String,
        /// True when a new history entry was pushed, false when the
        /// selection was replaced from the address
        pub pushed: bool,
    }

    /// A view's fetch failed; only that view shows an error state
    #[derive(Debug, Clone)]
    pub struct FetchFailed {
        pub view_id: ViewId,
        pub view_name: String,
        pub endpoint: String,
        pub status: Option<u16>,
        pub message: String,
    }

    /// A response arrived after its query was superseded
    #[derive(Debug, Clone)]
    pub struct StaleResponseDropped {
        pub view_id: ViewId,
        pub epoch: u64,
        pub current_epoch: u64,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(SelectionChanged, Navigated, FetchFailed, StaleResponseDropped);
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.write();
        handlers.entry(type_id).or_default().push(Arc::from(handler));
    }

    /// Publish an event
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let event_handlers = match self.handlers.read().get(&type_id) {
            Some(handlers) => handlers.clone(),
            None => return,
        };

        for handler in event_handlers {
            handler.handle(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: Fn(&dyn Event) + Send + Sync,
{
    fn handle(&self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: Fn(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
