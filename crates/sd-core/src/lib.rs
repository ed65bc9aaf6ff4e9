//! Core state for the spending dashboard
//!
//! This crate owns the shared selection (region, provider, procedure), its
//! navigable-address form and history synchronization, the event bus, and
//! the display formatters every view uses.

pub mod events;
pub mod format;
pub mod ids;
pub mod navigation;
pub mod selection;

// Re-export commonly used types
pub use events::{EventBus, ViewId};
pub use ids::{CategoryId, EntityId, Region};
pub use navigation::{MemoryHistory, NavigableAddress, NavigationHistory, UrlSync};
pub use selection::{
    AuxFilters, ChangeOrigin, Focus, Selection, SelectionChange, SelectionField,
    SelectionStore, SelectionSubscriber,
};
