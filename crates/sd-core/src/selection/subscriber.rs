//! Selection subscriber trait

use super::{SelectionChange, SelectionField};

/// Trait for components that need to respond to selection changes
pub trait SelectionSubscriber: Send + Sync {
    /// Fields this subscriber derives its state from
    fn depends_on(&self) -> &[SelectionField] {
        SelectionField::ALL
    }

    /// Called after a mutation that touched at least one of `depends_on`
    fn on_selection_change(&self, change: &SelectionChange);
}
