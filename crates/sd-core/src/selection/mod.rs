use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, EntityId, Region};

mod store;
mod subscriber;

pub use store::SelectionStore;
pub use subscriber::SelectionSubscriber;

/// What the dashboard is currently focused on.
///
/// A provider and a procedure can never be focused at the same time, so the
/// two are variants of one enum rather than two nullable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Focus {
    #[default]
    None,
    Entity(EntityId),
    Category(CategoryId),
}

/// Auxiliary filters that narrow views without changing focus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuxFilters {
    /// Restrict provider rankings to providers on the exclusion list
    pub show_only_flagged: bool,
}

/// The shared region x provider x procedure selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub region: Option<Region>,
    pub focus: Focus,
    pub aux: AuxFilters,
}

impl Selection {
    pub fn new(region: Option<Region>, focus: Focus) -> Self {
        Self {
            region,
            focus,
            aux: AuxFilters::default(),
        }
    }

    pub fn focused_entity(&self) -> Option<&EntityId> {
        match &self.focus {
            Focus::Entity(id) => Some(id),
            _ => None,
        }
    }

    pub fn focused_category(&self) -> Option<&CategoryId> {
        match &self.focus {
            Focus::Category(id) => Some(id),
            _ => None,
        }
    }

    /// The same selection with empty ids and an empty region treated as
    /// unset
    pub fn without_empty_ids(mut self) -> Self {
        self.region = self.region.filter(|r| !r.is_empty());
        let empty = match &self.focus {
            Focus::Entity(id) => id.is_empty(),
            Focus::Category(id) => id.is_empty(),
            Focus::None => false,
        };
        if empty {
            self.focus = Focus::None;
        }
        self
    }

    /// True when nothing is selected (the overview)
    pub fn is_overview(&self) -> bool {
        self.region.is_none() && self.focus == Focus::None
    }

    /// Fields whose values differ between `self` and `other`
    pub fn changed_fields(&self, other: &Selection) -> Vec<SelectionField> {
        let mut fields = Vec::new();
        if self.region != other.region {
            fields.push(SelectionField::Region);
        }
        if self.focused_entity() != other.focused_entity() {
            fields.push(SelectionField::Entity);
        }
        if self.focused_category() != other.focused_category() {
            fields.push(SelectionField::Category);
        }
        if self.aux != other.aux {
            fields.push(SelectionField::AuxFilters);
        }
        fields
    }
}

/// Individual fields of a [`Selection`] that a subscriber can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionField {
    Region,
    Entity,
    Category,
    AuxFilters,
}

impl SelectionField {
    pub const ALL: &'static [SelectionField] = &[
        SelectionField::Region,
        SelectionField::Entity,
        SelectionField::Category,
        SelectionField::AuxFilters,
    ];
}

/// Where a selection mutation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// One of the setters, driven by user interaction
    User,
    /// Replacement from the navigable address (back/forward)
    Navigation,
}

/// Notification delivered to subscribers after a mutation
#[derive(Debug, Clone)]
pub struct SelectionChange {
    pub previous: Selection,
    pub current: Selection,
    pub origin: ChangeOrigin,
    pub fields: Vec<SelectionField>,
}

impl SelectionChange {
    pub fn touches(&self, field: SelectionField) -> bool {
        self.fields.contains(&field)
    }

    pub fn touches_any(&self, fields: &[SelectionField]) -> bool {
        fields.iter().any(|f| self.touches(*f))
    }
}
