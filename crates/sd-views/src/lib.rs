//! Views of the spending dashboard
//!
//! Every view derives its query from the shared selection, loads from a
//! [`sd_data::CollectionSource`] on the tokio runtime, and discards
//! responses that arrive after its query changed.

pub mod dashboard;
pub mod detail;
pub mod list;
pub mod loader;
pub mod map;
pub mod reimbursement;
pub mod search;
pub mod timeseries;

pub use dashboard::{Dashboard, DashboardConfig};
pub use detail::{ProcedurePanel, ProviderPanel};
pub use list::{ListController, ListFilter, ListQuery, ListState, PageSource};
pub use loader::{Loadable, SingleLoader};
pub use map::{marker_radius, LayerKind, MapController, MapViewState, PickHit, Tooltip};
pub use reimbursement::{ReimbursementChart, ReimbursementQuery, ReimbursementState};
pub use search::{OnSelect, SearchBox, SearchConfig, SearchState};
pub use timeseries::{SeriesScope, TimeSeriesView};
