pub mod http;
pub mod memory;

pub use http::HttpCollectionSource;
pub use memory::MemorySource;

use async_trait::async_trait;
use sd_core::{CategoryId, EntityId, Region};

use crate::query::{MapQuery, Page, Sort, SortDir};
use crate::schema::{
    ExcludedProvidersPage, MapProvider, MonthlyData, Overview, ProcedureAvgReimbursement,
    ProcedureDetail, ProcedureProvider, ProcedureSummary, ProviderDetail, ProviderProcedure, ProviderSummary,
    StateMonthlyData,
};
use crate::Result;

/// Read-only access to the aggregated spending collections.
///
/// Implementations are stateless from the caller's point of view: identical
/// concurrent calls produce independent results.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Dataset-wide totals
    async fn overview(&self) -> Result<Overview>;

    /// Monthly national totals
    async fn national_timeseries(&self) -> Result<Vec<MonthlyData>>;

    /// Monthly totals per state, optionally for one state
    async fn state_timeseries(&self, region: Option<&Region>) -> Result<Vec<StateMonthlyData>>;

    /// Providers whose name or NPI matches `query`
    async fn search_providers(&self, query: &str, limit: usize) -> Result<Vec<ProviderSummary>>;

    /// Provider ranking, optionally within a state
    async fn top_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderSummary>>;

    async fn provider_detail(&self, id: &EntityId) -> Result<ProviderDetail>;

    async fn provider_timeseries(&self, id: &EntityId) -> Result<Vec<MonthlyData>>;

    /// Procedures billed by one provider
    async fn provider_procedures(
        &self,
        id: &EntityId,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderProcedure>>;

    /// Procedures whose code or description matches `query`
    async fn search_procedures(&self, query: &str, limit: usize)
        -> Result<Vec<ProcedureSummary>>;

    /// Procedure ranking
    async fn top_procedures(&self, sort: Sort, page: Page) -> Result<Vec<ProcedureSummary>>;

    async fn procedure_detail(&self, code: &CategoryId) -> Result<ProcedureDetail>;

    async fn procedure_timeseries(&self, code: &CategoryId) -> Result<Vec<MonthlyData>>;

    /// Providers billing one procedure, optionally within a state
    async fn procedure_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProcedureProvider>>;

    /// Providers billing one procedure ranked by average paid per claim,
    /// optionally within a state
    async fn procedure_avg_reimbursement(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        dir: SortDir,
        limit: usize,
    ) -> Result<ProcedureAvgReimbursement>;

    /// Geocoded providers for the map base layer
    async fn map_providers(&self, query: &MapQuery) -> Result<Vec<MapProvider>>;

    /// Geocoded providers billing one procedure
    async fn procedure_map_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        limit: usize,
    ) -> Result<Vec<MapProvider>>;

    /// Providers on the exclusion list that still received payments
    async fn excluded_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<ExcludedProvidersPage>;
}
