//! HTTP collection client

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use sd_core::{CategoryId, EntityId, Region};

use super::CollectionSource;
use crate::config::ClientConfig;
use crate::query::{push_region, MapQuery, Page, Sort, SortDir};
use crate::schema::{
    ExcludedProvidersPage, MapProvider, MonthlyData, Overview, ProcedureAvgReimbursement,
    ProcedureDetail, ProcedureProvider, ProcedureSummary, ProviderDetail, ProviderProcedure, ProviderSummary,
    StateMonthlyData,
};
use crate::{RemoteError, Result};

type Params = Vec<(&'static str, String)>;

/// Body the service returns with a 200 for unknown ids
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`CollectionSource`] over HTTP GET + JSON
pub struct HttpCollectionSource {
    client: Client,
    base_url: Url,
}

impl HttpCollectionSource {
    /// Create a client for the configured service
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::Config(format!("bad base URL '{}': {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Config(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL for `segments` under the base URL. Segments are
    /// percent-encoded individually, so ids may contain `/`.
    fn url(&self, segments: &[&str], params: &Params) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Config(format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], params: Params) -> Result<T> {
        let url = self.url(segments, &params)?;
        let endpoint = url.path().to_string();
        debug!(%url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(%endpoint, error = %e, "request failed");
            RemoteError::Transport {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%endpoint, status = status.as_u16(), "non-success status");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        let body = response.bytes().await.map_err(|e| RemoteError::Transport {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

        decode(&endpoint, &body)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T> {
    match serde_json::from_slice::<T>(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Ok(ErrorBody { error }) = serde_json::from_slice::<ErrorBody>(body) {
                debug!(%endpoint, %error, "service reported missing record");
                return Err(RemoteError::NotFound {
                    endpoint: endpoint.to_string(),
                });
            }
            Err(RemoteError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl CollectionSource for HttpCollectionSource {
    async fn overview(&self) -> Result<Overview> {
        self.get(&["api", "stats", "overview"], Vec::new()).await
    }

    async fn national_timeseries(&self) -> Result<Vec<MonthlyData>> {
        self.get(&["api", "stats", "timeseries", "national"], Vec::new())
            .await
    }

    async fn state_timeseries(&self, region: Option<&Region>) -> Result<Vec<StateMonthlyData>> {
        let mut params = Params::new();
        push_region(&mut params, region);
        self.get(&["api", "stats", "timeseries", "state"], params).await
    }

    async fn search_providers(&self, query: &str, limit: usize) -> Result<Vec<ProviderSummary>> {
        let params = vec![("q", query.to_string()), ("limit", limit.to_string())];
        self.get(&["api", "providers", "search"], params).await
    }

    async fn top_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderSummary>> {
        let mut params = Params::new();
        page.push_params(&mut params);
        sort.push_params(&mut params);
        push_region(&mut params, region);
        self.get(&["api", "providers", "top"], params).await
    }

    async fn provider_detail(&self, id: &EntityId) -> Result<ProviderDetail> {
        self.get(&["api", "providers", id.as_str()], Vec::new()).await
    }

    async fn provider_timeseries(&self, id: &EntityId) -> Result<Vec<MonthlyData>> {
        self.get(&["api", "providers", id.as_str(), "timeseries"], Vec::new())
            .await
    }

    async fn provider_procedures(
        &self,
        id: &EntityId,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderProcedure>> {
        let mut params = Params::new();
        page.push_params(&mut params);
        sort.push_params(&mut params);
        self.get(&["api", "providers", id.as_str(), "procedures"], params)
            .await
    }

    async fn search_procedures(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProcedureSummary>> {
        let params = vec![("q", query.to_string()), ("limit", limit.to_string())];
        self.get(&["api", "procedures", "search"], params).await
    }

    async fn top_procedures(&self, sort: Sort, page: Page) -> Result<Vec<ProcedureSummary>> {
        let mut params = Params::new();
        page.push_params(&mut params);
        sort.push_params(&mut params);
        self.get(&["api", "procedures", "top"], params).await
    }

    async fn procedure_detail(&self, code: &CategoryId) -> Result<ProcedureDetail> {
        self.get(&["api", "procedures", code.as_str(), "detail"], Vec::new())
            .await
    }

    async fn procedure_timeseries(&self, code: &CategoryId) -> Result<Vec<MonthlyData>> {
        self.get(&["api", "procedures", code.as_str(), "timeseries"], Vec::new())
            .await
    }

    async fn procedure_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProcedureProvider>> {
        let mut params = Params::new();
        page.push_params(&mut params);
        sort.push_params(&mut params);
        push_region(&mut params, region);
        self.get(&["api", "procedures", code.as_str(), "providers"], params)
            .await
    }

    async fn procedure_avg_reimbursement(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        dir: SortDir,
        limit: usize,
    ) -> Result<ProcedureAvgReimbursement> {
        let mut params = vec![
            ("limit", limit.to_string()),
            ("sort_dir", dir.as_param().to_string()),
        ];
        push_region(&mut params, region);
        self.get(&["api", "procedures", code.as_str(), "avg-reimbursement"], params)
            .await
    }

    async fn map_providers(&self, query: &MapQuery) -> Result<Vec<MapProvider>> {
        self.get(&["api", "map", "providers"], query.params()).await
    }

    async fn procedure_map_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        limit: usize,
    ) -> Result<Vec<MapProvider>> {
        let mut params = Params::new();
        push_region(&mut params, region);
        params.push(("limit", limit.to_string()));
        self.get(&["api", "map", "providers", "procedure", code.as_str()], params)
            .await
    }

    async fn excluded_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<ExcludedProvidersPage> {
        let mut params = Params::new();
        page.push_params(&mut params);
        sort.push_params(&mut params);
        push_region(&mut params, region);
        self.get(&["api", "analysis", "excluded-providers"], params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SortDir, SortKey};

    fn source(base: &str) -> HttpCollectionSource {
        HttpCollectionSource::new(&ClientConfig::default().with_base_url(base)).unwrap()
    }

    #[test]
    fn test_ids_are_encoded_as_single_segments() {
        let src = source("http://localhost:8000");
        let url = src
            .url(&["api", "procedures", "J/9 x", "detail"], &Params::new())
            .unwrap();
        assert_eq!(url.path(), "/api/procedures/J%2F9%20x/detail");
    }

    #[test]
    fn test_pagination_and_sort_params() {
        let src = source("http://localhost:8000/");
        let mut params = Params::new();
        Page::new(25, 25).push_params(&mut params);
        Sort::new(SortKey::TotalClaims, SortDir::Asc).push_params(&mut params);
        push_region(&mut params, Some(&Region::from("TX")));

        let url = src.url(&["api", "providers", "top"], &params).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/providers/top?limit=25&offset=25&sort_by=total_claims&sort_dir=asc&state=TX"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let src = source("https://example.org/spending/");
        let url = src.url(&["api", "stats", "overview"], &Params::new()).unwrap();
        assert_eq!(url.as_str(), "https://example.org/spending/api/stats/overview");
    }

    #[test]
    fn test_bad_base_url_is_config_error() {
        let err = HttpCollectionSource::new(&ClientConfig::default().with_base_url("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, RemoteError::Config(_)));
    }

    #[test]
    fn test_error_body_maps_to_not_found() {
        let err = decode::<ProviderDetail>("/api/providers/1", br#"{"error":"Provider not found"}"#)
            .unwrap_err();
        assert_eq!(err.status(), Some(404));

        let err = decode::<Vec<MonthlyData>>("/api/x", b"<html>").unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let src = source("http://127.0.0.1:9");
        let err = src.overview().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport { .. }));
        assert_eq!(err.endpoint(), "/api/stats/overview");
    }
}
