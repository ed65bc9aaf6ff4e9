//! In-memory collection source
//! Serves a fixed dataset with the same paging and sort semantics as the service

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use sd_core::{CategoryId, EntityId, Region};

use super::CollectionSource;
use crate::query::{MapQuery, Page, Sort, SortDir};
use crate::schema::{
    ExcludedProvider, ExcludedProvidersPage, Keyed, MapProvider, MonthlyData, Overview,
    ProcedureAvgReimbursement, ProcedureDetail, ProcedureProvider, ProcedureSummary,
    ProviderDetail, ProviderProcedure, ProviderReimbursement, ProviderSummary, Ranked,
    StateMonthlyData,
};
use crate::{RemoteError, Result};

/// A billing line: one provider x one procedure
#[derive(Debug, Clone)]
pub struct Billing {
    pub npi: String,
    pub hcpcs_code: String,
    pub total_paid: f64,
    pub total_claims: f64,
    pub total_beneficiaries: f64,
    /// `YYYY-MM` -> amount paid that month
    pub monthly_paid: BTreeMap<String, f64>,
}

/// Dataset served by [`MemorySource`]
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub providers: Vec<ProviderDetail>,
    pub procedures: Vec<ProcedureDetail>,
    pub billings: Vec<Billing>,
    pub exclusions: Vec<ExcludedProvider>,
}

const DEMO_STATES: &[(&str, &str, f64, f64)] = &[
    ("TX", "Houston", 29.76, -95.37),
    ("CA", "Los Angeles", 34.05, -118.24),
    ("NY", "New York", 40.71, -74.01),
    ("FL", "Miami", 25.76, -80.19),
    ("OH", "Columbus", 39.96, -83.00),
];

const DEMO_PROCEDURES: &[(&str, &str)] = &[
    ("T1019", "Personal care services, per 15 minutes"),
    ("T2016", "Habilitation, residential, waiver; per diem"),
    ("99213", "Office/outpatient visit, established patient"),
    ("H2016", "Comprehensive community support services, per diem"),
    ("S5125", "Attendant care services; per 15 minutes"),
    ("A0427", "Ambulance service, advanced life support"),
    ("J9/XZ", "Injection, test code with a reserved character"),
    ("G0156", "Services of home health aide, each 15 minutes"),
];

const DEMO_MONTHS: &[&str] = &["2023-01", "2023-02", "2023-03", "2023-04", "2023-05", "2023-06"];

impl Dataset {
    /// Deterministic synthetic dataset: 60 providers over five states, eight
    /// procedures, three billing lines per provider, and a handful of
    /// providers on the exclusion list.
    pub fn demo() -> Self {
        let mut data = Dataset::default();

        for i in 0..60usize {
            let (state, city, lat, lng) = DEMO_STATES[i % DEMO_STATES.len()];
            let npi = format!("{}", 1_000_000_000 + i * 7919);
            let mut provider_paid = 0.0;
            let mut provider_claims = 0.0;

            for j in 0..3usize {
                let (code, _) = DEMO_PROCEDURES[(i + j * 3) % DEMO_PROCEDURES.len()];
                let paid = ((60 - i) as f64) * 125_000.0 / (j + 1) as f64 + (i * 37 % 11) as f64;
                let claims = ((i * 13 + j * 29) % 500 + 10) as f64;
                let monthly_paid = DEMO_MONTHS
                    .iter()
                    .map(|m| (m.to_string(), paid / DEMO_MONTHS.len() as f64))
                    .collect();
                data.billings.push(Billing {
                    npi: npi.clone(),
                    hcpcs_code: code.to_string(),
                    total_paid: paid,
                    total_claims: claims,
                    total_beneficiaries: (claims / 4.0).ceil(),
                    monthly_paid,
                });
                provider_paid += paid;
                provider_claims += claims;
            }

            let flagged = i % 9 == 4;
            // Every tenth provider was never geocoded.
            let geocoded = i % 10 != 7;
            data.providers.push(ProviderDetail {
                npi: npi.clone(),
                name: format!("{city} Care Partners {i:02}"),
                state: Some(state.to_string()),
                city: Some(city.to_string()),
                zip: None,
                lat: geocoded.then_some(lat + (i as f64) * 0.01),
                lng: geocoded.then_some(lng - (i as f64) * 0.01),
                total_paid: provider_paid,
                total_claims: provider_claims,
                total_beneficiaries: (provider_claims / 4.0).ceil(),
                unique_procedures: 3.0,
                first_month: DEMO_MONTHS[0].to_string(),
                last_month: DEMO_MONTHS[DEMO_MONTHS.len() - 1].to_string(),
                is_excluded: flagged,
                exclusion: flagged.then(|| crate::schema::ExclusionInfo {
                    is_excluded: true,
                    exclusion_type: "1128b4".to_string(),
                    exclusion_date: "20190315".to_string(),
                    reinstatement_date: None,
                }),
                registry: None,
            });

            if flagged {
                data.exclusions.push(ExcludedProvider {
                    npi,
                    name: format!("{city} Care Partners {i:02}"),
                    state: Some(state.to_string()),
                    city: Some(city.to_string()),
                    total_paid: provider_paid,
                    total_claims: Some(provider_claims),
                    exclusion_type: "1128b4".to_string(),
                    exclusion_date: "20190315".to_string(),
                    reinstatement_date: None,
                    business_name: None,
                    specialty: None,
                });
            }
        }

        for (code, description) in DEMO_PROCEDURES {
            let lines: Vec<&Billing> = data.billings.iter().filter(|b| b.hcpcs_code == *code).collect();
            data.procedures.push(ProcedureDetail {
                hcpcs_code: code.to_string(),
                description: Some(description.to_string()),
                unique_providers: lines.len() as f64,
                total_paid: lines.iter().map(|b| b.total_paid).sum(),
                total_claims: Some(lines.iter().map(|b| b.total_claims).sum()),
                total_beneficiaries: Some(lines.iter().map(|b| b.total_beneficiaries).sum()),
            });
        }

        data
    }
}

/// [`CollectionSource`] backed by a [`Dataset`]
pub struct MemorySource {
    data: Dataset,
    failures: RwLock<Vec<(String, u16)>>,
}

impl MemorySource {
    pub fn new(data: Dataset) -> Self {
        Self {
            data,
            failures: RwLock::new(Vec::new()),
        }
    }

    /// Make every request whose endpoint starts with `prefix` fail with `status`
    pub fn fail(&self, prefix: &str, status: u16) {
        self.failures.write().push((prefix.to_string(), status));
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.failures.write().clear();
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    fn check(&self, endpoint: String) -> Result<()> {
        debug!(%endpoint, "memory GET");
        let failures = self.failures.read();
        match failures.iter().find(|(prefix, _)| endpoint.starts_with(prefix.as_str())) {
            Some((_, status)) => Err(RemoteError::Status {
                status: *status,
                endpoint,
            }),
            None => Ok(()),
        }
    }

    fn provider(&self, npi: &str) -> Option<&ProviderDetail> {
        self.data.providers.iter().find(|p| p.npi == npi)
    }

    fn procedure(&self, code: &str) -> Option<&ProcedureDetail> {
        self.data.procedures.iter().find(|p| p.hcpcs_code == code)
    }

    fn in_region(provider: &ProviderDetail, region: Option<&Region>) -> bool {
        region.map_or(true, |r| provider.state.as_deref() == Some(r.as_str()))
    }

    fn monthly<'a>(&self, billings: impl Iterator<Item = &'a Billing>) -> Vec<MonthlyData> {
        let mut months: BTreeMap<String, f64> = BTreeMap::new();
        for billing in billings {
            for (month, paid) in &billing.monthly_paid {
                *months.entry(month.clone()).or_default() += paid;
            }
        }
        months
            .into_iter()
            .map(|(month, total_paid)| MonthlyData {
                month,
                unique_providers: None,
                total_beneficiaries: 0.0,
                total_claims: 0.0,
                total_paid,
            })
            .collect()
    }
}

/// Sort by `sort` with the key as a stable tie-break, then cut `page`
fn paginate<T: Ranked + Keyed>(mut rows: Vec<T>, sort: Sort, page: Page) -> Vec<T> {
    rows.sort_by(|a, b| {
        let ord = a.metric(sort.key).total_cmp(&b.metric(sort.key));
        let ord = match sort.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        };
        ord.then_with(|| a.key().cmp(b.key()))
    });
    rows.into_iter().skip(page.offset).take(page.limit).collect()
}

fn summary(p: &ProviderDetail) -> ProviderSummary {
    ProviderSummary {
        npi: p.npi.clone(),
        name: p.name.clone(),
        state: p.state.clone(),
        city: p.city.clone(),
        total_paid: p.total_paid,
        total_claims: Some(p.total_claims),
        total_beneficiaries: Some(p.total_beneficiaries),
        is_excluded: Some(p.is_excluded),
        exclusion_type: p.exclusion.as_ref().map(|e| e.exclusion_type.clone()),
    }
}

fn procedure_summary(p: &ProcedureDetail) -> ProcedureSummary {
    ProcedureSummary {
        hcpcs_code: p.hcpcs_code.clone(),
        description: p.description.clone(),
        unique_providers: p.unique_providers,
        total_paid: p.total_paid,
        total_claims: p.total_claims,
        total_beneficiaries: p.total_beneficiaries,
    }
}

/// Paid per claim over `billings`, if any claims were billed
fn per_claim<'a>(billings: impl Iterator<Item = &'a Billing>) -> Option<f64> {
    let (paid, claims) = billings.fold((0.0, 0.0), |(paid, claims), b| {
        (paid + b.total_paid, claims + b.total_claims)
    });
    (claims > 0.0).then(|| paid / claims)
}

fn matches(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CollectionSource for MemorySource {
    async fn overview(&self) -> Result<Overview> {
        self.check("/api/stats/overview".into())?;
        let providers = &self.data.providers;
        Ok(Overview {
            total_paid: providers.iter().map(|p| p.total_paid).sum(),
            total_claims: providers.iter().map(|p| p.total_claims).sum(),
            total_beneficiaries: providers.iter().map(|p| p.total_beneficiaries).sum(),
            total_providers: providers.len() as f64,
            first_month: providers.iter().map(|p| p.first_month.clone()).min().unwrap_or_default(),
            last_month: providers.iter().map(|p| p.last_month.clone()).max().unwrap_or_default(),
        })
    }

    async fn national_timeseries(&self) -> Result<Vec<MonthlyData>> {
        self.check("/api/stats/timeseries/national".into())?;
        Ok(self.monthly(self.data.billings.iter()))
    }

    async fn state_timeseries(&self, region: Option<&Region>) -> Result<Vec<StateMonthlyData>> {
        self.check("/api/stats/timeseries/state".into())?;
        let mut states: Vec<&str> = self
            .data
            .providers
            .iter()
            .filter(|p| Self::in_region(p, region))
            .filter_map(|p| p.state.as_deref())
            .collect();
        states.sort_unstable();
        states.dedup();

        let mut rows = Vec::new();
        for state in states {
            let billings = self.data.billings.iter().filter(|b| {
                self.provider(&b.npi)
                    .is_some_and(|p| p.state.as_deref() == Some(state))
            });
            rows.extend(self.monthly(billings).into_iter().map(|data| StateMonthlyData {
                state: state.to_string(),
                data,
            }));
        }
        Ok(rows)
    }

    async fn search_providers(&self, query: &str, limit: usize) -> Result<Vec<ProviderSummary>> {
        self.check("/api/providers/search".into())?;
        let rows = self
            .data
            .providers
            .iter()
            .filter(|p| matches(&p.npi, query) || matches(&p.name, query))
            .map(summary)
            .collect();
        Ok(paginate(rows, Sort::default(), Page::first(limit)))
    }

    async fn top_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderSummary>> {
        self.check("/api/providers/top".into())?;
        let rows = self
            .data
            .providers
            .iter()
            .filter(|p| Self::in_region(p, region))
            .map(summary)
            .collect();
        Ok(paginate(rows, sort, page))
    }

    async fn provider_detail(&self, id: &EntityId) -> Result<ProviderDetail> {
        let endpoint = format!("/api/providers/{id}");
        self.check(endpoint.clone())?;
        self.provider(id.as_str())
            .cloned()
            .ok_or(RemoteError::NotFound { endpoint })
    }

    async fn provider_timeseries(&self, id: &EntityId) -> Result<Vec<MonthlyData>> {
        self.check(format!("/api/providers/{id}/timeseries"))?;
        Ok(self.monthly(self.data.billings.iter().filter(|b| b.npi == id.as_str())))
    }

    async fn provider_procedures(
        &self,
        id: &EntityId,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProviderProcedure>> {
        self.check(format!("/api/providers/{id}/procedures"))?;
        let rows = self
            .data
            .billings
            .iter()
            .filter(|b| b.npi == id.as_str())
            .map(|b| ProviderProcedure {
                hcpcs_code: b.hcpcs_code.clone(),
                description: self
                    .procedure(&b.hcpcs_code)
                    .and_then(|p| p.description.clone())
                    .unwrap_or_else(|| b.hcpcs_code.clone()),
                total_beneficiaries: Some(b.total_beneficiaries),
                total_claims: Some(b.total_claims),
                total_paid: b.total_paid,
            })
            .collect();
        Ok(paginate(rows, sort, page))
    }

    async fn search_procedures(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProcedureSummary>> {
        self.check("/api/procedures/search".into())?;
        let rows = self
            .data
            .procedures
            .iter()
            .filter(|p| {
                matches(&p.hcpcs_code, query)
                    || p.description.as_deref().is_some_and(|d| matches(d, query))
            })
            .map(procedure_summary)
            .collect();
        Ok(paginate(rows, Sort::default(), Page::first(limit)))
    }

    async fn top_procedures(&self, sort: Sort, page: Page) -> Result<Vec<ProcedureSummary>> {
        self.check("/api/procedures/top".into())?;
        let rows = self.data.procedures.iter().map(procedure_summary).collect();
        Ok(paginate(rows, sort, page))
    }

    async fn procedure_detail(&self, code: &CategoryId) -> Result<ProcedureDetail> {
        let endpoint = format!("/api/procedures/{code}/detail");
        self.check(endpoint.clone())?;
        self.procedure(code.as_str())
            .cloned()
            .ok_or(RemoteError::NotFound { endpoint })
    }

    async fn procedure_timeseries(&self, code: &CategoryId) -> Result<Vec<MonthlyData>> {
        self.check(format!("/api/procedures/{code}/timeseries"))?;
        Ok(self.monthly(
            self.data
                .billings
                .iter()
                .filter(|b| b.hcpcs_code == code.as_str()),
        ))
    }

    async fn procedure_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<Vec<ProcedureProvider>> {
        self.check(format!("/api/procedures/{code}/providers"))?;
        let rows = self
            .data
            .billings
            .iter()
            .filter(|b| b.hcpcs_code == code.as_str())
            .filter_map(|b| {
                let p = self.provider(&b.npi)?;
                Self::in_region(p, region).then(|| ProcedureProvider {
                    npi: p.npi.clone(),
                    name: p.name.clone(),
                    state: p.state.clone(),
                    city: p.city.clone(),
                    total_beneficiaries: Some(b.total_beneficiaries),
                    total_claims: Some(b.total_claims),
                    total_paid: b.total_paid,
                })
            })
            .collect();
        Ok(paginate(rows, sort, page))
    }

    async fn procedure_avg_reimbursement(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        dir: SortDir,
        limit: usize,
    ) -> Result<ProcedureAvgReimbursement> {
        self.check(format!("/api/procedures/{code}/avg-reimbursement"))?;
        let billed = move || {
            self.data
                .billings
                .iter()
                .filter(move |b| b.hcpcs_code == code.as_str() && b.total_claims > 0.0)
        };
        let in_region = move |b: &&Billing| {
            self.provider(&b.npi)
                .map_or(false, |p| Self::in_region(p, region))
        };

        let mut providers: Vec<ProviderReimbursement> = billed()
            .filter(in_region)
            .filter_map(|b| {
                let p = self.provider(&b.npi)?;
                Some(ProviderReimbursement {
                    npi: p.npi.clone(),
                    name: p.name.clone(),
                    state: p.state.clone(),
                    avg_per_claim: b.total_paid / b.total_claims,
                    total_claims: b.total_claims,
                    total_paid: b.total_paid,
                })
            })
            .collect();
        providers.sort_by(|a, b| {
            let ord = a.avg_per_claim.total_cmp(&b.avg_per_claim);
            let ord = match dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            ord.then_with(|| a.npi.cmp(&b.npi))
        });
        providers.truncate(limit);

        Ok(ProcedureAvgReimbursement {
            national_avg: per_claim(billed()),
            state_avg: region.and_then(|_| per_claim(billed().filter(in_region))),
            providers,
        })
    }

    async fn map_providers(&self, query: &MapQuery) -> Result<Vec<MapProvider>> {
        self.check("/api/map/providers".into())?;
        let rows = self
            .data
            .providers
            .iter()
            .filter(|p| Self::in_region(p, query.region.as_ref()) && p.coordinates().is_some())
            .map(MapProvider::from)
            .collect();
        Ok(paginate(rows, Sort::default(), Page::first(query.limit.unwrap_or(5000))))
    }

    async fn procedure_map_providers(
        &self,
        code: &CategoryId,
        region: Option<&Region>,
        limit: usize,
    ) -> Result<Vec<MapProvider>> {
        self.check(format!("/api/map/providers/procedure/{code}"))?;
        let rows = self
            .data
            .billings
            .iter()
            .filter(|b| b.hcpcs_code == code.as_str())
            .filter_map(|b| {
                let p = self.provider(&b.npi)?;
                if !Self::in_region(p, region) || p.coordinates().is_none() {
                    return None;
                }
                let mut point = MapProvider::from(p);
                point.total_paid = b.total_paid;
                point.total_claims = Some(b.total_claims);
                point.total_beneficiaries = Some(b.total_beneficiaries);
                Some(point)
            })
            .collect();
        Ok(paginate(rows, Sort::default(), Page::first(limit)))
    }

    async fn excluded_providers(
        &self,
        region: Option<&Region>,
        sort: Sort,
        page: Page,
    ) -> Result<ExcludedProvidersPage> {
        self.check("/api/analysis/excluded-providers".into())?;
        let rows: Vec<ExcludedProvider> = self
            .data
            .exclusions
            .iter()
            .filter(|e| region.map_or(true, |r| e.state.as_deref() == Some(r.as_str())))
            .cloned()
            .collect();
        let total = rows.len() as u64;
        Ok(ExcludedProvidersPage {
            providers: paginate(rows, sort, page),
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortKey;

    fn provider(npi: &str, state: &str, paid: f64, claims: f64) -> ProviderDetail {
        ProviderDetail {
            npi: npi.into(),
            name: format!("Provider {npi}"),
            state: Some(state.into()),
            city: Some("Springfield".into()),
            zip: None,
            lat: Some(30.0),
            lng: Some(-90.0),
            total_paid: paid,
            total_claims: claims,
            total_beneficiaries: 1.0,
            unique_procedures: 1.0,
            first_month: "2018-01".into(),
            last_month: "2024-12".into(),
            is_excluded: false,
            exclusion: None,
            registry: None,
        }
    }

    fn source() -> MemorySource {
        MemorySource::new(Dataset {
            providers: vec![
                provider("1", "TX", 300.0, 1.0),
                provider("2", "TX", 100.0, 9.0),
                provider("3", "CA", 200.0, 5.0),
            ],
            ..Dataset::default()
        })
    }

    #[tokio::test]
    async fn test_top_providers_sorts_and_pages() {
        let src = source();
        let page = src
            .top_providers(None, Sort::desc(SortKey::TotalPaid), Page::new(1, 2))
            .await
            .unwrap();
        let npis: Vec<&str> = page.iter().map(|p| p.npi.as_str()).collect();
        assert_eq!(npis, ["3", "2"]);

        let by_claims = src
            .top_providers(
                Some(&Region::from("TX")),
                Sort::new(SortKey::TotalClaims, SortDir::Asc),
                Page::first(10),
            )
            .await
            .unwrap();
        let npis: Vec<&str> = by_claims.iter().map(|p| p.npi.as_str()).collect();
        assert_eq!(npis, ["1", "2"]);
    }

    #[tokio::test]
    async fn test_injected_failure_reports_status_and_endpoint() {
        let src = source();
        src.fail("/api/providers/top", 503);

        let err = src
            .top_providers(None, Sort::default(), Page::first(5))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.endpoint(), "/api/providers/top");

        src.heal();
        assert!(src.top_providers(None, Sort::default(), Page::first(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_demo_dataset_is_consistent() {
        let src = MemorySource::new(Dataset::demo());
        let flagged = src
            .excluded_providers(None, Sort::default(), Page::first(100))
            .await
            .unwrap();
        assert_eq!(flagged.total as usize, src.dataset().exclusions.len());
        assert!(flagged.total > 0);

        let code = CategoryId::from("T1019");
        let per_procedure = src
            .procedure_providers(&code, None, Sort::default(), Page::first(100))
            .await
            .unwrap();
        let detail = src.procedure_detail(&code).await.unwrap();
        assert_eq!(per_procedure.len() as f64, detail.unique_providers);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let err = source().provider_detail(&EntityId::from("404")).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_avg_reimbursement_ranks_by_paid_per_claim() {
        let mut data = source().data;
        for (npi, paid, claims) in [("1", 300.0, 3.0), ("2", 100.0, 10.0), ("3", 200.0, 1.0)] {
            data.billings.push(Billing {
                npi: npi.into(),
                hcpcs_code: "T1019".into(),
                total_paid: paid,
                total_claims: claims,
                total_beneficiaries: 1.0,
                monthly_paid: BTreeMap::new(),
            });
        }
        let src = MemorySource::new(data);
        let code = CategoryId::from("T1019");

        let highest = src
            .procedure_avg_reimbursement(&code, None, SortDir::Desc, 10)
            .await
            .unwrap();
        let npis: Vec<&str> = highest.providers.iter().map(|p| p.npi.as_str()).collect();
        assert_eq!(npis, ["3", "1", "2"]);
        assert_eq!(highest.national_avg, Some(600.0 / 14.0));
        assert!(highest.state_avg.is_none());

        let lowest_tx = src
            .procedure_avg_reimbursement(&code, Some(&Region::from("TX")), SortDir::Asc, 1)
            .await
            .unwrap();
        assert_eq!(lowest_tx.providers.len(), 1);
        assert_eq!(lowest_tx.providers[0].npi, "2");
        assert_eq!(lowest_tx.state_avg, Some(400.0 / 13.0));
        assert_eq!(lowest_tx.national_avg, highest.national_avg);
    }
}
