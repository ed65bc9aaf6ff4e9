//! Records returned by the spending collection service

use serde::{Deserialize, Serialize};

use crate::query::SortKey;

/// A record with a unique id within its collection
pub trait Keyed {
    fn key(&self) -> &str;
}

/// A record that can be ranked by the service's sort keys
pub trait Ranked {
    fn metric(&self, key: SortKey) -> f64;
}

macro_rules! keyed_by {
    ($field:ident => $($t:ty),+) => {
        $(
            impl Keyed for $t {
                fn key(&self) -> &str {
                    &self.$field
                }
            }
        )+
    };
}

macro_rules! ranked {
    ($($t:ty),+) => {
        $(
            impl Ranked for $t {
                fn metric(&self, key: SortKey) -> f64 {
                    match key {
                        SortKey::TotalPaid => self.total_paid,
                        SortKey::TotalClaims => self.total_claims.unwrap_or_default(),
                        SortKey::TotalBeneficiaries => self.total_beneficiaries.unwrap_or_default(),
                    }
                }
            }
        )+
    };
}

/// Headline totals for the whole dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_paid: f64,
    pub total_claims: f64,
    pub total_beneficiaries: f64,
    pub total_providers: f64,
    pub first_month: String,
    pub last_month: String,
}

/// One month of spending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyData {
    pub month: String,
    #[serde(default)]
    pub unique_providers: Option<f64>,
    pub total_beneficiaries: f64,
    pub total_claims: f64,
    pub total_paid: f64,
}

/// One month of spending for one state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMonthlyData {
    pub state: String,
    #[serde(flatten)]
    pub data: MonthlyData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub total_paid: f64,
    #[serde(default)]
    pub total_claims: Option<f64>,
    #[serde(default)]
    pub total_beneficiaries: Option<f64>,
    #[serde(default)]
    pub is_excluded: Option<bool>,
    /// Exclusion authority code, present for providers on the exclusion list
    #[serde(default)]
    pub exclusion_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionInfo {
    pub is_excluded: bool,
    pub exclusion_type: String,
    pub exclusion_date: String,
    pub reinstatement_date: Option<String>,
}

/// Provider registry (NPPES) details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub org_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub credentials: Option<String>,
    pub taxonomy: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub enumeration_date: Option<String>,
    pub sex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDetail {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub total_paid: f64,
    pub total_claims: f64,
    pub total_beneficiaries: f64,
    pub unique_procedures: f64,
    pub first_month: String,
    pub last_month: String,
    #[serde(default)]
    pub is_excluded: bool,
    #[serde(default)]
    pub exclusion: Option<ExclusionInfo>,
    #[serde(default, rename = "nppes")]
    pub registry: Option<RegistryInfo>,
}

impl ProviderDetail {
    /// Coordinates, when the provider was geocoded
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lng?))
    }
}

/// A procedure billed by one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProcedure {
    pub hcpcs_code: String,
    pub description: String,
    pub total_beneficiaries: Option<f64>,
    pub total_claims: Option<f64>,
    pub total_paid: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSummary {
    pub hcpcs_code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unique_providers: f64,
    pub total_paid: f64,
    #[serde(default)]
    pub total_claims: Option<f64>,
    #[serde(default)]
    pub total_beneficiaries: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDetail {
    pub hcpcs_code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unique_providers: f64,
    pub total_paid: f64,
    pub total_claims: Option<f64>,
    pub total_beneficiaries: Option<f64>,
}

/// A provider billing one procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureProvider {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub total_beneficiaries: Option<f64>,
    pub total_claims: Option<f64>,
    pub total_paid: f64,
}

/// One provider's average paid per claim for a procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReimbursement {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    pub avg_per_claim: f64,
    pub total_claims: f64,
    pub total_paid: f64,
}

/// Providers ranked by average paid per claim for one procedure, with
/// national and (when a state is given) state benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureAvgReimbursement {
    pub national_avg: Option<f64>,
    #[serde(default)]
    pub state_avg: Option<f64>,
    pub providers: Vec<ProviderReimbursement>,
}

/// A geocoded provider for the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProvider {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub total_paid: f64,
    pub total_claims: Option<f64>,
    pub total_beneficiaries: Option<f64>,
}

/// A provider on the exclusion list that still received payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedProvider {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub total_paid: f64,
    pub total_claims: Option<f64>,
    pub exclusion_type: String,
    pub exclusion_date: String,
    pub reinstatement_date: Option<String>,
    pub business_name: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedProvidersPage {
    pub providers: Vec<ExcludedProvider>,
    pub total: u64,
}

impl From<ExcludedProvider> for ProviderSummary {
    fn from(p: ExcludedProvider) -> Self {
        Self {
            npi: p.npi,
            name: p.name,
            state: p.state,
            city: p.city,
            total_paid: p.total_paid,
            total_claims: p.total_claims,
            total_beneficiaries: None,
            is_excluded: Some(true),
            exclusion_type: Some(p.exclusion_type),
        }
    }
}

impl From<&ProviderDetail> for MapProvider {
    fn from(d: &ProviderDetail) -> Self {
        Self {
            npi: d.npi.clone(),
            name: d.name.clone(),
            state: d.state.clone(),
            city: d.city.clone(),
            lat: d.lat.unwrap_or_default(),
            lng: d.lng.unwrap_or_default(),
            total_paid: d.total_paid,
            total_claims: Some(d.total_claims),
            total_beneficiaries: Some(d.total_beneficiaries),
        }
    }
}

keyed_by!(npi => ProviderSummary, ProcedureProvider, MapProvider, ExcludedProvider, ProviderReimbursement);
keyed_by!(hcpcs_code => ProviderProcedure, ProcedureSummary);
ranked!(ProviderSummary, ProviderProcedure, ProcedureSummary, ProcedureProvider, MapProvider);

impl Ranked for ExcludedProvider {
    fn metric(&self, key: SortKey) -> f64 {
        match key {
            SortKey::TotalPaid => self.total_paid,
            SortKey::TotalClaims => self.total_claims.unwrap_or_default(),
            SortKey::TotalBeneficiaries => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_detail_decodes_registry_block() {
        let detail: ProviderDetail = serde_json::from_value(json!({
            "npi": "1234567890",
            "name": "Acme Home Care",
            "state": "TX",
            "city": "Houston",
            "zip": "77001",
            "lat": 29.76,
            "lng": -95.37,
            "total_paid": 1.5e9,
            "total_claims": 120000,
            "total_beneficiaries": 4000,
            "unique_procedures": 12,
            "first_month": "2018-01",
            "last_month": "2024-12",
            "nppes": { "taxonomy": "Home Health", "credentials": null }
        }))
        .unwrap();

        assert_eq!(detail.coordinates(), Some((29.76, -95.37)));
        assert!(!detail.is_excluded);
        assert_eq!(
            detail.registry.and_then(|r| r.taxonomy).as_deref(),
            Some("Home Health")
        );
    }

    #[test]
    fn test_state_monthly_flattens() {
        let row: StateMonthlyData = serde_json::from_value(json!({
            "state": "CA",
            "month": "2020-05",
            "unique_providers": 10,
            "total_beneficiaries": 5,
            "total_claims": 7,
            "total_paid": 100.5
        }))
        .unwrap();
        assert_eq!(row.state, "CA");
        assert_eq!(row.data.month, "2020-05");
    }

    #[test]
    fn test_excluded_provider_becomes_flagged_summary() {
        let page: ExcludedProvidersPage = serde_json::from_value(json!({
            "providers": [{
                "npi": "1", "name": "X", "state": "FL", "city": null,
                "total_paid": 10.0, "total_claims": 2,
                "exclusion_type": "1128b4", "exclusion_date": "20190101",
                "reinstatement_date": null, "business_name": null, "specialty": null
            }],
            "total": 1
        }))
        .unwrap();

        let summary = ProviderSummary::from(page.providers[0].clone());
        assert_eq!(summary.key(), "1");
        assert_eq!(summary.is_excluded, Some(true));
        assert_eq!(summary.exclusion_type.as_deref(), Some("1128b4"));
    }

    #[test]
    fn test_avg_reimbursement_decodes_without_state_benchmark() {
        let chart: ProcedureAvgReimbursement = serde_json::from_value(json!({
            "national_avg": 41.5,
            "providers": [
                {"npi": "1", "name": "A", "state": "TX", "avg_per_claim": 90.0, "total_claims": 10, "total_paid": 900.0},
                {"npi": "2", "name": "B", "state": null, "avg_per_claim": 12.5, "total_claims": 4, "total_paid": 50.0}
            ]
        }))
        .unwrap();
        assert_eq!(chart.national_avg, Some(41.5));
        assert!(chart.state_avg.is_none());
        assert_eq!(chart.providers[1].key(), "2");
        assert!(chart.providers[1].state.is_none());
    }
}
