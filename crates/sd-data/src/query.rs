//! Pagination, sort and filter parameters understood by the service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sd_core::Region;

/// The fixed set of server-side sort keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    TotalPaid,
    TotalClaims,
    TotalBeneficiaries,
}

impl SortKey {
    pub fn as_param(self) -> &'static str {
        match self {
            SortKey::TotalPaid => "total_paid",
            SortKey::TotalClaims => "total_claims",
            SortKey::TotalBeneficiaries => "total_beneficiaries",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_paid" | "paid" => Ok(SortKey::TotalPaid),
            "total_claims" | "claims" => Ok(SortKey::TotalClaims),
            "total_beneficiaries" | "beneficiaries" => Ok(SortKey::TotalBeneficiaries),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn as_param(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// Sort key plus direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Sort {
    pub key: SortKey,
    pub dir: SortDir,
}

impl Sort {
    pub fn new(key: SortKey, dir: SortDir) -> Self {
        Self { key, dir }
    }

    pub fn desc(key: SortKey) -> Self {
        Self::new(key, SortDir::Desc)
    }

    pub(crate) fn push_params(&self, params: &mut Vec<(&'static str, String)>) {
        params.push(("sort_by", self.key.as_param().to_string()));
        params.push(("sort_dir", self.dir.as_param().to_string()));
    }
}

/// Offset/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self::new(0, limit)
    }

    pub(crate) fn push_params(&self, params: &mut Vec<(&'static str, String)>) {
        params.push(("limit", self.limit.to_string()));
        params.push(("offset", self.offset.to_string()));
    }
}

/// Filters for the map point collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MapQuery {
    pub region: Option<Region>,
    pub month_from: Option<String>,
    pub month_to: Option<String>,
    pub limit: Option<usize>,
}

impl MapQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_region(&mut params, self.region.as_ref());
        if let Some(from) = &self.month_from {
            params.push(("month_from", from.clone()));
        }
        if let Some(to) = &self.month_to {
            params.push(("month_to", to.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

pub(crate) fn push_region(params: &mut Vec<(&'static str, String)>, region: Option<&Region>) {
    if let Some(region) = region {
        params.push(("state", region.to_string()));
    }
}
