pub mod adsense;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::MetricTotals;
use crate::error::Result;
use crate::store::AccountRecord;

pub use adsense::AdSenseProvider;

/// One report request: a closed date interval, optionally broken down by site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub by_domain: bool,
}

impl ReportRequest {
    pub fn totals(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            by_domain: false,
        }
    }

    pub fn domains(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            by_domain: true,
        }
    }
}

/// One row of a generated report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Dimension value (the domain name) when the report is broken down
    pub dimension: Option<String>,
    pub totals: MetricTotals,
}

/// Trait for revenue reporting backends
#[async_trait]
pub trait ReportingProvider: Send + Sync {
    /// Generate a report for `account`; an empty vector means no data
    async fn generate_report(&self, account: &AccountRecord, request: &ReportRequest) -> Result<Vec<ReportRow>>;

    /// Check that `account` has usable stored credentials without calling the API
    async fn check_credentials(&self, _account: &AccountRecord) -> Result<()> {
        Ok(())
    }

    /// Get provider name
    fn name(&self) -> &str;
}
