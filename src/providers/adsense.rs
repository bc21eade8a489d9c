use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::MetricTotals;
use crate::error::{GatewayError, Result};
use crate::providers::{ReportRequest, ReportRow, ReportingProvider};
use crate::store::AccountRecord;

pub const DEFAULT_API_BASE: &str = "https://adsense.googleapis.com/v2";

/// Metric columns requested for every report, in response order
const METRICS: [&str; 4] = ["ESTIMATED_EARNINGS", "CLICKS", "IMPRESSIONS", "PAGE_VIEWS"];

const PLACEHOLDER_TOKEN: &str = "placeholder";

/// AdSense Management API v2 provider
///
/// Authorizes with the access token stored in each account's credentials
/// file. Obtaining and refreshing that token happens elsewhere.
pub struct AdSenseProvider {
    client: Client,
    api_base: String,
    credentials_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateReportResponse {
    #[serde(default)]
    rows: Vec<ReportResponseRow>,
}

#[derive(Debug, Deserialize)]
struct ReportResponseRow {
    #[serde(default)]
    cells: Vec<ReportCell>,
}

#[derive(Debug, Deserialize)]
struct ReportCell {
    #[serde(default)]
    value: Option<String>,
}

impl ReportCell {
    fn as_f64(&self) -> f64 {
        self.value
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    fn as_u64(&self) -> u64 {
        let Some(raw) = self.value.as_deref().map(str::trim) else {
            return 0;
        };
        raw.parse::<u64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
            .unwrap_or(0)
    }
}

impl AdSenseProvider {
    /// Create new AdSense provider
    pub fn new(api_base: impl Into<String>, timeout: Duration, credentials_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials_dir: credentials_dir.into(),
        })
    }

    fn credentials_path(&self, account: &AccountRecord) -> PathBuf {
        let stored = Path::new(&account.credentials_file);
        if stored.is_absolute() {
            stored.to_path_buf()
        } else {
            self.credentials_dir.join(stored)
        }
    }

    /// Read the bearer token from the account's credentials file
    async fn access_token(&self, account: &AccountRecord) -> Result<String> {
        let path = self.credentials_path(account);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            GatewayError::Credentials(format!(
                "Cannot read credentials for '{}' at {}: {}",
                account.account_key,
                path.display(),
                e
            ))
        })?;

        let stored: StoredCredentials = serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Credentials(format!(
                "Invalid credentials file for '{}': {}",
                account.account_key, e
            ))
        })?;

        match stored.token.or(stored.access_token) {
            Some(token) if !token.is_empty() && token != PLACEHOLDER_TOKEN => Ok(token),
            _ => Err(GatewayError::Credentials(format!(
                "Account '{}' needs OAuth setup",
                account.account_key
            ))),
        }
    }

    /// `pub-123` or `accounts/pub-123` -> report endpoint
    fn report_url(&self, account_id: &str) -> String {
        let publisher = account_id.trim().trim_start_matches("accounts/");
        format!(
            "{}/accounts/{}/reports:generate",
            self.api_base,
            urlencoding::encode(publisher)
        )
    }

    fn query_params(request: &ReportRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("dateRange", "CUSTOM".to_string()),
            ("startDate.year", request.start.year().to_string()),
            ("startDate.month", request.start.month().to_string()),
            ("startDate.day", request.start.day().to_string()),
            ("endDate.year", request.end.year().to_string()),
            ("endDate.month", request.end.month().to_string()),
            ("endDate.day", request.end.day().to_string()),
        ];
        if request.by_domain {
            params.push(("dimensions", "DOMAIN_NAME".to_string()));
        }
        params.extend(METRICS.iter().map(|m| ("metrics", m.to_string())));
        params
    }

    fn parse_rows(&self, response: GenerateReportResponse, by_domain: bool) -> Result<Vec<ReportRow>> {
        let offset = usize::from(by_domain);

        response
            .rows
            .into_iter()
            .map(|row| {
                if row.cells.len() < offset + METRICS.len() {
                    return Err(GatewayError::provider(
                        self.name(),
                        format!("Expected {} cells per row, got {}", offset + METRICS.len(), row.cells.len()),
                    ));
                }

                let metrics = &row.cells[offset..];
                Ok(ReportRow {
                    dimension: if by_domain {
                        row.cells[0].value.clone()
                    } else {
                        None
                    },
                    totals: MetricTotals {
                        earnings_micros: metrics[0].as_f64(),
                        clicks: metrics[1].as_u64(),
                        impressions: metrics[2].as_u64(),
                        page_views: metrics[3].as_u64(),
                    },
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReportingProvider for AdSenseProvider {
    async fn generate_report(&self, account: &AccountRecord, request: &ReportRequest) -> Result<Vec<ReportRow>> {
        let token = self.access_token(account).await?;
        let url = self.report_url(&account.account_id);

        tracing::debug!(
            "Requesting report for {} ({} to {}, by_domain={})",
            account.account_key,
            request.start,
            request.end,
            request.by_domain
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&Self::query_params(request))
            .send()
            .await
            .map_err(|e| GatewayError::provider(self.name(), format!("Report request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(GatewayError::provider(self.name(), format!("HTTP {}: {}", status, snippet)));
        }

        let report: GenerateReportResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::provider(self.name(), format!("Invalid JSON: {}", e)))?;

        self.parse_rows(report, request.by_domain)
    }

    async fn check_credentials(&self, account: &AccountRecord) -> Result<()> {
        self.access_token(account).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "adsense"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewAccount;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    fn provider(dir: &Path) -> AdSenseProvider {
        AdSenseProvider::new(DEFAULT_API_BASE, Duration::from_secs(5), dir).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_report_url() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path());

        assert_eq!(
            provider.report_url("pub-123"),
            "https://adsense.googleapis.com/v2/accounts/pub-123/reports:generate"
        );
        assert_eq!(provider.report_url("accounts/pub-123"), provider.report_url("pub-123"));
    }

    #[test]
    fn test_query_params() {
        let request = ReportRequest::domains(day("2025-10-01"), day("2025-10-07"));
        let params = AdSenseProvider::query_params(&request);

        assert!(params.contains(&("startDate.day", "1".to_string())));
        assert!(params.contains(&("endDate.day", "7".to_string())));
        assert!(params.contains(&("dimensions", "DOMAIN_NAME".to_string())));
        assert_eq!(params.iter().filter(|(k, _)| *k == "metrics").count(), 4);

        let totals = AdSenseProvider::query_params(&ReportRequest::totals(day("2025-10-01"), day("2025-10-01")));
        assert!(!totals.iter().any(|(k, _)| *k == "dimensions"));
    }

    #[test]
    fn test_parse_rows() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path());

        let response: GenerateReportResponse = serde_json::from_str(
            r#"{"rows": [
                {"cells": [{"value": "example.com"}, {"value": "2199"}, {"value": "8"}, {"value": "830"}, {"value": "362"}]},
                {"cells": [{"value": "other.com"}, {"value": null}, {"value": "0"}, {"value": "12.0"}, {}]}
            ]}"#,
        )
        .unwrap();

        let rows = provider.parse_rows(response, true).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dimension.as_deref(), Some("example.com"));
        assert_eq!(rows[0].totals.earnings_micros, 2199.0);
        assert_eq!(rows[0].totals.impressions, 830);
        assert_eq!(rows[1].totals.earnings_micros, 0.0);
        assert_eq!(rows[1].totals.impressions, 12);
        assert_eq!(rows[1].totals.page_views, 0);

        let empty: GenerateReportResponse = serde_json::from_str("{}").unwrap();
        assert!(provider.parse_rows(empty, false).unwrap().is_empty());

        let short: GenerateReportResponse =
            serde_json::from_str(r#"{"rows": [{"cells": [{"value": "1"}]}]}"#).unwrap();
        assert!(provider.parse_rows(short, false).is_err());
    }

    #[tokio::test]
    async fn test_access_token() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path());
        let account = NewAccount::new("site1", "pub-1", "One").into_record(Utc::now());

        assert!(matches!(
            provider.access_token(&account).await,
            Err(GatewayError::Credentials(_))
        ));

        std::fs::write(dir.path().join("adsense-site1.dat"), r#"{"token": "placeholder"}"#).unwrap();
        assert!(provider.access_token(&account).await.is_err());

        std::fs::write(dir.path().join("adsense-site1.dat"), r#"{"token": "ya29.abc", "refresh_token": "r"}"#).unwrap();
        assert_eq!(provider.access_token(&account).await.unwrap(), "ya29.abc");
        assert!(provider.check_credentials(&account).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires network access and real credentials
    async fn test_live_report() {
        let dir = std::env::var("CREDENTIALS_DIR").unwrap_or_else(|_| ".".to_string());
        let provider = provider(Path::new(&dir));
        let account = NewAccount::new("live", std::env::var("ADSENSE_PUB_ID").unwrap_or_default(), "Live")
            .into_record(Utc::now());

        let today = Utc::now().date_naive();
        let rows = provider
            .generate_report(&account, &ReportRequest::totals(today, today))
            .await
            .unwrap();
        assert!(rows.len() <= 1);
    }
}
