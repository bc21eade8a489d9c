use serde::{Deserialize, Serialize};

use crate::core::currency::{cpm, ctr, micros_to_local, round2, rpm};

/// Raw metric totals for one report row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub earnings_micros: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub page_views: u64,
}

impl MetricTotals {
    pub fn earnings(&self) -> f64 {
        micros_to_local(self.earnings_micros)
    }

    pub fn accumulate(&mut self, other: &MetricTotals) {
        self.earnings_micros += other.earnings_micros;
        self.clicks += other.clicks;
        self.impressions += other.impressions;
        self.page_views += other.page_views;
    }
}

/// Earnings report for one account over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsReport {
    /// `YYYY-MM-DD` or `YYYY-MM-DD to YYYY-MM-DD`
    pub date: String,
    pub account_key: String,
    pub account_id: String,
    pub earnings: f64,
    pub earnings_micros: i64,
    pub clicks: u64,
    pub impressions: u64,
    pub page_views: u64,
    pub ctr: f64,
    pub cpm: f64,
    pub rpm: f64,
    /// 0 = today, 1 = yesterday, -1 = no data found
    pub data_age_days: i64,
    pub note: String,
}

impl EarningsReport {
    pub fn from_totals(
        date: impl Into<String>,
        account_key: impl Into<String>,
        account_id: impl Into<String>,
        totals: &MetricTotals,
        data_age_days: i64,
        note: impl Into<String>,
    ) -> Self {
        let earnings = totals.earnings();
        Self {
            date: date.into(),
            account_key: account_key.into(),
            account_id: account_id.into(),
            earnings: round2(earnings),
            earnings_micros: totals.earnings_micros as i64,
            clicks: totals.clicks,
            impressions: totals.impressions,
            page_views: totals.page_views,
            ctr: round2(ctr(totals.clicks, totals.impressions)),
            cpm: round2(cpm(earnings, totals.impressions)),
            rpm: round2(rpm(earnings, totals.page_views)),
            data_age_days,
            note: note.into(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.data_age_days >= 0
    }
}

/// Earnings for a single site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEarnings {
    pub domain: String,
    pub earnings: f64,
    pub earnings_micros: i64,
    pub clicks: u64,
    pub impressions: u64,
    pub page_views: u64,
    pub ctr: f64,
    pub cpm: f64,
    pub rpm: f64,
}

impl DomainEarnings {
    pub fn new(domain: impl Into<String>, totals: &MetricTotals) -> Self {
        let earnings = totals.earnings();
        Self {
            domain: domain.into(),
            earnings: round2(earnings),
            earnings_micros: totals.earnings_micros as i64,
            clicks: totals.clicks,
            impressions: totals.impressions,
            page_views: totals.page_views,
            ctr: round2(ctr(totals.clicks, totals.impressions)),
            cpm: round2(cpm(earnings, totals.impressions)),
            rpm: round2(rpm(earnings, totals.page_views)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub total_domains: usize,
    pub total_earnings: f64,
    pub total_earnings_micros: i64,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub total_page_views: u64,
    pub overall_ctr: f64,
    pub overall_cpm: f64,
}

/// Per-domain breakdown for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBreakdown {
    pub date: String,
    pub account_key: String,
    pub account_id: String,
    pub domain_filter: Option<String>,
    pub domains: Vec<DomainEarnings>,
    pub summary: DomainSummary,
}

impl DomainBreakdown {
    /// Build from `(domain, totals)` rows, keeping domains that contain
    /// `domain_filter` (case-insensitive), highest earnings first.
    pub fn from_rows<'a>(
        date: impl Into<String>,
        account_key: impl Into<String>,
        account_id: impl Into<String>,
        domain_filter: Option<&str>,
        rows: impl IntoIterator<Item = (&'a str, &'a MetricTotals)>,
    ) -> Self {
        let needle = domain_filter.map(|f| f.to_lowercase());
        let mut totals = MetricTotals::default();

        let mut domains: Vec<DomainEarnings> = rows
            .into_iter()
            .filter(|(domain, _)| match &needle {
                Some(needle) => domain.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .map(|(domain, row)| {
                totals.accumulate(row);
                DomainEarnings::new(domain, row)
            })
            .collect();

        domains.sort_by(|a, b| b.earnings.total_cmp(&a.earnings));

        let total_earnings = totals.earnings();
        let summary = DomainSummary {
            total_domains: domains.len(),
            total_earnings: round2(total_earnings),
            total_earnings_micros: totals.earnings_micros as i64,
            total_clicks: totals.clicks,
            total_impressions: totals.impressions,
            total_page_views: totals.page_views,
            overall_ctr: round2(ctr(totals.clicks, totals.impressions)),
            overall_cpm: round2(cpm(total_earnings, totals.impressions)),
        };

        Self {
            date: date.into(),
            account_key: account_key.into(),
            account_id: account_id.into(),
            domain_filter: domain_filter.map(str::to_string),
            domains,
            summary,
        }
    }
}

/// One account's line in the multi-account summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEarningsSummary {
    pub account_key: String,
    pub account_id: String,
    pub display_name: String,
    /// `active` when the fetch succeeded, `error` otherwise
    pub status: String,
    pub earnings: f64,
    pub earnings_micros: i64,
    pub clicks: u64,
    pub impressions: u64,
    pub page_views: u64,
    pub rpm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountEarningsSummary {
    pub fn fetched(
        account_key: impl Into<String>,
        account_id: impl Into<String>,
        display_name: impl Into<String>,
        totals: &MetricTotals,
    ) -> Self {
        let earnings = totals.earnings();
        Self {
            account_key: account_key.into(),
            account_id: account_id.into(),
            display_name: display_name.into(),
            status: "active".to_string(),
            earnings: round2(earnings),
            earnings_micros: totals.earnings_micros as i64,
            clicks: totals.clicks,
            impressions: totals.impressions,
            page_views: totals.page_views,
            rpm: round2(rpm(earnings, totals.page_views)),
            error: None,
        }
    }

    pub fn failed(
        account_key: impl Into<String>,
        account_id: impl Into<String>,
        display_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(error.into()),
            ..Self::fetched(account_key, account_id, display_name, &MetricTotals::default())
        }
    }
}

/// Combined earnings across every configured account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAccountSummary {
    pub date: String,
    pub total_accounts: usize,
    pub total_earnings: f64,
    pub total_earnings_micros: i64,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub total_page_views: u64,
    pub overall_ctr: f64,
    pub overall_cpm: f64,
    pub overall_rpm: f64,
    pub accounts: Vec<AccountEarningsSummary>,
}

impl MultiAccountSummary {
    pub fn new(date: impl Into<String>, totals: &MetricTotals, accounts: Vec<AccountEarningsSummary>) -> Self {
        let earnings = totals.earnings();
        Self {
            date: date.into(),
            total_accounts: accounts.len(),
            total_earnings: round2(earnings),
            total_earnings_micros: totals.earnings_micros as i64,
            total_clicks: totals.clicks,
            total_impressions: totals.impressions,
            total_page_views: totals.page_views,
            overall_ctr: round2(ctr(totals.clicks, totals.impressions)),
            overall_cpm: round2(cpm(earnings, totals.impressions)),
            overall_rpm: round2(rpm(earnings, totals.page_views)),
            accounts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(micros: f64, clicks: u64, impressions: u64, page_views: u64) -> MetricTotals {
        MetricTotals {
            earnings_micros: micros,
            clicks,
            impressions,
            page_views,
        }
    }

    #[test]
    fn test_earnings_report_from_totals() {
        let report = EarningsReport::from_totals(
            "2025-10-03",
            "site1",
            "pub-123",
            &totals(3229.0, 9, 930, 412),
            1,
            "Latest data from 1 day(s) ago",
        );

        assert_eq!(report.earnings, 3.23);
        assert_eq!(report.earnings_micros, 3229);
        assert_eq!(report.ctr, 0.97);
        assert_eq!(report.cpm, 3.47);
        assert_eq!(report.rpm, 7.84);
        assert!(report.has_data());
    }

    #[test]
    fn test_domain_breakdown_filters_and_sorts() {
        let small = totals(1000.0, 1, 100, 50);
        let large = totals(5000.0, 4, 400, 200);
        let other = totals(9000.0, 2, 300, 100);

        let breakdown = DomainBreakdown::from_rows(
            "2025-10-03",
            "site1",
            "pub-123",
            Some("Example"),
            vec![
                ("blog.example.com", &small),
                ("shop.example.com", &large),
                ("unrelated.net", &other),
            ],
        );

        assert_eq!(breakdown.domains.len(), 2);
        assert_eq!(breakdown.domains[0].domain, "shop.example.com");
        assert_eq!(breakdown.summary.total_domains, 2);
        assert_eq!(breakdown.summary.total_earnings, 6.0);
        assert_eq!(breakdown.summary.total_earnings_micros, 6000);
        assert_eq!(breakdown.summary.total_impressions, 500);
        assert_eq!(breakdown.domain_filter.as_deref(), Some("Example"));
    }

    #[test]
    fn test_failed_account_summary() {
        let failed = AccountEarningsSummary::failed("site2", "pub-2", "Site Two", "HTTP 401");
        assert_eq!(failed.status, "error");
        assert_eq!(failed.earnings, 0.0);
        assert_eq!(failed.error.as_deref(), Some("HTTP 401"));

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "HTTP 401");
    }

    #[test]
    fn test_multi_account_totals() {
        let mut combined = MetricTotals::default();
        let a = totals(3230.0, 9, 930, 412);
        let b = totals(131010.0, 68, 2507, 1136);
        combined.accumulate(&a);
        combined.accumulate(&b);

        let summary = MultiAccountSummary::new(
            "2025-10-03",
            &combined,
            vec![
                AccountEarningsSummary::fetched("a", "pub-a", "A", &a),
                AccountEarningsSummary::fetched("b", "pub-b", "B", &b),
            ],
        );

        assert_eq!(summary.total_accounts, 2);
        assert_eq!(summary.total_earnings, 134.24);
        assert_eq!(summary.total_clicks, 77);
        assert_eq!(summary.total_impressions, 3437);
    }
}
