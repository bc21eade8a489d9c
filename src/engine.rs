use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::cache::{domain_earnings_key, earnings_key, summary_key, CacheEntryInfo, CacheStats, ResponseCache};
use crate::core::date_range::format_date;
use crate::core::{
    AccountEarningsSummary, Attempt, DateQuery, DomainBreakdown, EarningsReport, MetricTotals, MultiAccountSummary,
    ReportWindow,
};
use crate::error::{GatewayError, Result};
use crate::providers::{ReportRequest, ReportRow, ReportingProvider};
use crate::store::{
    AccountFiles, AccountRecord, AccountStatusReport, AccountStore, AccountSummary, AccountUpdate, ArtifactFile,
    DocumentStatistics, NewAccount,
};

/// Main reporting orchestrator
///
/// Every report goes through the same steps: look up the account, build the
/// cache key, return a cached copy if one is fresh, otherwise ask the
/// provider, convert the rows and cache the result.
pub struct ReportingService {
    store: Arc<RwLock<AccountStore>>,
    cache: Arc<dyn ResponseCache>,
    provider: Arc<dyn ReportingProvider>,
    cache_ttl: Duration,
}

impl ReportingService {
    pub fn new(
        store: AccountStore,
        cache: Arc<dyn ResponseCache>,
        provider: Arc<dyn ReportingProvider>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            cache,
            provider,
            cache_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    async fn account(&self, account_key: &str) -> Result<AccountRecord> {
        self.store
            .read()
            .await
            .get_account(account_key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("Account '{}' not found", account_key)))
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(hit) => Some(hit),
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                self.cache.delete(key);
                None
            }
        }
    }

    fn remember<T: Serialize>(&self, key: &str, response: &T) {
        match serde_json::to_value(response) {
            Ok(value) => self.cache.set(key, value, Some(self.cache_ttl)),
            Err(e) => tracing::warn!("Failed to cache {}: {}", key, e),
        }
    }

    /// Try each attempt in order, returning the first one with rows.
    ///
    /// Failed attempts are logged and skipped. `Ok(None)` means at least one
    /// attempt succeeded but none had data; if every attempt failed the last
    /// error is returned.
    async fn first_with_data(
        &self,
        account: &AccountRecord,
        attempts: &[Attempt],
        by_domain: bool,
    ) -> Result<Option<(Attempt, Vec<ReportRow>)>> {
        let mut last_error = None;
        let mut answered = false;

        for attempt in attempts {
            let request = ReportRequest {
                start: attempt.start,
                end: attempt.end,
                by_domain,
            };
            match self.provider.generate_report(account, &request).await {
                Ok(rows) if !rows.is_empty() => return Ok(Some((*attempt, rows))),
                Ok(_) => {
                    tracing::debug!("No data for {} on {}", account.account_key, attempt.start);
                    answered = true;
                }
                Err(e) => {
                    tracing::warn!(
                        "Error fetching data for {} ({} days back): {}",
                        account.account_key,
                        attempt.age_days,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }

    /// Earnings for one account
    ///
    /// Without a date filter, tries today and then up to three days back and
    /// reports the first day that has data.
    pub async fn earnings(&self, account_key: &str, query: &DateQuery) -> Result<EarningsReport> {
        let account = self.account(account_key).await?;
        let key = earnings_key(account_key, query);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let today = Self::today();
        let window = query.resolve(today)?;

        let report = match window {
            ReportWindow::Range { start, end } => {
                let rows = self
                    .provider
                    .generate_report(&account, &ReportRequest::totals(start, end))
                    .await?;
                let totals = sum_rows(&rows);
                let note = if rows.is_empty() {
                    "No data for this period".to_string()
                } else {
                    format!(
                        "Aggregated over {} days ({} - {})",
                        (end - start).num_days() + 1,
                        start,
                        end
                    )
                };
                EarningsReport::from_totals(window.label(today), account_key, &account.account_id, &totals, 0, note)
            }
            _ => match self.first_with_data(&account, &window.attempts(today), false).await? {
                Some((attempt, rows)) => EarningsReport::from_totals(
                    format_date(attempt.start),
                    account_key,
                    &account.account_id,
                    &sum_rows(&rows),
                    attempt.age_days,
                    freshness_note(attempt.age_days),
                ),
                None => EarningsReport::from_totals(
                    window.label(today),
                    account_key,
                    &account.account_id,
                    &MetricTotals::default(),
                    -1,
                    "Data not available yet. AdSense reporting lags by 1-3 days.",
                ),
            },
        };

        self.remember(&key, &report);
        Ok(report)
    }

    /// Per-domain earnings for one account, optionally filtered by a domain substring
    pub async fn domain_earnings(
        &self,
        account_key: &str,
        domain_filter: Option<&str>,
        query: &DateQuery,
    ) -> Result<DomainBreakdown> {
        let account = self.account(account_key).await?;
        let domain_filter = domain_filter.map(str::trim).filter(|f| !f.is_empty());
        let key = domain_earnings_key(account_key, domain_filter, query);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let today = Self::today();
        let window = query.resolve(today)?;

        let (label, rows) = match window {
            ReportWindow::Range { start, end } => {
                let rows = self
                    .provider
                    .generate_report(&account, &ReportRequest::domains(start, end))
                    .await?;
                (window.label(today), rows)
            }
            _ => {
                let attempts = window.attempts(today);
                match self.first_with_data(&account, &attempts, true).await? {
                    Some((attempt, rows)) => (format_date(attempt.start), rows),
                    None => (window.label(today), Vec::new()),
                }
            }
        };

        let merged = merge_by_domain(&rows);
        let breakdown = DomainBreakdown::from_rows(
            label,
            account_key,
            &account.account_id,
            domain_filter,
            merged.iter().map(|(domain, totals)| (domain.as_str(), totals)),
        );

        self.remember(&key, &breakdown);
        Ok(breakdown)
    }

    /// Combined earnings across every stored account
    ///
    /// Accounts whose report fails are listed with `status = "error"` and
    /// count nothing towards the totals.
    pub async fn summary(&self, query: &DateQuery) -> Result<MultiAccountSummary> {
        let key = summary_key(query);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let today = Self::today();
        let window = query.resolve(today)?;
        let (start, end) = match window {
            ReportWindow::Auto => (today, today),
            ReportWindow::Day(day) => (day, day),
            ReportWindow::Range { start, end } => (start, end),
        };
        let request = ReportRequest::totals(start, end);

        let accounts: Vec<AccountRecord> = self.store.read().await.all_accounts().values().cloned().collect();

        let mut totals = MetricTotals::default();
        let mut lines = Vec::with_capacity(accounts.len());
        for account in &accounts {
            match self.provider.generate_report(account, &request).await {
                Ok(rows) => {
                    let account_totals = sum_rows(&rows);
                    totals.accumulate(&account_totals);
                    lines.push(AccountEarningsSummary::fetched(
                        &account.account_key,
                        &account.account_id,
                        &account.display_name,
                        &account_totals,
                    ));
                }
                Err(e) => {
                    tracing::warn!("Error fetching data for {}: {}", account.account_key, e);
                    lines.push(AccountEarningsSummary::failed(
                        &account.account_key,
                        &account.account_id,
                        &account.display_name,
                        e.to_string(),
                    ));
                }
            }
        }

        let summary = MultiAccountSummary::new(window.label(today), &totals, lines);
        self.remember(&key, &summary);
        Ok(summary)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_entries(&self) -> Vec<CacheEntryInfo> {
        self.cache.cache_info()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }

    pub fn delete_cache_entry(&self, key: &str) -> bool {
        self.cache.delete(key)
    }

    /// Spawn a background sweep of expired cache entries
    ///
    /// A zero interval disables the sweep and returns `None`.
    pub fn spawn_cleanup_task(&self, every: Duration) -> Option<JoinHandle<()>> {
        if every.is_zero() {
            tracing::debug!("Cache sweep disabled");
            return None;
        }

        let cache = Arc::clone(&self.cache);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!("Removed {} expired cache entries", removed);
                }
            }
        }))
    }

    pub async fn list_accounts(&self) -> Vec<AccountSummary> {
        self.store.read().await.account_list()
    }

    pub async fn get_account(&self, account_key: &str) -> Result<AccountRecord> {
        self.account(account_key).await
    }

    /// Setup state of an account from its files on disk
    ///
    /// Never contacts the reporting API; the provider only inspects the
    /// stored credentials.
    pub async fn account_status(&self, account_key: &str) -> Result<AccountStatusReport> {
        let (account, files) = {
            let store = self.store.read().await;
            let account = store
                .get_account(account_key)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("Account '{}' not found", account_key)))?;
            let files = AccountFiles {
                client_secrets: ArtifactFile::at(store.resolve_artifact(&account.client_secrets)),
                credentials: ArtifactFile::at(store.resolve_artifact(&account.credentials_file)),
            };
            (account, files)
        };

        let credentials_error = if files.client_secrets.exists && files.credentials.exists {
            self.provider.check_credentials(&account).await.err().map(|e| e.to_string())
        } else {
            None
        };

        let report = AccountStatusReport::new(&account, files, credentials_error);
        tracing::debug!("Account {} is {}", account_key, report.connection_status.as_str());
        Ok(report)
    }

    pub async fn search_accounts(&self, query: &str) -> Vec<AccountRecord> {
        self.store.read().await.search_accounts(query)
    }

    pub async fn add_account(&self, new: NewAccount) -> Result<AccountRecord> {
        self.store.write().await.add_account(new)
    }

    pub async fn update_account(&self, account_key: &str, updates: &AccountUpdate) -> Result<AccountRecord> {
        self.store.write().await.update_account(account_key, updates)
    }

    pub async fn remove_account(&self, account_key: &str, delete_files: bool) -> Result<()> {
        if self.store.write().await.remove_account(account_key, delete_files)? {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("Account '{}' not found", account_key)))
        }
    }

    pub async fn database_stats(&self) -> DatabaseStats {
        let store = self.store.read().await;
        DatabaseStats {
            database_path: store.path().to_path_buf(),
            version: store.metadata().version.clone(),
            last_modified: store.metadata().last_modified.to_rfc3339(),
            statistics: store.statistics().clone(),
        }
    }

    pub async fn validate_database(&self) -> Vec<String> {
        self.store.read().await.validate_database()
    }

    pub async fn create_backup(&self, backup_path: Option<&Path>) -> Result<PathBuf> {
        self.store.write().await.create_backup(backup_path)
    }

    /// Restore from a backup; cached reports are dropped since they may
    /// reference accounts that no longer exist
    pub async fn restore_backup(&self, backup_path: &Path) -> Result<PathBuf> {
        let safety = self.store.write().await.restore_from_backup(backup_path)?;
        self.cache.clear();
        Ok(safety)
    }

    /// Validate the database and log any problems found
    pub async fn startup_check(&self) -> Vec<String> {
        let problems = self.validate_database().await;
        if problems.is_empty() {
            tracing::info!("Account database validated");
        } else {
            for problem in &problems {
                tracing::warn!("Database check: {}", problem);
            }
        }
        problems
    }
}

/// Database metadata plus derived statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub database_path: PathBuf,
    pub version: String,
    pub last_modified: String,
    pub statistics: DocumentStatistics,
}

fn sum_rows(rows: &[ReportRow]) -> MetricTotals {
    let mut totals = MetricTotals::default();
    for row in rows {
        totals.accumulate(&row.totals);
    }
    totals
}

/// Collapse rows sharing a domain name; rows without one are dropped
fn merge_by_domain(rows: &[ReportRow]) -> BTreeMap<String, MetricTotals> {
    let mut merged: BTreeMap<String, MetricTotals> = BTreeMap::new();
    for row in rows {
        if let Some(domain) = row.dimension.as_deref() {
            merged.entry(domain.to_string()).or_default().accumulate(&row.totals);
        }
    }
    merged
}

fn freshness_note(age_days: i64) -> String {
    match age_days {
        0 => "Data for today".to_string(),
        1 => "Latest data is from 1 day ago".to_string(),
        n => format!("Latest data is from {} days ago", n),
    }
}
