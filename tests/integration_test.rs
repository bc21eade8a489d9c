use adsense_gateway::core::MetricTotals;
use adsense_gateway::providers::{ReportRequest, ReportRow};
use adsense_gateway::{
    AccountRecord, AccountStatus, AccountStore, AccountUpdate, DateQuery, GatewayError, NewAccount,
    ReportingProvider, ReportingService, Result, TtlCache,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Serves a fixed report for every account except `pub-broken`
#[derive(Default)]
struct FixedProvider {
    requests: AtomicUsize,
}

#[async_trait]
impl ReportingProvider for FixedProvider {
    async fn generate_report(&self, account: &AccountRecord, request: &ReportRequest) -> Result<Vec<ReportRow>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if account.account_id == "pub-broken" {
            return Err(GatewayError::Credentials(format!(
                "Account '{}' needs OAuth setup",
                account.account_key
            )));
        }

        let totals = MetricTotals {
            earnings_micros: 3229.0,
            clicks: 9,
            impressions: 930,
            page_views: 412,
        };
        if request.by_domain {
            Ok(vec![
                ReportRow {
                    dimension: Some("perpustakaan.id".to_string()),
                    totals,
                },
                ReportRow {
                    dimension: Some("m.perpustakaan.id".to_string()),
                    totals: MetricTotals {
                        earnings_micros: 1000.0,
                        ..totals
                    },
                },
            ])
        } else {
            Ok(vec![ReportRow { dimension: None, totals }])
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn build_service(db: &Path, ttl: Duration) -> (ReportingService, Arc<FixedProvider>) {
    let store = AccountStore::open(db).unwrap();
    let provider = Arc::new(FixedProvider::default());
    let service = ReportingService::new(store, Arc::new(TtlCache::new(ttl)), provider.clone(), ttl);
    (service, provider)
}

#[tokio::test]
async fn test_reports_end_to_end() {
    let dir = tempdir().unwrap();
    let (service, provider) = build_service(&dir.path().join("accounts.json"), Duration::from_secs(60));

    service
        .add_account(NewAccount::new("perpustakaan", "pub-1111", "Perpustakaan").website_url("https://perpustakaan.id"))
        .await
        .unwrap();
    service
        .add_account(NewAccount::new("broken", "pub-broken", "Broken"))
        .await
        .unwrap();

    let report = service.earnings("perpustakaan", &DateQuery::today()).await.unwrap();
    assert_eq!(report.data_age_days, 0);
    assert_eq!(report.earnings, 3.23);
    assert_eq!(report.ctr, 0.97);
    assert_eq!(report.cpm, 3.47);
    assert_eq!(report.rpm, 7.84);

    let domains = service
        .domain_earnings("perpustakaan", Some("m."), &DateQuery::today())
        .await
        .unwrap();
    assert_eq!(domains.domains.len(), 1);
    assert_eq!(domains.domains[0].domain, "m.perpustakaan.id");

    let summary = service.summary(&DateQuery::today()).await.unwrap();
    assert_eq!(summary.total_accounts, 2);
    assert_eq!(summary.total_earnings, 3.23);
    assert_eq!(summary.accounts.iter().filter(|a| a.status == "error").count(), 1);

    let requests = provider.requests.load(Ordering::SeqCst);
    service.earnings("perpustakaan", &DateQuery::today()).await.unwrap();
    service.summary(&DateQuery::today()).await.unwrap();
    assert_eq!(provider.requests.load(Ordering::SeqCst), requests);

    let stats = service.cache_stats();
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hit_rate_percent, 40.0);

    let entries = service.cache_entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.value_type == "object" && !e.is_expired));
}

#[tokio::test]
async fn test_expired_reports_are_refetched() {
    let dir = tempdir().unwrap();
    let (service, provider) = build_service(&dir.path().join("accounts.json"), Duration::from_millis(30));
    service
        .add_account(NewAccount::new("site", "pub-1", "Site"))
        .await
        .unwrap();

    service.earnings("site", &DateQuery::today()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    service.earnings("site", &DateQuery::today()).await.unwrap();

    assert_eq!(provider.requests.load(Ordering::SeqCst), 2);
    assert_eq!(service.cache_stats().hits, 0);
}

#[tokio::test]
async fn test_account_lifecycle_through_service() {
    let dir = tempdir().unwrap();
    let (service, _provider) = build_service(&dir.path().join("accounts.json"), Duration::from_secs(60));

    service
        .add_account(NewAccount::new("gowesgo", "pub-2222", "Gowesgo").category("sports"))
        .await
        .unwrap();

    let duplicate = service
        .add_account(NewAccount::new("gowesgo", "pub-9999", "Again"))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, GatewayError::AlreadyExists(_)));

    let updated = service
        .update_account("gowesgo", &AccountUpdate::status(AccountStatus::Active))
        .await
        .unwrap();
    assert!(updated.is_active());
    assert_eq!(updated.metadata.category.as_deref(), Some("sports"));

    let stats = service.database_stats().await;
    assert_eq!(stats.statistics.active_accounts, 1);

    service.remove_account("gowesgo", false).await.unwrap();
    assert!(service.list_accounts().await.is_empty());
    assert!(matches!(
        service.earnings("gowesgo", &DateQuery::today()).await,
        Err(GatewayError::NotFound(_))
    ));
}

#[test]
fn test_store_survives_restart() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("accounts.json");

    {
        let (service, _provider) = build_service(&db, Duration::from_secs(60));
        tokio_test::block_on(service.add_account(NewAccount::new("persisted", "pub-3", "Persisted"))).unwrap();
    }

    let (service, _provider) = build_service(&db, Duration::from_secs(60));
    let account = tokio_test::block_on(service.get_account("persisted")).unwrap();
    assert_eq!(account.account_id, "pub-3");
    assert_eq!(account.status, AccountStatus::Inactive);
}
