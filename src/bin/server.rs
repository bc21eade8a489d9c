use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adsense_gateway::cache::{CacheEntryInfo, CacheStats};
use adsense_gateway::store::{AccountStatusReport, AccountSummary};
use adsense_gateway::{
    AccountRecord, AccountStore, AccountUpdate, AdSenseProvider, DatabaseStats, DateFilter, DateQuery,
    DomainBreakdown, EarningsReport, GatewayConfig, GatewayError, MultiAccountSummary, NewAccount,
    ReportingService, TtlCache,
};

#[derive(Clone)]
struct AppState {
    service: Arc<ReportingService>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    provider: String,
    accounts: usize,
    cache_entries: usize,
}

#[derive(Debug, Serialize)]
struct AccountListResponse {
    total: usize,
    accounts: Vec<AccountSummary>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    total: usize,
    accounts: Vec<AccountRecord>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

/// Credential files go with the account unless `delete_files=false`
#[derive(Debug, Deserialize)]
struct RemoveParams {
    #[serde(default = "default_true")]
    delete_files: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct ValidationResponse {
    valid: bool,
    errors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BackupParams {
    #[serde(default)]
    backup_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BackupResponse {
    backup_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RestoreParams {
    backup_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct RestoreResponse {
    restored_from: PathBuf,
    previous_version: PathBuf,
}

/// Date parameters plus the optional domain substring filter
#[derive(Debug, Default, Deserialize)]
struct DomainParams {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    date_filter: Option<DateFilter>,
    #[serde(default)]
    custom_date: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    removed: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adsense_gateway_server=info,adsense_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    tracing::info!("Starting AdSense Gateway Server v{}", adsense_gateway::VERSION);
    tracing::info!("Database: {}", config.db_path.display());
    tracing::info!("Credentials: {}", config.credentials_dir.display());
    tracing::info!("Port: {}", config.port);

    let store = if config.reset_corrupt_db {
        AccountStore::open_or_reset(&config.db_path)?
    } else {
        AccountStore::open(&config.db_path)?
    }
    .with_credentials_dir(&config.credentials_dir);

    let provider = AdSenseProvider::new(&config.api_base, config.http_timeout, &config.credentials_dir)?;
    let service = ReportingService::new(
        store,
        Arc::new(TtlCache::new(config.cache_ttl)),
        Arc::new(provider),
        config.cache_ttl,
    );

    service.startup_check().await;
    if service.spawn_cleanup_task(config.cleanup_interval).is_some() {
        tracing::info!("Cache sweep every {:?}", config.cleanup_interval);
    }

    let state = AppState {
        service: Arc::new(service),
    };

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/accounts", get(list_accounts_handler).post(add_account_handler))
        .route("/api/accounts/search", get(search_accounts_handler))
        .route(
            "/api/accounts/:account_key",
            get(get_account_handler)
                .put(update_account_handler)
                .delete(remove_account_handler),
        )
        .route("/api/accounts/:account_key/status", get(account_status_handler))
        .route("/api/database/stats", get(database_stats_handler))
        .route("/api/database/validate", get(validate_handler))
        .route("/api/database/backup", post(backup_handler))
        .route("/api/database/restore", post(restore_handler))
        .route("/api/earnings/:account_key", get(earnings_handler))
        .route("/api/domain-earnings/:account_key", get(domain_earnings_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/api/cache/entries", get(cache_entries_handler))
        .route("/api/cache/clear", post(clear_cache_handler))
        .route("/api/cache/cleanup", post(cleanup_cache_handler))
        .route("/api/cache/entry/*cache_key", delete(delete_cache_entry_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: adsense_gateway::VERSION.to_string(),
        provider: state.service.provider_name().to_string(),
        accounts: state.service.list_accounts().await.len(),
        cache_entries: state.service.cache_stats().total_entries,
    })
}

async fn list_accounts_handler(State(state): State<AppState>) -> Json<AccountListResponse> {
    let accounts = state.service.list_accounts().await;
    Json(AccountListResponse {
        total: accounts.len(),
        accounts,
    })
}

async fn add_account_handler(
    State(state): State<AppState>,
    Json(new): Json<NewAccount>,
) -> Result<(StatusCode, Json<AccountRecord>), AppError> {
    let account = state.service.add_account(new).await?;
    tracing::info!("Account created: {}", account.account_key);
    Ok((StatusCode::CREATED, Json(account)))
}

async fn search_accounts_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let accounts = state.service.search_accounts(&params.q).await;
    Json(SearchResponse {
        query: params.q,
        total: accounts.len(),
        accounts,
    })
}

async fn get_account_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
) -> Result<Json<AccountRecord>, AppError> {
    Ok(Json(state.service.get_account(&account_key).await?))
}

async fn account_status_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
) -> Result<Json<AccountStatusReport>, AppError> {
    Ok(Json(state.service.account_status(&account_key).await?))
}

async fn update_account_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
    Json(updates): Json<AccountUpdate>,
) -> Result<Json<AccountRecord>, AppError> {
    Ok(Json(state.service.update_account(&account_key, &updates).await?))
}

async fn remove_account_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<MessageResponse>, AppError> {
    state.service.remove_account(&account_key, params.delete_files).await?;
    Ok(Json(MessageResponse {
        message: format!("Account '{}' removed", account_key),
    }))
}

async fn database_stats_handler(State(state): State<AppState>) -> Json<DatabaseStats> {
    Json(state.service.database_stats().await)
}

async fn validate_handler(State(state): State<AppState>) -> Json<ValidationResponse> {
    let errors = state.service.validate_database().await;
    Json(ValidationResponse {
        valid: errors.is_empty(),
        errors,
    })
}

async fn backup_handler(
    State(state): State<AppState>,
    Query(params): Query<BackupParams>,
) -> Result<Json<BackupResponse>, AppError> {
    let backup_path = state.service.create_backup(params.backup_path.as_deref()).await?;
    Ok(Json(BackupResponse { backup_path }))
}

async fn restore_handler(
    State(state): State<AppState>,
    Query(params): Query<RestoreParams>,
) -> Result<Json<RestoreResponse>, AppError> {
    let previous_version = state.service.restore_backup(&params.backup_path).await?;
    Ok(Json(RestoreResponse {
        restored_from: params.backup_path,
        previous_version,
    }))
}

async fn earnings_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<EarningsReport>, AppError> {
    let report = state.service.earnings(&account_key, &query).await?;
    tracing::info!("{} → {} ({})", account_key, report.earnings, report.date);
    Ok(Json(report))
}

async fn domain_earnings_handler(
    State(state): State<AppState>,
    Path(account_key): Path<String>,
    Query(params): Query<DomainParams>,
) -> Result<Json<DomainBreakdown>, AppError> {
    let query = DateQuery {
        date_filter: params.date_filter,
        custom_date: params.custom_date,
        start_date: params.start_date,
        end_date: params.end_date,
    };
    Ok(Json(
        state
            .service
            .domain_earnings(&account_key, params.domain.as_deref(), &query)
            .await?,
    ))
}

async fn summary_handler(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<MultiAccountSummary>, AppError> {
    Ok(Json(state.service.summary(&query).await?))
}

async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service.cache_stats())
}

async fn cache_entries_handler(State(state): State<AppState>) -> Json<Vec<CacheEntryInfo>> {
    Json(state.service.cache_entries())
}

async fn clear_cache_handler(State(state): State<AppState>) -> Json<CountResponse> {
    let removed = state.service.clear_cache();
    tracing::info!("Cache cleared ({} entries)", removed);
    Json(CountResponse { removed })
}

async fn cleanup_cache_handler(State(state): State<AppState>) -> Json<CountResponse> {
    Json(CountResponse {
        removed: state.service.cleanup_cache(),
    })
}

async fn delete_cache_entry_handler(
    State(state): State<AppState>,
    Path(cache_key): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if state.service.delete_cache_entry(&cache_key) {
        Ok(Json(MessageResponse {
            message: format!("Cache entry '{}' deleted", cache_key),
        }))
    } else {
        Err(AppError(GatewayError::NotFound(format!(
            "Cache entry '{}' not found",
            cache_key
        ))))
    }
}

// Error handling
struct AppError(GatewayError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AlreadyExists(_) => StatusCode::CONFLICT,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Provider { .. } | GatewayError::HttpRequest(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!("{} - {}", status, message);
        } else {
            tracing::debug!("{} - {}", status, message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<GatewayError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn remove_params(uri: &str) -> RemoveParams {
        let uri: Uri = uri.parse().unwrap();
        Query::<RemoveParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_remove_deletes_files_by_default() {
        assert!(remove_params("/api/accounts/site1").delete_files);
        assert!(remove_params("/api/accounts/site1?delete_files=true").delete_files);
        assert!(!remove_params("/api/accounts/site1?delete_files=false").delete_files);
    }
}
