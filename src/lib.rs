//! # AdSense Gateway
//!
//! Reporting proxy in front of the AdSense Management API:
//! - Flat-file JSON account database with backup, restore and validation
//! - In-memory TTL response cache with hit/miss statistics
//! - Earnings, per-domain and multi-account reports in local currency
//! - Async/await architecture
//! - Multiple interfaces: Rust library, HTTP API, admin CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use adsense_gateway::{AccountStore, AdSenseProvider, DateQuery, ReportingService, TtlCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = AccountStore::open("accounts.json")?;
//!     let provider = AdSenseProvider::new(
//!         "https://adsense.googleapis.com/v2",
//!         Duration::from_secs(30),
//!         ".",
//!     )?;
//!     let service = ReportingService::new(
//!         store,
//!         Arc::new(TtlCache::default()),
//!         Arc::new(provider),
//!         Duration::from_secs(60),
//!     );
//!
//!     let report = service.earnings("perpustakaan", &DateQuery::default()).await?;
//!     println!("{}: {} ({} days old)", report.date, report.earnings, report.data_age_days);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod providers;
pub mod store;

// Re-export primary types
pub use cache::{CacheKey, ResponseCache, TtlCache};
pub use config::GatewayConfig;
pub use core::{DateFilter, DateQuery, DomainBreakdown, EarningsReport, MultiAccountSummary};
pub use engine::{DatabaseStats, ReportingService};
pub use error::{GatewayError, Result};
pub use providers::{AdSenseProvider, ReportingProvider};
pub use store::{
    AccountRecord, AccountStatus, AccountStatusReport, AccountStore, AccountUpdate, ConnectionStatus, NewAccount,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
