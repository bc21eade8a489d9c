use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::providers::adsense::DEFAULT_API_BASE;

/// Runtime configuration, read from the environment by the binaries
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub db_path: PathBuf,
    pub credentials_dir: PathBuf,
    pub port: u16,
    pub cache_ttl: Duration,
    /// Zero disables the periodic sweep
    pub cleanup_interval: Duration,
    pub api_base: String,
    pub http_timeout: Duration,
    pub reset_corrupt_db: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let db_path = PathBuf::from("accounts.json");
        Self {
            credentials_dir: parent_dir(&db_path),
            db_path,
            port: 8000,
            cache_ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: Duration::from_secs(30),
            reset_corrupt_db: false,
        }
    }
}

impl GatewayConfig {
    /// Load from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db_path = lookup("ACCOUNTS_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let credentials_dir = lookup("CREDENTIALS_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| parent_dir(&db_path));

        Self {
            credentials_dir,
            db_path,
            port: parse_or(&lookup, "PORT", defaults.port),
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl.as_secs())),
            cleanup_interval: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
            api_base: lookup("ADSENSE_API_BASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_base),
            http_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ADSENSE_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
            reset_corrupt_db: lookup("RESET_CORRUPT_DB")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.reset_corrupt_db),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}='{}', using {}", name, raw, default);
                default
            }
        },
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
