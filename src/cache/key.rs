use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::core::DateQuery;

/// Length of the hex digest embedded in every key
const DIGEST_LEN: usize = 8;

/// Builder for deterministic cache keys
///
/// Keys look like `prefix:digest:[["name",value],...]`. Parameters are kept
/// sorted by name, so the order they are supplied in never changes the key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    prefix: String,
    params: BTreeMap<String, Value>,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a named parameter; `None` values are encoded as `null`
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn build(&self) -> String {
        let pairs: Vec<(&String, &Value)> = self.params.iter().collect();
        // Serializing strings and JSON values into a Vec cannot fail.
        let encoded = serde_json::to_string(&pairs).unwrap_or_default();
        let digest = hex::encode(Sha256::digest(encoded.as_bytes()));

        format!("{}:{}:{}", self.prefix, &digest[..DIGEST_LEN], encoded)
    }
}

fn with_date_query(key: CacheKey, query: &DateQuery) -> CacheKey {
    key.param("date_filter", query.date_filter.map(|f| f.as_str()))
        .param("custom_date", query.custom_date.clone())
        .param("start_date", query.start_date.clone())
        .param("end_date", query.end_date.clone())
}

/// Key for a single account's earnings report
pub fn earnings_key(account_key: &str, query: &DateQuery) -> String {
    with_date_query(CacheKey::new("today_earnings").param("account_key", account_key), query).build()
}

/// Key for a single account's per-domain breakdown
pub fn domain_earnings_key(account_key: &str, domain_filter: Option<&str>, query: &DateQuery) -> String {
    with_date_query(
        CacheKey::new("domain_earnings")
            .param("account_key", account_key)
            .param("domain_filter", domain_filter),
        query,
    )
    .build()
}

/// Key for the all-accounts summary
pub fn summary_key(query: &DateQuery) -> String {
    with_date_query(CacheKey::new("multi_account_summary"), query).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DateFilter;

    #[test]
    fn test_key_is_order_independent() {
        let a = CacheKey::new("earnings")
            .param("account", "test")
            .param("date", "2025-10-04")
            .build();
        let b = CacheKey::new("earnings")
            .param("date", "2025-10-04")
            .param("account", "test")
            .build();

        assert_eq!(a, b);
    }

    #[test]
    fn test_key_differs_on_values() {
        let a = CacheKey::new("earnings").param("account", "site1").build();
        let b = CacheKey::new("earnings").param("account", "site2").build();
        let c = CacheKey::new("other").param("account", "site1").build();

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_layout_is_debuggable() {
        let key = CacheKey::new("earnings")
            .param("account", "site1")
            .param("custom_date", None::<String>)
            .build();

        let mut parts = key.splitn(3, ':');
        assert_eq!(parts.next(), Some("earnings"));

        let digest = parts.next().unwrap();
        assert_eq!(digest.len(), DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(parts.next(), Some(r#"[["account","site1"],["custom_date",null]]"#));
    }

    #[test]
    fn test_missing_and_null_params_differ() {
        let with_null = CacheKey::new("p").param("x", None::<String>).build();
        let without = CacheKey::new("p").build();
        assert_ne!(with_null, without);
        assert_eq!(without, "p:4f53cda1:[]");
    }

    #[test]
    fn test_named_helpers() {
        let today = DateQuery {
            date_filter: Some(DateFilter::Today),
            ..DateQuery::default()
        };
        let auto = DateQuery::default();

        assert_eq!(earnings_key("site1", &today), earnings_key("site1", &today));
        assert_ne!(earnings_key("site1", &today), earnings_key("site1", &auto));
        assert_ne!(earnings_key("site1", &today), earnings_key("site2", &today));
        assert!(earnings_key("site1", &today).starts_with("today_earnings:"));

        assert_ne!(
            domain_earnings_key("site1", Some("example.com"), &today),
            domain_earnings_key("site1", None, &today)
        );
        assert!(summary_key(&auto).starts_with("multi_account_summary:"));
    }
}
