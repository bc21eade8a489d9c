use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{GatewayError, Result};
use crate::store::timestamp;

/// Account lifecycle status, driven by the credential flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Error,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "error" => Ok(AccountStatus::Error),
            other => Err(GatewayError::InvalidInput(format!(
                "Unknown status '{}': use active, inactive or error",
                other
            ))),
        }
    }
}

/// Free-form account metadata; unknown keys are preserved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountMetadata {
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AccountMetadata {
    /// Shallow merge: keys in `patch` overwrite, everything else is kept
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Self> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }

        serde_json::from_value(Value::Object(current))
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid metadata: {}", e)))
    }
}

/// One configured reporting account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_key: String,
    /// Publisher ID at the reporting provider, e.g. `pub-123`
    #[serde(default)]
    pub account_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Path to the OAuth client-secret file
    #[serde(default)]
    pub client_secrets: String,
    /// Path to the token/credentials file
    #[serde(default)]
    pub credentials_file: String,
    pub status: AccountStatus,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: AccountMetadata,
}

impl AccountRecord {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Fields the search operation looks at
    pub(crate) fn search_haystack(&self) -> [&str; 5] {
        [
            self.display_name.as_str(),
            self.description.as_str(),
            self.metadata.website_url.as_deref().unwrap_or_default(),
            self.metadata.notes.as_deref().unwrap_or_default(),
            self.account_key.as_str(),
        ]
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            account_key: self.account_key.clone(),
            account_id: self.account_id.clone(),
            display_name: self.display_name.clone(),
            status: self.status,
            created_at: self.created_at,
            website_url: self.metadata.website_url.clone(),
        }
    }
}

/// Listing projection of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_key: String,
    pub account_id: String,
    pub display_name: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub website_url: Option<String>,
}

/// Parameters for adding an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub account_key: String,
    pub account_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub client_secrets: Option<String>,
    #[serde(default)]
    pub credentials_file: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAccount {
    pub fn new(
        account_key: impl Into<String>,
        account_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            account_key: account_key.into(),
            account_id: account_id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn client_secrets(mut self, path: impl Into<String>) -> Self {
        self.client_secrets = Some(path.into());
        self
    }

    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    pub fn website_url(mut self, url: impl Into<String>) -> Self {
        self.website_url = Some(url.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build the stored record; new accounts stay inactive until OAuth completes
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> AccountRecord {
        let client_secrets = self
            .client_secrets
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_client_secrets_path(&self.account_key));
        let credentials_file = self
            .credentials_file
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_credentials_path(&self.account_key));
        let description = self
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("AdSense account for {}", self.display_name));

        AccountRecord {
            account_key: self.account_key,
            account_id: self.account_id,
            display_name: self.display_name,
            description,
            client_secrets,
            credentials_file,
            status: AccountStatus::Inactive,
            created_at: now,
            updated_at: now,
            metadata: AccountMetadata {
                website_url: self.website_url,
                category: self.category,
                notes: self.notes,
                extra: BTreeMap::new(),
            },
        }
    }
}

/// Partial update; only these top-level fields may be overwritten
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
    #[serde(default)]
    pub client_secrets: Option<String>,
    #[serde(default)]
    pub credentials_file: Option<String>,
    /// Shallow-merged into the existing metadata
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl AccountUpdate {
    pub fn status(status: AccountStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn metadata(patch: Map<String, Value>) -> Self {
        Self {
            metadata: Some(patch),
            ..Self::default()
        }
    }

    /// Produce the updated record without touching `record`
    pub(crate) fn apply_to(&self, record: &AccountRecord, now: DateTime<Utc>) -> Result<AccountRecord> {
        let mut updated = record.clone();

        if let Some(account_id) = &self.account_id {
            updated.account_id = account_id.clone();
        }
        if let Some(display_name) = &self.display_name {
            updated.display_name = display_name.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(client_secrets) = &self.client_secrets {
            updated.client_secrets = client_secrets.clone();
        }
        if let Some(credentials_file) = &self.credentials_file {
            updated.credentials_file = credentials_file.clone();
        }
        if let Some(patch) = &self.metadata {
            updated.metadata = record.metadata.merged(patch)?;
        }

        updated.updated_at = now;
        Ok(updated)
    }
}

pub fn default_client_secrets_path(account_key: &str) -> String {
    format!("client_secrets-{}.json", account_key)
}

pub fn default_credentials_path(account_key: &str) -> String {
    format!("adsense-{}.dat", account_key)
}

/// Keys are limited to ASCII letters, digits, `_` and `-`
pub fn is_valid_account_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_validation() {
        assert!(is_valid_account_key("site1"));
        assert!(is_valid_account_key("my_site-2"));
        assert!(!is_valid_account_key(""));
        assert!(!is_valid_account_key("site 1"));
        assert!(!is_valid_account_key("site.com"));
        assert!(!is_valid_account_key("../etc"));
        assert!(!is_valid_account_key("sité"));
    }

    #[test]
    fn test_new_account_defaults() {
        let record = NewAccount::new("site1", "pub-123", "Site One").into_record(Utc::now());

        assert_eq!(record.status, AccountStatus::Inactive);
        assert_eq!(record.client_secrets, "client_secrets-site1.json");
        assert_eq!(record.credentials_file, "adsense-site1.dat");
        assert_eq!(record.description, "AdSense account for Site One");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_metadata_merge_is_shallow() {
        let metadata = AccountMetadata {
            website_url: Some("https://one.example".to_string()),
            category: Some("news".to_string()),
            notes: None,
            extra: BTreeMap::new(),
        };

        let patch = json!({"notes": "x", "owner": "ops"});
        let merged = metadata.merged(patch.as_object().unwrap()).unwrap();

        assert_eq!(merged.website_url.as_deref(), Some("https://one.example"));
        assert_eq!(merged.category.as_deref(), Some("news"));
        assert_eq!(merged.notes.as_deref(), Some("x"));
        assert_eq!(merged.extra.get("owner"), Some(&json!("ops")));
    }

    #[test]
    fn test_update_ignores_unknown_fields() {
        let update: AccountUpdate = serde_json::from_value(json!({
            "display_name": "Renamed",
            "account_key": "hijack",
            "created_at": "1999-01-01T00:00:00"
        }))
        .unwrap();

        let record = NewAccount::new("site1", "pub-123", "Site One").into_record(Utc::now());
        let updated = update.apply_to(&record, Utc::now()).unwrap();

        assert_eq!(updated.display_name, "Renamed");
        assert_eq!(updated.account_key, "site1");
        assert_eq!(updated.created_at, record.created_at);
    }

    #[test]
    fn test_record_accepts_naive_timestamps() {
        let record: AccountRecord = serde_json::from_value(json!({
            "account_key": "legacy",
            "account_id": "pub-9",
            "display_name": "Legacy",
            "status": "active",
            "created_at": "2025-10-04T12:30:00.123456",
            "updated_at": "2025-10-04T12:30:00",
            "metadata": {"website_url": null, "category": null, "notes": null}
        }))
        .unwrap();

        assert!(record.is_active());
        assert_eq!(record.created_at.format("%Y-%m-%d %H:%M").to_string(), "2025-10-04 12:30");
    }
}
