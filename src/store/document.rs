use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::store::account::AccountRecord;
use crate::store::timestamp;

pub const DOCUMENT_VERSION: &str = "1.0.0";
pub const SCHEMA_VERSION: &str = "1.0";

/// Top-level sections every database file must carry
pub const REQUIRED_SECTIONS: [&str; 3] = ["_metadata", "accounts", "_statistics"];

/// Fields every stored account must carry
pub const REQUIRED_ACCOUNT_FIELDS: [&str; 3] = ["account_key", "display_name", "status"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub last_modified: DateTime<Utc>,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_description() -> String {
    "AdSense Accounts Database".to_string()
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: default_version(),
            created: now,
            last_modified: now,
            description: default_description(),
            schema_version: default_schema_version(),
        }
    }
}

/// Derived counts; recomputed from `accounts` before every write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatistics {
    #[serde(default)]
    pub total_accounts: usize,
    #[serde(default)]
    pub active_accounts: usize,
    #[serde(default)]
    pub inactive_accounts: usize,
    #[serde(default, with = "timestamp::option")]
    pub last_backup: Option<DateTime<Utc>>,
}

/// The whole account database as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDocument {
    #[serde(rename = "_metadata", default)]
    pub metadata: DocumentMetadata,
    /// Descriptive only, never interpreted
    #[serde(rename = "_schema", default = "default_schema")]
    pub schema: Value,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountRecord>,
    #[serde(rename = "_statistics", default)]
    pub statistics: DocumentStatistics,
}

pub fn default_schema() -> Value {
    json!({
        "account_structure": {
            "account_key": "string (unique identifier)",
            "account_id": "string (AdSense publisher ID)",
            "display_name": "string (human readable name)",
            "description": "string (optional description)",
            "client_secrets": "string (path to client secrets file)",
            "credentials_file": "string (path to OAuth credentials file)",
            "status": "string (active/inactive/error)",
            "created_at": "string (ISO timestamp)",
            "updated_at": "string (ISO timestamp)",
            "metadata": {
                "website_url": "string (optional)",
                "category": "string (optional)",
                "notes": "string (optional)"
            }
        }
    })
}

impl Default for DatabaseDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl DatabaseDocument {
    pub fn empty() -> Self {
        Self {
            metadata: DocumentMetadata::default(),
            schema: default_schema(),
            accounts: BTreeMap::new(),
            statistics: DocumentStatistics::default(),
        }
    }

    /// Recompute the derived counts, keeping `last_backup`
    pub fn refresh_statistics(&mut self) {
        let total = self.accounts.len();
        let active = self.accounts.values().filter(|a| a.is_active()).count();

        self.statistics.total_accounts = total;
        self.statistics.active_accounts = active;
        self.statistics.inactive_accounts = total - active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::account::{AccountStatus, NewAccount};

    #[test]
    fn test_empty_document_has_all_sections() {
        let value = serde_json::to_value(DatabaseDocument::empty()).unwrap();
        for section in REQUIRED_SECTIONS {
            assert!(value.get(section).is_some(), "missing {}", section);
        }
        assert!(value.get("_schema").is_some());
        assert_eq!(value["_statistics"]["last_backup"], Value::Null);
    }

    #[test]
    fn test_refresh_statistics() {
        let mut doc = DatabaseDocument::empty();
        let mut active = NewAccount::new("a", "pub-a", "A").into_record(Utc::now());
        active.status = AccountStatus::Active;
        let mut errored = NewAccount::new("b", "pub-b", "B").into_record(Utc::now());
        errored.status = AccountStatus::Error;
        let inactive = NewAccount::new("c", "pub-c", "C").into_record(Utc::now());

        doc.accounts.insert("a".into(), active);
        doc.accounts.insert("b".into(), errored);
        doc.accounts.insert("c".into(), inactive);
        doc.statistics.total_accounts = 99;
        doc.refresh_statistics();

        assert_eq!(doc.statistics.total_accounts, 3);
        assert_eq!(doc.statistics.active_accounts, 1);
        assert_eq!(doc.statistics.inactive_accounts, 2);
    }

    #[test]
    fn test_missing_sections_are_defaulted() {
        let doc: DatabaseDocument = serde_json::from_str(r#"{"accounts": {}}"#).unwrap();
        assert!(doc.accounts.is_empty());
        assert_eq!(doc.metadata.schema_version, SCHEMA_VERSION);
    }
}
