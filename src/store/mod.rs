//! Flat-file account database.
//!
//! A single JSON document holds every account plus metadata and derived
//! statistics. Each mutation rewrites the whole document (see [`persist`]).
//! The store is single-writer: mutations take `&mut self`, so callers that
//! share it wrap it in a lock.

pub mod account;
pub mod document;
pub mod persist;
pub mod status;
pub mod timestamp;

use chrono::{Local, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{GatewayError, Result};

pub use account::{
    is_valid_account_key, AccountMetadata, AccountRecord, AccountStatus, AccountSummary, AccountUpdate,
    NewAccount,
};
pub use document::{DatabaseDocument, DocumentMetadata, DocumentStatistics};
pub use status::{AccountFiles, AccountStatusReport, ArtifactFile, ConnectionStatus};

/// JSON-file backed account store
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    credentials_dir: PathBuf,
    document: DatabaseDocument,
}

impl AccountStore {
    /// Open the database at `path`, creating and persisting an empty one if absent.
    ///
    /// Returns [`GatewayError::CorruptState`] when the file exists but cannot be
    /// read; use [`AccountStore::open_or_reset`] to continue with an empty
    /// document instead.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let credentials_dir = default_credentials_dir(&path);

        match persist::read_document(&path)? {
            Some(document) => {
                info!("Loaded {} accounts from {}", document.accounts.len(), path.display());
                Ok(Self {
                    path,
                    credentials_dir,
                    document,
                })
            }
            None => {
                let mut store = Self {
                    path,
                    credentials_dir,
                    document: DatabaseDocument::empty(),
                };
                store.save()?;
                info!("Created new accounts database at {}", store.path.display());
                Ok(store)
            }
        }
    }

    /// Like [`AccountStore::open`], but a corrupt file is replaced by an empty
    /// in-memory document. The corrupt file stays on disk until the next write
    /// rotates it to `.bak`.
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Self::open(path.clone()) {
            Err(GatewayError::CorruptState { message, .. }) => {
                warn!(
                    "Account database {} is unreadable ({}); continuing with an empty database",
                    path.display(),
                    message
                );
                Ok(Self {
                    credentials_dir: default_credentials_dir(&path),
                    path,
                    document: DatabaseDocument::empty(),
                })
            }
            other => other,
        }
    }

    /// Directory relative credential paths are resolved against
    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials_dir(&self) -> &Path {
        &self.credentials_dir
    }

    /// Resolve a stored credential path to where it lives on disk
    pub fn resolve_artifact(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.credentials_dir.join(path)
        }
    }

    fn save(&mut self) -> Result<()> {
        self.document.metadata.last_modified = Utc::now();
        self.document.refresh_statistics();
        persist::write_document(&self.path, &self.document)
    }

    pub fn get_account(&self, account_key: &str) -> Option<&AccountRecord> {
        self.document.accounts.get(account_key)
    }

    pub fn account_exists(&self, account_key: &str) -> bool {
        self.document.accounts.contains_key(account_key)
    }

    pub fn all_accounts(&self) -> &BTreeMap<String, AccountRecord> {
        &self.document.accounts
    }

    pub fn active_accounts(&self) -> BTreeMap<String, AccountRecord> {
        self.document
            .accounts
            .iter()
            .filter(|(_, account)| account.is_active())
            .map(|(key, account)| (key.clone(), account.clone()))
            .collect()
    }

    pub fn account_list(&self) -> Vec<AccountSummary> {
        self.document.accounts.values().map(AccountRecord::summary).collect()
    }

    /// Case-insensitive substring search over name, description, website, notes and key
    pub fn search_accounts(&self, query: &str) -> Vec<AccountRecord> {
        let needle = query.to_lowercase();
        self.document
            .accounts
            .values()
            .filter(|account| {
                account
                    .search_haystack()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> &DocumentStatistics {
        &self.document.statistics
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.document.metadata
    }

    pub fn add_account(&mut self, new: NewAccount) -> Result<AccountRecord> {
        if self.account_exists(&new.account_key) {
            return Err(GatewayError::AlreadyExists(format!(
                "Account '{}' already exists",
                new.account_key
            )));
        }
        if !is_valid_account_key(&new.account_key) {
            return Err(GatewayError::InvalidInput(format!(
                "Account key '{}' must contain only letters, numbers, underscores, and hyphens",
                new.account_key
            )));
        }

        let record = new.into_record(Utc::now());
        let key = record.account_key.clone();
        self.document.accounts.insert(key.clone(), record.clone());

        if let Err(e) = self.save() {
            self.document.accounts.remove(&key);
            return Err(e);
        }

        info!("Added new account: {}", key);
        Ok(record)
    }

    pub fn update_account(&mut self, account_key: &str, updates: &AccountUpdate) -> Result<AccountRecord> {
        let current = self
            .get_account(account_key)
            .ok_or_else(|| GatewayError::NotFound(format!("Account '{}' not found", account_key)))?;

        let updated = updates.apply_to(current, Utc::now())?;
        let previous = self
            .document
            .accounts
            .insert(account_key.to_string(), updated.clone());

        if let Err(e) = self.save() {
            if let Some(previous) = previous {
                self.document.accounts.insert(account_key.to_string(), previous);
            }
            return Err(e);
        }

        info!("Updated account: {}", account_key);
        Ok(updated)
    }

    /// Remove an account. Returns `false` if it did not exist.
    ///
    /// With `delete_files`, the client-secret and credentials files are
    /// deleted best-effort; failures are logged only.
    pub fn remove_account(&mut self, account_key: &str, delete_files: bool) -> Result<bool> {
        let Some(account) = self.document.accounts.remove(account_key) else {
            return Ok(false);
        };

        if let Err(e) = self.save() {
            self.document.accounts.insert(account_key.to_string(), account);
            return Err(e);
        }

        if delete_files {
            for stored in [&account.client_secrets, &account.credentials_file] {
                if stored.is_empty() {
                    continue;
                }
                let path = self.resolve_artifact(stored);
                if !path.exists() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => info!("Deleted file: {}", path.display()),
                    Err(e) => warn!("Could not delete file {}: {}", path.display(), e),
                }
            }
        }

        info!("Removed account: {}", account_key);
        Ok(true)
    }

    /// Copy the current database file, by default to a timestamped sibling
    pub fn create_backup(&mut self, backup_path: Option<&Path>) -> Result<PathBuf> {
        let backup_path = match backup_path {
            Some(path) => path.to_path_buf(),
            None => {
                let name = format!("accounts_backup_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
                match self.path.parent() {
                    Some(parent) => parent.join(name),
                    None => PathBuf::from(name),
                }
            }
        };

        if !self.path.exists() {
            self.save()?;
        }
        fs::copy(&self.path, &backup_path)?;

        self.document.statistics.last_backup = Some(Utc::now());
        self.save()?;

        info!("Created backup: {}", backup_path.display());
        Ok(backup_path)
    }

    /// Replace the database with a backup's content.
    ///
    /// The current state is first copied to `<db>.before_restore`; that path
    /// is returned.
    pub fn restore_from_backup(&mut self, backup_path: &Path) -> Result<PathBuf> {
        if !backup_path.exists() {
            return Err(GatewayError::NotFound(format!(
                "Backup file not found: {}",
                backup_path.display()
            )));
        }

        let raw = fs::read_to_string(backup_path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid backup file: {}", e)))?;

        if !value.get("accounts").is_some_and(|a| a.is_object()) {
            return Err(GatewayError::InvalidInput(
                "Invalid backup file: missing accounts section".to_string(),
            ));
        }

        let restored: DatabaseDocument = serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid backup file: {}", e)))?;

        let safety_path = persist::with_suffix(&self.path, ".before_restore");
        let safety_path = self.create_backup(Some(&safety_path))?;

        self.document = restored;
        self.save()?;

        info!("Restored database from backup: {}", backup_path.display());
        info!("Previous version backed up to: {}", safety_path.display());
        Ok(safety_path)
    }

    /// Report integrity problems; never fails
    pub fn validate_database(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match persist::read_raw(&self.path) {
            Ok(Some(raw)) => {
                for section in document::REQUIRED_SECTIONS {
                    if raw.get(section).is_none() {
                        errors.push(format!("Missing section: {}", section));
                    }
                }
                if let Some(accounts) = raw.get("accounts").and_then(|a| a.as_object()) {
                    for (key, account) in accounts {
                        let Some(fields) = account.as_object() else {
                            errors.push(format!("Account {}: invalid data type", key));
                            continue;
                        };
                        for field in document::REQUIRED_ACCOUNT_FIELDS {
                            if !fields.contains_key(field) {
                                errors.push(format!("Account {}: missing field {}", key, field));
                            }
                        }
                    }
                }
            }
            Ok(None) => errors.push(format!("Database file not found: {}", self.path.display())),
            Err(e) => errors.push(format!("Database validation error: {}", e)),
        }

        for (key, account) in &self.document.accounts {
            if account.account_key != *key {
                errors.push(format!(
                    "Account {}: account_key field is '{}'",
                    key, account.account_key
                ));
            }
            if account.display_name.trim().is_empty() {
                errors.push(format!("Account {}: empty display_name", key));
            }
            if !account.client_secrets.is_empty() && !self.resolve_artifact(&account.client_secrets).exists() {
                errors.push(format!(
                    "Account {}: client secrets file not found: {}",
                    key, account.client_secrets
                ));
            }
        }

        errors
    }
}

fn default_credentials_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
