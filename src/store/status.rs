use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::store::account::{AccountMetadata, AccountRecord, AccountStatus};
use crate::store::timestamp;

/// Where an account stands in the credential setup flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    MissingClientSecrets,
    NeedsOauth,
    Ready,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::MissingClientSecrets => "missing_client_secrets",
            ConnectionStatus::NeedsOauth => "needs_oauth",
            ConnectionStatus::Ready => "ready",
        }
    }
}

/// A credential artifact as resolved on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub exists: bool,
}

impl ArtifactFile {
    pub fn at(path: PathBuf) -> Self {
        let exists = path.is_file();
        Self { path, exists }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountFiles {
    pub client_secrets: ArtifactFile,
    pub credentials: ArtifactFile,
}

/// Setup state of one account plus what to do next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStatusReport {
    pub account_key: String,
    pub display_name: String,
    pub account_id: String,
    pub status: AccountStatus,
    pub connection_status: ConnectionStatus,
    pub connection_details: String,
    pub files: AccountFiles,
    pub metadata: AccountMetadata,
    pub next_steps: Vec<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub updated_at: DateTime<Utc>,
}

impl AccountStatusReport {
    /// Classify from the files on disk; `credentials_error` is the reason a
    /// present credentials file is still unusable
    pub fn new(account: &AccountRecord, files: AccountFiles, credentials_error: Option<String>) -> Self {
        let (connection_status, connection_details) = if !files.client_secrets.exists {
            (
                ConnectionStatus::MissingClientSecrets,
                "Client secrets file not found".to_string(),
            )
        } else if !files.credentials.exists {
            (ConnectionStatus::NeedsOauth, "Ready for OAuth connection".to_string())
        } else if let Some(reason) = credentials_error {
            (ConnectionStatus::NeedsOauth, reason)
        } else {
            (ConnectionStatus::Ready, "Stored credentials found".to_string())
        };

        let next_steps = next_steps(&account.account_key, connection_status, &files);

        Self {
            account_key: account.account_key.clone(),
            display_name: account.display_name.clone(),
            account_id: account.account_id.clone(),
            status: account.status,
            connection_status,
            connection_details,
            files,
            metadata: account.metadata.clone(),
            next_steps,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.connection_status == ConnectionStatus::Ready
    }
}

fn next_steps(account_key: &str, connection: ConnectionStatus, files: &AccountFiles) -> Vec<String> {
    match connection {
        ConnectionStatus::MissingClientSecrets => vec![
            "Download the OAuth client secrets from Google Cloud Console".to_string(),
            format!("Save them to {}", files.client_secrets.path.display()),
        ],
        ConnectionStatus::NeedsOauth => vec![
            "Complete the OAuth authorization for this account".to_string(),
            format!("Store the resulting token in {}", files.credentials.path.display()),
        ],
        ConnectionStatus::Ready => vec![
            format!("Test earnings: GET /api/earnings/{}", account_key),
            format!("View domains: GET /api/domain-earnings/{}", account_key),
        ],
    }
}
