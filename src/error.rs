use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Requested account (or file) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Account key already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Malformed key, backup file, date filter, ...
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted account database exists but cannot be loaded
    #[error("Corrupt account database at {}: {message}", path.display())]
    CorruptState { path: PathBuf, message: String },

    /// Credential artifact missing or unusable
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Reporting provider errors
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },
}

impl GatewayError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = GatewayError::NotFound("Account 'site1' not found".to_string());
        assert!(err.to_string().contains("site1"));

        let err = GatewayError::CorruptState {
            path: PathBuf::from("accounts.json"),
            message: "expected value at line 1".to_string(),
        };
        assert!(err.to_string().contains("accounts.json"));

        let err = GatewayError::provider("adsense", "HTTP 401");
        assert_eq!(err.to_string(), "Provider 'adsense' error: HTTP 401");
    }
}
