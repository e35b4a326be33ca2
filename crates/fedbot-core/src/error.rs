//! FedBot error type.

use thiserror::Error;

/// Errors raised by FedBot components.
#[derive(Debug, Error)]
pub enum FedBotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Case source error: {0}")]
    CaseSource(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Malformed case {case}: {reason}")]
    MalformedCase { case: String, reason: String },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FedBotError {
    /// A missing or unparseable field on one case record.
    pub fn malformed(case: &str, reason: impl Into<String>) -> Self {
        Self::MalformedCase {
            case: case.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FedBotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = FedBotError::malformed("01234567", "missing Priority");
        assert_eq!(err.to_string(), "Malformed case 01234567: missing Priority");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FedBotError = json_err.into();
        assert!(matches!(err, FedBotError::Json(_)));
    }
}
