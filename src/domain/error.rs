use thiserror::Error;

use super::context::Interruption;
use super::storage::StoreError;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Update expression error: {message}")]
    UpdateExpression { message: String },

    #[error("Decoding error: {message}")]
    Decoding { message: String },

    #[error("Store error in {operation} for key '{key}': {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{operation} for key '{key}' interrupted: {reason}")]
    Cancelled {
        operation: &'static str,
        key: String,
        reason: Interruption,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    pub fn update_expression(message: impl Into<String>) -> Self {
        Self::UpdateExpression {
            message: message.into(),
        }
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    pub fn store(operation: &'static str, key: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation,
            key: key.into(),
            source,
        }
    }

    pub fn cancelled(operation: &'static str, key: impl Into<String>, reason: Interruption) -> Self {
        Self::Cancelled {
            operation,
            key: key.into(),
            reason,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the call was interrupted before the outcome was known
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_store_error_carries_context() {
        let error = DomainError::store(
            "add_to_reserve",
            "team-1",
            StoreError::throttled("slow down"),
        );
        assert_eq!(
            error.to_string(),
            "Store error in add_to_reserve for key 'team-1': Request throttled: slow down"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn test_cancelled_error() {
        let error = DomainError::cancelled("get", "team-1", Interruption::DeadlineExceeded);
        assert_eq!(
            error.to_string(),
            "get for key 'team-1' interrupted: deadline exceeded"
        );
        assert!(error.is_cancelled());
        assert!(!DomainError::encoding("x").is_cancelled());
    }

    #[test]
    fn test_encoding_error() {
        let error = DomainError::encoding("team id must not be empty");
        assert_eq!(error.to_string(), "Encoding error: team id must not be empty");
    }
}
