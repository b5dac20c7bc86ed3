//! Failures reported by key-value stores

use thiserror::Error;

/// Transport and service failures surfaced by a store
///
/// The repository wraps these with the operation name and key before handing
/// them to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Request throttled: {message}")]
    Throttled { message: String },

    #[error("Conditional check failed: {message}")]
    ConditionalCheckFailed { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },
}

impl StoreError {
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
        }
    }

    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::ConditionalCheckFailed {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
