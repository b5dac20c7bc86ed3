//! Store factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::StoreSettings;
use crate::domain::storage::KeyValueStore;
use crate::domain::DomainError;

use super::dynamodb::{DynamoDbConfig, DynamoDbStore};
use super::in_memory::InMemoryKeyValueStore;

/// Supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory store (for testing/development)
    InMemory,
    /// Amazon DynamoDB, or anything speaking its API
    DynamoDb,
}

impl StoreType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "dynamodb" | "dynamo" | "ddb" => Some(Self::DynamoDb),
            _ => None,
        }
    }
}

/// Factory for creating store instances
#[derive(Debug)]
pub struct StoreFactory;

impl StoreFactory {
    /// Creates the configured store; `key_attribute` names the table's hash key
    pub async fn create(
        settings: &StoreSettings,
        key_attribute: &str,
    ) -> Result<Arc<dyn KeyValueStore>, DomainError> {
        let store_type = StoreType::from_str(&settings.backend).ok_or_else(|| {
            DomainError::configuration(format!("Unknown store backend '{}'", settings.backend))
        })?;

        if settings.table_name.is_empty() {
            return Err(DomainError::configuration("Table name must not be empty"));
        }

        info!(backend = ?store_type, table = %settings.table_name, "Creating store");

        match store_type {
            StoreType::InMemory => {
                let store: Arc<dyn KeyValueStore> =
                    Self::create_in_memory(&settings.table_name, key_attribute);
                Ok(store)
            }
            StoreType::DynamoDb => {
                let store = Self::create_dynamodb(settings).await;

                if settings.create_table_if_missing {
                    store
                        .ensure_table(&settings.table_name, key_attribute)
                        .await
                        .map_err(|e| {
                            DomainError::configuration(format!(
                                "Failed to prepare table '{}': {}",
                                settings.table_name, e
                            ))
                        })?;
                }

                Ok(store as Arc<dyn KeyValueStore>)
            }
        }
    }

    /// Creates an in-memory store holding one empty table
    pub fn create_in_memory(table: &str, key_attribute: &str) -> Arc<InMemoryKeyValueStore> {
        Arc::new(InMemoryKeyValueStore::with_table(table, key_attribute))
    }

    /// Creates a DynamoDB store from the connection settings
    pub async fn create_dynamodb(settings: &StoreSettings) -> Arc<DynamoDbStore> {
        let mut config = DynamoDbConfig::new();

        if let Some(region) = &settings.region {
            config = config.with_region(region);
        }

        if let Some(endpoint_url) = &settings.endpoint_url {
            config = config.with_endpoint_url(endpoint_url);
        }

        Arc::new(DynamoDbStore::connect(&config).await)
    }
}
