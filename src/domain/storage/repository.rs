//! Key-value store trait definition

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::attribute::Item;
use super::error::StoreError;
use super::expression::UpdateRequest;

/// Point operations offered by a schemaless key-value table service
///
/// Implementations must be safe to share across tasks; every call is a
/// single request and carries no state over to the next one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Writes the full item, replacing any item with the same key
    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError>;

    /// Reads the item stored under `key`
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError>;

    /// Applies an update expression atomically to the item under `key`
    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateRequest,
    ) -> Result<(), StoreError>;

    /// Deletes the item under `key`; deleting an absent item succeeds
    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), StoreError>;

    /// Short backend identifier used in logs
    fn backend_name(&self) -> &'static str;
}
