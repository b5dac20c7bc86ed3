//! In-memory key-value store implementation

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::evaluator::{apply_update, validate_value};
use crate::domain::storage::{AttributeValue, Item, KeyValueStore, StoreError, UpdateRequest};

#[derive(Debug)]
struct Table {
    key_attribute: String,
    items: HashMap<String, Item>,
}

impl Table {
    fn new(key_attribute: impl Into<String>) -> Self {
        Self {
            key_attribute: key_attribute.into(),
            items: HashMap::new(),
        }
    }

    /// Storage slot for a key item; the key must hold exactly the key attribute
    fn slot(&self, key: &Item) -> Result<String, StoreError> {
        if key.len() != 1 {
            return Err(key_mismatch());
        }

        self.slot_of(key.get(&self.key_attribute))
    }

    fn slot_of(&self, value: Option<&AttributeValue>) -> Result<String, StoreError> {
        match value {
            Some(AttributeValue::S(id)) if !id.is_empty() => Ok(id.clone()),
            _ => Err(key_mismatch()),
        }
    }
}

fn key_mismatch() -> StoreError {
    StoreError::validation("The provided key element does not match the schema")
}

/// Thread-safe in-memory key-value store
///
/// Evaluates update expressions with the same semantics as the hosted store
/// for the actions this crate issues. Useful for testing and development.
/// Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryKeyValueStore {
    /// Creates a store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one table already present
    pub fn with_table(table: &str, key_attribute: &str) -> Self {
        let store = Self::new();
        {
            let mut tables = store
                .tables
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tables.insert(table.to_string(), Table::new(key_attribute));
        }
        store
    }

    /// Creates the table unless it already exists
    pub fn ensure_table(&self, table: &str, key_attribute: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|e| {
            StoreError::transport(format!("Failed to acquire write lock: {}", e))
        })?;

        tables
            .entry(table.to_string())
            .or_insert_with(|| Table::new(key_attribute));
        Ok(())
    }

    /// Number of items in `table`
    pub fn item_count(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|e| {
            StoreError::transport(format!("Failed to acquire read lock: {}", e))
        })?;

        tables
            .get(table)
            .map(|t| t.items.len())
            .ok_or_else(|| StoreError::table_not_found(table))
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.write().map_err(|e| {
            StoreError::transport(format!("Failed to acquire write lock: {}", e))
        })?;

        let table_state = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        f(table_state)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        item.values().try_for_each(validate_value)?;

        self.with_table_mut(table, |state| {
            let slot = state.slot_of(item.get(&state.key_attribute))?;
            state.items.insert(slot, item);
            Ok(())
        })
    }

    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().map_err(|e| {
            StoreError::transport(format!("Failed to acquire read lock: {}", e))
        })?;

        let state = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        let slot = state.slot(key)?;
        Ok(state.items.get(&slot).cloned())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateRequest,
    ) -> Result<(), StoreError> {
        self.with_table_mut(table, |state| {
            let slot = state.slot(key)?;
            let mut item = state.items.get(&slot).cloned().unwrap_or_else(|| key.clone());

            apply_update(&mut item, &state.key_attribute, update)?;

            state.items.insert(slot, item);
            Ok(())
        })
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), StoreError> {
        self.with_table_mut(table, |state| {
            let slot = state.slot(key)?;
            state.items.remove(&slot);
            Ok(())
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
