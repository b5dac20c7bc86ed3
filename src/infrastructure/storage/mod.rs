//! Storage infrastructure - Key-value store implementations

mod dynamodb;
mod evaluator;
mod factory;
mod in_memory;

pub use dynamodb::{DynamoDbConfig, DynamoDbStore};
pub use factory::{StoreFactory, StoreType};
pub use in_memory::InMemoryKeyValueStore;
