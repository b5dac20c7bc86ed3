//! Storage domain - vocabulary shared by every key-value store adapter

mod attribute;
mod error;
mod expression;
mod repository;

pub use attribute::{decode_number, encode_number, AttributeValue, Item};
pub use error::StoreError;
pub use expression::{AttributePath, UpdateExpressionBuilder, UpdateRequest};
pub use repository::KeyValueStore;

#[cfg(test)]
pub use repository::MockKeyValueStore;
