//! Domain layer: entities, storage vocabulary and repository contracts

pub mod context;
pub mod error;
pub mod storage;
pub mod team;

pub use context::{CancellationSource, CancellationToken, Interruption, RequestContext};
pub use error::DomainError;
pub use storage::{
    AttributePath, AttributeValue, Item, KeyValueStore, StoreError, UpdateExpressionBuilder,
    UpdateRequest,
};
pub use team::{Team, TeamRepository};
