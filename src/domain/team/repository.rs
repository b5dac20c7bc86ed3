//! Team repository trait

use async_trait::async_trait;

use super::entity::Team;
use crate::domain::context::RequestContext;
use crate::domain::DomainError;

/// Repository for teams
///
/// Reserve operations are idempotent; batting order operations are not.
#[async_trait]
pub trait TeamRepository: Send + Sync + std::fmt::Debug {
    /// Writes the whole team, replacing any team with the same id
    async fn create(&self, ctx: &RequestContext, team: &Team) -> Result<(), DomainError>;

    /// Reads a team, `None` when no item exists under `id`
    async fn find(&self, ctx: &RequestContext, id: &str) -> Result<Option<Team>, DomainError>;

    /// Reads a team, falling back to `Team::default()` when absent
    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Team, DomainError> {
        Ok(self.find(ctx, id).await?.unwrap_or_default())
    }

    /// Set-union of `numbers` into the reserve
    async fn add_to_reserve(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError>;

    /// Set-subtraction of `numbers` from the reserve; absent values are ignored
    async fn remove_from_reserve(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError>;

    /// Appends `numbers`, in order, to the end of the batting order
    async fn append_to_batting_order(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError>;

    /// Removes the batting order elements at the zero-based `indices`
    ///
    /// All positions refer to the list as stored when the request is applied.
    async fn remove_from_batting_order(
        &self,
        ctx: &RequestContext,
        id: &str,
        indices: &[usize],
    ) -> Result<(), DomainError>;
}
