//! Key-value store backed team repository

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::context::RequestContext;
use crate::domain::storage::{
    AttributePath, AttributeValue, KeyValueStore, StoreError, UpdateExpressionBuilder,
};
use crate::domain::team::{attributes, Team, TeamRepository};
use crate::domain::DomainError;

/// Team repository issuing point reads, writes and update expressions
///
/// Holds no mutable state; clones of the store handle can back any number of
/// repositories and tables at once.
pub struct KeyValueTeamRepository {
    store: Arc<dyn KeyValueStore>,
    table_name: String,
    default_timeout: Option<Duration>,
}

impl Debug for KeyValueTeamRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueTeamRepository")
            .field("backend", &self.store.backend_name())
            .field("table_name", &self.table_name)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl KeyValueTeamRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, table_name: impl Into<String>) -> Self {
        Self {
            store,
            table_name: table_name.into(),
            default_timeout: None,
        }
    }

    /// Deadline used when the caller's context carries none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn effective_context(&self, ctx: &RequestContext) -> RequestContext {
        match (ctx.deadline(), self.default_timeout) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }

    /// Runs one store call under the context, attaching operation and key to failures
    async fn execute<T, F>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        id: &str,
        request: F,
    ) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match self.effective_context(ctx).run(request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, id = %id, error = %e, "Store request failed");
                Err(DomainError::store(operation, id, e))
            }
            Err(reason) => {
                warn!(operation, id = %id, %reason, "Store request interrupted");
                Err(DomainError::cancelled(operation, id, reason))
            }
        }
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        id: &str,
        builder: UpdateExpressionBuilder,
    ) -> Result<(), DomainError> {
        let key = Team::key_for(id)?;
        let update = builder.build()?;

        debug!(
            operation,
            id = %id,
            expression = %update.expression,
            "Issuing update"
        );

        self.execute(
            ctx,
            operation,
            id,
            self.store.update_item(&self.table_name, &key, &update),
        )
        .await
    }
}

#[async_trait]
impl TeamRepository for KeyValueTeamRepository {
    async fn create(&self, ctx: &RequestContext, team: &Team) -> Result<(), DomainError> {
        info!(id = %team.id(), name = %team.name(), "Creating team");

        let item = team.to_item()?;

        self.execute(
            ctx,
            "create",
            team.id(),
            self.store.put_item(&self.table_name, item),
        )
        .await
    }

    async fn find(&self, ctx: &RequestContext, id: &str) -> Result<Option<Team>, DomainError> {
        let key = Team::key_for(id)?;

        let item = self
            .execute(ctx, "get", id, self.store.get_item(&self.table_name, &key))
            .await?;

        match item {
            Some(item) => Team::from_item(&item).map(Some),
            None => {
                debug!(id = %id, "Team not found");
                Ok(None)
            }
        }
    }

    async fn add_to_reserve(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError> {
        Team::key_for(id)?;

        if numbers.is_empty() {
            debug!(id = %id, "Nothing to add to reserve");
            return Ok(());
        }

        info!(id = %id, count = numbers.len(), "Adding to reserve");

        let builder = UpdateExpressionBuilder::new().add(
            AttributePath::new(attributes::RESERVE),
            AttributeValue::number_set(numbers.iter().copied()),
        );

        self.update(ctx, "add_to_reserve", id, builder).await
    }

    async fn remove_from_reserve(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError> {
        Team::key_for(id)?;

        if numbers.is_empty() {
            debug!(id = %id, "Nothing to remove from reserve");
            return Ok(());
        }

        info!(id = %id, count = numbers.len(), "Removing from reserve");

        let builder = UpdateExpressionBuilder::new().delete(
            AttributePath::new(attributes::RESERVE),
            AttributeValue::number_set(numbers.iter().copied()),
        );

        self.update(ctx, "remove_from_reserve", id, builder).await
    }

    async fn append_to_batting_order(
        &self,
        ctx: &RequestContext,
        id: &str,
        numbers: &[i64],
    ) -> Result<(), DomainError> {
        Team::key_for(id)?;

        if numbers.is_empty() {
            debug!(id = %id, "Nothing to append to batting order");
            return Ok(());
        }

        info!(id = %id, count = numbers.len(), "Appending to batting order");

        let builder = UpdateExpressionBuilder::new().set_list_append(
            AttributePath::new(attributes::BATTING_ORDER),
            AttributeValue::number_list(numbers.iter().copied()),
        );

        self.update(ctx, "append_to_batting_order", id, builder).await
    }

    async fn remove_from_batting_order(
        &self,
        ctx: &RequestContext,
        id: &str,
        indices: &[usize],
    ) -> Result<(), DomainError> {
        Team::key_for(id)?;

        // One request, highest position first, each position once
        let mut positions = indices.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        if positions.is_empty() {
            debug!(id = %id, "Nothing to remove from batting order");
            return Ok(());
        }

        info!(id = %id, positions = ?positions, "Removing from batting order");

        let builder = positions
            .iter()
            .fold(UpdateExpressionBuilder::new(), |builder, &index| {
                builder.remove(AttributePath::new(attributes::BATTING_ORDER).index(index))
            });

        self.update(ctx, "remove_from_batting_order", id, builder).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mockall::predicate::eq;

    use super::*;
    use crate::domain::context::{CancellationSource, Interruption};
    use crate::domain::storage::{Item, MockKeyValueStore, UpdateRequest};
    use crate::infrastructure::storage::InMemoryKeyValueStore;

    const TABLE: &str = "BaseballTeams";

    fn create_repo() -> (Arc<InMemoryKeyValueStore>, KeyValueTeamRepository) {
        let store = Arc::new(InMemoryKeyValueStore::with_table(TABLE, attributes::ID));
        let repo = KeyValueTeamRepository::new(store.clone(), TABLE);
        (store, repo)
    }

    fn create_team(id: &str, name: &str) -> Team {
        Team::new(id, name)
            .with_batting_order([1, 2, 3])
            .with_reserve([4, 5, 6])
    }

    async fn seeded(id: &str) -> KeyValueTeamRepository {
        let (_, repo) = create_repo();
        repo.create(&RequestContext::background(), &create_team(id, "Team"))
            .await
            .unwrap();
        repo
    }

    fn set(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background();
        let team = create_team("test001", "Team 1");

        repo.create(&ctx, &team).await.unwrap();

        let retrieved = repo.get(&ctx, "test001").await.unwrap();
        assert_eq!(retrieved, team);
    }

    #[tokio::test]
    async fn test_create_overwrites() {
        let (store, repo) = create_repo();
        let ctx = RequestContext::background();

        repo.create(&ctx, &create_team("test001", "Team 1")).await.unwrap();
        let replacement = Team::new("test001", "Renamed").with_batting_order([9]);
        repo.create(&ctx, &replacement).await.unwrap();

        assert_eq!(repo.get(&ctx, "test001").await.unwrap(), replacement);
        assert_eq!(store.item_count(TABLE).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_absent_returns_default() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background();

        assert_eq!(repo.get(&ctx, "invalid").await.unwrap(), Team::default());
        assert_eq!(repo.find(&ctx, "invalid").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_present() {
        let repo = seeded("test002").await;
        let found = repo
            .find(&RequestContext::background(), "test002")
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.name().to_string()), Some("Team".to_string()));
    }

    #[tokio::test]
    async fn test_add_to_reserve() {
        let repo = seeded("test003").await;
        let ctx = RequestContext::background();

        repo.add_to_reserve(&ctx, "test003", &[7, 8, 9]).await.unwrap();

        let team = repo.get(&ctx, "test003").await.unwrap();
        assert_eq!(team.reserve(), &set(&[4, 5, 6, 7, 8, 9]));
    }

    #[tokio::test]
    async fn test_add_to_reserve_is_idempotent() {
        let repo = seeded("test003").await;
        let ctx = RequestContext::background();

        repo.add_to_reserve(&ctx, "test003", &[10]).await.unwrap();
        repo.add_to_reserve(&ctx, "test003", &[10, 10, 4]).await.unwrap();

        let team = repo.get(&ctx, "test003").await.unwrap();
        assert_eq!(team.reserve(), &set(&[4, 5, 6, 10]));
    }

    #[tokio::test]
    async fn test_add_to_reserve_creates_set_on_absent_team() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background();

        repo.add_to_reserve(&ctx, "fresh", &[1]).await.unwrap();

        let team = repo.get(&ctx, "fresh").await.unwrap();
        assert_eq!(team.id(), "fresh");
        assert_eq!(team.reserve(), &set(&[1]));
    }

    #[tokio::test]
    async fn test_remove_from_reserve() {
        let repo = seeded("test004").await;
        let ctx = RequestContext::background();

        repo.remove_from_reserve(&ctx, "test004", &[4]).await.unwrap();

        let team = repo.get(&ctx, "test004").await.unwrap();
        assert_eq!(team.reserve(), &set(&[5, 6]));
    }

    #[tokio::test]
    async fn test_remove_absent_from_reserve_is_safe() {
        let repo = seeded("test004").await;
        let ctx = RequestContext::background();

        repo.remove_from_reserve(&ctx, "test004", &[99]).await.unwrap();
        repo.remove_from_reserve(&ctx, "test004", &[99]).await.unwrap();

        let team = repo.get(&ctx, "test004").await.unwrap();
        assert_eq!(team.reserve(), &set(&[4, 5, 6]));
    }

    #[tokio::test]
    async fn test_remove_whole_reserve() {
        let repo = seeded("test004").await;
        let ctx = RequestContext::background();

        repo.remove_from_reserve(&ctx, "test004", &[4, 5, 6]).await.unwrap();

        let team = repo.get(&ctx, "test004").await.unwrap();
        assert!(team.reserve().is_empty());
        assert_eq!(team.batting_order(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_append_to_batting_order() {
        let repo = seeded("test005").await;
        let ctx = RequestContext::background();

        repo.append_to_batting_order(&ctx, "test005", &[10, 11])
            .await
            .unwrap();

        let team = repo.get(&ctx, "test005").await.unwrap();
        assert_eq!(team.batting_order(), &[1, 2, 3, 10, 11]);
    }

    #[tokio::test]
    async fn test_append_is_not_idempotent() {
        let repo = seeded("test005").await;
        let ctx = RequestContext::background();

        repo.append_to_batting_order(&ctx, "test005", &[3]).await.unwrap();
        repo.append_to_batting_order(&ctx, "test005", &[3]).await.unwrap();

        let team = repo.get(&ctx, "test005").await.unwrap();
        assert_eq!(team.batting_order(), &[1, 2, 3, 3, 3]);
    }

    #[tokio::test]
    async fn test_remove_from_batting_order() {
        let repo = seeded("test006").await;
        let ctx = RequestContext::background();

        repo.remove_from_batting_order(&ctx, "test006", &[1, 2])
            .await
            .unwrap();

        let team = repo.get(&ctx, "test006").await.unwrap();
        assert_eq!(team.batting_order(), &[1]);
    }

    #[tokio::test]
    async fn test_remove_from_batting_order_any_index_order() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background();
        repo.create(
            &ctx,
            &Team::new("test007", "Team 7").with_batting_order([10, 20, 30, 40, 50]),
        )
        .await
        .unwrap();

        repo.remove_from_batting_order(&ctx, "test007", &[0, 3, 3, 1])
            .await
            .unwrap();

        let team = repo.get(&ctx, "test007").await.unwrap();
        assert_eq!(team.batting_order(), &[30, 50]);
    }

    #[tokio::test]
    async fn test_remove_out_of_range_index() {
        let repo = seeded("test008").await;
        let ctx = RequestContext::background();

        repo.remove_from_batting_order(&ctx, "test008", &[2, 10])
            .await
            .unwrap();

        let team = repo.get(&ctx, "test008").await.unwrap();
        assert_eq!(team.batting_order(), &[1, 2]);
    }

    #[tokio::test]
    async fn test_empty_inputs_do_not_touch_the_store() {
        let mut store = MockKeyValueStore::new();
        store.expect_update_item().never();

        let repo = KeyValueTeamRepository::new(Arc::new(store), TABLE);
        let ctx = RequestContext::background();

        repo.add_to_reserve(&ctx, "t", &[]).await.unwrap();
        repo.remove_from_reserve(&ctx, "t", &[]).await.unwrap();
        repo.append_to_batting_order(&ctx, "t", &[]).await.unwrap();
        repo.remove_from_batting_order(&ctx, "t", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_id_is_an_encoding_error() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background();

        let errors = [
            repo.find(&ctx, "").await.unwrap_err(),
            repo.create(&ctx, &Team::default()).await.unwrap_err(),
            repo.add_to_reserve(&ctx, "", &[1]).await.unwrap_err(),
            repo.remove_from_reserve(&ctx, "", &[1]).await.unwrap_err(),
            repo.append_to_batting_order(&ctx, "", &[1]).await.unwrap_err(),
            repo.remove_from_batting_order(&ctx, "", &[0]).await.unwrap_err(),
        ];

        for error in errors {
            assert!(matches!(error, DomainError::Encoding { .. }), "{}", error);
        }
    }

    #[tokio::test]
    async fn test_update_requests_sent_to_store() {
        let key = Team::key_for("t1").unwrap();
        let expected = UpdateRequest {
            expression: "REMOVE #0[2], #0[1]".to_string(),
            names: [("#0".to_string(), "batting_order".to_string())]
                .into_iter()
                .collect(),
            values: Default::default(),
        };

        let mut store = MockKeyValueStore::new();
        store
            .expect_update_item()
            .with(eq(TABLE), eq(key), eq(expected))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let repo = KeyValueTeamRepository::new(Arc::new(store), TABLE);

        repo.remove_from_batting_order(&RequestContext::background(), "t1", &[1, 2])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reserve_members_sent_as_number_set() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_update_item()
            .withf(|_, _, update: &UpdateRequest| {
                update.expression == "ADD #0 :0"
                    && update.names.get("#0").map(String::as_str) == Some("reserve")
                    && update.values.get(":0")
                        == Some(&AttributeValue::Ns(vec!["7".into(), "-8".into()]))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let repo = KeyValueTeamRepository::new(Arc::new(store), TABLE);

        repo.add_to_reserve(&RequestContext::background(), "t1", &[7, -8, 7])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_error_carries_operation_and_key() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_update_item()
            .returning(|_, _, _| Err(StoreError::throttled("slow down")));

        let repo = KeyValueTeamRepository::new(Arc::new(store), TABLE);
        let err = repo
            .append_to_batting_order(&RequestContext::background(), "t9", &[1])
            .await
            .unwrap_err();

        match err {
            DomainError::Store {
                operation,
                key,
                source,
            } => {
                assert_eq!(operation, "append_to_batting_order");
                assert_eq!(key, "t9");
                assert_eq!(source, StoreError::throttled("slow down"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_list_append_on_team_without_list_is_store_error() {
        let (store, repo) = create_repo();
        let ctx = RequestContext::background();
        store
            .put_item(TABLE, Team::key_for("bare").unwrap())
            .await
            .unwrap();

        let err = repo
            .append_to_batting_order(&ctx, "bare", &[1])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Store {
                source: StoreError::Validation { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_item_is_decoding_error() {
        let (store, repo) = create_repo();
        let mut item: Item = Team::key_for("broken").unwrap();
        item.insert(
            attributes::RESERVE.to_string(),
            AttributeValue::Ss(vec!["ace".into()]),
        );
        store.put_item(TABLE, item).await.unwrap();

        let err = repo
            .get(&RequestContext::background(), "broken")
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Decoding { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (_, repo) = create_repo();
        let source = CancellationSource::new();
        let ctx = RequestContext::background().with_cancellation(source.token());
        source.cancel();

        let err = repo.add_to_reserve(&ctx, "t1", &[1]).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Cancelled {
                operation: "add_to_reserve",
                reason: Interruption::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let mut store = MockKeyValueStore::new();
        store.expect_get_item().returning(|_, _| Ok(None));

        let repo = KeyValueTeamRepository::new(Arc::new(store), TABLE)
            .with_default_timeout(Duration::from_millis(0));

        let err = repo
            .find(&RequestContext::background(), "slow")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Cancelled {
                reason: Interruption::DeadlineExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_request() {
        let (_, repo) = create_repo();
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(10));

        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        };

        let err = repo.execute(&ctx, "create", "t1", slow).await.unwrap_err();

        assert!(err.is_cancelled());
    }
}
