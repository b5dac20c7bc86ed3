//! Roster Store
//!
//! Persistence for baseball teams on top of a schemaless key-value store:
//! - Whole-team upsert and point reads
//! - Reserve maintained as a number set (`ADD` / `DELETE`)
//! - Batting order maintained as a list (`list_append` / indexed `REMOVE`)
//! - DynamoDB-compatible backend plus an in-memory emulator

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{DomainError, RequestContext, Team, TeamRepository};
pub use infrastructure::team::KeyValueTeamRepository;

use std::time::Duration;

use domain::team::attributes;
use infrastructure::logging::init_logging;
use infrastructure::storage::StoreFactory;

/// Builds the team repository described by `config`
pub async fn create_team_repository(
    config: &AppConfig,
) -> Result<KeyValueTeamRepository, DomainError> {
    let store = StoreFactory::create(&config.store, attributes::ID).await?;
    let repository = KeyValueTeamRepository::new(store, &config.store.table_name);

    Ok(match config.store.request_timeout_ms {
        Some(ms) => repository.with_default_timeout(Duration::from_millis(ms)),
        None => repository,
    })
}

/// Loads configuration, installs logging and builds the repository
pub async fn bootstrap() -> Result<KeyValueTeamRepository, DomainError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()
        .map_err(|e| DomainError::configuration(format!("Failed to load config: {}", e)))?;

    init_logging(&config.logging)?;

    let repository = create_team_repository(&config).await?;
    tracing::info!(repository = ?repository, "Team repository ready");

    Ok(repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_team_repository_from_defaults() {
        let config = AppConfig::default();
        let repo = create_team_repository(&config).await.unwrap();
        let ctx = RequestContext::background();

        assert_eq!(repo.table_name(), "BaseballTeams");

        let team = Team::new("test001", "Team 1").with_batting_order([1, 2, 3]);
        repo.create(&ctx, &team).await.unwrap();
        repo.remove_from_batting_order(&ctx, "test001", &[1, 2])
            .await
            .unwrap();

        assert_eq!(repo.get(&ctx, "test001").await.unwrap().batting_order(), &[1]);
    }
}
