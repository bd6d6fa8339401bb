use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use docent_core::config::{AppConfig, ConfigError, LoadOptions};
use docent_core::IntentCatalog;
use docent_engine::classifier::IntentClassifier;
use docent_engine::dispatcher::Dispatcher;
use docent_engine::generator::{GeneratorSettings, ReplyGenerator};
use docent_engine::llm::LlmClient;
use docent_platform::ForumHttpClient;
use docent_store::{connect, migrations, DbPool, SqlHandledPostRepository};

use crate::llm_http::OpenAiCompatibleLlm;
use crate::retrieval_http::HttpRetrievalGateway;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Dispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        platform_base_url = %config.platform.base_url,
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let repository = Arc::new(SqlHandledPostRepository::new(db_pool.clone()));
    let platform =
        Arc::new(ForumHttpClient::new(&config.platform).map_err(BootstrapError::HttpClient)?);
    let llm: Arc<dyn LlmClient> =
        Arc::new(OpenAiCompatibleLlm::new(&config.llm).map_err(BootstrapError::HttpClient)?);
    let retrieval = Arc::new(
        HttpRetrievalGateway::new(&config.retrieval).map_err(BootstrapError::HttpClient)?,
    );

    let classifier = IntentClassifier::new(
        llm.clone(),
        IntentCatalog::default(),
        config.engine.max_intent_tokens,
    );
    let generator = ReplyGenerator::new(
        llm,
        retrieval,
        GeneratorSettings {
            retrieval_k: config.retrieval.k,
            history_window: config.engine.history_window,
            max_reply_tokens: config.engine.max_reply_tokens,
        },
    );
    let dispatcher = Dispatcher::new(
        platform,
        repository,
        classifier,
        generator,
        config.engine.feedback_rules(),
        config.platform.api_username.clone(),
        Duration::from_secs(config.engine.poll_interval_secs),
    );

    Ok(Application { config, db_pool, dispatcher })
}

#[cfg(test)]
mod tests {
    use docent_core::config::{ConfigOverrides, LoadOptions};
    use sqlx::Row;

    use super::bootstrap;

    fn valid_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                platform_base_url: Some("https://forum.example.com".to_string()),
                platform_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_platform_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("platform."), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_dispatcher_state() {
        let app = bootstrap(valid_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let table_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name = 'handled_posts'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("handled_posts table should exist after bootstrap")
        .get::<i64, _>("count");
        assert_eq!(table_count, 1);

        let state = app.dispatcher.load_state().await.expect("state replay");
        assert_eq!(state.handled_count(), 0);
        assert_eq!(state.open_session_count(), 0);
    }
}
