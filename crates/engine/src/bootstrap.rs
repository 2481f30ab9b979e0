use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use snapquote_core::config::{AppConfig, ConfigError, LoadOptions};
use snapquote_db::repositories::{
    SqlIndustryPackStore, SqlPlatformConfigStore, SqlTenantSettingsStore,
};
use snapquote_db::{connect_with_settings, migrations, DbPool};

use crate::resolution::ResolutionEngine;

/// Everything a front-end (CLI today, HTTP later) needs after startup.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: ResolutionEngine,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Loads configuration, then brings up the database and engine.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting engine bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Brings up the database and engine from an already-validated config.
/// CLI commands load config themselves (for their own error reporting) and
/// enter here.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    // Config validation already proved this parses; a failure here means
    // the environment changed underneath us, and the built-in baseline is
    // still a correct platform layer.
    let seed_patch = match config.platform.ai_defaults_patch() {
        Ok(patch) => patch,
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.seed_patch_invalid",
                correlation_id = "bootstrap",
                error = %error,
                "platform AI defaults unusable; continuing with the built-in baseline"
            );
            None
        }
    };

    let has_platform_key = config.platform.has_openai_key();
    let engine = ResolutionEngine::new(
        Arc::new(SqlPlatformConfigStore::with_seed_patch(db_pool.clone(), seed_patch)),
        Arc::new(SqlIndustryPackStore::new(db_pool.clone())),
        Arc::new(SqlTenantSettingsStore::new(db_pool.clone())),
        has_platform_key,
    );
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        has_platform_key,
        "resolution engine ready"
    );

    Ok(Application { config, db_pool, engine })
}
