use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use snapquote_core::domain::platform::{PlatformConfig, PlatformConfigPatch};

use super::{decode_json, PlatformConfigStore, StoreError};
use crate::DbPool;

/// SQLite-backed platform config store.
///
/// Effective layering on load: hard-coded baseline, then the deploy-time
/// seed patch injected at construction, then the persisted patch row.
/// The persisted row accumulates admin saves, so it wins wherever it
/// speaks; untouched leaves keep seed or baseline values.
pub struct SqlPlatformConfigStore {
    pool: DbPool,
    seed_patch: Option<PlatformConfigPatch>,
}

impl SqlPlatformConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, seed_patch: None }
    }

    pub fn with_seed_patch(pool: DbPool, seed_patch: Option<PlatformConfigPatch>) -> Self {
        Self { pool, seed_patch }
    }

    fn seeded_baseline(&self) -> PlatformConfig {
        let mut config = PlatformConfig::default();
        if let Some(seed) = &self.seed_patch {
            config.apply_patch(seed.clone());
        }
        config
    }

    async fn load_persisted_patch(&self) -> Result<Option<PlatformConfigPatch>, StoreError> {
        let row = sqlx::query("SELECT patch_json FROM platform_ai_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let patch_json: String = row.try_get("patch_json")?;
        decode_json("platform_ai_config.patch_json", &patch_json).map(Some)
    }
}

#[async_trait]
impl PlatformConfigStore for SqlPlatformConfigStore {
    async fn load(&self) -> PlatformConfig {
        let mut config = self.seeded_baseline();

        match self.load_persisted_patch().await {
            Ok(Some(patch)) => config.apply_patch(patch),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "platform config row unreadable; serving seeded defaults"
                );
            }
        }

        config.normalized()
    }

    async fn save(&self, patch: PlatformConfigPatch) -> Result<PlatformConfig, StoreError> {
        let merged = match self.load_persisted_patch().await? {
            Some(previous) => previous.merged_with(patch),
            None => patch,
        };
        let mut merged = merged.normalized();

        let version = merged.version.unwrap_or(1);
        merged.version = Some(version);
        let updated_at = Utc::now();

        let patch_json = serde_json::to_string(&merged).map_err(|error| {
            StoreError::Decode(format!("platform patch did not serialize: {error}"))
        })?;

        sqlx::query(
            "INSERT INTO platform_ai_config (id, patch_json, version, updated_at)
             VALUES (1, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 patch_json = excluded.patch_json,
                 version = excluded.version,
                 updated_at = excluded.updated_at",
        )
        .bind(&patch_json)
        .bind(version)
        .bind(updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let mut config = self.seeded_baseline();
        config.apply_patch(merged);
        let mut config = config.normalized();
        config.updated_at = updated_at;
        Ok(config)
    }
}
