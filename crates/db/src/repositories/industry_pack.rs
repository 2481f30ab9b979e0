use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::OnceCell;

use snapquote_core::domain::industry::{
    normalize_industry_key, IndustryModelOverrides, IndustryPack, IndustryPromptOverrides,
    PackMeta, PackProvenance,
};

use super::{decode_json, IndustryPackStore, parse_timestamp, StoreError};
use crate::DbPool;

/// Physical generations of the `industry_pack` table. The first generation
/// stored models and prompts as separate blobs; the current one stores a
/// single consolidated `pack_json`. Both decode to the same logical pack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PackSchema {
    Canonical,
    Legacy,
}

/// SQLite-backed industry pack store.
///
/// The physical schema is probed exactly once per store instance with a
/// zero-row select; an undefined-column error selects the legacy read and
/// write paths. A failed probe is not cached, so a transient connection
/// error does not pin the store to the wrong generation.
pub struct SqlIndustryPackStore {
    pool: DbPool,
    schema: OnceCell<PackSchema>,
}

impl SqlIndustryPackStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, schema: OnceCell::new() }
    }

    async fn schema(&self) -> Result<PackSchema, StoreError> {
        self.schema
            .get_or_try_init(|| async {
                match sqlx::query("SELECT pack_json FROM industry_pack LIMIT 0")
                    .fetch_optional(&self.pool)
                    .await
                {
                    Ok(_) => Ok(PackSchema::Canonical),
                    Err(sqlx::Error::Database(error))
                        if error.message().contains("no such column") =>
                    {
                        Ok(PackSchema::Legacy)
                    }
                    Err(error) => Err(StoreError::Database(error)),
                }
            })
            .await
            .copied()
    }

    async fn latest_row(
        &self,
        key: &str,
        schema: PackSchema,
    ) -> Result<Option<SqliteRow>, StoreError> {
        let query = match schema {
            PackSchema::Canonical => {
                "SELECT version, pack_json, models_json, prompts_json, updated_by, source, updated_at
                 FROM industry_pack
                 WHERE industry_key = ? AND enabled = 1
                 ORDER BY version DESC, updated_at DESC
                 LIMIT 1"
            }
            PackSchema::Legacy => {
                "SELECT version, models_json, prompts_json, updated_by, source, updated_at
                 FROM industry_pack
                 WHERE industry_key = ? AND enabled = 1
                 ORDER BY version DESC, updated_at DESC
                 LIMIT 1"
            }
        };

        sqlx::query(query).bind(key).fetch_optional(&self.pool).await.map_err(StoreError::from)
    }

    async fn next_version(&self, key: &str) -> Result<i64, StoreError> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM industry_pack WHERE industry_key = ?")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;
        Ok(current.unwrap_or(0) + 1)
    }

    async fn catalog_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT industry_key FROM industry_catalog WHERE active = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(normalize_keys(rows))
    }

    async fn tenant_industry_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, Option<String>>(
            "SELECT DISTINCT industry_key FROM tenant_settings WHERE industry_key IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(normalize_keys(rows.into_iter().flatten().collect()))
    }

    async fn packed_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT industry_key FROM industry_pack")
                .fetch_all(&self.pool)
                .await?;
        Ok(normalize_keys(rows))
    }
}

#[async_trait]
impl IndustryPackStore for SqlIndustryPackStore {
    async fn get(&self, industry_key: &str) -> Result<Option<IndustryPack>, StoreError> {
        Ok(self.get_with_meta(industry_key).await?.map(|(pack, _)| pack))
    }

    async fn get_with_meta(
        &self,
        industry_key: &str,
    ) -> Result<Option<(IndustryPack, PackMeta)>, StoreError> {
        let key = normalize_industry_key(industry_key);
        if key.is_empty() {
            return Ok(None);
        }

        let schema = self.schema().await?;
        let Some(row) = self.latest_row(&key, schema).await? else {
            return Ok(None);
        };

        let decoded = match schema {
            PackSchema::Canonical => decode_canonical_row(&row)?,
            PackSchema::Legacy => decode_legacy_row(&row)?,
        };
        Ok(Some(decoded))
    }

    async fn upsert(
        &self,
        industry_key: &str,
        pack: &IndustryPack,
        provenance: PackProvenance,
    ) -> Result<PackMeta, StoreError> {
        let key = normalize_industry_key(industry_key);
        if key.is_empty() {
            return Err(StoreError::Decode("industry key is blank".to_string()));
        }

        let schema = self.schema().await?;
        let version = match provenance.version {
            Some(version) => version,
            None => self.next_version(&key).await?,
        };
        let updated_by = provenance.updated_by.unwrap_or_else(|| "system".to_string());
        let source = provenance.source.unwrap_or_else(|| "manual".to_string());
        let updated_at = Utc::now();

        match schema {
            PackSchema::Canonical => {
                let pack_json = serde_json::to_string(pack).map_err(|error| {
                    StoreError::Decode(format!("industry pack did not serialize: {error}"))
                })?;
                sqlx::query(
                    "INSERT INTO industry_pack
                         (industry_key, version, pack_json, enabled, updated_by, source, updated_at)
                     VALUES (?, ?, ?, 1, ?, ?, ?)
                     ON CONFLICT (industry_key, version) DO UPDATE SET
                         pack_json = excluded.pack_json,
                         enabled = excluded.enabled,
                         updated_by = excluded.updated_by,
                         source = excluded.source,
                         updated_at = excluded.updated_at",
                )
                .bind(&key)
                .bind(version)
                .bind(&pack_json)
                .bind(&updated_by)
                .bind(&source)
                .bind(updated_at.to_rfc3339())
                .execute(&self.pool)
                .await?;
            }
            PackSchema::Legacy => {
                let models_json = serde_json::to_string(&pack.models).map_err(|error| {
                    StoreError::Decode(format!("industry models did not serialize: {error}"))
                })?;
                let prompts_json = serde_json::to_string(&pack.prompts).map_err(|error| {
                    StoreError::Decode(format!("industry prompts did not serialize: {error}"))
                })?;
                sqlx::query(
                    "INSERT INTO industry_pack
                         (industry_key, version, models_json, prompts_json, enabled, updated_by, source, updated_at)
                     VALUES (?, ?, ?, ?, 1, ?, ?, ?)
                     ON CONFLICT (industry_key, version) DO UPDATE SET
                         models_json = excluded.models_json,
                         prompts_json = excluded.prompts_json,
                         enabled = excluded.enabled,
                         updated_by = excluded.updated_by,
                         source = excluded.source,
                         updated_at = excluded.updated_at",
                )
                .bind(&key)
                .bind(version)
                .bind(&models_json)
                .bind(&prompts_json)
                .bind(&updated_by)
                .bind(&source)
                .bind(updated_at.to_rfc3339())
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(PackMeta { version, updated_by, source, updated_at })
    }

    async fn list_keys_missing_pack(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let known = match self.catalog_keys().await {
            Ok(keys) if !keys.is_empty() => keys,
            Ok(_) => self.tenant_industry_keys().await?,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "industry catalog unreadable; falling back to tenant industry keys"
                );
                self.tenant_industry_keys().await?
            }
        };

        let packed = self.packed_keys().await?;
        Ok(known.into_iter().filter(|key| !packed.contains(key)).take(limit).collect())
    }
}

fn decode_canonical_row(row: &SqliteRow) -> Result<(IndustryPack, PackMeta), StoreError> {
    let pack_json: Option<String> = row.try_get("pack_json")?;
    let pack = match pack_json.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => decode_json::<IndustryPack>("industry_pack.pack_json", &raw)?,
        // Rows written before the pack_json migration still carry the
        // split blobs.
        None => decode_legacy_columns(row)?,
    };
    Ok((pack.normalized(), decode_meta(row)?))
}

fn decode_legacy_row(row: &SqliteRow) -> Result<(IndustryPack, PackMeta), StoreError> {
    Ok((decode_legacy_columns(row)?.normalized(), decode_meta(row)?))
}

fn decode_legacy_columns(row: &SqliteRow) -> Result<IndustryPack, StoreError> {
    let models_json: Option<String> = row.try_get("models_json")?;
    let prompts_json: Option<String> = row.try_get("prompts_json")?;

    let models = match models_json.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => decode_json::<IndustryModelOverrides>("industry_pack.models_json", &raw)?,
        None => IndustryModelOverrides::default(),
    };
    let prompts = match prompts_json.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => decode_json::<IndustryPromptOverrides>("industry_pack.prompts_json", &raw)?,
        None => IndustryPromptOverrides::default(),
    };

    Ok(IndustryPack { models, prompts })
}

fn decode_meta(row: &SqliteRow) -> Result<PackMeta, StoreError> {
    let updated_at_raw: String = row.try_get("updated_at")?;
    Ok(PackMeta {
        version: row.try_get("version")?,
        updated_by: row
            .try_get::<Option<String>, _>("updated_by")?
            .unwrap_or_else(|| "system".to_string()),
        source: row.try_get::<Option<String>, _>("source")?.unwrap_or_else(|| "manual".to_string()),
        updated_at: parse_timestamp("industry_pack.updated_at", &updated_at_raw)?,
    })
}

fn normalize_keys(raw: Vec<String>) -> BTreeSet<String> {
    raw.iter()
        .map(|key| normalize_industry_key(key))
        .filter(|key| !key.is_empty())
        .collect()
}
