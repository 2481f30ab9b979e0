use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use snapquote_core::domain::tenant::{PlanTier, TenantOverrides, TenantSettings};

use super::{parse_timestamp, StoreError, TenantSettingsStore};
use crate::DbPool;

/// SQLite-backed tenant settings store.
pub struct SqlTenantSettingsStore {
    pool: DbPool,
}

impl SqlTenantSettingsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantSettingsStore for SqlTenantSettingsStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantSettings>, StoreError> {
        let row = sqlx::query(
            "SELECT tenant_id, display_name, industry_key, plan_tier, monthly_quote_limit,
                    activation_grace_credits, activation_grace_used, openai_key, overrides_json,
                    created_at, updated_at
             FROM tenant_settings
             WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_tenant(&row)).transpose()
    }

    async fn upsert(&self, settings: &TenantSettings) -> Result<(), StoreError> {
        let overrides_json = settings
            .overrides
            .as_ref()
            .map(|overrides| {
                serde_json::to_string(overrides).map_err(|error| {
                    StoreError::Decode(format!("tenant overrides did not serialize: {error}"))
                })
            })
            .transpose()?;

        sqlx::query(
            "INSERT INTO tenant_settings
                 (tenant_id, display_name, industry_key, plan_tier, monthly_quote_limit,
                  activation_grace_credits, activation_grace_used, openai_key, overrides_json,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 industry_key = excluded.industry_key,
                 plan_tier = excluded.plan_tier,
                 monthly_quote_limit = excluded.monthly_quote_limit,
                 activation_grace_credits = excluded.activation_grace_credits,
                 activation_grace_used = excluded.activation_grace_used,
                 openai_key = excluded.openai_key,
                 overrides_json = excluded.overrides_json,
                 created_at = excluded.created_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&settings.tenant_id)
        .bind(&settings.display_name)
        .bind(&settings.industry_key)
        .bind(settings.plan_tier.as_str())
        .bind(settings.monthly_quote_limit.map(i64::from))
        .bind(settings.activation_grace_credits)
        .bind(settings.activation_grace_used)
        .bind(settings.openai_key.as_ref().map(|key| key.expose_secret().to_string())) // ubs:ignore
        .bind(overrides_json)
        .bind(settings.created_at.to_rfc3339())
        .bind(settings.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_overrides(
        &self,
        tenant_id: &str,
        overrides: Option<&TenantOverrides>,
    ) -> Result<bool, StoreError> {
        let overrides_json = overrides
            .map(|overrides| {
                serde_json::to_string(overrides).map_err(|error| {
                    StoreError::Decode(format!("tenant overrides did not serialize: {error}"))
                })
            })
            .transpose()?;

        let result = sqlx::query(
            "UPDATE tenant_settings SET overrides_json = ?, updated_at = ? WHERE tenant_id = ?",
        )
        .bind(overrides_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_tenant(row: &SqliteRow) -> Result<TenantSettings, StoreError> {
    let tenant_id: String = row.try_get("tenant_id")?;
    let plan_tier_raw: String = row.try_get("plan_tier")?;
    let created_at_raw: String = row.try_get("created_at")?;
    let updated_at_raw: String = row.try_get("updated_at")?;

    let industry_key =
        row.try_get::<Option<String>, _>("industry_key")?.filter(|key| !key.trim().is_empty());

    // Corrupt or negative limits read as zero quota, never as unlimited.
    let monthly_quote_limit = row
        .try_get::<Option<i64>, _>("monthly_quote_limit")?
        .map(|limit| u32::try_from(limit).unwrap_or(0));

    let openai_key = row
        .try_get::<Option<String>, _>("openai_key")?
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from); // ubs:ignore

    let overrides = match row.try_get::<Option<String>, _>("overrides_json")? {
        Some(raw) if !raw.trim().is_empty() => match serde_json::from_str(&raw) {
            Ok(overrides) => Some(overrides),
            Err(error) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %error,
                    "tenant overrides blob unreadable; treating tenant as override-free"
                );
                None
            }
        },
        _ => None,
    };

    Ok(TenantSettings {
        plan_tier: parse_plan_tier(&tenant_id, &plan_tier_raw),
        display_name: row.try_get("display_name")?,
        industry_key,
        monthly_quote_limit,
        activation_grace_credits: row.try_get::<i64, _>("activation_grace_credits")?.max(0),
        activation_grace_used: row.try_get::<i64, _>("activation_grace_used")?.max(0),
        openai_key,
        overrides,
        created_at: parse_timestamp("tenant_settings.created_at", &created_at_raw)?,
        updated_at: parse_timestamp("tenant_settings.updated_at", &updated_at_raw)?,
        tenant_id,
    })
}

fn parse_plan_tier(tenant_id: &str, raw: &str) -> PlanTier {
    match raw {
        "free" => PlanTier::Free,
        "trial" => PlanTier::Trial,
        "pro" => PlanTier::Pro,
        "scale" => PlanTier::Scale,
        other => {
            // Unknown tiers read as the most restrictive plan.
            tracing::warn!(tenant_id = %tenant_id, plan_tier = %other, "unknown plan tier");
            PlanTier::Free
        }
    }
}
