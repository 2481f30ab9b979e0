use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::StoreError;

/// Canonical demo seeds and verification contract for the three key-policy
/// tenant states.
const SEED_TENANTS: &[SeedTenantContract] = &[
    SeedTenantContract {
        tenant_id: "tenant-aurora",
        display_name: "Aurora Photo Studio",
        industry_key: "photography",
        plan_tier: "pro",
        monthly_quote_limit: 200,
        activation_grace_credits: 0,
        activation_grace_used: 0,
        has_tenant_key: true,
        has_overrides: true,
        description: "Pro tenant with its own credential and quality-preset overrides",
    },
    SeedTenantContract {
        tenant_id: "tenant-borealis",
        display_name: "Borealis Lawn Care",
        industry_key: "landscaping",
        plan_tier: "trial",
        monthly_quote_limit: 25,
        activation_grace_credits: 25,
        activation_grace_used: 3,
        has_tenant_key: false,
        has_overrides: false,
        description: "Trial tenant mid-way through its platform grace allowance",
    },
    SeedTenantContract {
        tenant_id: "tenant-cirrus",
        display_name: "Cirrus Plumbing",
        industry_key: "plumbing",
        plan_tier: "free",
        monthly_quote_limit: 5,
        activation_grace_credits: 0,
        activation_grace_used: 0,
        has_tenant_key: false,
        has_overrides: false,
        description: "Free tenant with no credential of any kind",
    },
];

const SEED_CATALOG_KEYS: &[&str] = &["photography", "landscaping", "plumbing"];

const SEED_PACK_KEYS: &[&str] = &["photography", "landscaping"];

/// Catalog entry deliberately left without a pack so `packs list-missing`
/// has something to report against the demo data.
const UNPACKED_CATALOG_KEY: &str = "plumbing";

/// Demo seed dataset for the layered-resolution flows.
///
/// Provides deterministic fixtures for:
/// 1. A platform patch row (blocked topics).
/// 2. Two industry packs plus one catalog gap.
/// 3. Three tenants spanning the key-policy states.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// SQL fixture content for the demo seed data.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo seed dataset into the database.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let tenants_seeded = SEED_TENANTS
            .iter()
            .map(|tenant| SeedTenantInfo {
                tenant_id: tenant.tenant_id,
                plan_tier: tenant.plan_tier,
                description: tenant.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { tenants_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let platform_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM platform_ai_config WHERE id = 1 AND json_valid(patch_json))",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("platform-patch", platform_ok == 1));

        let quoted_catalog = sql_array_from_ids(SEED_CATALOG_KEYS);
        let catalog_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM industry_catalog WHERE industry_key IN {quoted_catalog} AND active = 1"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("industry-catalog", catalog_count == SEED_CATALOG_KEYS.len() as i64));

        for key in SEED_PACK_KEYS {
            let pack_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM industry_pack
                               WHERE industry_key = ?1 AND version = 1 AND enabled = 1
                                 AND json_valid(pack_json))",
            )
            .bind(key)
            .fetch_one(pool)
            .await?;
            checks.push((pack_label(key), pack_ok == 1));
        }

        let gap_ok: i64 = sqlx::query_scalar(
            "SELECT NOT EXISTS(SELECT 1 FROM industry_pack WHERE industry_key = ?1)",
        )
        .bind(UNPACKED_CATALOG_KEY)
        .fetch_one(pool)
        .await?;
        checks.push(("plumbing-pack-gap", gap_ok == 1));

        for tenant in SEED_TENANTS {
            let row_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM tenant_settings
                               WHERE tenant_id = ?1 AND display_name = ?2 AND industry_key = ?3
                                 AND plan_tier = ?4 AND monthly_quote_limit = ?5
                                 AND activation_grace_credits = ?6 AND activation_grace_used = ?7)",
            )
            .bind(tenant.tenant_id)
            .bind(tenant.display_name)
            .bind(tenant.industry_key)
            .bind(tenant.plan_tier)
            .bind(tenant.monthly_quote_limit)
            .bind(tenant.activation_grace_credits)
            .bind(tenant.activation_grace_used)
            .fetch_one(pool)
            .await?;
            checks.push((tenant.row_label(), row_ok == 1));

            let credential_matches: i64 = sqlx::query_scalar(
                "SELECT (openai_key IS NOT NULL) = ?2 FROM tenant_settings WHERE tenant_id = ?1",
            )
            .bind(tenant.tenant_id)
            .bind(tenant.has_tenant_key)
            .fetch_one(pool)
            .await?;
            checks.push((tenant.credential_label(), credential_matches == 1));

            let overrides_match: i64 = sqlx::query_scalar(
                "SELECT (overrides_json IS NOT NULL) = ?2 FROM tenant_settings WHERE tenant_id = ?1",
            )
            .bind(tenant.tenant_id)
            .bind(tenant.has_overrides)
            .fetch_one(pool)
            .await?;
            checks.push((tenant.overrides_label(), overrides_match == 1));
        }

        let aurora_overrides_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tenant_settings
                           WHERE tenant_id = 'tenant-aurora'
                             AND json_extract(overrides_json, '$.models.kind') = 'preset'
                             AND json_extract(overrides_json, '$.models.name') = 'quality'
                             AND json_extract(overrides_json, '$.max_qa_questions') = 4)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("aurora-overrides-shape", aurora_overrides_ok == 1));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Clean up seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;

        let quoted_tenants =
            sql_array_from_ids(&SEED_TENANTS.iter().map(|t| t.tenant_id).collect::<Vec<_>>());
        let quoted_packs = sql_array_from_ids(SEED_PACK_KEYS);
        let quoted_catalog = sql_array_from_ids(SEED_CATALOG_KEYS);

        sqlx::query(&format!("DELETE FROM tenant_settings WHERE tenant_id IN {quoted_tenants}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM industry_pack WHERE industry_key IN {quoted_packs} AND source = 'fixture'"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM industry_catalog WHERE industry_key IN {quoted_catalog}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM platform_ai_config WHERE id = 1").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTenantContract {
    tenant_id: &'static str,
    display_name: &'static str,
    industry_key: &'static str,
    plan_tier: &'static str,
    monthly_quote_limit: i64,
    activation_grace_credits: i64,
    activation_grace_used: i64,
    has_tenant_key: bool,
    has_overrides: bool,
    description: &'static str,
}

impl SeedTenantContract {
    fn row_label(&self) -> &'static str {
        match self.tenant_id {
            "tenant-aurora" => "tenant-aurora-row",
            "tenant-borealis" => "tenant-borealis-row",
            _ => "tenant-cirrus-row",
        }
    }

    fn credential_label(&self) -> &'static str {
        match self.tenant_id {
            "tenant-aurora" => "tenant-aurora-credential",
            "tenant-borealis" => "tenant-borealis-credential",
            _ => "tenant-cirrus-credential",
        }
    }

    fn overrides_label(&self) -> &'static str {
        match self.tenant_id {
            "tenant-aurora" => "tenant-aurora-overrides",
            "tenant-borealis" => "tenant-borealis-overrides",
            _ => "tenant-cirrus-overrides",
        }
    }
}

fn pack_label(industry_key: &str) -> &'static str {
    match industry_key {
        "photography" => "photography-pack",
        _ => "landscaping-pack",
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub tenants_seeded: Vec<SeedTenantInfo>,
}

#[derive(Debug)]
pub struct SeedTenantInfo {
    pub tenant_id: &'static str,
    pub plan_tier: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification =
            DemoSeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present);
        assert_eq!(first.tenants_seeded.len(), 3);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            DemoSeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.tenants_seeded.len(), 3);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn verify_seed_tenant_specific_properties() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        let borealis_grace: (i64, i64) = sqlx::query_as(
            "SELECT activation_grace_credits, activation_grace_used
             FROM tenant_settings WHERE tenant_id = ?1",
        )
        .bind("tenant-borealis")
        .fetch_one(&pool)
        .await
        .expect("query borealis grace counters");
        assert_eq!(borealis_grace, (25, 3));

        let aurora_style: String = sqlx::query_scalar(
            "SELECT json_extract(overrides_json, '$.rendering_policy.style')
             FROM tenant_settings WHERE tenant_id = ?1",
        )
        .bind("tenant-aurora")
        .fetch_one(&pool)
        .await
        .expect("query aurora style override");
        assert_eq!(aurora_style, "editorial");

        let landscaping_estimator: String = sqlx::query_scalar(
            "SELECT json_extract(pack_json, '$.models.estimator_model')
             FROM industry_pack WHERE industry_key = ?1 AND version = 1",
        )
        .bind("landscaping")
        .fetch_one(&pool)
        .await
        .expect("query landscaping estimator override");
        assert_eq!(landscaping_estimator, "gpt-4o");

        let plumbing_packs: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM industry_pack WHERE industry_key = ?1")
                .bind("plumbing")
                .fetch_one(&pool)
                .await
                .expect("query plumbing pack count");
        assert_eq!(plumbing_packs, 0);
    }

    #[tokio::test]
    async fn clean_removes_every_seeded_row() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        DemoSeedDataset::clean(&pool).await.expect("clean seed fixtures");

        let remaining: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(1) FROM tenant_settings)
                  + (SELECT COUNT(1) FROM industry_pack)
                  + (SELECT COUNT(1) FROM industry_catalog)
                  + (SELECT COUNT(1) FROM platform_ai_config)",
        )
        .fetch_one(&pool)
        .await
        .expect("count remaining rows");
        assert_eq!(remaining, 0);
    }
}
