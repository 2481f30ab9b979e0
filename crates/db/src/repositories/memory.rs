use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;

use snapquote_core::domain::industry::{
    normalize_industry_key, IndustryPack, PackMeta, PackProvenance,
};
use snapquote_core::domain::platform::{PlatformConfig, PlatformConfigPatch};
use snapquote_core::domain::tenant::{TenantOverrides, TenantSettings};

use super::{IndustryPackStore, PlatformConfigStore, StoreError, TenantSettingsStore};

/// In-memory platform store with the same seed/persist layering as the SQL
/// store. The "persisted" patch lives behind a lock instead of a row.
#[derive(Default)]
pub struct InMemoryPlatformConfigStore {
    seed_patch: Option<PlatformConfigPatch>,
    persisted: RwLock<Option<PlatformConfigPatch>>,
}

impl InMemoryPlatformConfigStore {
    pub fn with_seed_patch(seed_patch: Option<PlatformConfigPatch>) -> Self {
        Self { seed_patch, persisted: RwLock::new(None) }
    }

    fn seeded_baseline(&self) -> PlatformConfig {
        let mut config = PlatformConfig::default();
        if let Some(seed) = &self.seed_patch {
            config.apply_patch(seed.clone());
        }
        config
    }
}

#[async_trait::async_trait]
impl PlatformConfigStore for InMemoryPlatformConfigStore {
    async fn load(&self) -> PlatformConfig {
        let mut config = self.seeded_baseline();
        if let Some(patch) = self.persisted.read().await.clone() {
            config.apply_patch(patch);
        }
        config.normalized()
    }

    async fn save(&self, patch: PlatformConfigPatch) -> Result<PlatformConfig, StoreError> {
        let mut persisted = self.persisted.write().await;
        let merged = match persisted.take() {
            Some(previous) => previous.merged_with(patch),
            None => patch,
        };
        let mut merged = merged.normalized();
        let version = merged.version.unwrap_or(1);
        merged.version = Some(version);
        *persisted = Some(merged.clone());

        let mut config = self.seeded_baseline();
        config.apply_patch(merged);
        let mut config = config.normalized();
        config.updated_at = Utc::now();
        Ok(config)
    }
}

/// In-memory industry pack store. `known_keys` stands in for the catalog
/// table when exercising `list_keys_missing_pack`.
#[derive(Default)]
pub struct InMemoryIndustryPackStore {
    packs: RwLock<HashMap<String, Vec<(IndustryPack, PackMeta)>>>,
    known_keys: RwLock<BTreeSet<String>>,
}

impl InMemoryIndustryPackStore {
    pub async fn add_known_key(&self, industry_key: &str) {
        let key = normalize_industry_key(industry_key);
        if !key.is_empty() {
            self.known_keys.write().await.insert(key);
        }
    }
}

#[async_trait::async_trait]
impl IndustryPackStore for InMemoryIndustryPackStore {
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

        let packs = self.packs.read().await;
        Ok(packs.get(&key).and_then(|versions| {
            versions.iter().max_by_key(|(_, meta)| (meta.version, meta.updated_at)).cloned()
        }))
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

        let mut packs = self.packs.write().await;
        let versions = packs.entry(key).or_default();
        let version = provenance.version.unwrap_or_else(|| {
            versions.iter().map(|(_, meta)| meta.version).max().unwrap_or(0) + 1
        });
        let meta = PackMeta {
            version,
            updated_by: provenance.updated_by.unwrap_or_else(|| "system".to_string()),
            source: provenance.source.unwrap_or_else(|| "manual".to_string()),
            updated_at: Utc::now(),
        };

        versions.retain(|(_, existing)| existing.version != version);
        versions.push((pack.clone().normalized(), meta.clone()));
        Ok(meta)
    }

    async fn list_keys_missing_pack(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let packs = self.packs.read().await;
        let known = self.known_keys.read().await;
        Ok(known.iter().filter(|key| !packs.contains_key(*key)).take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryTenantSettingsStore {
    tenants: RwLock<HashMap<String, TenantSettings>>,
}

#[async_trait::async_trait]
impl TenantSettingsStore for InMemoryTenantSettingsStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantSettings>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).cloned())
    }

    async fn upsert(&self, settings: &TenantSettings) -> Result<(), StoreError> {
        let mut tenants = self.tenants.write().await;
        tenants.insert(settings.tenant_id.clone(), settings.clone());
        Ok(())
    }

    async fn save_overrides(
        &self,
        tenant_id: &str,
        overrides: Option<&TenantOverrides>,
    ) -> Result<bool, StoreError> {
        let mut tenants = self.tenants.write().await;
        let Some(settings) = tenants.get_mut(tenant_id) else {
            return Ok(false);
        };
        settings.overrides = overrides.cloned();
        settings.updated_at = Utc::now();
        Ok(true)
    }
}
