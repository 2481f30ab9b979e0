use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use snapquote_core::domain::industry::{IndustryPack, PackMeta, PackProvenance};
use snapquote_core::domain::platform::{PlatformConfig, PlatformConfigPatch};
use snapquote_core::domain::tenant::{TenantOverrides, TenantSettings};

pub mod industry_pack;
pub mod memory;
pub mod platform_config;
pub mod tenant_settings;

pub use industry_pack::SqlIndustryPackStore;
pub use memory::{
    InMemoryIndustryPackStore, InMemoryPlatformConfigStore, InMemoryTenantSettingsStore,
};
pub use platform_config::SqlPlatformConfigStore;
pub use tenant_settings::SqlTenantSettingsStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Platform-layer config storage. `load` is infallible: the baseline plus
/// any seed patch always produces a usable config, and an unreadable
/// persisted row degrades with a warning rather than failing resolution.
#[async_trait]
pub trait PlatformConfigStore: Send + Sync {
    async fn load(&self) -> PlatformConfig;
    async fn save(&self, patch: PlatformConfigPatch) -> Result<PlatformConfig, StoreError>;
}

#[async_trait]
pub trait IndustryPackStore: Send + Sync {
    async fn get(&self, industry_key: &str) -> Result<Option<IndustryPack>, StoreError>;

    async fn get_with_meta(
        &self,
        industry_key: &str,
    ) -> Result<Option<(IndustryPack, PackMeta)>, StoreError>;

    async fn upsert(
        &self,
        industry_key: &str,
        pack: &IndustryPack,
        provenance: PackProvenance,
    ) -> Result<PackMeta, StoreError>;

    /// Industry keys known to the deployment that have no pack row yet,
    /// sorted and truncated to `limit`.
    async fn list_keys_missing_pack(&self, limit: usize) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait TenantSettingsStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantSettings>, StoreError>;

    async fn upsert(&self, settings: &TenantSettings) -> Result<(), StoreError>;

    /// Replaces (or with `None` clears) the tenant's override blob. Returns
    /// `false` when no such tenant row exists.
    async fn save_overrides(
        &self,
        tenant_id: &str,
        overrides: Option<&TenantOverrides>,
    ) -> Result<bool, StoreError>;
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw).map(|value| value.with_timezone(&Utc)).map_err(|error| {
        StoreError::Decode(format!("invalid {field} timestamp `{raw}`: {error}"))
    })
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    field: &str,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|error| StoreError::Decode(format!("invalid {field} payload: {error}")))
}
