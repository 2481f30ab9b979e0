use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use snapquote_core::domain::industry::{
    normalize_industry_key, IndustryPackDraft, PackMeta, PackProvenance,
};
use snapquote_core::domain::platform::{PlatformConfig, PlatformConfigPatch};
use snapquote_core::domain::tenant::{TenantOverrides, TenantSettings};
use snapquote_core::keypolicy::{KeyPolicyInputs, KeyPolicyStatus};
use snapquote_core::resolve::{merge_layers, EffectiveConfig};
use snapquote_db::repositories::{
    IndustryPackStore, PlatformConfigStore, StoreError, TenantSettingsStore,
};

/// Failures on the admin write surface. Read-side degradation never lands
/// here; resolution always answers.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("industry key is required")]
    IndustryKeyRequired,
    #[error("industry pack sets nothing; refusing to store an empty pack")]
    IndustryPackEmpty,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Layered-resolution front door. Owns no state beyond the store handles
/// and the deploy-time fact of whether a platform credential exists; every
/// resolution is computed fresh from storage.
pub struct ResolutionEngine {
    platform: Arc<dyn PlatformConfigStore>,
    packs: Arc<dyn IndustryPackStore>,
    tenants: Arc<dyn TenantSettingsStore>,
    has_platform_key: bool,
}

impl ResolutionEngine {
    pub fn new(
        platform: Arc<dyn PlatformConfigStore>,
        packs: Arc<dyn IndustryPackStore>,
        tenants: Arc<dyn TenantSettingsStore>,
        has_platform_key: bool,
    ) -> Self {
        Self { platform, packs, tenants, has_platform_key }
    }

    /// Resolves the effective configuration for one tenant request.
    ///
    /// `industry_key` overrides the tenant's stored industry when given.
    /// Unreadable tenant or pack layers degrade to absent with a warning;
    /// this call always produces a usable configuration.
    pub async fn resolve_effective_config(
        &self,
        tenant_id: &str,
        industry_key: Option<&str>,
    ) -> EffectiveConfig {
        let correlation_id = Uuid::new_v4();
        let platform = self.platform.load().await;

        let tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) => tenant,
            Err(error) => {
                warn!(
                    event_name = "policy.resolve.tenant_unreadable",
                    correlation_id = %correlation_id,
                    tenant_id = %tenant_id,
                    error = %error,
                    "tenant settings unreadable; resolving without the tenant layer"
                );
                None
            }
        };

        let industry_key = industry_key
            .map(normalize_industry_key)
            .filter(|key| !key.is_empty())
            .or_else(|| tenant.as_ref().and_then(|tenant| tenant.industry_key.clone()))
            .map(|key| normalize_industry_key(&key))
            .filter(|key| !key.is_empty());

        let industry = match industry_key.as_deref() {
            Some(key) => match self.packs.get(key).await {
                Ok(pack) => pack,
                Err(error) => {
                    warn!(
                        event_name = "policy.resolve.pack_unreadable",
                        correlation_id = %correlation_id,
                        tenant_id = %tenant_id,
                        industry_key = %key,
                        error = %error,
                        "industry pack unreadable; resolving without the industry layer"
                    );
                    None
                }
            },
            None => None,
        };

        let overrides = tenant.as_ref().and_then(|tenant| tenant.overrides.as_ref());
        let effective =
            merge_layers(&platform, industry_key.as_deref(), industry.as_ref(), overrides);

        info!(
            event_name = "policy.resolve.completed",
            correlation_id = %correlation_id,
            tenant_id = %tenant_id,
            industry_key = industry_key.as_deref().unwrap_or("none"),
            model_source = effective.model_source.as_str(),
            "effective configuration resolved"
        );
        effective
    }

    /// Evaluates credential readiness for a tenant. Never errors: an
    /// unreadable or missing tenant row yields an all-false status whose
    /// `reason` explains the gap.
    pub async fn get_key_policy_status(&self, tenant_id: &str) -> KeyPolicyStatus {
        let status = match self.tenants.get(tenant_id).await {
            Ok(Some(tenant)) => KeyPolicyInputs {
                plan_tier: tenant.plan_tier,
                has_tenant_key: tenant.has_tenant_key(),
                has_platform_key: self.has_platform_key,
                activation_grace_credits: tenant.activation_grace_credits,
                activation_grace_used: tenant.activation_grace_used,
            }
            .evaluate(),
            Ok(None) => {
                KeyPolicyStatus::unavailable(format!("tenant `{tenant_id}` is not registered"))
            }
            Err(error) => {
                warn!(
                    event_name = "policy.keys.tenant_unreadable",
                    tenant_id = %tenant_id,
                    error = %error,
                    "tenant settings unreadable during key policy evaluation"
                );
                KeyPolicyStatus::unavailable("tenant settings are temporarily unreadable")
            }
        };

        info!(
            event_name = "policy.keys.evaluated",
            tenant_id = %tenant_id,
            key_source = status.effective_key_source_now.as_str(),
            would_consume_grace = status.would_consume_grace_on_new_quote,
            "key policy evaluated"
        );
        status
    }

    /// Fetches the tenant row for display surfaces. Admin-only; resolution
    /// paths use the degradable loaders above instead.
    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantSettings>, AdminError> {
        Ok(self.tenants.get(tenant_id).await?)
    }

    pub async fn save_platform_config(
        &self,
        patch: PlatformConfigPatch,
    ) -> Result<PlatformConfig, AdminError> {
        let saved = self.platform.save(patch).await?;
        info!(
            event_name = "admin.platform.saved",
            version = saved.version,
            "platform configuration saved"
        );
        Ok(saved)
    }

    /// Validates and stores an industry pack draft. Guardrail payloads are
    /// platform-owned: a draft carrying one has it stripped with a warning
    /// before the pack is persisted.
    pub async fn upsert_industry_pack(
        &self,
        industry_key: &str,
        draft: IndustryPackDraft,
        provenance: PackProvenance,
    ) -> Result<PackMeta, AdminError> {
        let key = normalize_industry_key(industry_key);
        if key.is_empty() {
            return Err(AdminError::IndustryKeyRequired);
        }

        let (pack, stripped_guardrails) = draft.into_pack();
        if stripped_guardrails {
            warn!(
                event_name = "admin.pack.guardrails_stripped",
                industry_key = %key,
                "industry pack draft carried guardrails; they are platform-owned and were dropped"
            );
        }
        if pack.is_empty() {
            return Err(AdminError::IndustryPackEmpty);
        }

        let meta = self.packs.upsert(&key, &pack, provenance).await?;
        info!(
            event_name = "admin.pack.saved",
            industry_key = %key,
            version = meta.version,
            "industry pack stored"
        );
        Ok(meta)
    }

    /// Replaces a tenant's override bundle. Overrides normalize at this
    /// boundary; an all-empty bundle is persisted as no bundle at all, so
    /// saving `{}` and clearing are the same operation.
    pub async fn save_tenant_overrides(
        &self,
        tenant_id: &str,
        overrides: Option<TenantOverrides>,
    ) -> Result<(), AdminError> {
        let normalized =
            overrides.map(TenantOverrides::normalized).filter(|overrides| !overrides.is_empty());

        let updated = self.tenants.save_overrides(tenant_id, normalized.as_ref()).await?;
        if !updated {
            return Err(AdminError::Validation(format!("tenant `{tenant_id}` does not exist")));
        }

        info!(
            event_name = "admin.tenant.overrides_saved",
            tenant_id = %tenant_id,
            cleared = normalized.is_none(),
            "tenant overrides saved"
        );
        Ok(())
    }

    pub async fn list_keys_missing_pack(&self, limit: usize) -> Result<Vec<String>, AdminError> {
        Ok(self.packs.list_keys_missing_pack(limit).await?)
    }
}
