use serde::Serialize;

use crate::domain::tenant::PlanTier;

/// Which credential pool pays for a model invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Tenant,
    PlatformGrace,
    None,
}

impl KeySource {
    pub fn as_str(self) -> &'static str {
        match self {
            KeySource::Tenant => "tenant",
            KeySource::PlatformGrace => "platform_grace",
            KeySource::None => "none",
        }
    }
}

/// Raw facts the key policy is a pure function of. Grace counters may
/// arrive negative from damaged rows; evaluation clamps them to zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyPolicyInputs {
    pub plan_tier: PlanTier,
    pub has_tenant_key: bool,
    pub has_platform_key: bool,
    pub activation_grace_credits: i64,
    pub activation_grace_used: i64,
}

/// Per-tenant credential readiness snapshot. Derived on every read, never
/// stored; the consuming write path (out of scope here) is what actually
/// decrements grace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyPolicyStatus {
    pub plan_tier: PlanTier,
    pub activation_grace_credits: i64,
    pub activation_grace_used: i64,
    pub has_tenant_key: bool,
    pub has_platform_key: bool,
    pub platform_allowed: bool,
    pub effective_key_source_now: KeySource,
    pub would_consume_grace_on_new_quote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl KeyPolicyInputs {
    /// Resolves the effective key source. Never fails: every input
    /// combination maps to a status, and `KeySource::None` carries a
    /// human-readable reason instead of raising.
    pub fn evaluate(&self) -> KeyPolicyStatus {
        let activation_grace_credits = self.activation_grace_credits.max(0);
        let activation_grace_used = self.activation_grace_used.max(0);
        let platform_allowed = self.plan_tier.allows_platform_key();
        let grace_remaining = activation_grace_used < activation_grace_credits;

        let (effective_key_source_now, would_consume_grace_on_new_quote, reason) =
            if self.has_tenant_key {
                (KeySource::Tenant, false, None)
            } else if platform_allowed && self.has_platform_key {
                let reason = if grace_remaining {
                    None
                } else {
                    Some("activation grace exhausted; platform key remains in use".to_string())
                };
                (KeySource::PlatformGrace, grace_remaining, reason)
            } else if !platform_allowed {
                (
                    KeySource::None,
                    false,
                    Some(format!(
                        "plan tier `{}` does not permit platform key usage; add a tenant API key",
                        self.plan_tier.as_str()
                    )),
                )
            } else {
                (
                    KeySource::None,
                    false,
                    Some(
                        "no platform credential is configured; add a tenant API key".to_string(),
                    ),
                )
            };

        KeyPolicyStatus {
            plan_tier: self.plan_tier,
            activation_grace_credits,
            activation_grace_used,
            has_tenant_key: self.has_tenant_key,
            has_platform_key: self.has_platform_key,
            platform_allowed,
            effective_key_source_now,
            would_consume_grace_on_new_quote,
            reason,
        }
    }
}

impl KeyPolicyStatus {
    /// Status returned when the tenant row cannot be read at all: every
    /// boolean defaults to false and the diagnostic explains why.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            plan_tier: PlanTier::default(),
            activation_grace_credits: 0,
            activation_grace_used: 0,
            has_tenant_key: false,
            has_platform_key: false,
            platform_allowed: false,
            effective_key_source_now: KeySource::None,
            would_consume_grace_on_new_quote: false,
            reason: Some(reason.into()),
        }
    }
}
