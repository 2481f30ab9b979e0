use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::overlay::Overlay;
use crate::domain::platform::{MAX_QA_QUESTIONS, MIN_QA_QUESTIONS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreset {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl ModelPreset {
    /// Fixed estimator/Q&A pairs per preset. `Balanced` returns `None`:
    /// it defers to whatever platform and industry already resolved.
    pub fn model_pair(self) -> Option<(&'static str, &'static str)> {
        match self {
            ModelPreset::Fast => Some(("gpt-4o-mini", "gpt-4o-mini")),
            ModelPreset::Balanced => None,
            ModelPreset::Quality => Some(("gpt-4o", "gpt-4o")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelPreset::Fast => "fast",
            ModelPreset::Balanced => "balanced",
            ModelPreset::Quality => "quality",
        }
    }
}

/// How a tenant expresses its model choice. Validated at the write boundary
/// into a tagged variant rather than re-parsed from a free-text field on
/// every read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSelection {
    #[default]
    Inherit,
    Preset {
        name: ModelPreset,
    },
    Explicit {
        #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
        estimator_model: Overlay<String>,
        #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
        qa_model: Overlay<String>,
        #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
        render_model: Overlay<String>,
    },
}

impl ModelSelection {
    fn normalized(self) -> Self {
        match self {
            ModelSelection::Explicit { estimator_model, qa_model, render_model } => {
                let estimator_model = estimator_model.normalized();
                let qa_model = qa_model.normalized();
                let render_model = render_model.normalized();
                if estimator_model.is_inherit()
                    && qa_model.is_inherit()
                    && render_model.is_inherit()
                {
                    ModelSelection::Inherit
                } else {
                    ModelSelection::Explicit { estimator_model, qa_model, render_model }
                }
            }
            other => other,
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, ModelSelection::Inherit)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPromptOverrides {
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub quote_estimator_system: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub qa_question_generator_system: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub extra_system_preamble: Overlay<String>,
}

impl TenantPromptOverrides {
    fn is_empty(&self) -> bool {
        self.quote_estimator_system.is_inherit()
            && self.qa_question_generator_system.is_inherit()
            && self.extra_system_preamble.is_inherit()
    }

    fn normalized(self) -> Self {
        Self {
            quote_estimator_system: self.quote_estimator_system.normalized(),
            qa_question_generator_system: self.qa_question_generator_system.normalized(),
            extra_system_preamble: self.extra_system_preamble.normalized(),
        }
    }
}

/// Tenant knobs for the render path. `style` is a key into the platform's
/// style presets, or free-form style text when no preset matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderingPolicy {
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub prompt_addendum: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub negative_guidance: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub style: Overlay<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RenderingPolicy {
    fn is_empty(&self) -> bool {
        self.prompt_addendum.is_inherit()
            && self.negative_guidance.is_inherit()
            && self.style.is_inherit()
            && self.enabled.is_none()
    }

    fn normalized(self) -> Self {
        Self {
            prompt_addendum: self.prompt_addendum.normalized(),
            negative_guidance: self.negative_guidance.normalized(),
            style: self.style.normalized(),
            enabled: self.enabled,
        }
    }
}

/// Per-tenant customization layered on top of platform + industry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOverrides {
    #[serde(default)]
    pub models: ModelSelection,
    #[serde(default)]
    pub prompts: TenantPromptOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_qa_questions: Option<u8>,
    #[serde(default)]
    pub rendering_policy: RenderingPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TenantOverrides {
    /// Write-boundary cleanup. Blank overlays become `Inherit`, an
    /// all-inherit explicit model selection collapses, and the question cap
    /// is clamped into its valid range.
    pub fn normalized(mut self) -> Self {
        self.models = self.models.normalized();
        self.prompts = self.prompts.normalized();
        self.max_qa_questions =
            self.max_qa_questions.map(|v| v.clamp(MIN_QA_QUESTIONS, MAX_QA_QUESTIONS));
        self.rendering_policy = self.rendering_policy.normalized();
        self
    }

    /// All-empty overrides must resolve identically to no override row at
    /// all; callers persist `None` instead of an empty record.
    pub fn is_empty(&self) -> bool {
        self.models.is_inherit()
            && self.prompts.is_empty()
            && self.max_qa_questions.is_none()
            && self.rendering_policy.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Trial,
    Pro,
    Scale,
}

impl PlanTier {
    /// Plan gate for the platform-pooled credential. Free tenants must bring
    /// their own key.
    pub fn allows_platform_key(self) -> bool {
        !matches!(self, PlanTier::Free)
    }

    /// `None` is the sole unlimited sentinel.
    pub fn default_monthly_quote_limit(self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(5),
            PlanTier::Trial => Some(25),
            PlanTier::Pro => Some(200),
            PlanTier::Scale => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Trial => "trial",
            PlanTier::Pro => "pro",
            PlanTier::Scale => "scale",
        }
    }
}

/// Persisted tenant record: plan, credential, grace allowance, industry
/// provenance and the override bundle.
#[derive(Clone, Debug)]
pub struct TenantSettings {
    pub tenant_id: String,
    pub display_name: String,
    pub industry_key: Option<String>,
    pub plan_tier: PlanTier,
    pub monthly_quote_limit: Option<u32>,
    pub activation_grace_credits: i64,
    pub activation_grace_used: i64,
    pub openai_key: Option<SecretString>,
    pub overrides: Option<TenantOverrides>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantSettings {
    pub fn has_tenant_key(&self) -> bool {
        self.openai_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty()) // ubs:ignore
            .unwrap_or(false)
    }
}
