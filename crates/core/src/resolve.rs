use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::industry::{normalize_industry_key, IndustryPack};
use crate::domain::overlay::Overlay;
use crate::domain::platform::{GuardrailPolicy, PlatformConfig, MIN_QA_QUESTIONS};
use crate::domain::tenant::{ModelSelection, TenantOverrides};

/// Where the resolved model ids came from, for observability. A rejected
/// explicit request is a tag, not an error: resolution still succeeds with
/// the layer-resolved value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    PlatformDefault,
    TenantPreset,
    TenantExplicit,
    TenantRejectedNotAllowed,
}

impl ModelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSource::PlatformDefault => "platform_default",
            ModelSource::TenantPreset => "tenant_preset",
            ModelSource::TenantExplicit => "tenant_explicit",
            ModelSource::TenantRejectedNotAllowed => "tenant_rejected_not_allowed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedModels {
    pub estimator_model: String,
    pub qa_model: String,
    pub render_model: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedPrompts {
    pub quote_estimator_system: String,
    pub qa_question_generator_system: String,
    pub extra_system_preamble: String,
    pub render_prompt_preamble: String,
    pub render_prompt_template: String,
    pub render_style_presets: BTreeMap<String, String>,
}

/// Per-layer fragments surfaced for the admin "effective settings" viewer
/// and consumed by the prompt composers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LayerAudit {
    pub industry_key: Option<String>,
    pub industry_preamble: Option<String>,
    pub industry_render_addendum: Option<String>,
    pub industry_render_negative: Option<String>,
    pub tenant_style: Option<String>,
    pub tenant_render_addendum: Option<String>,
    pub tenant_render_negative: Option<String>,
    pub tenant_rendering_enabled: bool,
    pub rejected_models: Vec<String>,
}

impl Default for LayerAudit {
    fn default() -> Self {
        Self {
            industry_key: None,
            industry_preamble: None,
            industry_render_addendum: None,
            industry_render_negative: None,
            tenant_style: None,
            tenant_render_addendum: None,
            tenant_render_negative: None,
            tenant_rendering_enabled: true,
            rejected_models: Vec::new(),
        }
    }
}

/// The fully-resolved configuration one request runs with. Every field is
/// concrete; computed fresh per resolution and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub models: ResolvedModels,
    pub model_source: ModelSource,
    pub prompts: ResolvedPrompts,
    pub guardrails: GuardrailPolicy,
    pub layers: LayerAudit,
}

impl EffectiveConfig {
    /// Tenant style resolved through the platform's named presets; a key
    /// with no preset match is treated as free-form style text.
    pub fn resolved_style_text(&self) -> Option<String> {
        let key = self.layers.tenant_style.as_ref()?;
        Some(self.prompts.render_style_presets.get(key).cloned().unwrap_or_else(|| key.clone()))
    }
}

/// Deterministic three-layer merge: platform baseline, then industry pack,
/// then tenant overrides. Pure; all storage reads happen in the engine.
///
/// Guardrails are copied verbatim from the platform layer. The single
/// tenant-visible guardrail knob is `max_qa_questions`, which may only
/// tighten; a request above the platform cap is clamped down, not rejected.
pub fn merge_layers(
    platform: &PlatformConfig,
    industry_key: Option<&str>,
    industry: Option<&IndustryPack>,
    tenant: Option<&TenantOverrides>,
) -> EffectiveConfig {
    let platform = platform.clone().normalized();

    let mut models = ResolvedModels {
        estimator_model: platform.models.estimator_model.clone(),
        qa_model: platform.models.qa_model.clone(),
        render_model: platform.models.render_model.clone(),
    };
    let mut prompts = ResolvedPrompts {
        quote_estimator_system: platform.prompts.quote_estimator_system.clone(),
        qa_question_generator_system: platform.prompts.qa_question_generator_system.clone(),
        extra_system_preamble: platform.prompts.extra_system_preamble.clone(),
        render_prompt_preamble: platform.prompts.render_prompt_preamble.clone(),
        render_prompt_template: platform.prompts.render_prompt_template.clone(),
        render_style_presets: platform.prompts.render_style_presets.clone(),
    };
    let mut guardrails = platform.guardrails.clone();
    let mut model_source = ModelSource::PlatformDefault;
    let mut layers = LayerAudit {
        industry_key: industry_key.map(normalize_industry_key).filter(|key| !key.is_empty()),
        ..LayerAudit::default()
    };

    if let Some(pack) = industry.filter(|pack| !pack.is_empty()) {
        let pack = pack.clone().normalized();
        pack.models.estimator_model.apply_to(&mut models.estimator_model);
        pack.models.qa_model.apply_to(&mut models.qa_model);
        pack.models.render_model.apply_to(&mut models.render_model);
        pack.prompts.quote_estimator_system.apply_to(&mut prompts.quote_estimator_system);
        pack.prompts
            .qa_question_generator_system
            .apply_to(&mut prompts.qa_question_generator_system);
        pack.prompts.extra_system_preamble.apply_to(&mut prompts.extra_system_preamble);
        layers.industry_preamble = pack.prompts.industry_preamble.into_value();
        layers.industry_render_addendum = pack.prompts.render_addendum.into_value();
        layers.industry_render_negative = pack.prompts.render_negative_guidance.into_value();
    }

    if let Some(overrides) = tenant {
        // Re-normalizing here keeps legacy rows honest: a stored blank still
        // means inherit even if it predates write-boundary normalization.
        let overrides = overrides.clone().normalized();

        match &overrides.models {
            ModelSelection::Inherit => {}
            ModelSelection::Preset { name } => {
                if let Some((estimator, qa)) = name.model_pair() {
                    models.estimator_model = estimator.to_string();
                    models.qa_model = qa.to_string();
                    model_source = ModelSource::TenantPreset;
                }
            }
            ModelSelection::Explicit { estimator_model, qa_model, render_model } => {
                let allowlist = &platform.models.tenant_model_allowlist;
                let mut accepted = false;
                let mut rejected = Vec::new();
                apply_explicit_model(
                    estimator_model,
                    allowlist,
                    &mut models.estimator_model,
                    &mut accepted,
                    &mut rejected,
                );
                apply_explicit_model(
                    qa_model,
                    allowlist,
                    &mut models.qa_model,
                    &mut accepted,
                    &mut rejected,
                );
                apply_explicit_model(
                    render_model,
                    allowlist,
                    &mut models.render_model,
                    &mut accepted,
                    &mut rejected,
                );
                if !rejected.is_empty() {
                    model_source = ModelSource::TenantRejectedNotAllowed;
                    layers.rejected_models = rejected;
                } else if accepted {
                    model_source = ModelSource::TenantExplicit;
                }
            }
        }

        overrides.prompts.quote_estimator_system.apply_to(&mut prompts.quote_estimator_system);
        overrides
            .prompts
            .qa_question_generator_system
            .apply_to(&mut prompts.qa_question_generator_system);
        overrides.prompts.extra_system_preamble.apply_to(&mut prompts.extra_system_preamble);

        if let Some(requested) = overrides.max_qa_questions {
            guardrails.max_qa_questions =
                requested.clamp(MIN_QA_QUESTIONS, platform.guardrails.max_qa_questions);
        }

        layers.tenant_style = overrides.rendering_policy.style.into_value();
        layers.tenant_render_addendum = overrides.rendering_policy.prompt_addendum.into_value();
        layers.tenant_render_negative = overrides.rendering_policy.negative_guidance.into_value();
        layers.tenant_rendering_enabled = overrides.rendering_policy.enabled.unwrap_or(true);
    }

    EffectiveConfig { models, model_source, prompts, guardrails, layers }
}

fn apply_explicit_model(
    requested: &Overlay<String>,
    allowlist: &[String],
    slot: &mut String,
    accepted: &mut bool,
    rejected: &mut Vec<String>,
) {
    if let Overlay::Set(model) = requested {
        if allowlist.is_empty() || allowlist.iter().any(|allowed| allowed == model) {
            *slot = model.clone();
            *accepted = true;
        } else {
            rejected.push(model.clone());
        }
    }
}
