use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Built-in text model used whenever an estimator/Q&A model field resolves
/// blank. Resolution must never hand an empty model id to the caller.
pub const FALLBACK_TEXT_MODEL: &str = "gpt-4o-mini";
/// Built-in image model counterpart for the render path.
pub const FALLBACK_RENDER_MODEL: &str = "gpt-image-1";

pub const MIN_QA_QUESTIONS: u8 = 1;
pub const MAX_QA_QUESTIONS: u8 = 10;
pub const MIN_OUTPUT_TOKENS: u32 = 100;
pub const MAX_OUTPUT_TOKENS: u32 = 4000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailMode {
    Strict,
    Balanced,
    Permissive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiHandling {
    Redact,
    Allow,
    Deny,
}

/// Safety policy owned exclusively by the platform layer. Industry packs and
/// tenant overrides can never loosen any field here; the only tenant-visible
/// knob is tightening `max_qa_questions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    pub mode: GuardrailMode,
    pub pii_handling: PiiHandling,
    #[serde(default)]
    pub blocked_topics: Vec<String>,
    pub max_qa_questions: u8,
    pub max_output_tokens: u32,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            mode: GuardrailMode::Balanced,
            pii_handling: PiiHandling::Redact,
            blocked_topics: Vec::new(),
            max_qa_questions: 5,
            max_output_tokens: 1200,
        }
    }
}

impl GuardrailPolicy {
    /// Clamps numeric caps into their valid ranges and deduplicates blocked
    /// topics preserving first-occurrence order.
    pub fn normalized(mut self) -> Self {
        self.max_qa_questions = self.max_qa_questions.clamp(MIN_QA_QUESTIONS, MAX_QA_QUESTIONS);
        self.max_output_tokens = self.max_output_tokens.clamp(MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS);
        self.blocked_topics = dedupe_preserving_order(self.blocked_topics);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub estimator_model: String,
    pub qa_model: String,
    pub render_model: String,
    /// Explicit tenant model requests must appear here to be honored.
    /// Empty means allow-all, an explicit operator choice.
    #[serde(default)]
    pub tenant_model_allowlist: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            estimator_model: FALLBACK_TEXT_MODEL.to_string(),
            qa_model: FALLBACK_TEXT_MODEL.to_string(),
            render_model: FALLBACK_RENDER_MODEL.to_string(),
            tenant_model_allowlist: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub quote_estimator_system: String,
    pub qa_question_generator_system: String,
    #[serde(default)]
    pub extra_system_preamble: String,
    #[serde(default)]
    pub render_prompt_preamble: String,
    #[serde(default)]
    pub render_prompt_template: String,
    #[serde(default)]
    pub render_style_presets: BTreeMap<String, String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let mut render_style_presets = BTreeMap::new();
        render_style_presets.insert(
            "bold".to_string(),
            "high contrast, saturated color, dramatic lighting".to_string(),
        );
        render_style_presets.insert(
            "editorial".to_string(),
            "magazine-grade composition, soft shadows, shallow depth of field".to_string(),
        );
        render_style_presets.insert(
            "natural".to_string(),
            "true-to-life color, neutral daylight, unretouched look".to_string(),
        );

        Self {
            quote_estimator_system: "You are a senior estimator for a local services business. \
                Study the customer's photos and notes, then describe the work you see, what it \
                will take, and where the photos leave room for doubt."
                .to_string(),
            qa_question_generator_system: "You prepare clarifying questions an estimator would \
                ask before quoting a job from photos. Every question must materially change the \
                scope, access, or price of the work."
                .to_string(),
            extra_system_preamble: String::new(),
            render_prompt_preamble: "Photorealistic after-shot of the completed job, matching \
                the original photo's framing and lighting."
                .to_string(),
            render_prompt_template: "Style: {{style}}\nService: {{service_type}}\nJob summary: \
                {{summary}}\nCustomer notes: {{customer_notes}}\nBusiness notes: {{tenant_notes}}"
                .to_string(),
            render_style_presets,
        }
    }
}

/// Platform-wide baseline configuration. A single logical instance exists
/// per deployment; industry packs and tenant overrides layer on top of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub version: i64,
    pub models: ModelConfig,
    pub prompts: PromptConfig,
    pub guardrails: GuardrailPolicy,
    pub updated_at: DateTime<Utc>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            version: 1,
            models: ModelConfig::default(),
            prompts: PromptConfig::default(),
            guardrails: GuardrailPolicy::default(),
            updated_at: Utc::now(),
        }
    }
}

impl PlatformConfig {
    pub fn apply_patch(&mut self, patch: PlatformConfigPatch) {
        if let Some(version) = patch.version {
            self.version = version;
        }

        if let Some(models) = patch.models {
            if let Some(estimator_model) = models.estimator_model {
                self.models.estimator_model = estimator_model;
            }
            if let Some(qa_model) = models.qa_model {
                self.models.qa_model = qa_model;
            }
            if let Some(render_model) = models.render_model {
                self.models.render_model = render_model;
            }
            if let Some(tenant_model_allowlist) = models.tenant_model_allowlist {
                self.models.tenant_model_allowlist = tenant_model_allowlist;
            }
        }

        if let Some(prompts) = patch.prompts {
            if let Some(quote_estimator_system) = prompts.quote_estimator_system {
                self.prompts.quote_estimator_system = quote_estimator_system;
            }
            if let Some(qa_question_generator_system) = prompts.qa_question_generator_system {
                self.prompts.qa_question_generator_system = qa_question_generator_system;
            }
            if let Some(extra_system_preamble) = prompts.extra_system_preamble {
                self.prompts.extra_system_preamble = extra_system_preamble;
            }
            if let Some(render_prompt_preamble) = prompts.render_prompt_preamble {
                self.prompts.render_prompt_preamble = render_prompt_preamble;
            }
            if let Some(render_prompt_template) = prompts.render_prompt_template {
                self.prompts.render_prompt_template = render_prompt_template;
            }
            if let Some(render_style_presets) = prompts.render_style_presets {
                self.prompts.render_style_presets = render_style_presets;
            }
        }

        if let Some(guardrails) = patch.guardrails {
            if let Some(mode) = guardrails.mode {
                self.guardrails.mode = mode;
            }
            if let Some(pii_handling) = guardrails.pii_handling {
                self.guardrails.pii_handling = pii_handling;
            }
            if let Some(blocked_topics) = guardrails.blocked_topics {
                self.guardrails.blocked_topics = blocked_topics;
            }
            if let Some(max_qa_questions) = guardrails.max_qa_questions {
                self.guardrails.max_qa_questions = max_qa_questions;
            }
            if let Some(max_output_tokens) = guardrails.max_output_tokens {
                self.guardrails.max_output_tokens = max_output_tokens;
            }
        }
    }

    /// Restores the never-empty model invariant and guardrail ranges after
    /// patches have been applied.
    pub fn normalized(mut self) -> Self {
        if self.models.estimator_model.trim().is_empty() {
            self.models.estimator_model = FALLBACK_TEXT_MODEL.to_string();
        }
        if self.models.qa_model.trim().is_empty() {
            self.models.qa_model = FALLBACK_TEXT_MODEL.to_string();
        }
        if self.models.render_model.trim().is_empty() {
            self.models.render_model = FALLBACK_RENDER_MODEL.to_string();
        }
        self.models.tenant_model_allowlist =
            dedupe_preserving_order(self.models.tenant_model_allowlist);
        self.guardrails = self.guardrails.normalized();
        self
    }
}

/// All-`Option` mirror of [`PlatformConfig`]. Drives both the deploy-time
/// environment seed and the admin save payload; a later patch wins at every
/// leaf it speaks for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelConfigPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptConfigPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<GuardrailPolicyPatch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimator_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_model_allowlist: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_estimator_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_question_generator_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_system_preamble: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_prompt_preamble: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_prompt_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_style_presets: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GuardrailMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_handling: Option<PiiHandling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_qa_questions: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl PlatformConfigPatch {
    /// Folds `later` on top of this patch, later-wins per leaf. Used by the
    /// platform store to accumulate partial admin saves.
    pub fn merged_with(self, later: PlatformConfigPatch) -> Self {
        Self {
            version: later.version.or(self.version),
            models: merge_sections(self.models, later.models, |mut base, next| {
                base.estimator_model = next.estimator_model.or(base.estimator_model);
                base.qa_model = next.qa_model.or(base.qa_model);
                base.render_model = next.render_model.or(base.render_model);
                base.tenant_model_allowlist =
                    next.tenant_model_allowlist.or(base.tenant_model_allowlist);
                base
            }),
            prompts: merge_sections(self.prompts, later.prompts, |mut base, next| {
                base.quote_estimator_system =
                    next.quote_estimator_system.or(base.quote_estimator_system);
                base.qa_question_generator_system =
                    next.qa_question_generator_system.or(base.qa_question_generator_system);
                base.extra_system_preamble =
                    next.extra_system_preamble.or(base.extra_system_preamble);
                base.render_prompt_preamble =
                    next.render_prompt_preamble.or(base.render_prompt_preamble);
                base.render_prompt_template =
                    next.render_prompt_template.or(base.render_prompt_template);
                base.render_style_presets = next.render_style_presets.or(base.render_style_presets);
                base
            }),
            guardrails: merge_sections(self.guardrails, later.guardrails, |mut base, next| {
                base.mode = next.mode.or(base.mode);
                base.pii_handling = next.pii_handling.or(base.pii_handling);
                base.blocked_topics = next.blocked_topics.or(base.blocked_topics);
                base.max_qa_questions = next.max_qa_questions.or(base.max_qa_questions);
                base.max_output_tokens = next.max_output_tokens.or(base.max_output_tokens);
                base
            }),
        }
    }

    /// Save-boundary cleanup: blank model strings drop to `None` so the
    /// built-in literals apply, guardrail numbers are clamped, topic lists
    /// deduplicated. Saving garbage values must not fail the save.
    pub fn normalized(mut self) -> Self {
        if let Some(models) = self.models.as_mut() {
            models.estimator_model = non_blank(models.estimator_model.take());
            models.qa_model = non_blank(models.qa_model.take());
            models.render_model = non_blank(models.render_model.take());
            if let Some(allowlist) = models.tenant_model_allowlist.take() {
                models.tenant_model_allowlist = Some(dedupe_preserving_order(allowlist));
            }
        }
        if let Some(guardrails) = self.guardrails.as_mut() {
            if let Some(max_qa_questions) = guardrails.max_qa_questions {
                guardrails.max_qa_questions =
                    Some(max_qa_questions.clamp(MIN_QA_QUESTIONS, MAX_QA_QUESTIONS));
            }
            if let Some(max_output_tokens) = guardrails.max_output_tokens {
                guardrails.max_output_tokens =
                    Some(max_output_tokens.clamp(MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS));
            }
            if let Some(blocked_topics) = guardrails.blocked_topics.take() {
                guardrails.blocked_topics = Some(dedupe_preserving_order(blocked_topics));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.models.is_none()
            && self.prompts.is_none()
            && self.guardrails.is_none()
    }
}

fn merge_sections<T>(
    base: Option<T>,
    later: Option<T>,
    merge: impl FnOnce(T, T) -> T,
) -> Option<T> {
    match (base, later) {
        (Some(base), Some(later)) => Some(merge(base, later)),
        (base, None) => base,
        (None, later) => later,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn dedupe_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            out.push(trimmed);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        GuardrailMode, GuardrailPolicyPatch, ModelConfigPatch, PlatformConfig, PlatformConfigPatch,
        PromptConfigPatch, FALLBACK_RENDER_MODEL, FALLBACK_TEXT_MODEL,
    };

    #[test]
    fn later_patch_wins_per_leaf() {
        let mut config = PlatformConfig::default();

        config.apply_patch(PlatformConfigPatch {
            models: Some(ModelConfigPatch {
                estimator_model: Some("seed-model".to_string()),
                qa_model: Some("seed-qa".to_string()),
                ..ModelConfigPatch::default()
            }),
            prompts: Some(PromptConfigPatch {
                extra_system_preamble: Some("seed preamble".to_string()),
                ..PromptConfigPatch::default()
            }),
            ..PlatformConfigPatch::default()
        });
        config.apply_patch(PlatformConfigPatch {
            models: Some(ModelConfigPatch {
                estimator_model: Some("persisted-model".to_string()),
                ..ModelConfigPatch::default()
            }),
            ..PlatformConfigPatch::default()
        });

        assert_eq!(config.models.estimator_model, "persisted-model");
        // Leaves the later patch did not speak for keep the earlier value.
        assert_eq!(config.models.qa_model, "seed-qa");
        assert_eq!(config.prompts.extra_system_preamble, "seed preamble");
    }

    #[test]
    fn merged_with_prefers_later_but_keeps_unspoken_leaves() {
        let base = PlatformConfigPatch {
            models: Some(ModelConfigPatch {
                estimator_model: Some("old".to_string()),
                qa_model: Some("kept".to_string()),
                ..ModelConfigPatch::default()
            }),
            ..PlatformConfigPatch::default()
        };
        let later = PlatformConfigPatch {
            models: Some(ModelConfigPatch {
                estimator_model: Some("new".to_string()),
                ..ModelConfigPatch::default()
            }),
            guardrails: Some(GuardrailPolicyPatch {
                mode: Some(GuardrailMode::Strict),
                ..GuardrailPolicyPatch::default()
            }),
            ..PlatformConfigPatch::default()
        };

        let merged = base.merged_with(later);
        let models = merged.models.expect("models section");
        assert_eq!(models.estimator_model.as_deref(), Some("new"));
        assert_eq!(models.qa_model.as_deref(), Some("kept"));
        assert_eq!(
            merged.guardrails.and_then(|g| g.mode),
            Some(GuardrailMode::Strict)
        );
    }

    #[test]
    fn normalized_config_restores_model_fallbacks() {
        let mut config = PlatformConfig::default();
        config.models.estimator_model = "   ".to_string();
        config.models.qa_model = String::new();
        config.models.render_model = "\t".to_string();

        let normalized = config.normalized();
        assert_eq!(normalized.models.estimator_model, FALLBACK_TEXT_MODEL);
        assert_eq!(normalized.models.qa_model, FALLBACK_TEXT_MODEL);
        assert_eq!(normalized.models.render_model, FALLBACK_RENDER_MODEL);
    }

    #[test]
    fn normalized_patch_clamps_guardrails_and_dedupes_topics() {
        let patch = PlatformConfigPatch {
            guardrails: Some(GuardrailPolicyPatch {
                blocked_topics: Some(vec![
                    "weapons".to_string(),
                    "  weapons ".to_string(),
                    "medical advice".to_string(),
                    "   ".to_string(),
                ]),
                max_qa_questions: Some(25),
                max_output_tokens: Some(7),
                ..GuardrailPolicyPatch::default()
            }),
            models: Some(ModelConfigPatch {
                estimator_model: Some("   ".to_string()),
                ..ModelConfigPatch::default()
            }),
            ..PlatformConfigPatch::default()
        };

        let normalized = patch.normalized();
        let guardrails = normalized.guardrails.expect("guardrails section");
        assert_eq!(
            guardrails.blocked_topics,
            Some(vec!["weapons".to_string(), "medical advice".to_string()])
        );
        assert_eq!(guardrails.max_qa_questions, Some(10));
        assert_eq!(guardrails.max_output_tokens, Some(100));
        // Blank model strings drop out entirely so the fallback literal applies.
        assert_eq!(normalized.models.expect("models section").estimator_model, None);
    }

    #[test]
    fn patch_parses_from_partial_json() {
        let patch: PlatformConfigPatch =
            serde_json::from_str(r#"{"guardrails":{"max_qa_questions":3}}"#).unwrap();
        assert!(patch.models.is_none());
        assert_eq!(patch.guardrails.unwrap().max_qa_questions, Some(3));
    }

    #[test]
    fn default_config_is_concrete() {
        let config = PlatformConfig::default();
        assert!(!config.models.estimator_model.is_empty());
        assert!(!config.models.qa_model.is_empty());
        assert!(!config.models.render_model.is_empty());
        assert!(!config.prompts.quote_estimator_system.is_empty());
        assert!(!config.prompts.qa_question_generator_system.is_empty());
        assert!(config.prompts.render_style_presets.contains_key("natural"));
    }
}
