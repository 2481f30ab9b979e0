pub mod config;
pub mod domain;
pub mod keypolicy;
pub mod prompt;
pub mod resolve;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, LoadOptions, LogFormat,
    LoggingConfig, PlatformSettings,
};
pub use domain::industry::{
    normalize_industry_key, IndustryModelOverrides, IndustryPack, IndustryPackDraft,
    IndustryPromptOverrides, PackMeta, PackProvenance,
};
pub use domain::overlay::Overlay;
pub use domain::platform::{
    GuardrailMode, GuardrailPolicy, ModelConfig, ModelConfigPatch, PiiHandling, PlatformConfig,
    PlatformConfigPatch, PromptConfig, PromptConfigPatch, FALLBACK_RENDER_MODEL,
    FALLBACK_TEXT_MODEL, MAX_QA_QUESTIONS, MIN_QA_QUESTIONS,
};
pub use domain::pricing::{PricingMode, PricingPolicySnapshot};
pub use domain::tenant::{
    ModelPreset, ModelSelection, PlanTier, RenderingPolicy, TenantOverrides,
    TenantPromptOverrides, TenantSettings,
};
pub use keypolicy::{KeyPolicyInputs, KeyPolicyStatus, KeySource};
pub use prompt::render::{compose_render_prompt, CompiledRenderPrompt, RenderRequest};
pub use prompt::{compose_estimator_prompt, compose_qa_prompt};
pub use resolve::{
    merge_layers, EffectiveConfig, LayerAudit, ModelSource, ResolvedModels, ResolvedPrompts,
};
