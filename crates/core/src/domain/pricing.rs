use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    #[default]
    AssessmentOnly,
    Fixed,
    Range,
}

/// Pre-computed pricing posture handed in by the caller. The composer only
/// formats these values into prompt text; no pricing arithmetic happens in
/// this engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicySnapshot {
    pub pricing_enabled: bool,
    pub mode: PricingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_job_amount: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PricingPolicySnapshot {
    fn default() -> Self {
        Self {
            pricing_enabled: false,
            mode: PricingMode::AssessmentOnly,
            model_hint: None,
            minimum_job_amount: None,
            currency: default_currency(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}
