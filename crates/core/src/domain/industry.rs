use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::overlay::Overlay;

/// Canonical form for industry keys: lowercased, trimmed slug. An empty
/// normalized key is never queried or written.
pub fn normalize_industry_key(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryModelOverrides {
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub estimator_model: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub qa_model: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub render_model: Overlay<String>,
}

impl IndustryModelOverrides {
    fn is_empty(&self) -> bool {
        self.estimator_model.is_inherit()
            && self.qa_model.is_inherit()
            && self.render_model.is_inherit()
    }

    fn normalized(self) -> Self {
        Self {
            estimator_model: self.estimator_model.normalized(),
            qa_model: self.qa_model.normalized(),
            render_model: self.render_model.normalized(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryPromptOverrides {
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub quote_estimator_system: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub qa_question_generator_system: Overlay<String>,
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub extra_system_preamble: Overlay<String>,
    /// Industry specialization text composed as its own labeled prompt
    /// block, distinct from the replace-merged system texts above.
    #[serde(default, skip_serializing_if = "Overlay::is_inherit")]
    pub industry_preamble: Overlay<String>,
    /// Render fields tolerate the field names older pack blobs were
    /// written with.
    #[serde(
        default,
        alias = "renderAddendum",
        alias = "render_prompt_addendum",
        skip_serializing_if = "Overlay::is_inherit"
    )]
    pub render_addendum: Overlay<String>,
    #[serde(
        default,
        alias = "negativePrompt",
        alias = "render_negative",
        skip_serializing_if = "Overlay::is_inherit"
    )]
    pub render_negative_guidance: Overlay<String>,
}

impl IndustryPromptOverrides {
    fn is_empty(&self) -> bool {
        self.quote_estimator_system.is_inherit()
            && self.qa_question_generator_system.is_inherit()
            && self.extra_system_preamble.is_inherit()
            && self.industry_preamble.is_inherit()
            && self.render_addendum.is_inherit()
            && self.render_negative_guidance.is_inherit()
    }

    fn normalized(self) -> Self {
        Self {
            quote_estimator_system: self.quote_estimator_system.normalized(),
            qa_question_generator_system: self.qa_question_generator_system.normalized(),
            extra_system_preamble: self.extra_system_preamble.normalized(),
            industry_preamble: self.industry_preamble.normalized(),
            render_addendum: self.render_addendum.normalized(),
            render_negative_guidance: self.render_negative_guidance.normalized(),
        }
    }
}

/// Stored per-industry override bundle. Partial by construction: every field
/// is an overlay over the platform baseline. Guardrails are structurally
/// impossible here; they arrive only via [`IndustryPackDraft`] and are
/// stripped before a pack is stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryPack {
    #[serde(default)]
    pub models: IndustryModelOverrides,
    #[serde(default)]
    pub prompts: IndustryPromptOverrides,
}

impl IndustryPack {
    /// A pack that sets nothing is treated as absent by resolution and
    /// rejected by the write path.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.prompts.is_empty()
    }

    pub fn normalized(self) -> Self {
        Self { models: self.models.normalized(), prompts: self.prompts.normalized() }
    }
}

/// Admin-facing input shape for pack upserts. Unlike the stored pack it may
/// carry a `guardrails` payload, which the write path drops.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryPackDraft {
    #[serde(default)]
    pub models: IndustryModelOverrides,
    #[serde(default)]
    pub prompts: IndustryPromptOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<serde_json::Value>,
}

impl IndustryPackDraft {
    /// Converts the draft into its storable pack, reporting whether a
    /// guardrail payload had to be stripped.
    pub fn into_pack(self) -> (IndustryPack, bool) {
        let stripped_guardrails = self.guardrails.is_some();
        let pack = IndustryPack { models: self.models, prompts: self.prompts }.normalized();
        (pack, stripped_guardrails)
    }
}

/// Provenance recorded alongside each stored pack row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackMeta {
    pub version: i64,
    pub updated_by: String,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied provenance for an upsert; unset fields get defaults at
/// the write boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackProvenance {
    pub version: Option<i64>,
    pub updated_by: Option<String>,
    pub source: Option<String>,
}
