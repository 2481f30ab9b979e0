//! Pure prompt compilation. Every composer builds an ordered list of text
//! blocks, trims each, drops the empty ones and joins the rest with a blank
//! line. Identical inputs always produce byte-identical output.

pub mod render;

pub use render::{compose_render_prompt, CompiledRenderPrompt, RenderRequest};

use crate::domain::platform::PiiHandling;
use crate::domain::pricing::{PricingMode, PricingPolicySnapshot};
use crate::resolve::EffectiveConfig;

/// System prompt for the quote estimator call.
pub fn compose_estimator_prompt(
    effective: &EffectiveConfig,
    pricing: &PricingPolicySnapshot,
) -> String {
    let blocks = vec![
        guardrail_block(effective),
        effective.prompts.extra_system_preamble.clone(),
        effective.prompts.quote_estimator_system.clone(),
        industry_block(effective),
        tenant_context_block(effective),
        communication_style_block(pricing),
        pricing_policy_block(pricing),
    ];
    join_blocks(blocks)
}

/// System prompt for the clarifying-question generator call. Shares the
/// estimator skeleton but swaps the style and pricing tail for a question
/// block capped at the resolved guardrail maximum.
pub fn compose_qa_prompt(effective: &EffectiveConfig) -> String {
    let blocks = vec![
        guardrail_block(effective),
        effective.prompts.extra_system_preamble.clone(),
        effective.prompts.qa_question_generator_system.clone(),
        industry_block(effective),
        tenant_context_block(effective),
        question_style_block(effective),
    ];
    join_blocks(blocks)
}

fn join_blocks(blocks: Vec<String>) -> String {
    blocks
        .iter()
        .map(|block| block.trim())
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn guardrail_block(effective: &EffectiveConfig) -> String {
    let mut lines = vec![
        "Respond with valid JSON matching the provided schema exactly. No markdown fences, \
         no commentary outside the JSON."
            .to_string(),
    ];
    match effective.guardrails.pii_handling {
        PiiHandling::Redact => lines.push(
            "Redact personal contact details (names, phone numbers, addresses) from your output."
                .to_string(),
        ),
        PiiHandling::Deny => lines.push(
            "Refuse to repeat or act on personal contact details present in the input.".to_string(),
        ),
        PiiHandling::Allow => {}
    }
    if !effective.guardrails.blocked_topics.is_empty() {
        lines.push(format!(
            "Never provide content involving: {}.",
            effective.guardrails.blocked_topics.join(", ")
        ));
    }
    lines.join("\n")
}

fn industry_block(effective: &EffectiveConfig) -> String {
    match (&effective.layers.industry_key, &effective.layers.industry_preamble) {
        (Some(key), Some(preamble)) if !preamble.trim().is_empty() => {
            format!("Industry specialization ({key}):\n{preamble}")
        }
        _ => String::new(),
    }
}

fn tenant_context_block(effective: &EffectiveConfig) -> String {
    let mut lines = Vec::new();
    if let Some(style) = effective.resolved_style_text() {
        lines.push(format!("Preferred visual style: {style}."));
    }
    if let Some(notes) = &effective.layers.tenant_render_addendum {
        if !notes.trim().is_empty() {
            lines.push(format!("Business notes: {notes}"));
        }
    }
    if lines.is_empty() {
        String::new()
    } else {
        format!("Tenant context:\n{}", lines.join("\n"))
    }
}

fn communication_style_block(pricing: &PricingPolicySnapshot) -> String {
    let pricing_line = match (pricing.pricing_enabled, pricing.mode) {
        (false, _) | (true, PricingMode::AssessmentOnly) => {
            "Describe scope and considerations without quoting prices."
        }
        (true, PricingMode::Fixed) => "Present one firm price for the described scope.",
        (true, PricingMode::Range) => {
            "Present a realistic low-to-high price range for the described scope."
        }
    };
    format!(
        "Communication style:\n\
         - Open with a summary of 2-4 sentences.\n\
         - List 3-6 scope bullets.\n\
         - List 3-5 assumptions.\n\
         - List 3-5 clarifying questions.\n\
         - {pricing_line}"
    )
}

fn pricing_policy_block(pricing: &PricingPolicySnapshot) -> String {
    let mut lines = vec!["Pricing policy (non-negotiable):".to_string()];
    if !pricing.pricing_enabled || pricing.mode == PricingMode::AssessmentOnly {
        lines.push("- Set estimate_low and estimate_high to 0.".to_string());
        lines.push("- Use no monetary language anywhere in the response.".to_string());
    } else {
        match pricing.mode {
            PricingMode::Fixed => lines.push(
                "- Set estimate_low equal to estimate_high: one firm number.".to_string(),
            ),
            PricingMode::Range => lines.push(
                "- Set estimate_low strictly below estimate_high: a genuine range.".to_string(),
            ),
            PricingMode::AssessmentOnly => {}
        }
        if let Some(minimum) = &pricing.minimum_job_amount {
            lines.push(format!(
                "- Never estimate below the minimum job amount of {} {}.",
                minimum, pricing.currency
            ));
        }
    }
    if let Some(hint) = pricing.model_hint.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        lines.push(format!("- Pricing guidance: {hint}"));
    }
    lines.join("\n")
}

fn question_style_block(effective: &EffectiveConfig) -> String {
    format!(
        "Question style:\n\
         - Ask at most {} clarifying questions.\n\
         - Every question must change the scope, access, or price of the work.\n\
         - Respond with strict JSON of the shape {{\"questions\":[\"...\"]}} and nothing else.",
        effective.guardrails.max_qa_questions
    )
}
