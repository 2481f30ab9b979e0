use crate::commands::{bootstrap_failure, CommandResult};
use snapquote_core::config::{AppConfig, LoadOptions};
use snapquote_core::resolve::EffectiveConfig;
use snapquote_engine::bootstrap_with_config;

pub fn run(tenant_id: &str, industry: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "show-config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "show-config",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await.map_err(bootstrap_failure)?;
        let effective = app.engine.resolve_effective_config(tenant_id, industry).await;
        app.db_pool.close().await;
        Ok::<EffectiveConfig, (&'static str, String, u8)>(effective)
    });

    match result {
        Ok(effective) => {
            CommandResult::success("show-config", render_effective(tenant_id, &effective))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("show-config", error_class, message, exit_code)
        }
    }
}

/// Human-readable rendering of a resolved policy. Prompt bodies are long,
/// so they render as sizes; everything an operator compares across tenants
/// renders verbatim.
fn render_effective(tenant_id: &str, effective: &EffectiveConfig) -> String {
    let industry = effective.layers.industry_key.as_deref().unwrap_or("none");
    let mut lines =
        vec![format!("effective policy for tenant `{tenant_id}` (industry: {industry}):")];

    lines.push(format!("- models.estimator_model = {}", effective.models.estimator_model));
    lines.push(format!("- models.qa_model = {}", effective.models.qa_model));
    lines.push(format!("- models.render_model = {}", effective.models.render_model));
    lines.push(format!("- model_source = {}", effective.model_source.as_str()));

    lines.push(format!("- guardrails.mode = {:?}", effective.guardrails.mode));
    lines.push(format!("- guardrails.pii_handling = {:?}", effective.guardrails.pii_handling));
    let blocked_topics = if effective.guardrails.blocked_topics.is_empty() {
        "<none>".to_string()
    } else {
        effective.guardrails.blocked_topics.join(", ")
    };
    lines.push(format!("- guardrails.blocked_topics = {blocked_topics}"));
    lines.push(format!(
        "- guardrails.max_qa_questions = {}",
        effective.guardrails.max_qa_questions
    ));
    lines.push(format!(
        "- guardrails.max_output_tokens = {}",
        effective.guardrails.max_output_tokens
    ));

    lines.push(format!(
        "- prompts.quote_estimator_system = {}",
        text_stat(&effective.prompts.quote_estimator_system)
    ));
    lines.push(format!(
        "- prompts.qa_question_generator_system = {}",
        text_stat(&effective.prompts.qa_question_generator_system)
    ));
    lines.push(format!(
        "- prompts.extra_system_preamble = {}",
        text_stat(&effective.prompts.extra_system_preamble)
    ));
    lines.push(format!(
        "- prompts.render_prompt_preamble = {}",
        text_stat(&effective.prompts.render_prompt_preamble)
    ));
    lines.push(format!(
        "- prompts.render_prompt_template = {}",
        text_stat(&effective.prompts.render_prompt_template)
    ));
    lines.push(format!(
        "- prompts.render_style_presets = {} presets",
        effective.prompts.render_style_presets.len()
    ));

    lines.push(format!(
        "- layers.industry_preamble = {}",
        effective.layers.industry_preamble.as_deref().map(text_stat).unwrap_or_else(none_marker)
    ));
    lines.push(format!(
        "- layers.tenant_style = {}",
        effective.layers.tenant_style.as_deref().unwrap_or("<none>")
    ));
    lines.push(format!(
        "- layers.tenant_rendering_enabled = {}",
        effective.layers.tenant_rendering_enabled
    ));
    let rejected = if effective.layers.rejected_models.is_empty() {
        "<none>".to_string()
    } else {
        effective.layers.rejected_models.join(", ")
    };
    lines.push(format!("- layers.rejected_models = {rejected}"));

    lines.join("\n")
}

fn text_stat(text: &str) -> String {
    format!("{} chars", text.chars().count())
}

fn none_marker() -> String {
    "<none>".to_string()
}
