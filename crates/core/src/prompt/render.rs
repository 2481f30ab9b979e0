use serde::Serialize;

use crate::resolve::EffectiveConfig;

use super::join_blocks;

/// Substitution values for the platform render template. Blank fields
/// substitute as empty strings rather than leaving placeholder tokens
/// behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderRequest {
    pub service_type: String,
    pub summary: String,
    pub customer_notes: String,
    pub tenant_notes: String,
}

/// Final render prompt plus each layer's raw fragment, so the admin audit
/// view can show where every piece of text came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompiledRenderPrompt {
    pub prompt: String,
    pub platform_preamble: String,
    pub platform_body: String,
    pub industry_addendum: String,
    pub industry_negative: String,
    pub tenant_addendum: String,
    pub tenant_negative: String,
}

/// Compiles the image-render prompt: platform preamble, the platform
/// template with literal `{{placeholder}}` substitution, then the industry
/// and tenant addendum/negative-guidance pairs. The tenant pair is skipped
/// when the tenant disabled its rendering policy.
pub fn compose_render_prompt(
    effective: &EffectiveConfig,
    request: &RenderRequest,
) -> CompiledRenderPrompt {
    let style_text = effective.resolved_style_text().unwrap_or_default();
    let substituted = substitute_placeholders(
        &effective.prompts.render_prompt_template,
        &[
            ("style", style_text.as_str()),
            ("service_type", request.service_type.as_str()),
            ("summary", request.summary.as_str()),
            ("customer_notes", request.customer_notes.as_str()),
            ("tenant_notes", request.tenant_notes.as_str()),
        ],
    );

    let platform_preamble = effective.prompts.render_prompt_preamble.trim().to_string();
    let platform_body = strip_unresolved_placeholders(&substituted).trim().to_string();
    let industry_addendum = fragment(&effective.layers.industry_render_addendum);
    let industry_negative = fragment(&effective.layers.industry_render_negative);
    let (tenant_addendum, tenant_negative) = if effective.layers.tenant_rendering_enabled {
        (
            fragment(&effective.layers.tenant_render_addendum),
            fragment(&effective.layers.tenant_render_negative),
        )
    } else {
        (String::new(), String::new())
    };

    let prompt = join_blocks(vec![
        platform_preamble.clone(),
        platform_body.clone(),
        industry_addendum.clone(),
        negative_line(&industry_negative),
        tenant_addendum.clone(),
        negative_line(&tenant_negative),
    ]);

    CompiledRenderPrompt {
        prompt,
        platform_preamble,
        platform_body,
        industry_addendum,
        industry_negative,
        tenant_addendum,
        tenant_negative,
    }
}

fn fragment(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn negative_line(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("Avoid: {text}")
    }
}

fn substitute_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = template.to_string();
    for (key, value) in values {
        output = output.replace(&format!("{{{{{key}}}}}"), value.trim());
    }
    output
}

/// Drops `{{unknown}}` tokens the substitution pass did not cover. An
/// unterminated `{{` is left as literal text.
fn strip_unresolved_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        match rest[start + 2..].find("}}") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use crate::domain::industry::IndustryPack;
    use crate::domain::overlay::Overlay;
    use crate::domain::platform::PlatformConfig;
    use crate::domain::tenant::{RenderingPolicy, TenantOverrides};
    use crate::resolve::merge_layers;

    use super::{compose_render_prompt, strip_unresolved_placeholders, RenderRequest};

    #[test]
    fn placeholders_substitute_literally() {
        let mut platform = PlatformConfig::default();
        platform.prompts.render_prompt_template =
            "Service: {{service_type}}\nSummary: {{summary}}".to_string();

        let effective = merge_layers(&platform, None, None, None);
        let compiled = compose_render_prompt(
            &effective,
            &RenderRequest {
                service_type: "exterior detail".to_string(),
                summary: "full repaint of two doors".to_string(),
                ..RenderRequest::default()
            },
        );

        assert!(compiled.platform_body.contains("Service: exterior detail"));
        assert!(compiled.platform_body.contains("Summary: full repaint of two doors"));
    }

    #[test]
    fn unknown_placeholders_are_removed_and_unterminated_kept() {
        assert_eq!(strip_unresolved_placeholders("a {{weather}} b"), "a  b");
        assert_eq!(strip_unresolved_placeholders("a {{oops"), "a {{oops");
        assert_eq!(strip_unresolved_placeholders("plain text"), "plain text");

        let mut platform = PlatformConfig::default();
        platform.prompts.render_prompt_template = "before {{mystery_token}} after".to_string();
        let effective = merge_layers(&platform, None, None, None);
        let compiled = compose_render_prompt(&effective, &RenderRequest::default());
        assert!(!compiled.platform_body.contains("mystery_token"));
        assert!(!compiled.platform_body.contains("{{"));
    }

    #[test]
    fn layers_concatenate_in_order_with_negative_guidance() {
        let platform = PlatformConfig::default();
        let mut pack = IndustryPack::default();
        pack.prompts.render_addendum = Overlay::Set("show restored trim".to_string());
        pack.prompts.render_negative_guidance = Overlay::Set("no people".to_string());
        let overrides = TenantOverrides {
            rendering_policy: RenderingPolicy {
                prompt_addendum: Overlay::Set("include the shop logo wall".to_string()),
                negative_guidance: Overlay::Set("no license plates".to_string()),
                ..RenderingPolicy::default()
            },
            ..TenantOverrides::default()
        };

        let effective =
            merge_layers(&platform, Some("auto_detailing"), Some(&pack), Some(&overrides));
        let compiled = compose_render_prompt(&effective, &RenderRequest::default());

        assert_eq!(compiled.industry_addendum, "show restored trim");
        assert_eq!(compiled.tenant_negative, "no license plates");
        assert!(compiled.prompt.contains("Avoid: no people"));
        assert!(compiled.prompt.contains("Avoid: no license plates"));

        let industry_pos = compiled.prompt.find("show restored trim").unwrap();
        let tenant_pos = compiled.prompt.find("include the shop logo wall").unwrap();
        assert!(industry_pos < tenant_pos);
    }

    #[test]
    fn disabled_tenant_rendering_skips_tenant_fragments_only() {
        let platform = PlatformConfig::default();
        let mut pack = IndustryPack::default();
        pack.prompts.render_addendum = Overlay::Set("show restored trim".to_string());
        let overrides = TenantOverrides {
            rendering_policy: RenderingPolicy {
                prompt_addendum: Overlay::Set("include the shop logo wall".to_string()),
                enabled: Some(false),
                ..RenderingPolicy::default()
            },
            ..TenantOverrides::default()
        };

        let effective =
            merge_layers(&platform, Some("auto_detailing"), Some(&pack), Some(&overrides));
        let compiled = compose_render_prompt(&effective, &RenderRequest::default());

        assert!(compiled.prompt.contains("show restored trim"));
        assert!(!compiled.prompt.contains("include the shop logo wall"));
        assert!(compiled.tenant_addendum.is_empty());
    }

    #[test]
    fn style_key_substitutes_preset_text() {
        let platform = PlatformConfig::default();
        let overrides = TenantOverrides {
            rendering_policy: RenderingPolicy {
                style: Overlay::Set("bold".to_string()),
                ..RenderingPolicy::default()
            },
            ..TenantOverrides::default()
        };

        let effective = merge_layers(&platform, None, None, Some(&overrides));
        let compiled = compose_render_prompt(&effective, &RenderRequest::default());
        assert!(compiled.platform_body.contains("high contrast, saturated color"));
    }
}
