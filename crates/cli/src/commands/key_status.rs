use crate::commands::{bootstrap_failure, CommandResult};
use snapquote_core::config::{AppConfig, LoadOptions};
use snapquote_core::keypolicy::KeyPolicyStatus;
use snapquote_engine::bootstrap_with_config;

pub fn run(tenant_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "key-status",
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
                "key-status",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await.map_err(bootstrap_failure)?;
        let status = app.engine.get_key_policy_status(tenant_id).await;
        app.db_pool.close().await;
        Ok::<KeyPolicyStatus, (&'static str, String, u8)>(status)
    });

    match result {
        Ok(status) => CommandResult::success("key-status", render_status(tenant_id, &status)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("key-status", error_class, message, exit_code)
        }
    }
}

fn render_status(tenant_id: &str, status: &KeyPolicyStatus) -> String {
    let lines = vec![
        format!("key policy for tenant `{tenant_id}`:"),
        format!("- plan_tier = {}", status.plan_tier.as_str()),
        format!("- key_source = {}", status.effective_key_source_now.as_str()),
        format!("- platform_allowed = {}", status.platform_allowed),
        format!("- has_tenant_key = {}", status.has_tenant_key),
        format!("- has_platform_key = {}", status.has_platform_key),
        format!(
            "- activation_grace = {} used of {}",
            status.activation_grace_used, status.activation_grace_credits
        ),
        format!(
            "- would_consume_grace_on_new_quote = {}",
            status.would_consume_grace_on_new_quote
        ),
        format!("- reason = {}", status.reason.as_deref().unwrap_or("<none>")),
    ];

    lines.join("\n")
}
