use std::fs;
use std::path::Path;

use crate::commands::{bootstrap_failure, CommandResult};
use snapquote_core::config::{AppConfig, LoadOptions};
use snapquote_core::domain::industry::{
    normalize_industry_key, IndustryPackDraft, PackMeta, PackProvenance,
};
use snapquote_engine::{bootstrap_with_config, AdminError};

pub fn run_list_missing(limit: usize) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "packs-list-missing",
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
                "packs-list-missing",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await.map_err(bootstrap_failure)?;
        let keys = app.engine.list_keys_missing_pack(limit).await.map_err(admin_failure)?;
        app.db_pool.close().await;
        Ok::<Vec<String>, (&'static str, String, u8)>(keys)
    });

    match result {
        Ok(keys) if keys.is_empty() => {
            CommandResult::success("packs-list-missing", "every known industry has a prompt pack")
        }
        Ok(keys) => {
            let listed: Vec<String> = keys.iter().map(|key| format!("  - {key}")).collect();
            let message =
                format!("industries missing a prompt pack:\n{}", listed.join("\n"));
            CommandResult::success("packs-list-missing", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("packs-list-missing", error_class, message, exit_code)
        }
    }
}

pub fn run_upsert(
    key: &str,
    file: &Path,
    updated_by: Option<String>,
    source: Option<String>,
) -> CommandResult {
    let raw = match fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "packs-upsert",
                "draft_read",
                format!("could not read draft file `{}`: {error}", file.display()),
                2,
            );
        }
    };

    let draft: IndustryPackDraft = match serde_json::from_str(&raw) {
        Ok(draft) => draft,
        Err(error) => {
            return CommandResult::failure(
                "packs-upsert",
                "draft_parse",
                format!("draft file `{}` is not a valid pack draft: {error}", file.display()),
                2,
            );
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "packs-upsert",
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
                "packs-upsert",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let normalized_key = normalize_industry_key(key);
    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await.map_err(bootstrap_failure)?;
        let provenance = PackProvenance { version: None, updated_by, source };
        let meta = app
            .engine
            .upsert_industry_pack(key, draft, provenance)
            .await
            .map_err(admin_failure)?;
        app.db_pool.close().await;
        Ok::<PackMeta, (&'static str, String, u8)>(meta)
    });

    match result {
        Ok(meta) => {
            let message = format!(
                "stored industry pack `{normalized_key}` version {} (updated_by: {}, source: {})",
                meta.version, meta.updated_by, meta.source
            );
            CommandResult::success("packs-upsert", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("packs-upsert", error_class, message, exit_code)
        }
    }
}

fn admin_failure(error: AdminError) -> (&'static str, String, u8) {
    let (error_class, exit_code) = match &error {
        AdminError::IndustryKeyRequired
        | AdminError::IndustryPackEmpty
        | AdminError::Validation(_) => ("validation", 2),
        AdminError::Store(_) => ("store", 5),
    };
    (error_class, error.to_string(), exit_code)
}
