use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use snapquote_cli::commands::{doctor, key_status, migrate, packs, seed, show_config};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("SNAPQUOTE_DATABASE_URL", "sqlite::memory:"),
            ("SNAPQUOTE_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_reports_config_validation_failure() {
    with_env(&[("SNAPQUOTE_DATABASE_URL", "postgres://nope")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("database.url"));
    });
}

#[test]
fn seed_returns_deterministic_tenant_summary() {
    with_env(
        &[
            ("SNAPQUOTE_DATABASE_URL", "sqlite::memory:"),
            ("SNAPQUOTE_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = seed::run();
            assert_eq!(result.exit_code, 0, "expected deterministic seed success");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "seed");
            assert_eq!(payload["status"], "ok");

            let message = payload["message"].as_str().unwrap_or("");
            let aurora_line = "  - tenant-aurora: pro (Pro tenant with its own credential and quality-preset overrides)";
            let borealis_line = "  - tenant-borealis: trial (Trial tenant mid-way through its platform grace allowance)";
            let cirrus_line = "  - tenant-cirrus: free (Free tenant with no credential of any kind)";
            assert!(message.contains(aurora_line));
            assert!(message.contains(borealis_line));
            assert!(message.contains(cirrus_line));
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let url = file_db_url(&dir, "seed-twice.db");

    with_env(&[("SNAPQUOTE_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn doctor_json_reports_every_readiness_check() {
    with_env(
        &[
            ("SNAPQUOTE_DATABASE_URL", "sqlite::memory:"),
            ("SNAPQUOTE_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let output = doctor::run(true);
            let report: Value =
                serde_json::from_str(&output).expect("doctor --json should emit valid JSON");

            assert_eq!(report["overall_status"], "pass");
            let checks = report["checks"].as_array().expect("checks should be an array");
            let names: Vec<&str> =
                checks.iter().filter_map(|check| check["name"].as_str()).collect();
            assert_eq!(
                names,
                ["config_validation", "platform_credential", "database_connectivity"]
            );
        },
    );
}

#[test]
fn key_status_reflects_seeded_tenant_credentials() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let url = file_db_url(&dir, "key-status.db");

    with_env(&[("SNAPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed before key-status");

        let aurora = key_status::run("tenant-aurora");
        assert_eq!(aurora.exit_code, 0);
        let payload = parse_payload(&aurora.output);
        assert_eq!(payload["command"], "key-status");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("- plan_tier = pro"));
        assert!(message.contains("- key_source = tenant\n"));
        assert!(message.contains("- reason = <none>"));

        let cirrus = key_status::run("tenant-cirrus");
        assert_eq!(cirrus.exit_code, 0);
        let payload = parse_payload(&cirrus.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("- key_source = none"));
        assert!(message.contains("plan tier `free` does not permit platform key usage"));
    });
}

#[test]
fn show_config_resolves_seeded_layers() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let url = file_db_url(&dir, "show-config.db");

    with_env(&[("SNAPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed before show-config");

        let result = show_config::run("tenant-aurora", None);
        assert_eq!(result.exit_code, 0, "expected successful resolution");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "show-config");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("(industry: photography)"));
        assert!(message.contains("- models.estimator_model = gpt-4o\n"));
        assert!(message.contains("- model_source = tenant_preset"));
        assert!(message.contains("- guardrails.max_qa_questions = 4"));
        assert!(message.contains("- guardrails.blocked_topics = medical advice, legal advice"));
        assert!(message.contains("- layers.tenant_style = editorial"));
    });
}

#[test]
fn show_config_industry_flag_overrides_the_tenant_row() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let url = file_db_url(&dir, "industry-flag.db");

    with_env(&[("SNAPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed before show-config");

        // Stored row points at landscaping, whose pack raises the estimator.
        let stored = show_config::run("tenant-borealis", None);
        let message = parse_payload(&stored.output)["message"].as_str().unwrap_or("").to_string();
        assert!(message.contains("(industry: landscaping)"));
        assert!(message.contains("- models.estimator_model = gpt-4o\n"));
        assert!(message.contains("- model_source = platform_default"));

        // The flag wins; photography sets no models, so the platform
        // fallback shows through.
        let flagged = show_config::run("tenant-borealis", Some("photography"));
        let message = parse_payload(&flagged.output)["message"].as_str().unwrap_or("").to_string();
        assert!(message.contains("(industry: photography)"));
        assert!(message.contains("- models.estimator_model = gpt-4o-mini"));
    });
}

#[test]
fn packs_backfill_flow_lists_then_fills_the_gap() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let url = file_db_url(&dir, "packs.db");

    with_env(&[("SNAPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed before packs");

        let listed = packs::run_list_missing(20);
        assert_eq!(listed.exit_code, 0);
        let message = parse_payload(&listed.output)["message"].as_str().unwrap_or("").to_string();
        assert!(message.contains("  - plumbing"));

        let draft_path = dir.path().join("plumbing-pack.json");
        fs::write(
            &draft_path,
            r#"{"prompts":{"industry_preamble":"You specialize in licensed plumbing work. Count fixtures and access difficulty before pricing."}}"#,
        )
        .expect("draft file should be writable");

        let upserted = packs::run_upsert("Plumbing", &draft_path, Some("ops".to_string()), None);
        assert_eq!(upserted.exit_code, 0, "expected successful pack upsert");
        let payload = parse_payload(&upserted.output);
        assert_eq!(payload["command"], "packs-upsert");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message
            .contains("stored industry pack `plumbing` version 1 (updated_by: ops, source: manual)"));

        let refreshed = packs::run_list_missing(20);
        let message =
            parse_payload(&refreshed.output)["message"].as_str().unwrap_or("").to_string();
        assert_eq!(message, "every known industry has a prompt pack");
    });
}

#[test]
fn packs_upsert_rejects_an_unparseable_draft() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let draft_path = dir.path().join("broken.json");
    fs::write(&draft_path, "{not json").expect("draft file should be writable");

    with_env(&[("SNAPQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = packs::run_upsert("plumbing", &draft_path, None, None);
        assert_eq!(result.exit_code, 2, "expected draft parse failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "draft_parse");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn file_db_url(dir: &tempfile::TempDir, file_name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join(file_name).display())
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SNAPQUOTE_DATABASE_URL",
        "SNAPQUOTE_DATABASE_MAX_CONNECTIONS",
        "SNAPQUOTE_DATABASE_TIMEOUT_SECS",
        "SNAPQUOTE_PLATFORM_OPENAI_API_KEY",
        "SNAPQUOTE_PLATFORM_AI_DEFAULTS",
        "SNAPQUOTE_LOGGING_LEVEL",
        "SNAPQUOTE_LOGGING_FORMAT",
        "SNAPQUOTE_LOG_LEVEL",
        "SNAPQUOTE_LOG_FORMAT",
        "OPENAI_API_KEY",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
