pub mod config;
pub mod doctor;
pub mod key_status;
pub mod migrate;
pub mod packs;
pub mod seed;
pub mod show_config;

use serde::Serialize;
use snapquote_engine::BootstrapError;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Maps a bootstrap failure onto the shared (error_class, message, exit_code)
/// triple the engine-backed commands report through.
pub(crate) fn bootstrap_failure(error: BootstrapError) -> (&'static str, String, u8) {
    let (error_class, exit_code) = match &error {
        BootstrapError::Config(_) => ("config_validation", 2),
        BootstrapError::DatabaseConnect(_) => ("db_connectivity", 4),
        BootstrapError::Migration(_) => ("migration", 5),
    };
    (error_class, error.to_string(), exit_code)
}
