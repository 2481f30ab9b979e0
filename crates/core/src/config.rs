use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::platform::PlatformConfigPatch;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub platform: PlatformSettings,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Deployment-level platform inputs: the pooled OpenAI credential grace
/// tenants bill against, and an optional JSON patch seeding the platform AI
/// defaults at deploy time.
#[derive(Clone, Debug)]
pub struct PlatformSettings {
    pub openai_api_key: Option<SecretString>,
    pub ai_defaults_json: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://snapquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            platform: PlatformSettings { openai_api_key: None, ai_defaults_json: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PlatformSettings {
    pub fn has_openai_key(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty()) // ubs:ignore
            .unwrap_or(false)
    }

    /// Deploy-time seed patch parsed from `ai_defaults_json`. Unknown fields
    /// inside the payload are ignored by the patch shape.
    pub fn ai_defaults_patch(&self) -> Result<Option<PlatformConfigPatch>, ConfigError> {
        let Some(raw) = self.ai_defaults_json.as_deref() else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(raw).map(Some).map_err(|err| {
            ConfigError::Validation(format!(
                "platform.ai_defaults_json did not parse as a platform config patch: {err}"
            ))
        })
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("snapquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(platform) = patch.platform {
            if let Some(openai_api_key_value) = platform.openai_api_key {
                self.platform.openai_api_key = Some(secret_value(openai_api_key_value)); // ubs:ignore
            }
            if let Some(ai_defaults_json) = platform.ai_defaults_json {
                self.platform.ai_defaults_json = Some(ai_defaults_json);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SNAPQUOTE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SNAPQUOTE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SNAPQUOTE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SNAPQUOTE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SNAPQUOTE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let platform_key = read_env("SNAPQUOTE_PLATFORM_OPENAI_API_KEY")
            .or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = platform_key {
            self.platform.openai_api_key = Some(secret_value(value)); // ubs:ignore
        }
        if let Some(value) = read_env("SNAPQUOTE_PLATFORM_AI_DEFAULTS") {
            self.platform.ai_defaults_json = Some(value);
        }

        let log_level =
            read_env("SNAPQUOTE_LOGGING_LEVEL").or_else(|| read_env("SNAPQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SNAPQUOTE_LOGGING_FORMAT").or_else(|| read_env("SNAPQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(openai_api_key) = overrides.openai_api_key {
            self.platform.openai_api_key = Some(secret_value(openai_api_key)); // ubs:ignore
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_platform(&self.platform)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("snapquote.toml"), PathBuf::from("config/snapquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_platform(platform: &PlatformSettings) -> Result<(), ConfigError> {
    if let Some(key) = &platform.openai_api_key {
        if key.expose_secret().trim().is_empty() { // ubs:ignore
            return Err(ConfigError::Validation(
                "platform.openai_api_key is set but blank; remove it or provide a real key"
                    .to_string(),
            ));
        }
    }

    platform.ai_defaults_patch().map(|_| ())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    platform: Option<PlatformPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformPatch {
    openai_api_key: Option<String>,
    ai_defaults_json: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
// ubs:ignore
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PLATFORM_OPENAI_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("snapquote.toml");
            fs::write(
                &path,
                r#"
[platform]
openai_api_key = "${TEST_PLATFORM_OPENAI_KEY}" # ubs:ignore
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config
                .platform
                .openai_api_key
                .as_ref()
                .ok_or("platform key should be set from interpolated file value")?;
            ensure(
                key.expose_secret() == "sk-from-env",
                "platform key should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PLATFORM_OPENAI_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SNAPQUOTE_LOG_LEVEL", "warn");
        env::set_var("SNAPQUOTE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SNAPQUOTE_LOG_LEVEL", "SNAPQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SNAPQUOTE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SNAPQUOTE_PLATFORM_OPENAI_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("snapquote.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[platform]
openai_api_key = "sk-from-file" # ubs:ignore

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            let key = config.platform.openai_api_key.as_ref().ok_or("platform key missing")?;
            ensure(
                key.expose_secret() == "sk-from-env",
                "env platform key should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["SNAPQUOTE_DATABASE_URL", "SNAPQUOTE_PLATFORM_OPENAI_API_KEY"]);
        result
    }

    #[test]
    fn invalid_ai_defaults_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SNAPQUOTE_PLATFORM_AI_DEFAULTS", "not-json");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("ai_defaults_json")
            );
            ensure(has_message, "validation failure should mention ai_defaults_json")
        })();

        clear_vars(&["SNAPQUOTE_PLATFORM_AI_DEFAULTS"]);
        result
    }

    #[test]
    fn ai_defaults_parse_into_a_platform_patch() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var(
            "SNAPQUOTE_PLATFORM_AI_DEFAULTS",
            r#"{"models":{"estimator_model":"gpt-4o"},"guardrails":{"max_qa_questions":4}}"#,
        );

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let patch = config
                .platform
                .ai_defaults_patch()
                .map_err(|err| format!("seed patch failed: {err}"))?
                .ok_or("seed patch should be present")?;

            ensure(
                patch.models.as_ref().and_then(|m| m.estimator_model.as_deref())
                    == Some("gpt-4o"),
                "seed patch should carry the estimator model",
            )?;
            ensure(
                patch.guardrails.and_then(|g| g.max_qa_questions) == Some(4),
                "seed patch should carry the question cap",
            )?;
            Ok(())
        })();

        clear_vars(&["SNAPQUOTE_PLATFORM_AI_DEFAULTS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SNAPQUOTE_PLATFORM_OPENAI_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("sk-secret-value"),
                "debug output should not contain the platform key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["SNAPQUOTE_PLATFORM_OPENAI_API_KEY"]);
        result
    }
}
