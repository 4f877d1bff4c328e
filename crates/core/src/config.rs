use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["leaveform.toml", "config/leaveform.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub form_channel_id: String,
    pub announce_channel_id: String,
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
    pub discord_token: Option<String>,
    pub form_channel_id: Option<String>,
    pub announce_channel_id: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

/// Environment keys in lookup order. The unprefixed names are accepted for
/// deployments that predate the `LEAVEFORM_` prefix.
pub const TOKEN_ENV_KEYS: [&str; 2] = ["LEAVEFORM_DISCORD_TOKEN", "DISCORD_TOKEN"];
pub const FORM_CHANNEL_ENV_KEYS: [&str; 2] = ["LEAVEFORM_FORM_CHANNEL_ID", "FORM_CHANNEL_ID"];
pub const ANNOUNCE_CHANNEL_ENV_KEYS: [&str; 2] =
    ["LEAVEFORM_ANNOUNCE_CHANNEL_ID", "ANNOUNCE_CHANNEL_ID"];
pub const LOG_LEVEL_ENV_KEYS: [&str; 2] = ["LEAVEFORM_LOGGING_LEVEL", "LEAVEFORM_LOG_LEVEL"];
pub const LOG_FORMAT_ENV_KEYS: [&str; 2] = ["LEAVEFORM_LOGGING_FORMAT", "LEAVEFORM_LOG_FORMAT"];

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
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new().into(),
                form_channel_id: String::new(),
                announce_channel_id: String::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Parsed form channel snowflake. Only meaningful after [`AppConfig::validate`].
    pub fn form_channel(&self) -> u64 {
        parse_snowflake(&self.discord.form_channel_id).unwrap_or_default()
    }

    pub fn announce_channel(&self) -> u64 {
        parse_snowflake(&self.discord.announce_channel_id).unwrap_or_default()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(token) = discord.token {
                self.discord.token = token.into();
            }
            if let Some(form_channel_id) = discord.form_channel_id {
                self.discord.form_channel_id = form_channel_id;
            }
            if let Some(announce_channel_id) = discord.announce_channel_id {
                self.discord.announce_channel_id = announce_channel_id;
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
        if let Some(value) = read_env_any(&TOKEN_ENV_KEYS) {
            self.discord.token = value.into();
        }
        if let Some(value) = read_env_any(&FORM_CHANNEL_ENV_KEYS) {
            self.discord.form_channel_id = value;
        }
        if let Some(value) = read_env_any(&ANNOUNCE_CHANNEL_ENV_KEYS) {
            self.discord.announce_channel_id = value;
        }

        if let Some(value) = read_env_any(&LOG_LEVEL_ENV_KEYS) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&LOG_FORMAT_ENV_KEYS) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.discord_token {
            self.discord.token = token.into();
        }
        if let Some(form_channel_id) = overrides.form_channel_id {
            self.discord.form_channel_id = form_channel_id;
        }
        if let Some(announce_channel_id) = overrides.announce_channel_id {
            self.discord.announce_channel_id = announce_channel_id;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
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

pub fn parse_snowflake(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }

    validate_channel_id("discord.form_channel_id", &discord.form_channel_id)?;
    validate_channel_id("discord.announce_channel_id", &discord.announce_channel_id)?;

    Ok(())
}

fn validate_channel_id(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{key} is required (right-click the channel with developer mode on > Copy Channel ID)"
        )));
    }
    if parse_snowflake(value).is_none() {
        return Err(ConfigError::Validation(format!(
            "{key} must be a numeric channel id, got `{value}`"
        )));
    }
    Ok(())
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

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    form_channel_id: Option<String>,
    announce_channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_KEYS: [&str; 10] = [
        "LEAVEFORM_DISCORD_TOKEN",
        "DISCORD_TOKEN",
        "LEAVEFORM_FORM_CHANNEL_ID",
        "FORM_CHANNEL_ID",
        "LEAVEFORM_ANNOUNCE_CHANNEL_ID",
        "ANNOUNCE_CHANNEL_ID",
        "LEAVEFORM_LOGGING_LEVEL",
        "LEAVEFORM_LOG_LEVEL",
        "LEAVEFORM_LOGGING_FORMAT",
        "LEAVEFORM_LOG_FORMAT",
    ];

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

    fn valid_env() {
        env::set_var("LEAVEFORM_DISCORD_TOKEN", "MTA.token.value");
        env::set_var("LEAVEFORM_FORM_CHANNEL_ID", "1000");
        env::set_var("LEAVEFORM_ANNOUNCE_CHANNEL_ID", "2000");
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        env::set_var("TEST_LEAVEFORM_TOKEN", "MTA.from.env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leaveform.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "${TEST_LEAVEFORM_TOKEN}"
form_channel_id = "111"
announce_channel_id = "222"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "MTA.from.env",
                "token should be interpolated from environment",
            )?;
            ensure(config.form_channel() == 111, "form channel should come from file")?;
            ensure(config.announce_channel() == 222, "announce channel should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_LEAVEFORM_TOKEN"]);
        result
    }

    #[test]
    fn legacy_unprefixed_env_keys_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        env::set_var("DISCORD_TOKEN", "MTA.legacy.token");
        env::set_var("FORM_CHANNEL_ID", "333");
        env::set_var("ANNOUNCE_CHANNEL_ID", "444");
        env::set_var("LEAVEFORM_LOG_LEVEL", "warn");
        env::set_var("LEAVEFORM_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "MTA.legacy.token",
                "legacy token key should be honored",
            )?;
            ensure(config.form_channel() == 333, "legacy form channel key should be honored")?;
            ensure(
                config.announce_channel() == 444,
                "legacy announce channel key should be honored",
            )?;
            ensure(config.logging.level == "warn", "log level alias should be honored")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "log format alias should be honored",
            )?;
            Ok(())
        })();

        clear_vars(&ALL_KEYS);
        result
    }

    #[test]
    fn prefixed_env_key_wins_over_legacy_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        valid_env();
        env::set_var("FORM_CHANNEL_ID", "9999");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.form_channel() == 1000, "prefixed key should win")
        })();

        clear_vars(&ALL_KEYS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        env::set_var("LEAVEFORM_DISCORD_TOKEN", "MTA.from.env");
        env::set_var("LEAVEFORM_FORM_CHANNEL_ID", "555");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leaveform.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "MTA.from.file"
form_channel_id = "111"
announce_channel_id = "222"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    announce_channel_id: Some("777".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.announce_channel() == 777, "override announce channel should win")?;
            ensure(config.form_channel() == 555, "env form channel should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.discord.token.expose_secret() == "MTA.from.env",
                "env token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&ALL_KEYS);
        result
    }

    #[test]
    fn missing_channel_id_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        env::set_var("LEAVEFORM_DISCORD_TOKEN", "MTA.token.value");
        env::set_var("LEAVEFORM_FORM_CHANNEL_ID", "1000");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("discord.announce_channel_id")
            );
            ensure(has_message, "validation failure should mention discord.announce_channel_id")
        })();

        clear_vars(&ALL_KEYS);
        result
    }

    #[test]
    fn non_numeric_channel_id_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        valid_env();
        env::set_var("LEAVEFORM_FORM_CHANNEL_ID", "#general");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected non-numeric channel id to fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.contains("discord.form_channel_id") && message.contains("numeric")
                ),
                "validation failure should explain the numeric requirement",
            )
        })();

        clear_vars(&ALL_KEYS);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_KEYS);

        valid_env();
        env::set_var("LEAVEFORM_DISCORD_TOKEN", "MTA.super-secret.value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("MTA.super-secret.value"),
                "debug output should not contain the bot token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&ALL_KEYS);
        result
    }
}
