use std::env;
use std::fs;
use std::path::Path;

use leaveform_core::config::{
    resolve_config_path, AppConfig, LoadOptions, ANNOUNCE_CHANNEL_ENV_KEYS, FORM_CHANNEL_ENV_KEYS,
    LOG_FORMAT_ENV_KEYS, LOG_LEVEL_ENV_KEYS, TOKEN_ENV_KEYS,
};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, CONFIG_FAILURE_EXIT_CODE};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                CONFIG_FAILURE_EXIT_CODE,
            )
        }
    };

    CommandResult::text(0, render(&config))
}

fn render(config: &AppConfig) -> String {
    let config_file_path = resolve_config_path(None);
    let source = FieldSources {
        doc: load_config_file_doc(config_file_path.as_deref()),
        path: config_file_path.as_deref(),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "discord.token",
        &redact_token(config.discord.token.expose_secret()),
        source.of("discord.token", &TOKEN_ENV_KEYS),
    ));
    lines.push(render_line(
        "discord.form_channel_id",
        &config.discord.form_channel_id,
        source.of("discord.form_channel_id", &FORM_CHANNEL_ENV_KEYS),
    ));
    lines.push(render_line(
        "discord.announce_channel_id",
        &config.discord.announce_channel_id,
        source.of("discord.announce_channel_id", &ANNOUNCE_CHANNEL_ENV_KEYS),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source.of("logging.level", &LOG_LEVEL_ENV_KEYS),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source.of("logging.format", &LOG_FORMAT_ENV_KEYS),
    ));

    lines.join("\n")
}

struct FieldSources<'a> {
    doc: Option<Value>,
    path: Option<&'a Path>,
}

impl FieldSources<'_> {
    fn of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn env_is_set(key: &str) -> bool {
    env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first token segment, which only encodes the bot's user id.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}
