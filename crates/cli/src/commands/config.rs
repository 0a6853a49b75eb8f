use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use permbot_core::config::{AppConfig, LoadOptions, LogFormat};
use secrecy::ExposeSecret;
use toml::Value;

use super::CommandResult;

struct ConfigLine {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    CommandResult::output(render(&config, detect_config_path().as_deref()))
}

/// Lists every effective setting with where it came from. Secrets are redacted.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    for line in config_lines(config) {
        let source =
            field_source(line.key, line.env_keys, config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(line.key, &line.value, source));
    }
    lines.join("\n")
}

fn config_lines(config: &AppConfig) -> Vec<ConfigLine> {
    let admin_users = if config.permissions.admin_users.is_empty() {
        "<none>".to_string()
    } else {
        config.permissions.admin_users.join(", ")
    };
    let log_format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    vec![
        ConfigLine {
            key: "slack.bot_token",
            value: redact_token(config.slack.bot_token.expose_secret()),
            env_keys: &["PERMBOT_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        },
        ConfigLine {
            key: "slack.signing_secret",
            value: redact_token(config.slack.signing_secret.expose_secret()),
            env_keys: &["PERMBOT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"],
        },
        ConfigLine {
            key: "slack.app_token",
            value: redact_token(config.slack.app_token.expose_secret()),
            env_keys: &["PERMBOT_SLACK_APP_TOKEN", "SLACK_APP_TOKEN"],
        },
        ConfigLine {
            key: "server.transport",
            value: config.server.transport.as_str().to_string(),
            env_keys: &["PERMBOT_SERVER_TRANSPORT"],
        },
        ConfigLine {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["PERMBOT_SERVER_BIND_ADDRESS"],
        },
        ConfigLine {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["PERMBOT_SERVER_PORT"],
        },
        ConfigLine {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["PERMBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        ConfigLine {
            key: "permissions.admin_users",
            value: admin_users,
            env_keys: &["PERMBOT_PERMISSIONS_ADMIN_USERS"],
        },
        ConfigLine {
            key: "permissions.strict_mode",
            value: config.permissions.strict_mode.to_string(),
            env_keys: &["PERMBOT_PERMISSIONS_STRICT_MODE"],
        },
        ConfigLine {
            key: "rate_limit.max_requests",
            value: config.rate_limit.max_requests.to_string(),
            env_keys: &["PERMBOT_RATE_LIMIT_MAX_REQUESTS"],
        },
        ConfigLine {
            key: "rate_limit.window_secs",
            value: config.rate_limit.window_secs.to_string(),
            env_keys: &["PERMBOT_RATE_LIMIT_WINDOW_SECS"],
        },
        ConfigLine {
            key: "commands.deploy_step_delay_ms",
            value: config.commands.deploy_step_delay_ms.to_string(),
            env_keys: &["PERMBOT_COMMANDS_DEPLOY_STEP_DELAY_MS"],
        },
        ConfigLine {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PERMBOT_LOGGING_LEVEL", "PERMBOT_LOG_LEVEL"],
        },
        ConfigLine {
            key: "logging.format",
            value: log_format.to_string(),
            env_keys: &["PERMBOT_LOGGING_FORMAT", "PERMBOT_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("permbot.toml"), PathBuf::from("config/permbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env_key = env_keys
        .iter()
        .find(|env_key| env::var(env_key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = set_env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
