//! `TAKT_<SECTION>_<KEY>` environment-variable overrides.
//!
//! Section names are single tokens (`agent`, `supervisor`, `loader`,
//! `interactive`, `storage`) so the grammar never has to guess where the
//! section name ends and the key begins. `TAKT_CONFIG_DIR` and
//! `TAKT_NO_TTY` are handled outside this grammar (§6) since they have no
//! corresponding dotted config key.

use std::env;

use tracing::debug;

use super::{Config, ConfigError};

const PREFIX: &str = "TAKT_";

pub fn apply_overrides(config: &mut Config) -> Result<(), ConfigError> {
    for (name, value) in env::vars() {
        if name == "TAKT_CONFIG_DIR" || name == "TAKT_NO_TTY" {
            continue;
        }
        let Some(rest) = name.strip_prefix(PREFIX) else {
            continue;
        };
        apply_one(config, &name, rest, &value)?;
    }

    if let Ok(no_tty) = env::var("TAKT_NO_TTY") {
        config.interactive.no_tty = no_tty == "1";
    }

    Ok(())
}

fn apply_one(config: &mut Config, full_name: &str, rest: &str, value: &str) -> Result<(), ConfigError> {
    let lower = rest.to_lowercase();
    let (section, key) = lower
        .split_once('_')
        .ok_or_else(|| ConfigError::UnknownEnvKey(full_name.to_string()))?;

    debug!(full_name, section, key, "apply_one: applying env override");

    match section {
        "agent" => match key {
            "provider" => config.agent.provider = value.to_string(),
            "model" => config.agent.model = value.to_string(),
            "language" => config.agent.language = value.to_string(),
            "ai_judge_enabled" => config.agent.ai_judge_enabled = parse_env(full_name, value, "bool")?,
            _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
        },
        "supervisor" => match key {
            "concurrency" => config.supervisor.concurrency = parse_env(full_name, value, "u32")?,
            "task_poll_interval_ms" => config.supervisor.task_poll_interval_ms = parse_env(full_name, value, "u64")?,
            _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
        },
        "loader" => match key {
            "use_builtin" => config.loader.use_builtin = parse_env(full_name, value, "bool")?,
            "repertoire_dir" => config.loader.repertoire_dir = value.into(),
            _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
        },
        "interactive" => match key {
            "mode" => config.interactive.mode = value.to_string(),
            _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
        },
        "storage" => match key {
            "takt_dir" => config.storage.takt_dir = value.into(),
            _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
        },
        _ => return Err(ConfigError::UnknownEnvKey(full_name.to_string())),
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(full_name: &str, value: &str, type_name: &'static str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue(full_name.to_string(), value.to_string(), type_name))
}
