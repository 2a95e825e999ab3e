//! `ResolvedConfig` — the typed, fully-merged configuration (Design Notes).

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub language: Language,
    pub provider: Provider,
    pub permission_mode: PermissionMode,
    pub session: SessionDirective,
    pub branch_name_strategy: BranchNameStrategy,
    pub interactive_mode: InteractiveMode,
    pub concurrency: u32,
    pub task_poll_interval_ms: u64,
    pub use_builtin_pieces: bool,

    /// Whether the Rule Evaluator's AI-judge step (spec.md §4.4 step 4) may
    /// fire when tag/aggregate/textual matching all fail. See
    /// `AgentConfig::ai_judge_enabled`.
    pub ai_judge_enabled: bool,
}

impl ResolvedConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            language: config.agent.language.parse().map_err(|_| {
                ConfigError::InvalidEnvValue("agent.language".to_string(), config.agent.language.clone(), "Language")
            })?,
            provider: config.agent.provider.parse().map_err(|_| {
                ConfigError::InvalidEnvValue("agent.provider".to_string(), config.agent.provider.clone(), "Provider")
            })?,
            permission_mode: PermissionMode::Readonly,
            session: SessionDirective::Continue,
            branch_name_strategy: BranchNameStrategy::Romaji,
            interactive_mode: config.interactive.mode.parse().map_err(|_| {
                ConfigError::InvalidEnvValue(
                    "interactive.mode".to_string(),
                    config.interactive.mode.clone(),
                    "InteractiveMode",
                )
            })?,
            concurrency: config.supervisor.concurrency.clamp(1, 10),
            task_poll_interval_ms: config.supervisor.task_poll_interval_ms.clamp(100, 5000),
            use_builtin_pieces: config.loader.use_builtin,
            ai_judge_enabled: config.agent.ai_judge_enabled,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ja,
}

impl std::str::FromStr for Language {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ja" => Ok(Self::Ja),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Claude,
    Codex,
    Opencode,
    Mock,
}

impl std::str::FromStr for Provider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            "opencode" => Ok(Self::Opencode),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

pub use crate::domain::PermissionMode;

/// `session ∈ {continue, refresh}` — the same enum the Movement type uses.
pub type SessionDirective = crate::domain::SessionDirective;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BranchNameStrategy {
    #[default]
    Romaji,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InteractiveMode {
    #[default]
    Prompt,
    Auto,
    Off,
}

impl std::str::FromStr for InteractiveMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "auto" => Ok(Self::Auto),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown interactive mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_defaults() {
        let config = Config::default();
        let resolved = ResolvedConfig::from_config(&config).unwrap();
        assert_eq!(resolved.provider, Provider::Claude);
        assert_eq!(resolved.language, Language::En);
        assert_eq!(resolved.concurrency, 3);
    }

    #[test]
    fn concurrency_clamped_to_valid_range() {
        let mut config = Config::default();
        config.supervisor.concurrency = 50;
        let resolved = ResolvedConfig::from_config(&config).unwrap();
        assert_eq!(resolved.concurrency, 10);
    }

    #[test]
    fn ai_judge_is_off_by_default() {
        let resolved = ResolvedConfig::from_config(&Config::default()).unwrap();
        assert!(!resolved.ai_judge_enabled);
    }

    #[test]
    fn ai_judge_toggle_carries_through_from_config() {
        let mut config = Config::default();
        config.agent.ai_judge_enabled = true;
        let resolved = ResolvedConfig::from_config(&config).unwrap();
        assert!(resolved.ai_judge_enabled);
    }
}
