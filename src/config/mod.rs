//! Config Resolver — layered configuration: defaults → global → project →
//! environment.

mod env;
mod error;
mod resolved;

pub use error::ConfigError;
pub use resolved::{BranchNameStrategy, InteractiveMode, Language, PermissionMode, Provider, ResolvedConfig, SessionDirective};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Raw, merged configuration before typed resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub supervisor: SupervisorConfig,
    pub loader: LoaderConfig,
    pub interactive: InteractiveConfig,
    pub storage: StorageConfig,
}

/// A config layer as read straight off disk: every field is `Option`, so
/// "absent from this file" and "present but equal to the default" are
/// distinguishable. Only fields actually written in the YAML ever override
/// a lower-precedence layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    agent: Option<RawAgentConfig>,
    supervisor: Option<RawSupervisorConfig>,
    loader: Option<RawLoaderConfig>,
    interactive: Option<RawInteractiveConfig>,
    storage: Option<RawStorageConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawAgentConfig {
    provider: Option<String>,
    model: Option<String>,
    language: Option<String>,
    ai_judge_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSupervisorConfig {
    concurrency: Option<u32>,
    task_poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawLoaderConfig {
    use_builtin: Option<bool>,
    repertoire_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawInteractiveConfig {
    mode: Option<String>,
    no_tty: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawStorageConfig {
    takt_dir: Option<PathBuf>,
}

impl Config {
    /// Load with the full cascade: defaults, then global file, then project
    /// file (each overlaid key-by-key on top of the previous layer, never
    /// replacing a whole section just because the file mentioned it), then
    /// environment overrides.
    pub fn load(explicit_path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        debug!(?explicit_path, "Config::load: called");

        let mut config = Self::default();

        if let Some(path) = explicit_path {
            config = config.overlay(Self::load_raw(path)?);
        } else {
            if let Some(global) = Self::global_config_path()
                && global.exists()
            {
                match Self::load_raw(&global) {
                    Ok(raw) => config = config.overlay(raw),
                    Err(e) => warn!(path = %global.display(), error = %e, "Config::load: failed to load global config, using defaults"),
                }
            }

            let project = Self::project_config_path();
            if project.exists() {
                match Self::load_raw(&project) {
                    Ok(raw) => config = config.overlay(raw),
                    Err(e) => warn!(path = %project.display(), error = %e, "Config::load: failed to load project config"),
                }
            }
        }

        env::apply_overrides(&mut config)?;

        info!("Config::load: resolved configuration");
        Ok(config)
    }

    fn load_raw<P: AsRef<Path>>(path: P) -> Result<RawConfig, ConfigError> {
        let content = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e.to_string()))?;
        let raw: RawConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Yaml(path.as_ref().display().to_string(), e.to_string()))?;
        info!(path = %path.as_ref().display(), "Config::load_raw: loaded");
        Ok(raw)
    }

    /// Overlay a layer on top of `self`: every key the layer's file actually
    /// set wins; every key it left out keeps `self`'s value. This is what
    /// lets a project config that only touches `supervisor.concurrency`
    /// leave the global config's `supervisor.task_poll_interval_ms` intact.
    fn overlay(self, raw: RawConfig) -> Self {
        Self {
            agent: match raw.agent {
                Some(a) => AgentConfig {
                    provider: a.provider.unwrap_or(self.agent.provider),
                    model: a.model.unwrap_or(self.agent.model),
                    language: a.language.unwrap_or(self.agent.language),
                    ai_judge_enabled: a.ai_judge_enabled.unwrap_or(self.agent.ai_judge_enabled),
                },
                None => self.agent,
            },
            supervisor: match raw.supervisor {
                Some(s) => SupervisorConfig {
                    concurrency: s.concurrency.unwrap_or(self.supervisor.concurrency),
                    task_poll_interval_ms: s.task_poll_interval_ms.unwrap_or(self.supervisor.task_poll_interval_ms),
                },
                None => self.supervisor,
            },
            loader: match raw.loader {
                Some(l) => LoaderConfig {
                    use_builtin: l.use_builtin.unwrap_or(self.loader.use_builtin),
                    repertoire_dir: l.repertoire_dir.unwrap_or(self.loader.repertoire_dir),
                },
                None => self.loader,
            },
            interactive: match raw.interactive {
                Some(i) => InteractiveConfig {
                    mode: i.mode.unwrap_or(self.interactive.mode),
                    no_tty: i.no_tty.unwrap_or(self.interactive.no_tty),
                },
                None => self.interactive,
            },
            storage: match raw.storage {
                Some(s) => StorageConfig {
                    takt_dir: s.takt_dir.unwrap_or(self.storage.takt_dir),
                },
                None => self.storage,
            },
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("TAKT_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.yml"));
        }
        dirs::config_dir().map(|d| d.join("takt").join("config.yml"))
    }

    fn project_config_path() -> PathBuf {
        PathBuf::from(".takt").join("config.yml")
    }

    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        resolved::ResolvedConfig::from_config(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    pub language: String,

    /// Gates the Rule Evaluator's AI-judge step (spec.md §4.4 step 4, Open
    /// Question (c)). Off by default: rule matching stays deterministic for
    /// identical `(movement, content, tag)` triples unless a piece author
    /// opts in.
    pub ai_judge_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: "default".to_string(),
            language: "en".to_string(),
            ai_judge_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub concurrency: u32,
    pub task_poll_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            task_poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub use_builtin: bool,
    pub repertoire_dir: PathBuf,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            repertoire_dir: PathBuf::from(".takt/repertoire"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractiveConfig {
    pub mode: String,
    pub no_tty: bool,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            mode: "prompt".to_string(),
            no_tty: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub takt_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            takt_dir: PathBuf::from(".takt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.agent.provider, "claude");
        assert_eq!(config.supervisor.concurrency, 3);
        assert!(config.loader.use_builtin);
    }

    #[test]
    fn deserialize_partial_config_uses_defaults() {
        let yaml = r#"
agent:
  model: claude-opus
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agent.model, "claude-opus");
        assert_eq!(config.agent.provider, "claude");
        assert_eq!(config.supervisor.concurrency, 3);
    }

    #[test]
    fn overlay_preserves_untouched_keys_in_the_same_section() {
        let base = Config {
            supervisor: SupervisorConfig {
                concurrency: 9,
                task_poll_interval_ms: 1000,
            },
            ..Config::default()
        };
        let raw: RawConfig = serde_yaml::from_str(
            r#"
supervisor:
  task_poll_interval_ms: 2500
"#,
        )
        .unwrap();

        let merged = base.overlay(raw);
        assert_eq!(merged.supervisor.concurrency, 9, "project layer never mentioned concurrency");
        assert_eq!(merged.supervisor.task_poll_interval_ms, 2500);
    }

    #[test]
    fn overlay_leaves_sections_absent_from_the_layer_untouched() {
        let base = Config {
            agent: AgentConfig {
                provider: "custom-provider".to_string(),
                ..AgentConfig::default()
            },
            ..Config::default()
        };
        let raw: RawConfig = serde_yaml::from_str(
            r#"
supervisor:
  concurrency: 5
"#,
        )
        .unwrap();

        let merged = base.overlay(raw);
        assert_eq!(merged.agent.provider, "custom-provider");
        assert_eq!(merged.supervisor.concurrency, 5);
    }
}
