use thiserror::Error;

/// Malformed env/config/YAML. Fatal at load; reported with file and path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, String),

    #[error("failed to parse config file {0}: {1}")]
    Yaml(String, String),

    #[error("environment variable {0} has value {1:?} which does not parse as {2}")]
    InvalidEnvValue(String, String, &'static str),

    #[error("unknown config key in environment variable {0}")]
    UnknownEnvKey(String),
}
