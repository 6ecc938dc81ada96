use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{ListFilter, NavigatorConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("config validation error: {message}")]
    Validation { message: String },
}

/// Load and validate a `NavigatorConfig` from a TOML file path.
///
/// Returns the default config if the file does not exist.
pub fn load_config(path: &Path) -> Result<NavigatorConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(NavigatorConfig::default());
    }

    let data = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_config(&data)
}

/// Parse and validate a `NavigatorConfig` from a TOML string.
pub fn parse_config(data: &str) -> Result<NavigatorConfig, ConfigError> {
    let config: NavigatorConfig = toml::from_str(data)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &NavigatorConfig) -> Result<(), ConfigError> {
    for (workflow_type, emoji) in &config.workflow_emoji {
        if emoji.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("workflow_emoji entry for '{workflow_type}' must not be empty"),
            });
        }
    }
    Ok(())
}
