use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// LIMIT injected on the outermost query when none is written
    #[validate(range(
        min = 1,
        max = 1000000,
        message = "Default limit must be between 1 and 1000000"
    ))]
    pub default_limit: u64,

    /// Maximum SELECT nesting depth
    #[validate(range(
        min = 1,
        max = 32,
        message = "Max query depth must be between 1 and 32"
    ))]
    pub max_query_depth: usize,

    /// Whether person columns are read off the events row instead of
    /// joining through the person tables
    pub person_on_events: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_query_depth: 5,
            person_on_events: false,
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            default_limit: parse_env_var("AQLC_DEFAULT_LIMIT", "100")?,
            max_query_depth: parse_env_var("AQLC_MAX_QUERY_DEPTH", "5")?,
            person_on_events: parse_env_var("AQLC_PERSON_ON_EVENTS", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

fn parse_env_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value.parse::<T>().map_err(|e| ConfigError::Parse {
        field: name.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(CompilerConfig::default().validated().is_ok());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let config = CompilerConfig {
            default_limit: 0,
            ..Default::default()
        };
        assert!(config.validated().is_err());
    }
}
