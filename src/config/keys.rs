use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::DEFAULT_API_KEY_PREFIX;

/// API key issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct KeysConfig {
    /// Prefix prepended to generated keys.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

impl KeysConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() || self.prefix.len() > 16 {
            return Err(ConfigError::Validation(
                "keys.prefix must be between 1 and 16 characters".into(),
            ));
        }
        if !self
            .prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "keys.prefix '{}' may only contain ASCII letters, digits, '-' and '_'",
                self.prefix
            )));
        }
        Ok(())
    }
}

fn default_prefix() -> String {
    DEFAULT_API_KEY_PREFIX.to_string()
}
