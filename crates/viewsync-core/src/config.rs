use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove the whole subtree.
    #[default]
    Cascade,
    /// Remove only the node; its children become parentless roots.
    Orphan,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub log_level: String,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub scale: f32,
    pub queue_capacity: usize,
    pub delete_policy: DeletePolicy,
    pub default_font_size: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            viewport_width: 390.0,
            viewport_height: 844.0,
            scale: 3.0,
            queue_capacity: 256,
            delete_policy: DeletePolicy::Cascade,
            default_font_size: 14.0,
        }
    }
}

impl BridgeConfig {
    /// Parses and validates. Blank input yields the defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(BridgeError::InvalidPayload(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        if self.queue_capacity == 0 {
            return Err(BridgeError::InvalidPayload(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.viewport_width) || !positive(self.viewport_height) {
            return Err(BridgeError::InvalidPayload(
                "viewport dimensions must be positive".into(),
            ));
        }
        if !positive(self.scale) {
            return Err(BridgeError::InvalidPayload("scale must be positive".into()));
        }
        if !positive(self.default_font_size) {
            return Err(BridgeError::InvalidPayload(
                "default_font_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_config_is_default() {
        assert_eq!(BridgeConfig::from_json("  ").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config =
            BridgeConfig::from_json(r#"{"delete_policy":"orphan","viewport_width":800}"#).unwrap();
        assert_eq!(config.delete_policy, DeletePolicy::Orphan);
        assert_eq!(config.viewport_width, 800.0);
        assert_eq!(config.viewport_height, 844.0);
    }

    #[test]
    fn test_unknown_fields_and_bad_values_rejected() {
        assert!(BridgeConfig::from_json(r#"{"viewport":1}"#).is_err());
        assert!(BridgeConfig::from_json(r#"{"queue_capacity":0}"#).is_err());
        assert!(BridgeConfig::from_json(r#"{"log_level":"loud"}"#).is_err());
        assert!(BridgeConfig::from_json(r#"{"scale":-1}"#).is_err());
    }
}
