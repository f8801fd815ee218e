//! Ranker configuration.
//!
//! Loaded from JSON (`{"gap": 10, "targetPolicy": "strict"}`) or from the
//! environment:
//! - `ACADEMY_RANK_GAP`: spacing used at the ends of a list.
//! - `ACADEMY_STRICT_TARGET`: `1`/`true` rejects placements after unknown ids.
//!
//! Missing or unparsable environment values fall back to the defaults with
//! a log line.

use std::env;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::order::GAP;
use crate::order::TargetPolicy;

pub const GAP_VAR: &str = "ACADEMY_RANK_GAP";
pub const STRICT_TARGET_VAR: &str = "ACADEMY_STRICT_TARGET";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed ranker config: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("gap must be a positive finite number, got {0}")]
    InvalidGap(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankerConfig {
    pub gap: f64,
    pub target_policy: TargetPolicy,
}

impl Default for RankerConfig {
    fn default() -> Self {
        return RankerConfig {
            gap: GAP,
            target_policy: TargetPolicy::FallbackToEnd,
        };
    }
}

impl RankerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gap.is_finite() || self.gap <= 0.0 {
            return Err(ConfigError::InvalidGap(self.gap));
        }
        return Ok(());
    }

    /// Parse and validate a JSON config. Absent keys take their defaults.
    pub fn from_json(text: &str) -> Result<RankerConfig, ConfigError> {
        let config: RankerConfig = serde_json::from_str(text)?;
        config.validate()?;
        return Ok(config);
    }

    /// Read the config from process environment variables.
    pub fn from_env() -> RankerConfig {
        return RankerConfig::from_lookup(|key| env::var(key).ok());
    }

    /// Read the config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RankerConfig {
        let mut config = RankerConfig::default();

        match lookup(GAP_VAR) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(gap) if gap.is_finite() && gap > 0.0 => config.gap = gap,
                _ => warn!("Invalid {GAP_VAR} value {raw:?}, using default: {GAP}"),
            },
            None => info!("{GAP_VAR} not set, using default: {GAP}"),
        }

        if let Some(raw) = lookup(STRICT_TARGET_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.target_policy = TargetPolicy::Strict,
                "0" | "false" | "no" | "" => {}
                _ => warn!("Invalid {STRICT_TARGET_VAR} value {raw:?}, keeping fallback to end"),
            }
        }

        return config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        return move |key| map.get(key).cloned();
    }

    #[test]
    fn json_defaults_missing_keys() {
        let config = RankerConfig::from_json("{}").unwrap();
        assert_eq!(config, RankerConfig::default());

        let config = RankerConfig::from_json(r#"{"gap": 100, "targetPolicy": "strict"}"#).unwrap();
        assert_eq!(config.gap, 100.0);
        assert_eq!(config.target_policy, TargetPolicy::Strict);
    }

    #[test]
    fn json_rejects_bad_gap() {
        assert!(matches!(RankerConfig::from_json(r#"{"gap": 0}"#), Err(ConfigError::InvalidGap(_))));
        assert!(matches!(RankerConfig::from_json(r#"{"gap": "ten"}"#), Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn env_values_are_read() {
        let config = RankerConfig::from_lookup(lookup(&[(GAP_VAR, "1024"), (STRICT_TARGET_VAR, "true")]));
        assert_eq!(config.gap, 1024.0);
        assert_eq!(config.target_policy, TargetPolicy::Strict);
    }

    #[test]
    fn env_falls_back_on_garbage() {
        let config = RankerConfig::from_lookup(lookup(&[(GAP_VAR, "-5"), (STRICT_TARGET_VAR, "maybe")]));
        assert_eq!(config, RankerConfig::default());
    }
}
