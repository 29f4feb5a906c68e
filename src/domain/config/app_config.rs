//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::recording::{SessionConstraints, DEFAULT_BIT_RATE, DEFAULT_SAMPLE_RATE};

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<u32>,
    pub duration: Option<String>,
    pub output: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            bit_rate: Some(DEFAULT_BIT_RATE),
            duration: Some("10s".to_string()),
            output: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            sample_rate: other.sample_rate.or(self.sample_rate),
            bit_rate: other.bit_rate.or(self.bit_rate),
            duration: other.duration.or(self.duration),
            output: other.output.or(self.output),
        }
    }

    pub fn sample_rate_or_default(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn bit_rate_or_default(&self) -> u32 {
        self.bit_rate.unwrap_or(DEFAULT_BIT_RATE)
    }

    /// Build session constraints from the configured rates, falling back
    /// to defaults for invalid values.
    pub fn constraints_or_default(&self) -> SessionConstraints {
        SessionConstraints::new(self.sample_rate_or_default(), self.bit_rate_or_default())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_all_rates() {
        let config = AppConfig::defaults();
        assert_eq!(config.sample_rate, Some(48_000));
        assert_eq!(config.bit_rate, Some(128_000));
        assert_eq!(config.duration, Some("10s".to_string()));
    }

    #[test]
    fn empty_has_no_values() {
        let config = AppConfig::empty();
        assert!(config.sample_rate.is_none());
        assert!(config.bit_rate.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            sample_rate: Some(48_000),
            bit_rate: Some(128_000),
            duration: Some("10s".to_string()),
            output: None,
        };
        let other = AppConfig {
            sample_rate: Some(16_000),
            bit_rate: None,
            duration: None,
            output: Some("take.ogg".to_string()),
        };

        let merged = base.merge(other);
        assert_eq!(merged.sample_rate, Some(16_000));
        assert_eq!(merged.bit_rate, Some(128_000));
        assert_eq!(merged.duration, Some("10s".to_string()));
        assert_eq!(merged.output, Some("take.ogg".to_string()));
    }

    #[test]
    fn constraints_from_config() {
        let config = AppConfig {
            sample_rate: Some(16_000),
            bit_rate: Some(24_000),
            ..Default::default()
        };
        let constraints = config.constraints_or_default();
        assert_eq!(constraints.sample_rate(), 16_000);
        assert_eq!(constraints.bit_rate(), 24_000);
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let config = AppConfig {
            sample_rate: Some(0),
            ..Default::default()
        };
        let constraints = config.constraints_or_default();
        assert_eq!(constraints.sample_rate(), DEFAULT_SAMPLE_RATE);
    }
}
