//! Event loop configuration.
//!
//! # Example
//! ```rust,ignore
//! use pledge_loop::{EventLoop, LoopConfig};
//!
//! // From environment
//! let config = LoopConfig::from_env()?;
//!
//! // Or explicit configuration
//! let config = LoopConfig {
//!     max_microtasks_per_drain: 10_000,
//!     ..Default::default()
//! };
//!
//! let event_loop = EventLoop::new(config);
//! ```

use crate::error::LoopError;

/// Environment variable holding the loop name
pub const ENV_LOOP_NAME: &str = "PLEDGE_LOOP_NAME";

/// Environment variable holding the microtask budget
pub const ENV_MAX_MICROTASKS: &str = "PLEDGE_MAX_MICROTASKS";

/// Event loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Loop name, used in log fields
    pub name: String,
    /// Upper bound on microtasks run by a single drain before the loop
    /// reports `LoopError::MicrotaskBudgetExceeded`
    pub max_microtasks_per_drain: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            name: "pledge-loop".to_string(),
            max_microtasks_per_drain: 1_000_000,
        }
    }
}

impl LoopConfig {
    /// Create loop configuration from environment variables.
    ///
    /// Reads `PLEDGE_LOOP_NAME` and `PLEDGE_MAX_MICROTASKS`; unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, LoopError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoopConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoopError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_LOOP_NAME) {
            config.name = name;
        }

        if let Some(raw) = lookup(ENV_MAX_MICROTASKS) {
            let budget = raw.trim().parse::<usize>().map_err(|e| {
                LoopError::Configuration(format!(
                    "{} must be a positive integer, got '{}': {}",
                    ENV_MAX_MICROTASKS, raw, e
                ))
            })?;
            config.max_microtasks_per_drain = budget;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive a loop
    pub fn validate(&self) -> Result<(), LoopError> {
        if self.max_microtasks_per_drain == 0 {
            return Err(LoopError::Configuration(
                "max_microtasks_per_drain must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = LoopConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoopConfig::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = LoopConfig::from_lookup(lookup(&[
            (ENV_LOOP_NAME, "ui"),
            (ENV_MAX_MICROTASKS, " 64 "),
        ]))
        .unwrap();

        assert_eq!(config.name, "ui");
        assert_eq!(config.max_microtasks_per_drain, 64);
    }

    #[test]
    fn test_rejects_bad_budget() {
        let err = LoopConfig::from_lookup(lookup(&[(ENV_MAX_MICROTASKS, "lots")])).unwrap_err();
        assert!(matches!(err, LoopError::Configuration(_)));

        let err = LoopConfig::from_lookup(lookup(&[(ENV_MAX_MICROTASKS, "0")])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }
}
