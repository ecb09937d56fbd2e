//! Scheduler configuration
//!
//! # Example
//! ```rust
//! use pledge_tasks::SchedulerConfig;
//!
//! // From environment
//! let config = SchedulerConfig::from_env().unwrap_or_default();
//!
//! // Or explicit configuration
//! let config = SchedulerConfig {
//!     name: "uploads".to_string(),
//!     limit: 4,
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::SchedulerError;

/// Environment variable holding the scheduler name
pub const ENV_SCHEDULER_NAME: &str = "PLEDGE_SCHEDULER_NAME";

/// Environment variable holding the concurrency ceiling
pub const ENV_SCHEDULER_LIMIT: &str = "PLEDGE_SCHEDULER_LIMIT";

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Scheduler name, used in log fields
    pub name: String,
    /// Maximum tasks running at once
    pub limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "scheduler".to_string(),
            limit: 2,
        }
    }
}

impl SchedulerConfig {
    /// Create scheduler configuration from environment variables.
    ///
    /// Reads `PLEDGE_SCHEDULER_NAME` and `PLEDGE_SCHEDULER_LIMIT`; unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, SchedulerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SchedulerConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_SCHEDULER_NAME) {
            config.name = name;
        }
        if let Some(limit) = lookup(ENV_SCHEDULER_LIMIT) {
            config.limit = limit.trim().parse().map_err(|e| {
                SchedulerError::Configuration(format!(
                    "{}: invalid limit '{}': {}",
                    ENV_SCHEDULER_LIMIT, limit, e
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the concurrency ceiling
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.limit == 0 {
            return Err(SchedulerError::Configuration(
                "limit must be at least 1".to_string(),
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
    fn test_scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.name, "scheduler");
        assert_eq!(config.limit, 2);
        assert_eq!(SchedulerConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn test_scheduler_config_from_lookup() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            (ENV_SCHEDULER_NAME, "uploads"),
            (ENV_SCHEDULER_LIMIT, " 8 "),
        ]))
        .unwrap();
        assert_eq!(config.name, "uploads");
        assert_eq!(config.limit, 8);
    }

    #[test]
    fn test_scheduler_config_rejects_bad_limits() {
        for bad in ["0", "-1", "two"] {
            let result = SchedulerConfig::from_lookup(lookup(&[(ENV_SCHEDULER_LIMIT, bad)]));
            assert!(
                matches!(result, Err(SchedulerError::Configuration(_))),
                "limit {:?} accepted",
                bad
            );
        }
    }
}
