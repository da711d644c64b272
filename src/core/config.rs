/*!
 * Lifecycle Configuration
 *
 * Runtime configuration for the scheduler port and the lifecycle layer
 */

use super::errors::{OsalError, OsalResult};
use super::limits;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OsalConfig {
    /// Scheduler tick frequency
    pub tick_rate_hz: u32,
    /// Maximum number of live tasks before spawning fails
    pub max_tasks: usize,
    /// Number of priority levels
    pub max_priorities: u8,
    /// Floor applied to host thread stacks
    pub min_stack_bytes: usize,
    /// Priority for threads created without one
    pub default_priority: u8,
    /// Stack budget for threads created without one
    pub default_stack_size: usize,
    /// Name of the root process
    pub root_process_name: String,
}

impl Default for OsalConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: limits::DEFAULT_TICK_RATE_HZ,
            max_tasks: limits::DEFAULT_MAX_TASKS,
            max_priorities: limits::DEFAULT_MAX_PRIORITIES,
            min_stack_bytes: limits::MIN_HOST_STACK_BYTES,
            default_priority: limits::DEFAULT_THREAD_PRIORITY,
            default_stack_size: limits::DEFAULT_STACK_SIZE,
            root_process_name: limits::ROOT_PROCESS_NAME.to_string(),
        }
    }
}

impl OsalConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> OsalResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OsalError::invalid(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `OSAL_*` environment variables
    ///
    /// Environment variables:
    /// - OSAL_TICK_RATE_HZ
    /// - OSAL_MAX_TASKS
    /// - OSAL_MAX_PRIORITIES
    /// - OSAL_ROOT_PROCESS
    pub fn from_env() -> OsalResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("OSAL_TICK_RATE_HZ")? {
            config.tick_rate_hz = v;
        }
        if let Some(v) = env_parse("OSAL_MAX_TASKS")? {
            config.max_tasks = v;
        }
        if let Some(v) = env_parse("OSAL_MAX_PRIORITIES")? {
            config.max_priorities = v;
        }
        if let Ok(name) = std::env::var("OSAL_ROOT_PROCESS") {
            config.root_process_name = name;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    #[must_use]
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    #[must_use]
    pub fn with_root_process_name(mut self, name: impl Into<String>) -> Self {
        self.root_process_name = name.into();
        self
    }

    /// Reject configurations the scheduler port cannot honour
    pub fn validate(&self) -> OsalResult<()> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1_000_000 {
            return Err(OsalError::invalid("tick_rate_hz must be in 1..=1000000"));
        }
        if self.max_tasks == 0 {
            return Err(OsalError::invalid("max_tasks must be non-zero"));
        }
        if self.max_priorities == 0 {
            return Err(OsalError::invalid("max_priorities must be non-zero"));
        }
        if self.default_stack_size == 0 {
            return Err(OsalError::invalid("default_stack_size must be non-zero"));
        }
        if self.root_process_name.is_empty() {
            return Err(OsalError::invalid("root_process_name must not be empty"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> OsalResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OsalError::invalid(format!("{} is not a valid value: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(OsalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = OsalConfig::from_json(r#"{"tick_rate_hz": 100, "max_tasks": 8}"#).unwrap();
        assert_eq!(config.tick_rate_hz, 100);
        assert_eq!(config.max_tasks, 8);
        assert_eq!(config.root_process_name, "system");
    }

    #[test]
    fn test_from_json_rejects_zero_tick_rate() {
        let err = OsalConfig::from_json(r#"{"tick_rate_hz": 0}"#).unwrap_err();
        assert!(matches!(err, OsalError::InvalidArgument(_)));
    }

    #[test]
    fn test_builder_methods() {
        let config = OsalConfig::default()
            .with_tick_rate(250)
            .with_max_tasks(4)
            .with_root_process_name("init");
        assert_eq!(config.tick_rate_hz, 250);
        assert_eq!(config.max_tasks, 4);
        assert_eq!(config.root_process_name, "init");
    }
}
