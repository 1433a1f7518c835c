//! Generation settings.
//!
//! Settings can be built in code or read from TOML:
//!
//! ```toml
//! bound = 6
//! max_time_secs = 30.0
//! threads = 4
//! mode = "reactions"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which transitions drive exploration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Rules are matched against states directly.
    #[default]
    Direct,
    /// Rules are first expanded into ground reactions.
    Reactions,
}

/// Limits and scaling of state-space generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Per-complex count bound; computed from the model when absent.
    pub bound: Option<u32>,
    /// Wall-clock budget in seconds.
    pub max_time_secs: Option<f64>,
    /// Stop once more than this many states are known.
    pub max_size: Option<usize>,
    /// Maximum number of worker threads.
    pub threads: usize,
    /// Frontier states per active worker when scaling.
    pub states_per_worker: usize,
    /// How often the controller re-evaluates limits and scaling.
    pub poll_interval_ms: u64,
    pub mode: GenerationMode,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            bound: None,
            max_time_secs: None,
            max_size: None,
            threads: num_cpus::get().max(1),
            states_per_worker: 50,
            poll_interval_ms: 20,
            mode: GenerationMode::Direct,
        }
    }
}

impl GenerationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        if self.states_per_worker == 0 {
            return Err(ConfigError::Invalid("states_per_worker must be at least 1".into()));
        }
        if let Some(secs) = self.max_time_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Invalid(format!("max_time_secs {secs} is not a duration")));
            }
        }
        Ok(())
    }

    pub fn with_bound(mut self, bound: u32) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn with_max_time(mut self, limit: Duration) -> Self {
        self.max_time_secs = Some(limit.as_secs_f64());
        self
    }

    pub fn with_max_size(mut self, states: usize) -> Self {
        self.max_size = Some(states);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_secs.map(Duration::from_secs_f64)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Workers worth running for a frontier of the given size.
    pub fn desired_workers(&self, frontier: usize) -> usize {
        let wanted = (frontier as f64 / self.states_per_worker as f64 - 0.5).ceil();
        (wanted.max(1.0) as usize).clamp(1, self.threads.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_with_defaults() {
        let config = GenerationConfig::from_toml_str(
            r#"
            bound = 4
            max_time_secs = 1.5
            threads = 3
            mode = "reactions"
            "#,
        )
        .unwrap();
        assert_eq!(config.bound, Some(4));
        assert_eq!(config.max_time(), Some(Duration::from_millis(1500)));
        assert_eq!(config.threads, 3);
        assert_eq!(config.mode, GenerationMode::Reactions);
        assert_eq!(config.states_per_worker, 50);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            GenerationConfig::from_toml_str("threads = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GenerationConfig::from_toml_str("colour = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn scaling_follows_the_frontier() {
        let config = GenerationConfig::default().with_threads(4);
        assert_eq!(config.desired_workers(0), 1);
        assert_eq!(config.desired_workers(60), 1);
        assert_eq!(config.desired_workers(80), 2);
        assert_eq!(config.desired_workers(10_000), 4);
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.toml");
        std::fs::write(&path, "max_size = 100\n").unwrap();
        let config = GenerationConfig::from_file(&path).unwrap();
        assert_eq!(config.max_size, Some(100));
    }
}
