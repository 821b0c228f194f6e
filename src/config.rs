//! Simulation-wide configuration.
//!
//! Model parameters are not read here; each model takes its own parameter
//! struct at construction.

use crate::error::ConfigError;

/// Environment variable overriding [`SimConfig::cycles`].
pub const ENV_CYCLES: &str = "PRACSIM_CYCLES";
/// Environment variable overriding [`SimConfig::default_block_size`].
pub const ENV_BLOCK_SIZE: &str = "PRACSIM_BLOCK_SIZE";
/// Environment variable overriding [`SimConfig::progress_interval`].
pub const ENV_PROGRESS_INTERVAL: &str = "PRACSIM_PROGRESS_INTERVAL";

/// Settings shared by the whole simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Cycles executed by [`Simulation::run_configured`](crate::rt::Simulation::run_configured)
    pub cycles: u64,
    /// Block size for source outputs that are not anchored (None = anchors required)
    pub default_block_size: Option<usize>,
    /// Sample interval in seconds for source outputs that are not anchored
    pub default_samp_intvl: f64,
    /// Log progress every N cycles (None = silent)
    pub progress_interval: Option<u64>,
    /// Stop the run at the end of the first cycle in which a source is exhausted
    pub stop_on_exhaustion: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 10,
            default_block_size: None,
            default_samp_intvl: 1.0,
            progress_interval: None,
            stop_on_exhaustion: true,
        }
    }
}

impl SimConfig {
    /// Set the cycle count.
    pub fn with_cycles(mut self, cycles: u64) -> Self {
        self.cycles = cycles;
        self
    }

    /// Set the fallback block size for unanchored sources.
    pub fn with_default_block_size(mut self, block_size: usize) -> Self {
        self.default_block_size = Some(block_size);
        self
    }

    /// Set the fallback sample interval for unanchored sources.
    pub fn with_default_samp_intvl(mut self, samp_intvl: f64) -> Self {
        self.default_samp_intvl = samp_intvl;
        self
    }

    /// Log progress every `interval` cycles.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Keep running after a source reports exhaustion.
    pub fn run_past_exhaustion(mut self) -> Self {
        self.stop_on_exhaustion = false;
        self
    }

    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_CYCLES) {
            config.cycles = parse_positive(ENV_CYCLES, &v)? as u64;
        }
        if let Some(v) = lookup(ENV_BLOCK_SIZE) {
            config.default_block_size = Some(parse_positive(ENV_BLOCK_SIZE, &v)?);
        }
        if let Some(v) = lookup(ENV_PROGRESS_INTERVAL) {
            config.progress_interval = Some(parse_positive(ENV_PROGRESS_INTERVAL, &v)? as u64);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values no simulation can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_samp_intvl.is_finite() && self.default_samp_intvl > 0.0) {
            return Err(invalid("default_samp_intvl", "must be positive and finite"));
        }
        if self.default_block_size == Some(0) {
            return Err(invalid("default_block_size", "must be positive"));
        }
        if self.progress_interval == Some(0) {
            return Err(invalid("progress_interval", "must be positive"));
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, &format!("expected a positive integer, got {value:?}"))),
    }
}

fn invalid(parameter: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        model: "simulation".to_string(),
        parameter: parameter.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [(ENV_CYCLES, "250"), (ENV_BLOCK_SIZE, " 1024 ")]
            .into_iter()
            .collect();
        let config = SimConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.cycles, 250);
        assert_eq!(config.default_block_size, Some(1024));
        assert_eq!(config.progress_interval, None);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = SimConfig::from_lookup(|k| (k == ENV_CYCLES).then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_CYCLES));
        assert!(SimConfig::from_lookup(|k| (k == ENV_BLOCK_SIZE).then(|| "0".to_string())).is_err());
    }

    #[test]
    fn validate_rejects_bad_interval() {
        let config = SimConfig::default().with_default_samp_intvl(0.0);
        assert!(config.validate().is_err());
        assert!(SimConfig::default().validate().is_ok());
    }
}
