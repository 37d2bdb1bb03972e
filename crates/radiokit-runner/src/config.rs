//! Runner configuration file.
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```yaml
//! cache:
//!   dir: /var/cache/radiokit
//!   max_size_bytes: 2147483648
//! fetcher:
//!   timeout_secs: 30
//! sampler:
//!   mesh_size: 151
//! pipeline:
//!   dataset: COP30
//!   resolution: 9
//!   max_distance_m: 50000
//!   missing_elevation:
//!     policy: fill
//!     value: 0.0
//! radio:
//!   freq_mhz: 915.0
//!   climate: continental_temperate
//! ```

use crate::{Result, RunnerError};
use radiokit_dem::{parse_resolution, CacheConfig, FetcherConfig, SamplerConfig};
use radiokit_itm::P2pParams;
use radiokit_link::PipelineConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Top-level runner settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub cache: CacheConfig,
    pub fetcher: FetcherConfig,
    pub sampler: SamplerConfig,
    pub pipeline: PipelineConfig,
    /// Link parameters for `predict`.
    pub radio: P2pParams,
}

impl RunnerConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: RunnerConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the component constructors would otherwise reject later.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size_bytes == 0 {
            return Err(RunnerError::Config("cache.max_size_bytes must be positive".into()));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(RunnerError::Config("fetcher.timeout_secs must be positive".into()));
        }
        if self.sampler.mesh_size < 2 {
            return Err(RunnerError::Config(format!(
                "sampler.mesh_size must be at least 2, got {}",
                self.sampler.mesh_size
            )));
        }
        parse_resolution(self.pipeline.resolution)
            .map_err(|e| RunnerError::Config(format!("pipeline.resolution: {}", e)))?;
        if !(self.pipeline.max_distance_m >= 0.0) {
            return Err(RunnerError::Config(format!(
                "pipeline.max_distance_m must be zero or positive, got {}",
                self.pipeline.max_distance_m
            )));
        }
        self.radio
            .validate()
            .map_err(|e| RunnerError::Config(format!("radio: {}", e)))?;
        Ok(())
    }
}
