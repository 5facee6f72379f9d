//! Re-skinning configuration.
//!
//! Defaults reproduce the reference avatar setup. A config can be loaded from
//! JSON and individual values overridden from the environment.

use crate::core::ScaleActivation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding [`ReskinConfig::max_scale`].
pub const MAX_SCALE_ENV: &str = "GSAVATAR_MAX_SCALE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReskinConfig {
    /// Normalisation constant of the per-face scale:
    /// `scale = (height + edge) / (2 * max_scale)`.
    pub max_scale: f32,

    /// Activation applied to stored splat scales.
    pub scale_activation: ScaleActivation,

    /// Triangles whose doubled area or reference edge length fall at or below
    /// this value get an identity rotation and zero scale.
    pub degenerate_epsilon: f32,

    /// Invocations per GPU workgroup.
    pub workgroup_size: u32,
}

impl Default for ReskinConfig {
    fn default() -> Self {
        Self {
            max_scale: 0.05,
            scale_activation: ScaleActivation::default(),
            degenerate_epsilon: 1e-12,
            workgroup_size: 256,
        }
    }
}

impl ReskinConfig {
    /// Load a config from a JSON file. Missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GSAVATAR_MAX_SCALE` if set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var(MAX_SCALE_ENV) {
            self.max_scale = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "max_scale",
                reason: format!("{MAX_SCALE_ENV}={raw} is not a number"),
            })?;
            log::info!("max_scale overridden from environment: {}", self.max_scale);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_scale.is_finite() && self.max_scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "max_scale",
                reason: format!("must be positive, got {}", self.max_scale),
            });
        }
        let act = &self.scale_activation;
        if !(act.min.is_finite() && act.max.is_finite() && act.max >= act.min && act.min >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "scale_activation",
                reason: format!("need 0 <= min <= max, got [{}, {}]", act.min, act.max),
            });
        }
        if !(self.degenerate_epsilon >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "degenerate_epsilon",
                reason: format!("must be non-negative, got {}", self.degenerate_epsilon),
            });
        }
        if self.workgroup_size == 0 {
            return Err(ConfigError::Invalid {
                field: "workgroup_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
