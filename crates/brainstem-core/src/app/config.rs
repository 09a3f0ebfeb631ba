//! Brain configuration surface.
//!
//! Nothing here takes effect on its own: a changed config is applied only by
//! an explicit `BrainController::reload`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::DiscretePolicy;
use crate::ports::{InferenceDevice, ModelRef};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainConfig {
    #[serde(default = "default_brain_name")]
    pub brain_name: String,

    /// `None` leaves the brain unloaded.
    #[serde(default)]
    pub model: Option<ModelRef>,

    #[serde(default)]
    pub device: InferenceDevice,

    /// Seeds epsilon noise and discrete sampling.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub discrete_policy: DiscretePolicy,
}

fn default_brain_name() -> String {
    "brain".to_string()
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            brain_name: default_brain_name(),
            model: None,
            device: InferenceDevice::Cpu,
            seed: 0,
            discrete_policy: DiscretePolicy::Sample,
        }
    }
}

impl BrainConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(ModelRef::new(model));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_policy(mut self, policy: DiscretePolicy) -> Self {
        self.discrete_policy = policy;
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
