//! Restricted Boltzmann Machine training
//!
//! A single RBM layer trained with one-step Contrastive Divergence, plus the
//! data collaborators (weights view, error curve, heatmap) that consume it.

pub mod data;
pub mod model;
pub mod numeric;
pub mod training;
pub mod visualize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide errors
#[derive(Debug, Error)]
pub enum RbmError {
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Invalid training config: {0}")]
    InvalidConfig(String),

    #[error("Empty batch set: {examples} examples cannot fill a batch of {batch_size}")]
    EmptyBatchSet { examples: usize, batch_size: usize },

    #[error("Reshape error: {0}")]
    Reshape(String),

    #[error("Hidden unit {index} out of range (model has {count})")]
    UnitOutOfRange { index: usize, count: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tensor data error: {0}")]
    Tensor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, RbmError>;

/// Contrastive Divergence hyper-parameters.
///
/// Always valid once constructed: use [`TrainingConfig::builder`] or
/// [`TrainingConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrainingConfigBuilder", into = "TrainingConfigBuilder")]
pub struct TrainingConfig {
    max_epochs: usize,
    threshold: f64,
    batch_size: usize,
    learn_rate: f64,
    momentum: f64,
    w_decay: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            max_epochs: 10,
            threshold: 0.05,
            batch_size: 1,
            learn_rate: 0.1,
            momentum: 0.5,
            w_decay: 0.0002,
        }
    }
}

impl TrainingConfig {
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Maximum number of training epochs
    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /// Target reconstruction error
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Examples per mini-batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn learn_rate(&self) -> f64 {
        self.learn_rate
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    /// Weight decay factor
    pub fn w_decay(&self) -> f64 {
        self.w_decay
    }
}

/// Builder for [`TrainingConfig`]. Starts from the documented defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfigBuilder {
    pub max_epochs: usize,
    pub threshold: f64,
    pub batch_size: usize,
    pub learn_rate: f64,
    pub momentum: f64,
    pub w_decay: f64,
}

impl Default for TrainingConfigBuilder {
    fn default() -> Self {
        TrainingConfig::default().into()
    }
}

impl TrainingConfigBuilder {
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learn_rate(mut self, learn_rate: f64) -> Self {
        self.learn_rate = learn_rate;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_w_decay(mut self, w_decay: f64) -> Self {
        self.w_decay = w_decay;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<TrainingConfig> {
        if self.max_epochs == 0 {
            return Err(RbmError::InvalidConfig(
                "max_epochs must be positive".to_string(),
            ));
        }
        // Negated comparisons also reject NaN
        if !(self.threshold > 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(RbmError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if !(self.learn_rate > 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "learn_rate must be positive, got {}",
                self.learn_rate
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(RbmError::InvalidConfig(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        if !(self.w_decay >= 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "w_decay must be non-negative, got {}",
                self.w_decay
            )));
        }

        Ok(TrainingConfig {
            max_epochs: self.max_epochs,
            threshold: self.threshold,
            batch_size: self.batch_size,
            learn_rate: self.learn_rate,
            momentum: self.momentum,
            w_decay: self.w_decay,
        })
    }
}

impl From<TrainingConfig> for TrainingConfigBuilder {
    fn from(config: TrainingConfig) -> Self {
        TrainingConfigBuilder {
            max_epochs: config.max_epochs,
            threshold: config.threshold,
            batch_size: config.batch_size,
            learn_rate: config.learn_rate,
            momentum: config.momentum,
            w_decay: config.w_decay,
        }
    }
}

impl TryFrom<TrainingConfigBuilder> for TrainingConfig {
    type Error = RbmError;

    fn try_from(builder: TrainingConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub num_hidden: usize,
    /// Standard deviation of the initial weights
    pub init_std: f64,
    /// Seed for weight initialisation and sampling (random if absent)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub dataset_path: String,
    pub model_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig::default(),
            model: ModelConfig {
                num_hidden: 16,
                init_std: 0.01,
                seed: Some(42),
            },
            data: DataConfig {
                dataset_path: "data/train.json".to_string(),
                model_path: "model/rbm.json".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RbmError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| RbmError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RbmError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
