//! Model training
//!
//! Contrastive Divergence loop and reconstruction error tracking.

pub mod cd_trainer;
pub mod metrics;

pub use cd_trainer::{CdTrainer, TrainingOutcome, TrainingRun, TrainingState};
pub use metrics::{EpochMetrics, TrainingHistory};
