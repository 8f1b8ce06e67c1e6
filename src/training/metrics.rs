//! Reconstruction error tracking

use std::fmt;

/// Per-batch reconstruction errors accumulated over one epoch
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    /// Sum of batch reconstruction errors
    pub error_sum: f64,
    /// Number of batches accumulated
    pub batch_count: usize,
    /// Number of examples seen
    pub examples: usize,
}

impl EpochMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, error: f32, batch_size: usize) {
        self.error_sum += error as f64;
        self.batch_count += 1;
        self.examples += batch_size;
    }

    /// Mean of the batch errors, or None before the first batch
    pub fn mean_error(&self) -> Option<f64> {
        if self.batch_count == 0 {
            None
        } else {
            Some(self.error_sum / self.batch_count as f64)
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mean_error() {
            Some(err) => write!(
                f,
                "Error: {:.4} over {} batches ({} examples)",
                err, self.batch_count, self.examples
            ),
            None => write!(f, "Error: n/a (no batches)"),
        }
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone)]
pub struct TrainingHistory {
    pub epoch_errors: Vec<f64>,
    pub best_error: f64,
    /// Zero-based index of the best epoch
    pub best_epoch: usize,
}

impl Default for TrainingHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            epoch_errors: Vec::new(),
            best_error: f64::INFINITY,
            best_epoch: 0,
        }
    }

    /// Record the mean error of a finished epoch
    pub fn record_epoch(&mut self, error: f64) {
        let epoch = self.epoch_errors.len();
        self.epoch_errors.push(error);

        if error < self.best_error {
            self.best_error = error;
            self.best_epoch = epoch;
        }
    }

    pub fn epochs(&self) -> usize {
        self.epoch_errors.len()
    }

    pub fn last_error(&self) -> Option<f64> {
        self.epoch_errors.last().copied()
    }

    /// Get improvement from last epoch
    pub fn last_improvement(&self) -> Option<f64> {
        if self.epoch_errors.len() < 2 {
            return None;
        }
        let n = self.epoch_errors.len();
        Some(self.epoch_errors[n - 2] - self.epoch_errors[n - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_metrics_mean() {
        let mut metrics = EpochMetrics::new();
        assert_eq!(metrics.mean_error(), None);

        metrics.update(0.5, 2);
        metrics.update(0.25, 2);
        assert_eq!(metrics.mean_error(), Some(0.375));
        assert_eq!(metrics.examples, 4);

        metrics.reset();
        assert_eq!(metrics.batch_count, 0);
    }

    #[test]
    fn test_history_tracks_best() {
        let mut history = TrainingHistory::new();
        assert_eq!(history.last_improvement(), None);

        history.record_epoch(0.4);
        history.record_epoch(0.3);
        history.record_epoch(0.35);

        assert_eq!(history.epochs(), 3);
        assert_eq!(history.best_epoch, 1);
        assert_eq!(history.best_error, 0.3);
        assert_eq!(history.last_error(), Some(0.35));
        assert!((history.last_improvement().unwrap() + 0.05).abs() < 1e-12);
    }
}
