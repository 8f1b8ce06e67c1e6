//! Error curve sampled while a training run is driven step by step

use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::training::CdTrainer;
use crate::Result;

/// Number of frames used when no count is given
pub const DEFAULT_FRAMES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Position on the [0, max_epochs] axis
    pub x: f64,
    /// Mini-batches trained when the point was taken
    pub step: usize,
    pub epoch: usize,
    /// Mean error of the last finished epoch, if any
    pub error: Option<f64>,
    /// Mean positive-phase hidden probability of this step's batch
    pub mean_hidden_probability: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorCurve {
    pub points: Vec<CurvePoint>,
}

impl ErrorCurve {
    /// Drive one training step per frame across `frames` points spanning
    /// [0, max_epochs]. Stops early if the run ends first.
    pub fn record<B: Backend>(
        trainer: &mut CdTrainer<'_, B>,
        dataset: &Dataset,
        frames: usize,
    ) -> Result<Self> {
        let xs = linspace(0.0, trainer.config().max_epochs() as f64, frames);
        let mut run = trainer.run(dataset)?;
        let mut points = Vec::with_capacity(xs.len());

        for x in xs {
            let Some(hid_probs) = run.next() else {
                log::debug!("Run ended after {} of {} frames", points.len(), frames);
                break;
            };
            points.push(CurvePoint {
                x,
                step: run.steps(),
                epoch: run.epoch(),
                error: run.last_epoch_error(),
                mean_hidden_probability: hid_probs.mean().into_scalar().elem(),
            });
        }

        Ok(ErrorCurve { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// (x, error) pairs for points taken after the first finished epoch
    pub fn error_series(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.error.map(|e| (p.x, e)))
            .collect()
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RbmModel;
    use crate::TrainingConfig;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_linspace() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(0.0, 10.0, 1), vec![0.0]);
        assert_eq!(linspace(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);

        let xs = linspace(0.0, 10.0, DEFAULT_FRAMES);
        assert_eq!(xs.len(), 128);
        assert!((xs[127] - 10.0).abs() < 1e-9);
    }

    fn trainer_setup(max_epochs: usize) -> (RbmModel<TestBackend>, TrainingConfig, Dataset) {
        let mut rng = StdRng::seed_from_u64(5);
        let model = RbmModel::init(4, 3, 0.1, &mut rng, &Default::default()).unwrap();
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(max_epochs)
            .with_threshold(1e-9)
            .build()
            .unwrap();
        (model, config, Dataset::bars_and_stripes(2).unwrap())
    }

    #[test]
    fn test_stops_at_frame_count() {
        let (mut model, config, dataset) = trainer_setup(10);
        let mut trainer = CdTrainer::with_seed(&mut model, config, 1);

        // 3 batches per epoch, 30 steps available
        let curve = ErrorCurve::record(&mut trainer, &dataset, 7).unwrap();
        assert_eq!(curve.len(), 7);
        assert_eq!(curve.points[0].x, 0.0);
        assert!((curve.points[6].x - 10.0).abs() < 1e-9);
        assert_eq!(curve.points[6].step, 7);

        // Error appears once the first epoch (3 steps) is done
        assert!(curve.points[1].error.is_none());
        assert!(curve.points[2].error.is_some());
        assert_eq!(curve.error_series().len(), 5);
        for p in &curve.points {
            assert!(p.mean_hidden_probability > 0.0 && p.mean_hidden_probability < 1.0);
        }
    }

    #[test]
    fn test_stops_when_run_ends() {
        let (mut model, config, dataset) = trainer_setup(2);
        let mut trainer = CdTrainer::with_seed(&mut model, config, 1);

        let curve = ErrorCurve::record(&mut trainer, &dataset, DEFAULT_FRAMES).unwrap();
        assert_eq!(curve.len(), 6);
        assert_eq!(curve.points.last().map(|p| p.epoch), Some(2));
        assert!(trainer.state().is_terminal());
    }
}
