//! One-step Contrastive Divergence training
//!
//! [`CdTrainer::run`] returns a lazy [`TrainingRun`] iterator. Every call to
//! `next()` trains on exactly one mini-batch and yields that batch's
//! positive-phase hidden probabilities ([num_hidden, batch_size]), so a caller
//! can observe or render between steps. Dropping the iterator abandons the run.

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::Dataset;
use crate::model::RbmModel;
use crate::numeric::{activation, root_mean_squared};
use crate::training::metrics::{EpochMetrics, TrainingHistory};
use crate::{RbmError, Result, TrainingConfig};

/// Where a trainer is in its current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// No run started yet
    Idle,
    Running,
    /// Mean error reached the threshold
    Converged,
    /// Epoch cap reached with the error still above threshold
    ExhaustedEpochs,
    /// Mean error became NaN
    Diverged,
}

impl TrainingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingState::Converged | TrainingState::ExhaustedEpochs | TrainingState::Diverged
        )
    }
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingState::Idle => write!(f, "Idle"),
            TrainingState::Running => write!(f, "Running"),
            TrainingState::Converged => write!(f, "Converged"),
            TrainingState::ExhaustedEpochs => write!(f, "Exhausted epochs"),
            TrainingState::Diverged => write!(f, "Diverged"),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOutcome {
    pub state: TrainingState,
    pub epochs: usize,
    /// Mini-batches processed
    pub steps: usize,
    pub mean_squared_error: f64,
}

/// Momentum accumulators, same shapes as the model parameters
#[derive(Debug, Clone)]
struct Velocity<B: Backend> {
    w: Tensor<B, 2>,
    a: Tensor<B, 2>,
    b: Tensor<B, 2>,
}

impl<B: Backend> Velocity<B> {
    fn zeros(model: &RbmModel<B>) -> Self {
        Velocity {
            w: model.weights().zeros_like(),
            a: model.visible_bias().zeros_like(),
            b: model.hidden_bias().zeros_like(),
        }
    }
}

/// Contrastive Divergence trainer holding exclusive access to one model
pub struct CdTrainer<'m, B: Backend> {
    model: &'m mut RbmModel<B>,
    config: TrainingConfig,
    seed: Option<u64>,
    rng: StdRng,
    epoch: usize,
    mean_squared_error: f64,
    state: TrainingState,
    velocity: Velocity<B>,
    history: TrainingHistory,
}

impl<'m, B: Backend> CdTrainer<'m, B> {
    /// Trainer sampling from an entropy-seeded source
    pub fn new(model: &'m mut RbmModel<B>, config: TrainingConfig) -> Self {
        Self::with_rng(model, config, None, StdRng::from_os_rng())
    }

    /// Trainer whose runs replay the same random draws
    pub fn with_seed(model: &'m mut RbmModel<B>, config: TrainingConfig, seed: u64) -> Self {
        Self::with_rng(model, config, Some(seed), StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        model: &'m mut RbmModel<B>,
        config: TrainingConfig,
        seed: Option<u64>,
        rng: StdRng,
    ) -> Self {
        let velocity = Velocity::zeros(model);
        CdTrainer {
            model,
            config,
            seed,
            rng,
            epoch: 0,
            mean_squared_error: config.threshold() + 1.0,
            state: TrainingState::Idle,
            velocity,
            history: TrainingHistory::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Epochs started in the current run
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Mean reconstruction error of the last finished epoch
    /// (threshold + 1 before the first epoch finishes)
    pub fn mean_squared_error(&self) -> f64 {
        self.mean_squared_error
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn model(&self) -> &RbmModel<B> {
        self.model
    }

    /// Start a training run over `dataset`.
    ///
    /// Resets the epoch counter, error, momentum and history. A seeded trainer
    /// also restarts its random source. Batches are contiguous slices in
    /// dataset order; examples past the last full batch are never trained on.
    pub fn run(&mut self, dataset: &Dataset) -> Result<TrainingRun<'_, 'm, B>> {
        let batch_size = self.config.batch_size();
        let batches_per_epoch = dataset.num_batches(batch_size);
        if batches_per_epoch == 0 {
            return Err(RbmError::EmptyBatchSet {
                examples: dataset.len(),
                batch_size,
            });
        }
        if dataset.num_visible() != self.model.num_visible() {
            return Err(RbmError::ShapeMismatch {
                expected: vec![self.model.num_visible()],
                found: vec![dataset.num_visible()],
            });
        }

        let dropped = dataset.len() - batches_per_epoch * batch_size;
        if dropped > 0 {
            log::warn!(
                "Dataset size {} is not a multiple of batch size {}; last {} examples are skipped",
                dataset.len(),
                batch_size,
                dropped
            );
        }

        let data = dataset.to_tensor::<B>(&self.model.weights().device())?;

        self.epoch = 0;
        self.mean_squared_error = self.config.threshold() + 1.0;
        self.velocity = Velocity::zeros(self.model);
        self.history = TrainingHistory::new();
        if let Some(seed) = self.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.state = TrainingState::Running;

        log::info!(
            "Starting CD training: {} examples, {} batches/epoch, up to {} epochs (threshold {})",
            dataset.len(),
            batches_per_epoch,
            self.config.max_epochs(),
            self.config.threshold()
        );

        Ok(TrainingRun {
            num_visible: dataset.num_visible(),
            trainer: self,
            data,
            batches_per_epoch,
            next_batch: 0,
            epoch_metrics: EpochMetrics::new(),
            steps: 0,
        })
    }

    /// Drive a run to completion
    pub fn train(&mut self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let steps = self.run(dataset)?.count();
        Ok(TrainingOutcome {
            state: self.state,
            epochs: self.epoch,
            steps,
            mean_squared_error: self.mean_squared_error,
        })
    }

    fn should_continue(&self) -> bool {
        self.mean_squared_error > self.config.threshold() && self.epoch < self.config.max_epochs()
    }

    fn finish(&mut self) {
        self.state = if self.mean_squared_error.is_nan() {
            TrainingState::Diverged
        } else if self.mean_squared_error <= self.config.threshold() {
            TrainingState::Converged
        } else {
            TrainingState::ExhaustedEpochs
        };

        log::info!(
            "Training finished: {} after {} epochs (error {:.4})",
            self.state,
            self.epoch,
            self.mean_squared_error
        );
    }

    /// One CD-1 update on a [batch_size, num_visible] slice.
    /// Returns the positive hidden probabilities and the reconstruction error.
    fn train_batch(&mut self, batch: Tensor<B, 2>) -> (Tensor<B, 2>, f32) {
        let batch_size = batch.dims()[0] as f64;
        let learn_rate = self.config.learn_rate();
        let momentum = self.config.momentum();
        let w_decay = self.config.w_decay();

        // One example per column
        let data = batch.transpose();

        // Positive phase
        let hid_probs = self.model.hidden_probabilities(data.clone());
        let hid_states = activation(&hid_probs, &mut self.rng);
        let pos_corr = hid_probs
            .clone()
            .matmul(data.clone().transpose())
            .div_scalar(batch_size);
        let pos_vis_act = data.clone().sum_dim(1).div_scalar(batch_size);
        let pos_hid_act = hid_probs.clone().sum_dim(1).div_scalar(batch_size);

        // Negative phase (one Gibbs step)
        let vis_probs = self.model.visible_probabilities(hid_states);
        let recon = activation(&vis_probs, &mut self.rng);
        let neg_hid_probs = self.model.hidden_probabilities(recon.clone());
        let neg_corr = neg_hid_probs
            .clone()
            .matmul(recon.clone().transpose())
            .div_scalar(batch_size);
        let neg_vis_act = recon.clone().sum_dim(1).div_scalar(batch_size);
        let neg_hid_act = neg_hid_probs.sum_dim(1).div_scalar(batch_size);

        // Momentum-smoothed updates
        let decay = self.model.weights().clone().mul_scalar(w_decay);
        let v = &mut self.velocity;
        v.w = v.w.clone().mul_scalar(momentum) + ((pos_corr - neg_corr) - decay).mul_scalar(learn_rate);
        v.a = v.a.clone().mul_scalar(momentum) + (pos_vis_act - neg_vis_act).mul_scalar(learn_rate);
        v.b = v.b.clone().mul_scalar(momentum) + (pos_hid_act - neg_hid_act).mul_scalar(learn_rate);
        self.model.apply_update(&v.w, &v.a, &v.b);

        let error = root_mean_squared(data, recon);
        (hid_probs, error)
    }
}

/// A training run in progress. Each item is one trained mini-batch.
pub struct TrainingRun<'a, 'm, B: Backend> {
    trainer: &'a mut CdTrainer<'m, B>,
    data: Tensor<B, 2>,
    num_visible: usize,
    batches_per_epoch: usize,
    next_batch: usize,
    epoch_metrics: EpochMetrics,
    steps: usize,
}

impl<B: Backend> TrainingRun<'_, '_, B> {
    pub fn epoch(&self) -> usize {
        self.trainer.epoch
    }

    pub fn mean_squared_error(&self) -> f64 {
        self.trainer.mean_squared_error
    }

    /// Mean error of the last finished epoch of this run
    pub fn last_epoch_error(&self) -> Option<f64> {
        self.trainer.history.last_error()
    }

    pub fn state(&self) -> TrainingState {
        self.trainer.state
    }

    /// Mini-batches trained so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.batches_per_epoch
    }

    pub fn model(&self) -> &RbmModel<B> {
        self.trainer.model
    }
}

impl<B: Backend> Iterator for TrainingRun<'_, '_, B> {
    type Item = Tensor<B, 2>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.trainer.state.is_terminal() {
            return None;
        }

        if self.next_batch == 0 {
            if !self.trainer.should_continue() {
                self.trainer.finish();
                return None;
            }
            self.trainer.epoch += 1;
            self.epoch_metrics.reset();
        }

        let batch_size = self.trainer.config.batch_size();
        let start = self.next_batch * batch_size;
        let batch = self
            .data
            .clone()
            .slice([start..start + batch_size, 0..self.num_visible]);

        let (hid_probs, error) = self.trainer.train_batch(batch);
        self.epoch_metrics.update(error, batch_size);
        self.next_batch += 1;
        self.steps += 1;

        log::debug!(
            "Epoch {} batch {}/{}: error {:.4}",
            self.trainer.epoch,
            self.next_batch,
            self.batches_per_epoch,
            error
        );

        if self.next_batch == self.batches_per_epoch {
            self.next_batch = 0;
            let mean = self.epoch_metrics.mean_error().unwrap_or(f64::NAN);
            self.trainer.mean_squared_error = mean;
            self.trainer.history.record_epoch(mean);

            log::info!(
                "Epoch {}/{}: {}",
                self.trainer.epoch,
                self.trainer.config.max_epochs(),
                self.epoch_metrics
            );
        }

        Some(hid_probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{from_rows, to_vec};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn small_dataset() -> Dataset {
        Dataset::new(vec![
            vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ])
        .unwrap()
    }

    fn seeded_model(num_visible: usize, num_hidden: usize, seed: u64) -> RbmModel<TestBackend> {
        let mut rng = StdRng::seed_from_u64(seed);
        RbmModel::init(num_visible, num_hidden, 0.1, &mut rng, &Default::default()).unwrap()
    }

    #[test]
    fn test_runs_exactly_max_epochs() {
        let mut model = seeded_model(6, 2, 1);
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(5)
            .with_threshold(1e-9)
            .build()
            .unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 17);
        assert_eq!(trainer.state(), TrainingState::Idle);
        assert_eq!(trainer.epoch(), 0);

        let outputs: Vec<_> = trainer.run(&small_dataset()).unwrap().collect();

        assert_eq!(outputs.len(), 5 * 2);
        for probs in &outputs {
            assert_eq!(probs.dims(), [2, 2]);
            for val in to_vec(probs.clone()).unwrap() {
                assert!(val > 0.0 && val < 1.0);
            }
        }
        assert_eq!(trainer.epoch(), 5);
        assert_eq!(trainer.state(), TrainingState::ExhaustedEpochs);
        assert_eq!(trainer.history().epochs(), 5);
    }

    #[test]
    fn test_high_threshold_stops_after_one_epoch() {
        let mut model = seeded_model(6, 3, 2);
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(50)
            .with_threshold(1.0)
            .build()
            .unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 3);

        let outcome = trainer.train(&small_dataset()).unwrap();
        assert_eq!(outcome.epochs, 1);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.state, TrainingState::Converged);
        assert!(outcome.mean_squared_error <= 1.0);
    }

    #[test]
    fn test_trailing_partial_batch_is_dropped() {
        let mut examples = small_dataset().examples().to_vec();
        examples.push(vec![1.0; 6]);
        let dataset = Dataset::new(examples).unwrap();

        let mut model = seeded_model(6, 2, 4);
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(3)
            .with_threshold(1e-9)
            .build()
            .unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 5);

        let run = trainer.run(&dataset).unwrap();
        assert_eq!(run.batches_per_epoch(), 2);
        assert_eq!(run.count(), 3 * 2);
    }

    #[test]
    fn test_empty_batch_set() {
        let config = TrainingConfig::builder().with_batch_size(5).build().unwrap();

        let mut model = seeded_model(6, 2, 0);
        let mut trainer = CdTrainer::with_seed(&mut model, config, 0);
        match trainer.run(&small_dataset()) {
            Err(RbmError::EmptyBatchSet {
                examples,
                batch_size,
            }) => {
                assert_eq!(examples, 4);
                assert_eq!(batch_size, 5);
            }
            Err(other) => panic!("Expected EmptyBatchSet, got {:?}", other),
            Ok(_) => panic!("Expected EmptyBatchSet"),
        }

        let empty = Dataset::new(Vec::new()).unwrap();
        assert!(matches!(
            trainer.run(&empty),
            Err(RbmError::EmptyBatchSet { .. })
        ));
        assert_eq!(trainer.state(), TrainingState::Idle);
    }

    #[test]
    fn test_dataset_width_must_match_model() {
        let mut model = seeded_model(4, 2, 0);
        let mut trainer = CdTrainer::with_seed(&mut model, TrainingConfig::default(), 0);
        assert!(matches!(
            trainer.run(&small_dataset()),
            Err(RbmError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_seeded_runs_replay_identically() {
        let dataset = Dataset::bars_and_stripes(3).unwrap();
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(3)
            .build()
            .unwrap();

        let train_steps = |seed: u64| {
            let mut model = seeded_model(9, 4, 8);
            let mut trainer = CdTrainer::with_seed(&mut model, config, seed);
            let steps = trainer.run(&dataset).unwrap().take(10).count();
            drop(trainer);
            assert_eq!(steps, 10);
            model.snapshot().unwrap()
        };

        let first = train_steps(21);
        assert_eq!(first, train_steps(21));
        assert_ne!(first, train_steps(22));
        // Parameters actually moved
        assert_ne!(first, seeded_model(9, 4, 8).snapshot().unwrap());
    }

    #[test]
    fn test_rerun_restarts_state() {
        let dataset = small_dataset();
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(2)
            .with_threshold(1e-9)
            .build()
            .unwrap();
        let mut model = seeded_model(6, 2, 6);
        let mut trainer = CdTrainer::with_seed(&mut model, config, 6);

        assert_eq!(trainer.run(&dataset).unwrap().count(), 4);
        assert_eq!(trainer.epoch(), 2);

        // Abandon a second run after one step
        {
            let mut run = trainer.run(&dataset).unwrap();
            assert!(run.next().is_some());
            assert_eq!(run.epoch(), 1);
            assert_eq!(run.last_epoch_error(), None);
            assert_eq!(run.mean_squared_error(), 1e-9 + 1.0);
        }
        assert_eq!(trainer.state(), TrainingState::Running);

        let outcome = trainer.train(&dataset).unwrap();
        assert_eq!(outcome.epochs, 2);
        assert_eq!(outcome.steps, 4);
    }

    #[test]
    fn test_iterator_stays_finished() {
        let mut model = seeded_model(6, 2, 9);
        let config = TrainingConfig::builder()
            .with_batch_size(4)
            .with_max_epochs(1)
            .build()
            .unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 9);
        let mut run = trainer.run(&small_dataset()).unwrap();

        assert!(run.next().is_some());
        assert!(run.next().is_none());
        assert!(run.state().is_terminal());
        assert!(run.next().is_none());
        assert_eq!(run.steps(), 1);
    }

    /// Saturated biases make every sample deterministic: hidden units never
    /// fire and reconstructions are all ones, so the updates reduce to the
    /// momentum and weight-decay terms.
    #[test]
    fn test_momentum_and_weight_decay_updates() {
        let device = Default::default();
        let w = from_rows::<TestBackend>(&[1.0; 6], 2, 3, &device).unwrap();
        let a = from_rows::<TestBackend>(&[50.0; 3], 3, 1, &device).unwrap();
        let b = from_rows::<TestBackend>(&[-50.0; 2], 2, 1, &device).unwrap();
        let mut model = RbmModel::from_parameters(w, a, b).unwrap();

        let config = TrainingConfig::builder()
            .with_batch_size(1)
            .with_learn_rate(0.1)
            .with_momentum(0.5)
            .with_w_decay(0.1)
            .build()
            .unwrap();
        let dataset = Dataset::new(vec![vec![0.0; 3]; 2]).unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 0);
        {
            let mut run = trainer.run(&dataset).unwrap();
            assert!(run.next().is_some());
            assert!(run.next().is_some());
            // All-zero data against all-one reconstructions
            assert!((run.mean_squared_error() - 1.0).abs() < 1e-6);
        }
        drop(trainer);

        let snapshot = model.snapshot().unwrap();
        // W: 1 -> 0.99 -> 0.99 - (0.5 * 0.01 + 0.1 * 0.1 * 0.99) = 0.9751
        for w in &snapshot.weights {
            assert!((w - 0.9751).abs() < 1e-5, "w = {}", w);
        }
        // a: 50 -> 49.9 -> 49.9 - (0.5 * 0.1 + 0.1) = 49.75
        for a in &snapshot.visible_bias {
            assert!((a - 49.75).abs() < 1e-4, "a = {}", a);
        }
        for b in &snapshot.hidden_bias {
            assert!((b + 50.0).abs() < 1e-4, "b = {}", b);
        }
    }

    #[test]
    fn test_nan_error_is_diverged() {
        let dataset = Dataset::new(vec![
            vec![f32::NAN, 0.0, 1.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ])
        .unwrap();
        let mut model = seeded_model(6, 2, 12);
        let config = TrainingConfig::builder()
            .with_batch_size(2)
            .with_max_epochs(5)
            .build()
            .unwrap();
        let mut trainer = CdTrainer::with_seed(&mut model, config, 12);

        let outcome = trainer.train(&dataset).unwrap();
        assert_eq!(outcome.state, TrainingState::Diverged);
        assert_eq!(outcome.epochs, 1);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.mean_squared_error.is_nan());
    }
}
