//! Restricted Boltzmann Machine parameters
//!
//! Layout (column-vector convention):
//! - `W`: [num_hidden, num_visible]
//! - `a`: [num_visible, 1] visible bias
//! - `b`: [num_hidden, 1] hidden bias
//!
//! Batches of examples are passed as [num_visible, batch] tensors, one example
//! per column.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::numeric::{from_rows, sigmoid, to_vec};
use crate::{RbmError, Result};

/// A single RBM layer. The trainer mutates its entries in place; the shapes
/// never change after construction.
#[derive(Debug, Clone)]
pub struct RbmModel<B: Backend> {
    w: Tensor<B, 2>,
    a: Tensor<B, 2>,
    b: Tensor<B, 2>,
}

impl<B: Backend> RbmModel<B> {
    /// Model with all-zero parameters
    pub fn zeros(num_visible: usize, num_hidden: usize, device: &B::Device) -> Self {
        RbmModel {
            w: Tensor::zeros([num_hidden, num_visible], device),
            a: Tensor::zeros([num_visible, 1], device),
            b: Tensor::zeros([num_hidden, 1], device),
        }
    }

    /// Weights drawn from N(0, init_std^2), biases at zero
    pub fn init<R: Rng + ?Sized>(
        num_visible: usize,
        num_hidden: usize,
        init_std: f64,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self> {
        if !init_std.is_finite() || init_std < 0.0 {
            return Err(RbmError::InvalidArgument(format!(
                "init_std must be finite and non-negative, got {}",
                init_std
            )));
        }
        let normal = Normal::new(0.0f32, init_std as f32).map_err(|e| {
            RbmError::InvalidArgument(format!("init_std {}: {}", init_std, e))
        })?;
        let weights: Vec<f32> = (0..num_hidden * num_visible)
            .map(|_| normal.sample(rng))
            .collect();

        Ok(RbmModel {
            w: from_rows(&weights, num_hidden, num_visible, device)?,
            a: Tensor::zeros([num_visible, 1], device),
            b: Tensor::zeros([num_hidden, 1], device),
        })
    }

    /// Assemble a model from existing parameters, checking that the shapes agree
    pub fn from_parameters(w: Tensor<B, 2>, a: Tensor<B, 2>, b: Tensor<B, 2>) -> Result<Self> {
        let [num_hidden, num_visible] = w.dims();
        if a.dims() != [num_visible, 1] {
            return Err(RbmError::ShapeMismatch {
                expected: vec![num_visible, 1],
                found: a.dims().to_vec(),
            });
        }
        if b.dims() != [num_hidden, 1] {
            return Err(RbmError::ShapeMismatch {
                expected: vec![num_hidden, 1],
                found: b.dims().to_vec(),
            });
        }
        Ok(RbmModel { w, a, b })
    }

    pub fn num_visible(&self) -> usize {
        self.w.dims()[1]
    }

    pub fn num_hidden(&self) -> usize {
        self.w.dims()[0]
    }

    /// Weight matrix [num_hidden, num_visible]
    pub fn weights(&self) -> &Tensor<B, 2> {
        &self.w
    }

    /// Visible bias [num_visible, 1]
    pub fn visible_bias(&self) -> &Tensor<B, 2> {
        &self.a
    }

    /// Hidden bias [num_hidden, 1]
    pub fn hidden_bias(&self) -> &Tensor<B, 2> {
        &self.b
    }

    /// P(h = 1 | v) for a [num_visible, batch] input
    pub fn hidden_probabilities(&self, visible: Tensor<B, 2>) -> Tensor<B, 2> {
        let batch = visible.dims()[1];
        sigmoid(self.w.clone().matmul(visible) + self.b.clone().repeat_dim(1, batch))
    }

    /// P(v = 1 | h) for a [num_hidden, batch] input
    pub fn visible_probabilities(&self, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let batch = hidden.dims()[1];
        sigmoid(self.w.clone().transpose().matmul(hidden) + self.a.clone().repeat_dim(1, batch))
    }

    /// Add parameter deltas in place
    pub(crate) fn apply_update(
        &mut self,
        w_update: &Tensor<B, 2>,
        a_update: &Tensor<B, 2>,
        b_update: &Tensor<B, 2>,
    ) {
        self.w = self.w.clone() + w_update.clone();
        self.a = self.a.clone() + a_update.clone();
        self.b = self.b.clone() + b_update.clone();
    }

    /// Host-side copy of the parameters
    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        Ok(ModelSnapshot {
            num_visible: self.num_visible(),
            num_hidden: self.num_hidden(),
            weights: to_vec(self.w.clone())?,
            visible_bias: to_vec(self.a.clone())?,
            hidden_bias: to_vec(self.b.clone())?,
        })
    }

    pub fn from_snapshot(snapshot: &ModelSnapshot, device: &B::Device) -> Result<Self> {
        let w = from_rows(
            &snapshot.weights,
            snapshot.num_hidden,
            snapshot.num_visible,
            device,
        )?;
        let a = from_rows(&snapshot.visible_bias, snapshot.num_visible, 1, device)?;
        let b = from_rows(&snapshot.hidden_bias, snapshot.num_hidden, 1, device)?;
        Self::from_parameters(w, a, b)
    }

    /// Save model to a JSON file
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot()?)
            .map_err(|e| RbmError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load model from a JSON file
    pub fn load(path: &str, device: &B::Device) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: ModelSnapshot =
            serde_json::from_str(&json).map_err(|e| RbmError::Parse(e.to_string()))?;
        Self::from_snapshot(&snapshot, device)
    }
}

/// Serializable RBM parameters, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub num_visible: usize,
    pub num_hidden: usize,
    pub weights: Vec<f32>,
    pub visible_bias: Vec<f32>,
    pub hidden_bias: Vec<f32>,
}
