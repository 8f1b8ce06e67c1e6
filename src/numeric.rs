//! Elementwise numeric operations shared by the model and trainer

use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use rand::Rng;

use crate::{RbmError, Result};

/// Elementwise logistic function 1 / (1 + e^-x)
pub fn sigmoid<B: Backend, const D: usize>(v: Tensor<B, D>) -> Tensor<B, D> {
    activation::sigmoid(v)
}

/// Stochastic binary activation.
///
/// Each entry `x` becomes 1.0 when `x > u` for an independent `u` drawn
/// uniformly from [0, 1), and 0.0 otherwise. The draws come from `rng`, so a
/// seeded generator reproduces the same states.
pub fn activation<B: Backend, const D: usize, R: Rng + ?Sized>(
    v: &Tensor<B, D>,
    rng: &mut R,
) -> Tensor<B, D> {
    let dims = v.dims();
    let count: usize = dims.iter().product();
    let uniform: Vec<f32> = (0..count).map(|_| rng.random::<f32>()).collect();
    let thresholds =
        Tensor::<B, 1>::from_floats(uniform.as_slice(), &v.device()).reshape(dims);

    v.clone().greater(thresholds).float()
}

/// Root-mean-squared difference between two equally shaped tensors
pub fn squared_error<B: Backend, const D: usize>(
    v: &Tensor<B, D>,
    w: &Tensor<B, D>,
) -> Result<f32> {
    let (left, right) = (v.dims(), w.dims());
    if left != right {
        return Err(RbmError::ShapeMismatch {
            expected: left.to_vec(),
            found: right.to_vec(),
        });
    }
    Ok(root_mean_squared(v.clone(), w.clone()))
}

/// Unchecked [`squared_error`] for callers that already hold matching shapes
pub(crate) fn root_mean_squared<B: Backend, const D: usize>(
    v: Tensor<B, D>,
    w: Tensor<B, D>,
) -> f32 {
    (v - w).powf_scalar(2.0).mean().sqrt().into_scalar().elem()
}

/// Copy a tensor's entries out in row-major order
pub fn to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| RbmError::Tensor(format!("{:?}", e)))
}

/// Build a 2D tensor from row-major values
pub fn from_rows<B: Backend>(
    values: &[f32],
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    if values.len() != rows * cols {
        return Err(RbmError::ShapeMismatch {
            expected: vec![rows, cols],
            found: vec![values.len()],
        });
    }
    Ok(Tensor::<B, 1>::from_floats(values, device).reshape([rows, cols]))
}
