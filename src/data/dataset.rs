//! Training examples for the RBM
//!
//! Examples are fixed-length vectors of visible unit values, kept in the
//! order they were supplied.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::numeric::from_rows;
use crate::{RbmError, Result};

/// An ordered, read-only set of equally sized examples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    examples: Vec<Vec<f32>>,
    num_visible: usize,
}

impl Dataset {
    /// Create a dataset, checking that every example has the same length.
    ///
    /// Values are not range-checked; a non-finite value makes the epoch error
    /// NaN and the run ends as `Diverged`.
    pub fn new(examples: Vec<Vec<f32>>) -> Result<Self> {
        let num_visible = examples.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = examples.iter().find(|e| e.len() != num_visible) {
            return Err(RbmError::ShapeMismatch {
                expected: vec![num_visible],
                found: vec![bad.len()],
            });
        }
        Ok(Dataset {
            examples,
            num_visible,
        })
    }

    /// Load from a JSON array of arrays
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let examples: Vec<Vec<f32>> = serde_json::from_str(&content)
            .map_err(|e| RbmError::Parse(format!("Failed to parse dataset {}: {}", path, e)))?;
        let dataset = Self::new(examples)?;
        log::info!(
            "Loaded {} examples of {} visible units from {}",
            dataset.len(),
            dataset.num_visible(),
            path
        );
        Ok(dataset)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string(&self.examples)
            .map_err(|e| RbmError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Bars-and-stripes images of `side` x `side` pixels.
    ///
    /// Every subset of rows lit (horizontal stripes) and every subset of
    /// columns lit (vertical bars). The blank and fully lit images appear in
    /// both families and are kept once, giving 2^(side+1) - 2 examples.
    pub fn bars_and_stripes(side: usize) -> Result<Self> {
        if side == 0 || side > 16 {
            return Err(RbmError::InvalidArgument(format!(
                "bars-and-stripes side must be in 1..=16, got {}",
                side
            )));
        }

        let mut examples: Vec<Vec<f32>> = Vec::with_capacity(1 << (side + 1));
        for mask in 0u32..(1 << side) {
            let lit = |i: usize| (mask >> i) & 1 == 1;

            let stripes: Vec<f32> = (0..side * side)
                .map(|p| if lit(p / side) { 1.0 } else { 0.0 })
                .collect();
            examples.push(stripes);

            // Blank and full images are already present as stripes
            if mask != 0 && mask != (1 << side) - 1 {
                let bars: Vec<f32> = (0..side * side)
                    .map(|p| if lit(p % side) { 1.0 } else { 0.0 })
                    .collect();
                examples.push(bars);
            }
        }

        Self::new(examples)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Length of every example
    pub fn num_visible(&self) -> usize {
        self.num_visible
    }

    pub fn examples(&self) -> &[Vec<f32>] {
        &self.examples
    }

    /// Number of full mini-batches; a trailing partial batch is not counted
    pub fn num_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            0
        } else {
            self.len() / batch_size
        }
    }

    /// All examples as a [len, num_visible] tensor
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Result<Tensor<B, 2>> {
        let flat: Vec<f32> = self.examples.iter().flatten().copied().collect();
        from_rows(&flat, self.len(), self.num_visible, device)
    }
}
