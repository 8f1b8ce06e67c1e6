//! Heatmap cells for external charting
//!
//! A flat array of N = dim * dim values is laid out row by row; each value
//! becomes an `(x, y, value)` cell with `y` counted from the bottom row.

use serde::{Deserialize, Serialize};

use crate::{RbmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub col: usize,
    /// Row index counted from the bottom
    pub row: usize,
    pub value: f32,
}

impl HeatmapCell {
    pub fn to_triple(&self) -> (usize, usize, f32) {
        (self.col, self.row, self.value)
    }
}

/// Convert a square image stored row-major into heatmap cells, in input order
pub fn heatmap(values: &[f32]) -> Result<Vec<HeatmapCell>> {
    let dim = square_side(values.len()).ok_or_else(|| {
        RbmError::Reshape(format!(
            "heatmap input of length {} is not a perfect square",
            values.len()
        ))
    })?;

    Ok(values
        .iter()
        .enumerate()
        .map(|(i, &value)| HeatmapCell {
            col: i % dim,
            row: dim - 1 - i / dim,
            value,
        })
        .collect())
}

fn square_side(n: usize) -> Option<usize> {
    let side = (n as f64).sqrt().round() as usize;
    (side * side == n).then_some(side)
}
