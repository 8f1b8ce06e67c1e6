//! Weight inspection: receptive fields and weight histograms

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::model::RbmModel;
use crate::numeric::to_vec;
use crate::{RbmError, Result};

/// Tile dimensions for viewing one hidden unit's weights as an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    pub width: usize,
    pub height: usize,
}

/// Read-only view over a model's weight matrix
pub struct WeightsView<'a, B: Backend> {
    model: &'a RbmModel<B>,
    shape: Option<TileShape>,
}

impl<'a, B: Backend> WeightsView<'a, B> {
    /// Flat view, one row of weights per hidden unit
    pub fn new(model: &'a RbmModel<B>) -> Self {
        WeightsView { model, shape: None }
    }

    /// Tiled view; `width * height` must equal the number of visible units
    pub fn with_shape(model: &'a RbmModel<B>, width: usize, height: usize) -> Result<Self> {
        if width.checked_mul(height) != Some(model.num_visible()) {
            return Err(RbmError::Reshape(format!(
                "{}x{} tiles do not cover {} visible units",
                width,
                height,
                model.num_visible()
            )));
        }
        Ok(WeightsView {
            model,
            shape: Some(TileShape { width, height }),
        })
    }

    pub fn shape(&self) -> Option<TileShape> {
        self.shape
    }

    /// Weight matrix as rows of [num_visible] values
    pub fn weights(&self) -> Result<Vec<Vec<f32>>> {
        let num_visible = self.model.num_visible();
        let flat = to_vec(self.model.weights().clone())?;
        Ok(flat.chunks(num_visible.max(1)).map(<[f32]>::to_vec).collect())
    }

    /// Incoming weights of one hidden unit.
    ///
    /// Untiled views return a single row; tiled views return `width` rows of
    /// `height` values.
    pub fn receptive_field(&self, unit: usize) -> Result<Vec<Vec<f32>>> {
        let count = self.model.num_hidden();
        if unit >= count {
            return Err(RbmError::UnitOutOfRange { index: unit, count });
        }

        let num_visible = self.model.num_visible();
        let row = self
            .model
            .weights()
            .clone()
            .slice([unit..unit + 1, 0..num_visible]);
        let values = to_vec(row)?;

        Ok(match self.shape {
            Some(TileShape { height, .. }) => {
                values.chunks(height.max(1)).map(<[f32]>::to_vec).collect()
            }
            None => vec![values],
        })
    }

    /// Receptive fields of every hidden unit
    pub fn tiles(&self) -> Result<Vec<Vec<Vec<f32>>>> {
        (0..self.model.num_hidden())
            .map(|unit| self.receptive_field(unit))
            .collect()
    }

    /// Bucket every weight into `bins` equal-width bins over [min, max]
    pub fn histogram(&self, bins: usize) -> Result<Histogram> {
        if bins == 0 {
            return Err(RbmError::InvalidArgument(
                "histogram needs at least one bin".to_string(),
            ));
        }
        let values = to_vec(self.model.weights().clone())?;
        Ok(Histogram::from_values(&values, bins))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f32,
    pub max: f32,
    pub bin_width: f32,
    pub counts: Vec<usize>,
}

impl Histogram {
    fn from_values(values: &[f32], bins: usize) -> Self {
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min > max {
            return Histogram {
                min: 0.0,
                max: 0.0,
                bin_width: 0.0,
                counts: vec![0; bins],
            };
        }

        let bin_width = (max - min) / bins as f32;
        let mut counts = vec![0; bins];
        for v in values.iter().filter(|v| v.is_finite()) {
            let idx = if bin_width > 0.0 {
                (((v - min) / bin_width) as usize).min(bins - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }

        Histogram {
            min,
            max,
            bin_width,
            counts,
        }
    }

    /// Lower edge of each bin
    pub fn edges(&self) -> Vec<f32> {
        (0..self.counts.len())
            .map(|i| self.min + i as f32 * self.bin_width)
            .collect()
    }
}
