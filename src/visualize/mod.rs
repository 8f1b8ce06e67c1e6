//! Data for external renderers
//!
//! Nothing here draws. Each collaborator turns trainer or model state into
//! plain values a plotting front end can consume:
//! - weights: per-unit receptive fields and weight histograms
//! - error_curve: per-step samples taken while driving a training run
//! - heatmap: (col, row, value) cells for square images

pub mod error_curve;
pub mod heatmap;
pub mod weights;

pub use error_curve::{CurvePoint, ErrorCurve, DEFAULT_FRAMES};
pub use heatmap::{heatmap, HeatmapCell};
pub use weights::{Histogram, TileShape, WeightsView};
