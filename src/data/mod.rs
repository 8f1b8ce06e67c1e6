//! Training data

pub mod dataset;

pub use dataset::Dataset;
