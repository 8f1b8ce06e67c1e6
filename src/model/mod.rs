//! RBM layer parameters and conditional probabilities

pub mod rbm;

pub use rbm::{ModelSnapshot, RbmModel};
