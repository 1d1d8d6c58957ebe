//! Opinion landscape engine
//!
//! Pipeline: opinion matrix → PCA → fine k-means → coarse grouping →
//! statement classification → atomic persistence.

pub mod classifier;
pub mod grouping;
pub mod kmeans;
pub mod matrix;
pub mod orchestrator;
pub mod pca;
pub mod quality;

pub use orchestrator::compute_opinion_landscape;
