//! A DCGAN trained on MNIST handwritten digits.
//!
//! Two small convolutional networks are trained against each other: a
//! generator that maps latent noise vectors to 28x28 grayscale images and a
//! discriminator that scores images as real or generated. Training alternates
//! one discriminator step and one generator step per batch, both driven by
//! binary cross entropy against constant targets.

pub mod checkpoint;
pub mod data;
pub mod metrics;
pub mod model;
pub mod training;
pub mod utils;

pub use checkpoint::CheckpointManager;
pub use data::{MnistBatch, MnistBatcher};
pub use metrics::GanMetrics;
pub use model::{Dcgan, DcganConfig};
pub use training::{train, TrainingConfig};

// wgpu takes precedence when both backend features are enabled
#[cfg(feature = "wgpu")]
pub type MyBackend = burn::backend::Wgpu<f32>;
#[cfg(all(feature = "ndarray", not(feature = "wgpu")))]
pub type MyBackend = burn::backend::NdArray<f32>;

pub type MyAutodiffBackend = burn::backend::Autodiff<MyBackend>;
