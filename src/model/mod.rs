//! Network loading and the patched classification head.

mod head;
mod loader;

pub use head::{ChromaHead, ANNEAL_SCALE, CLASS8_AB, CONV8_313_RH, NUM_BINS};
pub use loader::{load_cluster_centers, ColorizationNet, ModelPaths, NetworkHandle};

use ndarray::Array4;

use crate::error::Result;

/// A pretrained network that predicts chrominance from lightness.
///
/// `forward` receives a mean-centered `(1, 1, H, W)` lightness tensor and
/// returns `(1, 2, h, w)` a/b planes at the network's own output resolution.
pub trait Network {
    /// Run one forward pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the inference engine fails.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;
}

impl<N: Network + ?Sized> Network for Box<N> {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        (**self).forward(input)
    }
}
