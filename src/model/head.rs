//! Constant tail layers missing from the distributed weights.
//!
//! The released graph stops at the `conv8_313` logits. The two layers after
//! it carry fixed parameters that are patched in at load time:
//!
//! * `conv8_313_rh` scales every bin logit by [`ANNEAL_SCALE`] before the
//!   softmax, sharpening the distribution.
//! * `class8_ab` is a 1x1 convolution whose weights are the quantized ab
//!   cluster centers, turning the bin distribution into an expected a/b pair.

use ndarray::{s, Array1, Array2, Array4, Zip};

use crate::error::{Error, Result};

/// Number of quantized ab bins predicted by the network.
pub const NUM_BINS: usize = 313;

/// Softmax temperature scale applied by `conv8_313_rh`.
pub const ANNEAL_SCALE: f32 = 2.606;

/// Layer receiving the cluster centers as a 1x1 convolution weight.
pub const CLASS8_AB: &str = "class8_ab";

/// Layer receiving the constant rescaling tensor.
pub const CONV8_313_RH: &str = "conv8_313_rh";

/// The patched `conv8_313_rh` and `class8_ab` layers.
#[derive(Debug, Clone)]
pub struct ChromaHead {
    /// `(2, 313, 1, 1)` convolution weight.
    class8_ab: Array4<f32>,
    /// `(1, 313)` per-bin scale.
    conv8_313_rh: Array2<f32>,
}

impl ChromaHead {
    /// Build the head from a `(313, 2)` cluster-centers array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the array is not `313x2`.
    pub fn new(cluster_centers: &Array2<f32>) -> Result<Self> {
        if cluster_centers.dim() != (NUM_BINS, 2) {
            return Err(Error::ShapeMismatch {
                expected: format!("({NUM_BINS}, 2) cluster centers"),
                actual: format!("{:?}", cluster_centers.shape()),
            });
        }

        let class8_ab =
            Array4::from_shape_fn((2, NUM_BINS, 1, 1), |(c, k, _, _)| cluster_centers[[k, c]]);
        let conv8_313_rh = Array2::from_elem((1, NUM_BINS), ANNEAL_SCALE);

        tracing::debug!(
            "Patched {CLASS8_AB} {:?} and {CONV8_313_RH} {:?}",
            class8_ab.shape(),
            conv8_313_rh.shape()
        );

        Ok(Self {
            class8_ab,
            conv8_313_rh,
        })
    }

    /// Weight tensor of the `class8_ab` layer.
    #[must_use]
    pub const fn class8_ab(&self) -> &Array4<f32> {
        &self.class8_ab
    }

    /// Scale tensor of the `conv8_313_rh` layer.
    #[must_use]
    pub const fn conv8_313_rh(&self) -> &Array2<f32> {
        &self.conv8_313_rh
    }

    /// Decode `(N, 313, h, w)` bin logits into `(N, 2, h, w)` a/b planes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the logits do not have 313 bins.
    pub fn decode(&self, logits: &Array4<f32>) -> Result<Array4<f32>> {
        let (batch, bins, height, width) = logits.dim();
        if bins != NUM_BINS {
            return Err(Error::ShapeMismatch {
                expected: format!("{NUM_BINS} bin logits"),
                actual: format!("{:?}", logits.shape()),
            });
        }

        let scale = self.conv8_313_rh.row(0);
        let centers = self.class8_ab.slice(s![.., .., 0, 0]);

        let mut ab = Array4::<f32>::zeros((batch, 2, height, width));
        let mut probs = Array1::<f32>::zeros(NUM_BINS);

        for n in 0..batch {
            for y in 0..height {
                for x in 0..width {
                    Zip::from(&mut probs)
                        .and(logits.slice(s![n, .., y, x]))
                        .and(&scale)
                        .for_each(|p, &z, &k| *p = z * k);

                    // Shift by the max so exp() cannot overflow
                    let max = probs.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    probs.mapv_inplace(|v| (v - max).exp());
                    let total = probs.sum();

                    for c in 0..2 {
                        ab[[n, c, y, x]] = centers.row(c).dot(&probs) / total;
                    }
                }
            }
        }

        Ok(ab)
    }
}
