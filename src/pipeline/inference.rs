//! Lightness-in, chrominance-out inference around the network.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::model::Network;

use super::color::LabImage;

/// Side length of the square lightness input the network was trained on.
pub const NETWORK_INPUT_SIZE: usize = 224;

/// Mean-centering offset subtracted from L before inference.
pub const L_MEAN: f32 = 50.0;

/// Predict a/b planes for a Lab image at its own resolution.
///
/// The L channel is resized to 224x224 and mean centered before inference.
/// The predicted planes come back at the network's output resolution and are
/// resized up to the input's height and width. The result is `H x W x 2`.
///
/// # Errors
///
/// Returns an error if the image is empty, the network fails, or the network
/// output is not a `(1, 2, h, w)` tensor.
pub fn predict_chrominance<N: Network + ?Sized>(
    network: &mut N,
    lab: &LabImage,
) -> Result<Array3<f32>> {
    let (height, width, _) = lab.dim();
    if height == 0 || width == 0 {
        return Err(Error::ShapeMismatch {
            expected: "non-empty image".to_string(),
            actual: format!("{height}x{width}"),
        });
    }

    let lightness = resize_bilinear(
        lab.index_axis(Axis(2), 0),
        NETWORK_INPUT_SIZE,
        NETWORK_INPUT_SIZE,
    );
    let input = (lightness - L_MEAN)
        .into_shape_with_order((1, 1, NETWORK_INPUT_SIZE, NETWORK_INPUT_SIZE))
        .map_err(|err| Error::ShapeMismatch {
            expected: format!("(1, 1, {NETWORK_INPUT_SIZE}, {NETWORK_INPUT_SIZE})"),
            actual: err.to_string(),
        })?;

    tracing::debug!("Running network on {:?}", input.shape());
    let output = network.forward(&input)?;

    let (batch, channels, out_h, out_w) = output.dim();
    if batch == 0 || channels != 2 || out_h == 0 || out_w == 0 {
        return Err(Error::ShapeMismatch {
            expected: "(1, 2, h, w) chrominance".to_string(),
            actual: format!("{:?}", output.shape()),
        });
    }
    tracing::debug!("Network predicted ab at {out_h}x{out_w}, resizing to {height}x{width}");

    let mut ab = Array3::<f32>::zeros((height, width, 2));
    for c in 0..2 {
        let plane = resize_bilinear(output.slice(s![0, c, .., ..]), height, width);
        ab.index_axis_mut(Axis(2), c).assign(&plane);
    }

    Ok(ab)
}

/// Bilinear resize of a float plane using pixel-center alignment.
///
/// Samples are not clamped, so planes holding Lab values survive unchanged.
///
/// # Panics
///
/// Panics if `plane` is empty while the target is not.
#[must_use]
pub fn resize_bilinear(plane: ArrayView2<'_, f32>, height: usize, width: usize) -> Array2<f32> {
    let (src_h, src_w) = plane.dim();
    let rows = taps(src_h, height);
    let cols = taps(src_w, width);

    Array2::from_shape_fn((height, width), |(y, x)| {
        let (y0, y1, fy) = rows[y];
        let (x0, x1, fx) = cols[x];

        let top = plane[[y0, x0]].mul_add(1.0 - fx, plane[[y0, x1]] * fx);
        let bottom = plane[[y1, x0]].mul_add(1.0 - fx, plane[[y1, x1]] * fx);
        top.mul_add(1.0 - fy, bottom * fy)
    })
}

/// Source indices and weight for each destination coordinate along one axis.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn taps(src: usize, dst: usize) -> Vec<(usize, usize, f32)> {
    let scale = src as f32 / dst as f32;

    (0..dst)
        .map(|i| {
            let pos = (i as f32 + 0.5).mul_add(scale, -0.5).max(0.0);
            let lo = (pos.floor() as usize).min(src - 1);
            let hi = (lo + 1).min(src - 1);
            (lo, hi, pos - lo as f32)
        })
        .collect()
}
