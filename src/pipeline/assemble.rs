//! Recombine lightness and predicted chrominance into a display image.

use ndarray::{concatenate, Array2, Array3, Axis};

use crate::error::{Error, Result};
use crate::frontend::{ChannelOrder, Comparison};
use crate::image::BgrImage;

use super::color::{lab_to_bgr, LabImage};

/// Build the original/colorized pair from full-resolution L and a/b planes.
///
/// `luminance` must come from the original-resolution conversion. Neither
/// input nor `original` is modified.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the planes disagree on size.
pub fn assemble(
    original: &BgrImage,
    luminance: &Array2<f32>,
    chrominance: &Array3<f32>,
) -> Result<Comparison> {
    let (height, width) = luminance.dim();
    if chrominance.dim() != (height, width, 2) {
        return Err(Error::ShapeMismatch {
            expected: format!("({height}, {width}, 2) chrominance"),
            actual: format!("{:?}", chrominance.shape()),
        });
    }

    let lab: LabImage = concatenate(
        Axis(2),
        &[luminance.view().insert_axis(Axis(2)), chrominance.view()],
    )
    .map_err(|err| Error::ShapeMismatch {
        expected: "L, a, b planes of equal size".to_string(),
        actual: err.to_string(),
    })?;

    Ok(Comparison {
        original: original.clone(),
        colorized: to_display(&lab_to_bgr(&lab)),
        channel_order: ChannelOrder::Bgr,
    })
}

/// Rescale clipped [0, 1] samples to 8-bit.
///
/// Uses a truncating cast, so `0.999` maps to 254 rather than 255.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_display(image: &Array3<f32>) -> BgrImage {
    // Safe: clamped to [0, 255] before casting
    image.mapv(|v| (255.0 * v).clamp(0.0, 255.0) as u8)
}
