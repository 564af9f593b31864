//! Conversion between 8-bit BGR and floating point CIE Lab.

use ndarray::{Array2, Array3, Axis, Zip};
use palette::convert::FromColorUnclamped;
use palette::white_point::D65;
use palette::{Lab, LinSrgb, Srgb};

use crate::image::{BgrImage, BGR_CHANNELS};

/// Floating point image in HWC layout with channels (L, a, b).
///
/// L lies in [0, 100]; a and b are unbounded but stay within roughly
/// [-128, 128] for in-gamut colors.
pub type LabImage = Array3<f32>;

/// Convert an 8-bit BGR image to Lab.
///
/// Samples are scaled to [0, 1] before conversion and the result is kept at
/// full floating point precision.
#[must_use]
pub fn bgr_to_lab(image: &BgrImage) -> LabImage {
    let (height, width, _) = image.dim();
    let mut lab = Array3::<f32>::zeros((height, width, 3));

    Zip::from(lab.lanes_mut(Axis(2)))
        .and(image.lanes(Axis(2)))
        .for_each(|mut out, px| {
            let srgb = Srgb::new(
                f32::from(px[2]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[0]) / 255.0,
            );
            let linear: LinSrgb<f32> = srgb.into_linear();
            let color: Lab<D65, f32> = Lab::from_color_unclamped(linear);
            out[0] = color.l;
            out[1] = color.a;
            out[2] = color.b;
        });

    lab
}

/// Convert a Lab image to BGR with every sample clipped to [0, 1].
///
/// Predicted chrominance is not range constrained, so the unclipped result can
/// fall outside the displayable range.
#[must_use]
pub fn lab_to_bgr(lab: &LabImage) -> Array3<f32> {
    let (height, width, _) = lab.dim();
    let mut bgr = Array3::<f32>::zeros((height, width, BGR_CHANNELS));

    Zip::from(bgr.lanes_mut(Axis(2)))
        .and(lab.lanes(Axis(2)))
        .for_each(|mut out, px| {
            let linear = LinSrgb::<f32>::from_color_unclamped(Lab::<D65, f32>::new(
                px[0], px[1], px[2],
            ));
            let srgb: Srgb<f32> = Srgb::from_linear(linear);
            out[0] = srgb.blue.clamp(0.0, 1.0);
            out[1] = srgb.green.clamp(0.0, 1.0);
            out[2] = srgb.red.clamp(0.0, 1.0);
        });

    bgr
}

/// Copy the L channel out of a Lab image.
#[must_use]
pub fn luminance(lab: &LabImage) -> Array2<f32> {
    lab.index_axis(Axis(2), 0).to_owned()
}
