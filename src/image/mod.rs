//! Image loading, layout conversion, and saving utilities.

mod load;
mod save;

pub use load::{decode_image, load_image};
pub use save::{save_image, save_rgb};

use image::{Rgb, RgbImage};
use ndarray::Array3;

/// 8-bit image in HWC layout with channels in BGR order.
pub type BgrImage = Array3<u8>;

/// Number of channels in BGR images.
pub const BGR_CHANNELS: usize = 3;

/// Convert an RGB buffer into a BGR array.
#[must_use]
pub fn from_rgb(rgb: &RgbImage) -> BgrImage {
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn(
        (height as usize, width as usize, BGR_CHANNELS),
        |(y, x, c)| {
            // Safe: x and y are bounded by the buffer dimensions which fit in u32
            #[allow(clippy::cast_possible_truncation)]
            let pixel = rgb.get_pixel(x as u32, y as u32);
            pixel[BGR_CHANNELS - 1 - c]
        },
    )
}

/// Convert a BGR array back into an RGB buffer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_rgb(bgr: &BgrImage) -> RgbImage {
    let (height, width, _) = bgr.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([bgr[[y, x, 2]], bgr[[y, x, 1]], bgr[[y, x, 0]]])
    })
}
