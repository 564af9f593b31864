//! Image loading utilities.

use std::path::Path;

use image::DynamicImage;

use crate::error::{Error, Result};

use super::{from_rgb, BgrImage};

/// Load an image from disk as an 8-bit BGR array.
///
/// Any format the `image` crate can decode is accepted. Alpha is dropped and
/// grayscale inputs are expanded to three identical channels.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInput`] if the file cannot be opened or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<BgrImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::UnsupportedInput {
        name: path.display().to_string(),
        source,
    })?;

    tracing::debug!(
        "Loaded {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );

    Ok(to_bgr(&img))
}

/// Decode an in-memory image as an 8-bit BGR array.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInput`] if the bytes are not a decodable image.
pub fn decode_image(name: &str, bytes: &[u8]) -> Result<BgrImage> {
    let img = image::load_from_memory(bytes).map_err(|source| Error::UnsupportedInput {
        name: name.to_string(),
        source,
    })?;

    Ok(to_bgr(&img))
}

fn to_bgr(img: &DynamicImage) -> BgrImage {
    from_rgb(&img.to_rgb8())
}
