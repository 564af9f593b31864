//! Image saving utilities.

use std::path::Path;

use image::{DynamicImage, RgbImage};

use crate::error::{Error, Result};

use super::{to_rgb, BgrImage};

/// Save a BGR array as an image file.
///
/// The format is inferred from the extension; `quality` only applies to JPEG
/// output.
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_image<P: AsRef<Path>>(image: &BgrImage, path: P, quality: u8) -> Result<()> {
    save_rgb(to_rgb(image), path, quality)
}

/// Save an RGB buffer as an image file.
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_rgb<P: AsRef<Path>>(image: RgbImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();
    let img = DynamicImage::ImageRgb8(image);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::image::load_image;

    #[test]
    fn test_png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let bgr = Array3::from_shape_fn((3, 5, 3), |(y, x, c)| (y * 40 + x * 10 + c) as u8);

        save_image(&bgr, &path, 95).unwrap();
        assert_eq!(load_image(&path).unwrap(), bgr);
    }

    #[test]
    fn test_jpeg_quality_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let bgr = Array3::from_shape_fn((64, 64, 3), |(y, x, c)| ((y * 7) ^ (x * 13) ^ (c * 29)) as u8);

        let low = dir.path().join("low.jpg");
        let high = dir.path().join("high.jpg");
        save_image(&bgr, &low, 10).unwrap();
        save_image(&bgr, &high, 100).unwrap();

        let size = |p: &std::path::Path| std::fs::metadata(p).unwrap().len();
        assert!(size(&low) < size(&high));
    }

    #[test]
    fn test_jpeg_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let bgr = Array3::from_elem((20, 30, 3), 128u8);

        save_image(&bgr, &path, 80).unwrap();
        assert_eq!(load_image(&path).unwrap().dim(), (20, 30, 3));
    }
}
