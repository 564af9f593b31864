//! Request-level colorization pipeline.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::frontend::{Comparison, OutputFormat, Source};
use crate::image::{BgrImage, BGR_CHANNELS};
use crate::model::{ModelPaths, Network, NetworkHandle};

use super::{assemble, color, inference};

/// Configuration for the colorization pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model files.
    pub models: ModelPaths,

    /// Directory holding the bundled sample images.
    pub samples_dir: PathBuf,

    /// Where uploads are staged. None uses the system temporary directory.
    pub upload_dir: Option<PathBuf>,

    /// Intra-op thread count for the inference engine. None lets it decide.
    pub intra_threads: Option<usize>,

    /// Encoding of written results.
    pub output_format: OutputFormat,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelPaths::default(),
            samples_dir: PathBuf::from("samples"),
            upload_dir: None,
            intra_threads: None,
            output_format: OutputFormat::default(),
            output_quality: 95,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.intra_threads == Some(0) {
            return Err(Error::InvalidParameter {
                name: "intra_threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }
}

/// Colorizes images with a network that is loaded once and reused.
pub struct Pipeline<N = NetworkHandle> {
    config: Config,
    network: N,
}

impl Pipeline<NetworkHandle> {
    /// Create a pipeline that loads the network on its first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let network = NetworkHandle::new(config.models.clone(), config.intra_threads);
        Ok(Self { config, network })
    }

    /// Create a pipeline and load the network immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if a model file is missing, or another
    /// error if the network cannot be loaded.
    pub fn load(config: Config) -> Result<Self> {
        let mut pipeline = Self::new(config)?;

        tracing::info!("Initializing pipeline with config: {:?}", pipeline.config);
        pipeline.network.get()?;
        tracing::info!("Pipeline initialized successfully");

        Ok(pipeline)
    }

    /// Whether the network is currently loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.network.is_loaded()
    }

    /// Release the network. The next request loads it again.
    pub fn unload(&mut self) {
        self.network.unload();
    }
}

impl<N: Network> Pipeline<N> {
    /// Create a pipeline around an already constructed network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_network(config: Config, network: N) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, network })
    }

    /// The pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Colorize a BGR image, returning it alongside the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is not three-channel, the network cannot
    /// be loaded, or inference fails. No partial result is produced.
    pub fn colorize(&mut self, image: &BgrImage) -> Result<Comparison> {
        let (height, width, channels) = image.dim();
        if channels != BGR_CHANNELS {
            return Err(Error::ShapeMismatch {
                expected: format!("{BGR_CHANNELS} channel BGR image"),
                actual: format!("{channels} channels"),
            });
        }

        tracing::info!("Colorizing {width}x{height} image");

        let lab = color::bgr_to_lab(image);
        let chrominance = inference::predict_chrominance(&mut self.network, &lab)?;

        // Full-resolution L, never the 224x224 network input
        let luminance = color::luminance(&lab);

        assemble::assemble(image, &luminance, &chrominance)
    }

    /// Load an image from any frontend source and colorize it.
    ///
    /// Uploads are staged in a temporary file that is removed before this
    /// returns, whether or not colorization succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be decoded or colorization fails.
    pub fn colorize_source(&mut self, source: &Source) -> Result<Comparison> {
        tracing::info!("Processing {}", source.name());
        let image = source.load(&self.config.samples_dir, self.config.upload_dir.as_deref())?;
        self.colorize(&image)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use ndarray::{Array4, Axis};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::frontend::ChannelOrder;

    /// Stand-in for the real network: constant a/b at 56x56.
    struct ConstantNet {
        a: f32,
        b: f32,
        calls: usize,
    }

    impl ConstantNet {
        const fn new(a: f32, b: f32) -> Self {
            Self { a, b, calls: 0 }
        }
    }

    impl Network for ConstantNet {
        fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
            assert_eq!(input.shape(), &[1, 1, 224, 224]);
            self.calls += 1;
            let mut out = Array4::zeros((1, 2, 56, 56));
            out.index_axis_mut(Axis(1), 0).fill(self.a);
            out.index_axis_mut(Axis(1), 1).fill(self.b);
            Ok(out)
        }
    }

    struct FailingNet;

    impl Network for FailingNet {
        fn forward(&mut self, _input: &Array4<f32>) -> Result<Array4<f32>> {
            Err(Error::ShapeMismatch {
                expected: "anything".to_string(),
                actual: "engine failure".to_string(),
            })
        }
    }

    fn pipeline<N: Network>(network: N) -> Pipeline<N> {
        Pipeline::with_network(Config::default(), network).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_quality() {
        let config = Config {
            output_quality: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_threads() {
        let config = Config {
            intra_threads: Some(0),
            ..Config::default()
        };
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_solid_black_300x200() {
        let black = BgrImage::zeros((200, 300, 3));
        let mut pipeline = pipeline(ConstantNet::new(0.0, 0.0));

        let comparison = pipeline.colorize(&black).unwrap();
        assert_eq!(comparison.original.dim(), (200, 300, 3));
        assert_eq!(comparison.colorized.dim(), (200, 300, 3));
        assert_eq!(comparison.original, black);
        assert_eq!(comparison.channel_order, ChannelOrder::Bgr);
        assert!(comparison.colorized.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_random_images_keep_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut pipeline = pipeline(ConstantNet::new(25.0, -40.0));

        for _ in 0..4 {
            let height = rng.random_range(1..120);
            let width = rng.random_range(1..120);
            let image = BgrImage::from_shape_fn((height, width, 3), |_| rng.random());

            let comparison = pipeline.colorize(&image).unwrap();
            assert_eq!(comparison.colorized.dim(), image.dim());
        }
        assert_eq!(pipeline.network.calls, 4);
    }

    #[test]
    fn test_gray_input_tinted_by_prediction() {
        let gray = BgrImage::from_elem((50, 70, 3), 128);
        let mut pipeline = pipeline(ConstantNet::new(0.0, 60.0));

        let comparison = pipeline.colorize(&gray).unwrap();
        // Positive b pushes toward yellow: red and green above blue
        let px = comparison.colorized.slice(ndarray::s![25, 35, ..]);
        assert!(px[2_usize] > px[0_usize] && px[1_usize] > px[0_usize], "{px:?}");
    }

    #[test]
    fn test_gray_prediction_preserves_lightness() {
        let image = BgrImage::from_shape_fn((30, 40, 3), |(y, x, _)| (y * 4 + x) as u8);
        let mut pipeline = pipeline(ConstantNet::new(0.0, 0.0));

        let comparison = pipeline.colorize(&image).unwrap();
        ndarray::Zip::from(&comparison.colorized)
            .and(&image)
            .for_each(|&out, &orig| assert!(out.abs_diff(orig) <= 1, "{out} vs {orig}"));
    }

    #[test]
    fn test_network_failure_propagates() {
        let mut pipeline = pipeline(FailingNet);
        assert!(pipeline.colorize(&BgrImage::zeros((10, 10, 3))).is_err());
    }

    #[test]
    fn test_rejects_non_bgr() {
        let mut pipeline = pipeline(ConstantNet::new(0.0, 0.0));
        let err = pipeline.colorize(&BgrImage::zeros((10, 10, 4))).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        assert_eq!(pipeline.network.calls, 0);
    }

    #[test]
    fn test_lazy_pipeline_fails_fast_on_missing_model() {
        let config = Config {
            models: ModelPaths::in_dir("no/such/models"),
            ..Config::default()
        };

        let mut pipeline = Pipeline::new(config.clone()).unwrap();
        assert!(!pipeline.is_loaded());
        let err = pipeline.colorize(&BgrImage::zeros((8, 8, 3))).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));

        assert!(matches!(
            Pipeline::load(config).err(),
            Some(Error::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_upload_is_cleaned_up() {
        let uploads = tempfile::tempdir().unwrap();
        let config = Config {
            upload_dir: Some(uploads.path().to_path_buf()),
            ..Config::default()
        };
        let mut pipeline = Pipeline::with_network(config, ConstantNet::new(0.0, 0.0)).unwrap();

        // PNG signature followed by garbage: accepted as an upload, fails to decode
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(b"this is not a real png body");
        let source = Source::Upload {
            name: "broken.png".to_string(),
            bytes,
        };

        let err = pipeline.colorize_source(&source).unwrap_err();
        assert!(matches!(err, Error::UnsupportedInput { .. }), "{err}");
        assert_eq!(pipeline.network.calls, 0);

        let leftovers: Vec<_> = std::fs::read_dir(uploads.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_upload_removed_after_success() {
        let uploads = tempfile::tempdir().unwrap();
        let config = Config {
            upload_dir: Some(uploads.path().to_path_buf()),
            ..Config::default()
        };
        let mut pipeline = Pipeline::with_network(config, ConstantNet::new(5.0, 5.0)).unwrap();

        let mut bytes = Vec::new();
        RgbImage::from_pixel(4, 4, Rgb([90, 90, 90]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let source = Source::Upload {
            name: "ok.png".to_string(),
            bytes,
        };

        pipeline.colorize_source(&source).unwrap();
        assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_colorize_upload_source() {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(12, 9, Rgb([40, 40, 40]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let source = Source::Upload {
            name: "upload.png".to_string(),
            bytes,
        };

        let mut pipeline = pipeline(ConstantNet::new(10.0, 10.0));
        let comparison = pipeline.colorize_source(&source).unwrap();
        assert_eq!(comparison.colorized.dim(), (9, 12, 3));
    }
}
