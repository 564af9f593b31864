//! # colorize
//!
//! Colorizes grayscale photos with the pretrained "colorful image colorization"
//! network.
//!
//! The network only sees lightness. Each image is converted to CIE Lab, the L
//! channel is fed to the network at 224x224, and the predicted a/b channels are
//! scaled back up and recombined with the full-resolution L channel.
//!
//! ## Example
//!
//! ```no_run
//! use colorize::{Config, Pipeline, Source};
//!
//! # fn main() -> colorize::Result<()> {
//! let mut pipeline = Pipeline::load(Config::default())?;
//!
//! let comparison = pipeline.colorize_source(&Source::Path("old_photo.jpg".into()))?;
//! colorize::image::save_image(&comparison.colorized, "colorized.png", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frontend;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use frontend::{
    output_paths, ChannelOrder, Comparison, FileDetails, OutputFormat, SampleImage, Source,
};
pub use model::{ColorizationNet, ModelPaths, Network};
pub use pipeline::{Config, Pipeline};
