//! Custom error types for colorize.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the colorize library.
#[derive(Error, Debug)]
pub enum Error {
    /// A required model file is missing on disk.
    #[error("model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    /// Failed to build an ONNX session from the model files.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Failed to read the cluster-centers array.
    #[error("failed to read cluster centers from {}: {source}", path.display())]
    ClusterCenters {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Input could not be decoded as an image.
    #[error("unsupported input {name}: {source}")]
    UnsupportedInput {
        name: String,
        #[source]
        source: image::ImageError,
    },

    /// Upload is an image format the frontend does not accept.
    #[error("unsupported upload {name}: expected PNG or JPEG, got {format}")]
    UnsupportedFormat { name: String, format: String },

    /// Failed to save an image file.
    #[error("failed to save image to {}: {source}", path.display())]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for colorize operations.
pub type Result<T> = std::result::Result<T, Error>;
