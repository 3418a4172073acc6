//! Error types for fruitscan

use thiserror::Error;

/// Errors raised while turning an image into features
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The bytes or file could not be decoded as an image
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The image file could not be read
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// Image has no pixels
    #[error("image is empty: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Errors that can occur during recognition, training and artifact handling
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Feature extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Templates or model requested before they could be loaded
    #[error("not loaded: {0}")]
    NotLoaded(String),

    /// Prediction was made but fell below the acceptance threshold
    #[error("low confidence ({confidence:.2}%) for top match {label}")]
    LowConfidence { label: String, confidence: f64 },

    /// Model, scaler and label list do not belong together
    #[error("mismatched artifacts: {0}")]
    MismatchedArtifact(String),

    /// Feature vector does not match the model layout
    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLength { expected: usize, actual: usize },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Labelled image directory is missing or unusable
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Model fitting failed
    #[error("training error: {0}")]
    Training(String),

    /// Artifact encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RecognitionError {
    fn from(err: serde_json::Error) -> Self {
        RecognitionError::Serialization(err.to_string())
    }
}

/// Result type for fruitscan operations
pub type Result<T> = std::result::Result<T, RecognitionError>;
