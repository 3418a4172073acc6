//! Handcrafted image descriptors for the forest pipeline.
//!
//! A feature vector is laid out as
//!
//! | part        | length     | content                                               |
//! |-------------|------------|-------------------------------------------------------|
//! | histogram   | `3 * bins` | R, G, B histograms, each normalised to sum 1          |
//! | texture     | 2          | contour count on the edge map, edge pixel fraction    |
//! | shape       | 4          | area, perimeter, circularity, aspect ratio            |
//! | colour      | 6          | mean R, std R, mean G, std G, mean B, std B           |
//!
//! Changing any [`FeatureLayout`] field changes the vectors, so the layout is stored
//! with every trained model and checked again when the model is loaded.

pub mod color;
pub mod contours;
pub mod preprocessing;

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, RecognitionError};

/// Current version of the vector layout described in the module docs
pub const FEATURE_LAYOUT_VERSION: u32 = 1;

const TEXTURE_LEN: usize = 2;
const SHAPE_LEN: usize = 4;
const COLOR_STATS_LEN: usize = 6;

/// Smallest side length Canny and contour tracing are run on
pub const MIN_IMAGE_SIZE: u32 = 8;

/// Parameters that determine the content of a feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLayout {
    pub version: u32,
    /// Side length the image is resized to before extraction
    pub image_size: u32,
    pub histogram_bins: usize,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Grey level above which a pixel counts as foreground for shape features
    pub binary_threshold: u8,
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self {
            version: FEATURE_LAYOUT_VERSION,
            image_size: 128,
            histogram_bins: 32,
            canny_low: 100.0,
            canny_high: 200.0,
            binary_threshold: 127,
        }
    }
}

impl FeatureLayout {
    /// Number of values in a vector produced with this layout
    pub fn len(&self) -> usize {
        3 * self.histogram_bins + TEXTURE_LEN + SHAPE_LEN + COLOR_STATS_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject parameters the extractor cannot work with
    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.version != FEATURE_LAYOUT_VERSION {
            return Err(RecognitionError::InvalidConfig(format!(
                "feature layout version {} is not supported, expected {}",
                self.version, FEATURE_LAYOUT_VERSION
            )));
        }
        if self.image_size < MIN_IMAGE_SIZE {
            return Err(RecognitionError::InvalidConfig(format!(
                "image_size must be at least {}, got {}",
                MIN_IMAGE_SIZE, self.image_size
            )));
        }
        validate_bins(self.histogram_bins)?;
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(RecognitionError::InvalidConfig(format!(
                "canny thresholds must satisfy 0 <= low <= high, got {} and {}",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}

/// Histogram bins must split `0..=255` into at least one non-empty bin each
pub(crate) fn validate_bins(bins: usize) -> Result<(), RecognitionError> {
    if bins == 0 || bins > 256 {
        return Err(RecognitionError::InvalidConfig(format!(
            "histogram_bins must be within 1..=256, got {}",
            bins
        )));
    }
    Ok(())
}

/// Fixed-length numeric summary of one image
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Decode an image file, trusting its content over its extension
pub fn open_image(path: impl AsRef<Path>) -> Result<DynamicImage, ExtractionError> {
    Ok(ImageReader::open(path.as_ref())?.with_guessed_format()?.decode()?)
}

/// Extracts feature vectors with a fixed layout
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    layout: FeatureLayout,
}

impl FeatureExtractor {
    /// Fails with `InvalidConfig` if the layout cannot be extracted
    pub fn new(layout: FeatureLayout) -> Result<Self, RecognitionError> {
        layout.validate()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Extract features from a decoded image
    pub fn extract(&self, image: &DynamicImage) -> Result<FeatureVector, ExtractionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }

        let rgb = preprocessing::resize_rgb(image, self.layout.image_size);
        let gray = preprocessing::to_grayscale(&rgb);

        let mut values = Vec::with_capacity(self.layout.len());
        values.extend(color::channel_histograms(&rgb, self.layout.histogram_bins));
        values.extend(self.texture_features(&gray));
        values.extend(self.shape_features(&gray));
        values.extend(color::channel_stats(&rgb));
        debug_assert_eq!(values.len(), self.layout.len());

        Ok(FeatureVector(values))
    }

    /// Decode an image file and extract its features
    pub fn extract_path(&self, path: impl AsRef<Path>) -> Result<FeatureVector, ExtractionError> {
        self.extract(&open_image(path)?)
    }

    /// Decode encoded image bytes and extract their features
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<FeatureVector, ExtractionError> {
        let image = image::load_from_memory(bytes)?;
        self.extract(&image)
    }

    /// Intermediate images used by the extractor, for inspection
    pub fn debug_images(&self, image: &DynamicImage) -> Result<Vec<(&'static str, GrayImage)>, ExtractionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }
        let rgb = preprocessing::resize_rgb(image, self.layout.image_size);
        let gray = preprocessing::to_grayscale(&rgb);
        let edges = preprocessing::detect_edges(&gray, self.layout.canny_low, self.layout.canny_high);
        let binary = preprocessing::binarize(&gray, self.layout.binary_threshold);
        Ok(vec![("grayscale", gray), ("edges", edges), ("binary", binary)])
    }

    /// `[contour_count, edge_density]`
    fn texture_features(&self, gray: &GrayImage) -> [f64; TEXTURE_LEN] {
        let edges = preprocessing::detect_edges(gray, self.layout.canny_low, self.layout.canny_high);
        let contour_count = contours::find_contours(&edges).len();
        let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();
        let total = (edges.width() as u64 * edges.height() as u64) as f64;
        [contour_count as f64, edge_pixels as f64 / total]
    }

    /// `[area, perimeter, circularity, aspect_ratio]` of the largest contour, zeros if none
    fn shape_features(&self, gray: &GrayImage) -> [f64; SHAPE_LEN] {
        let binary = preprocessing::binarize(gray, self.layout.binary_threshold);
        let found = contours::find_contours(&binary);
        match contours::largest_contour(&found) {
            Some(c) => [c.area(), c.perimeter(), c.circularity(), c.aspect_ratio()],
            None => [0.0; SHAPE_LEN],
        }
    }
}
