//! Similarity measures used by template matching

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-8;

/// Weights used to blend histogram and pixel similarity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub histogram: f64,
    pub pixel: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            histogram: 0.6,
            pixel: 0.4,
        }
    }
}

impl SimilarityWeights {
    pub fn combine(&self, histogram_similarity: f64, pixel_similarity: f64) -> f64 {
        self.histogram * histogram_similarity + self.pixel * pixel_similarity
    }
}

/// Chi-square distance between two histograms
pub fn chi_square_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = x - y;
            diff * diff / (x + y + EPSILON)
        })
        .sum()
}

/// Histogram similarity in (0, 1], exactly 1.0 for identical histograms
pub fn histogram_similarity(a: &[f64], b: &[f64]) -> f64 {
    1.0 / (1.0 + chi_square_distance(a, b))
}

/// Correlation of two z-score normalised pixel arrays, rescaled from [-1, 1] to [0, 1]
pub fn pixel_similarity(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (mean_a, std_a) = mean_std(&a[..n]);
    let (mean_b, std_b) = mean_std(&b[..n]);

    let correlation = a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(&x, &y)| {
            let za = (x as f64 - mean_a) / (std_a + EPSILON);
            let zb = (y as f64 - mean_b) / (std_b + EPSILON);
            za * zb
        })
        .sum::<f64>()
        / n as f64;

    ((correlation + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn mean_std(values: &[f32]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}
