use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-dimension standardisation to zero mean and unit variance.
/// Dimensions with zero variance are only centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `records`, which must not be empty
    pub fn fit(records: ArrayView2<f64>) -> Self {
        let n = records.nrows() as f64;
        let mean: Array1<f64> = records.sum_axis(Axis(0)) / n;
        let scale = records
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(column, &m)| {
                let variance = column.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std == 0.0 { 1.0 } else { std }
            })
            .collect();
        Self {
            mean: mean.to_vec(),
            scale,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, records: ArrayView2<f64>) -> Array2<f64> {
        let mut out = records.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }

    pub fn transform_one(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }
}
