use serde::{Deserialize, Serialize};

/// Closed border traced around a region of a binary image
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Contour {
    /// Returns `None` for an empty point list
    pub fn from_points(points: Vec<(i32, i32)>) -> Option<Self> {
        let (first_x, first_y) = *points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first_x, first_y, first_x, first_y);
        for &(x, y) in &points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self {
            points,
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1) as u32
    }

    /// Polygon area enclosed by the border points (shoelace formula)
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice_area = 0.0;
        for i in 0..n {
            let (x0, y0) = self.points[i];
            let (x1, y1) = self.points[(i + 1) % n];
            twice_area += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
        }
        (twice_area / 2.0).abs()
    }

    /// Length of the closed polyline through the border points
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                let dx = (x1 - x0) as f64;
                let dy = (y1 - y0) as f64;
                (dx * dx + dy * dy).sqrt()
            })
            .sum()
    }

    /// Circularity = 4π × area / perimeter², 1.0 for an ideal disc
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter == 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }
}

/// Label and score pair, score expressed as a percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    #[serde(rename = "fruit")]
    pub label: String,
    pub confidence: f64,
}

impl ClassScore {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Whether a prediction is trustworthy enough to act on
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept,
    Reject { reason: String },
}

/// How the class scores of a prediction were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// One probability per known class, in label order
    Probabilities,
    /// Highest scoring classes, best first
    Ranked,
}

/// Outcome of classifying one image
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    /// Winning score in percent, within [0, 100]
    pub confidence: f64,
    pub scores: Vec<ClassScore>,
    pub score_kind: ScoreKind,
    pub decision: Decision,
}

impl Prediction {
    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, Decision::Accept)
    }

    /// Turn a rejected prediction into a `LowConfidence` error
    pub fn into_accepted(self) -> crate::Result<Self> {
        match self.decision {
            Decision::Accept => Ok(self),
            Decision::Reject { .. } => Err(crate::RecognitionError::LowConfidence {
                label: self.label,
                confidence: self.confidence,
            }),
        }
    }

    /// The best `k` class scores, best first
    pub fn top(&self, k: usize) -> Vec<ClassScore> {
        match self.score_kind {
            ScoreKind::Ranked => self.scores.iter().take(k).cloned().collect(),
            ScoreKind::Probabilities => {
                let mut ranked = self.scores.clone();
                ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                ranked.truncate(k);
                ranked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: i32) -> Contour {
        let mut points = Vec::new();
        for x in 0..side {
            points.push((x, 0));
        }
        for y in 0..side {
            points.push((side, y));
        }
        for x in (1..=side).rev() {
            points.push((x, side));
        }
        for y in (1..=side).rev() {
            points.push((0, y));
        }
        Contour::from_points(points).unwrap()
    }

    #[test]
    fn square_geometry() {
        let c = square(10);
        assert!((c.area() - 100.0).abs() < 1e-9);
        assert!((c.perimeter() - 40.0).abs() < 1e-9);
        assert!((c.circularity() - std::f64::consts::PI / 4.0).abs() < 1e-9);
        assert_eq!(c.aspect_ratio(), 1.0);
    }

    #[test]
    fn single_point_has_zero_circularity() {
        let c = Contour::from_points(vec![(3, 4)]).unwrap();
        assert_eq!(c.area(), 0.0);
        assert_eq!(c.perimeter(), 0.0);
        assert_eq!(c.circularity(), 0.0);
        assert_eq!(c.width(), 1);
    }

    #[test]
    fn rejected_prediction_becomes_low_confidence() {
        let p = Prediction {
            label: "Apple".into(),
            confidence: 42.0,
            scores: vec![],
            score_kind: ScoreKind::Probabilities,
            decision: Decision::Reject {
                reason: "too low".into(),
            },
        };
        match p.into_accepted() {
            Err(crate::RecognitionError::LowConfidence { label, confidence }) => {
                assert_eq!(label, "Apple");
                assert_eq!(confidence, 42.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
