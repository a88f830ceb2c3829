//! Distance metrics for embedding comparison.

use serde::{Deserialize, Serialize};

/// Distance metrics for embedding comparison.
///
/// Both are true distances: `0` for identical vectors, larger means less
/// similar, so a smaller `eps` is always the stricter threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    #[default]
    Cosine,
    /// Euclidean (L2) distance
    #[serde(alias = "euclidean")]
    L2,
}

impl DistanceMetric {
    /// Calculate the distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => {
                let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    (1.0 - dot_product / (norm_a * norm_b)).max(0.0)
                }
            }
            DistanceMetric::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }
}

/// Scale `vector` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_l2_distance() {
        let metric = DistanceMetric::L2;
        assert!((metric.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&DistanceMetric::L2).unwrap(), "\"l2\"");
        let parsed: DistanceMetric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(parsed, DistanceMetric::L2);
        assert_eq!(DistanceMetric::L2.name(), "l2");
        assert!(serde_json::from_str::<DistanceMetric>("\"manhattan\"").is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
