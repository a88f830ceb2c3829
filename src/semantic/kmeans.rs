//! Seeded k-means with k-means++ initialisation.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{DedupError, Result};
use crate::semantic::distance::DistanceMetric;
use crate::util::CancellationToken;

/// A trained clustering.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Final centroids.
    pub centroids: Vec<Vec<f32>>,
    /// Centroid index of every input vector.
    pub assignments: Vec<usize>,
    /// Distance of every input vector to its centroid.
    pub distances: Vec<f32>,
    /// Iterations run.
    pub iterations: usize,
}

/// k-means trainer.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    metric: DistanceMetric,
    max_iter: usize,
    tol: f64,
    seed: u64,
}

impl KMeans {
    /// Create a trainer for `n_clusters` centroids.
    pub fn new(n_clusters: usize, metric: DistanceMetric) -> Self {
        KMeans {
            n_clusters,
            metric,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence threshold on mean centroid movement.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the initialisation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train on `vectors`.
    ///
    /// `n_clusters` is clamped to the number of vectors. Clusters that lose
    /// all members keep their previous centroid. `cancel` is checked before
    /// every iteration.
    pub fn fit(
        &self,
        vectors: &[Vec<f32>],
        cancel: Option<&CancellationToken>,
    ) -> Result<KMeansModel> {
        if vectors.is_empty() {
            return Err(DedupError::invalid_config(
                "Cannot train centroids on empty vector set",
            ));
        }
        if self.n_clusters == 0 {
            return Err(DedupError::invalid_config("n_clusters must be at least 1"));
        }

        let k = self.n_clusters.min(vectors.len());
        let mut centroids = self.init_centroids_kmeans_plus_plus(vectors, k);
        let mut assignments = self.assign(vectors, &centroids);
        let mut iterations = 0;

        while iterations < self.max_iter {
            if let Some(token) = cancel {
                token.check("k-means")?;
            }
            iterations += 1;

            let old_centroids = centroids.clone();
            self.update_centroids(vectors, &assignments, &mut centroids);
            assignments = self.assign(vectors, &centroids);

            let movement = self.compute_convergence(&old_centroids, &centroids);
            if movement < self.tol {
                debug!("k-means converged after {iterations} iterations");
                break;
            }
        }

        let (assignments, distances): (Vec<usize>, Vec<f32>) = assignments.into_iter().unzip();
        Ok(KMeansModel {
            centroids,
            assignments,
            distances,
            iterations,
        })
    }

    fn init_centroids_kmeans_plus_plus(&self, vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = Vec::with_capacity(k);

        let first_idx = rng.random_range(0..vectors.len());
        centroids.push(vectors[first_idx].clone());

        // Squared distance to the nearest chosen centroid, updated incrementally.
        let mut weights: Vec<f64> = vectors
            .iter()
            .map(|v| (self.metric.distance(v, &centroids[0]) as f64).powi(2))
            .collect();

        while centroids.len() < k {
            let total_weight: f64 = weights.iter().sum();

            let next = if total_weight <= 0.0 {
                rng.random_range(0..vectors.len())
            } else {
                let target = rng.random::<f64>() * total_weight;
                let mut cumsum = 0.0;
                let mut chosen = None;
                for (i, &weight) in weights.iter().enumerate() {
                    cumsum += weight;
                    if weight > 0.0 && cumsum >= target {
                        chosen = Some(i);
                        break;
                    }
                }
                // Rounding can leave `target` just above the final sum.
                chosen.unwrap_or_else(|| {
                    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
                })
            };

            let centroid = vectors[next].clone();
            for (weight, vector) in weights.iter_mut().zip(vectors) {
                let d = (self.metric.distance(vector, &centroid) as f64).powi(2);
                if d < *weight {
                    *weight = d;
                }
            }
            centroids.push(centroid);
        }

        centroids
    }

    fn nearest_centroid(&self, vector: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
        let mut best_cluster = 0;
        let mut best_distance = f32::INFINITY;

        for (i, centroid) in centroids.iter().enumerate() {
            let distance = self.metric.distance(vector, centroid);
            if distance < best_distance {
                best_distance = distance;
                best_cluster = i;
            }
        }

        (best_cluster, best_distance)
    }

    fn assign(&self, vectors: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<(usize, f32)> {
        if vectors.len() > 1000 {
            vectors
                .par_iter()
                .map(|vector| self.nearest_centroid(vector, centroids))
                .collect()
        } else {
            vectors
                .iter()
                .map(|vector| self.nearest_centroid(vector, centroids))
                .collect()
        }
    }

    fn update_centroids(
        &self,
        vectors: &[Vec<f32>],
        assignments: &[(usize, f32)],
        centroids: &mut [Vec<f32>],
    ) {
        let dimension = vectors[0].len();
        let mut cluster_sums = vec![vec![0.0f64; dimension]; centroids.len()];
        let mut cluster_counts = vec![0usize; centroids.len()];

        for (vector, &(cluster, _)) in vectors.iter().zip(assignments) {
            cluster_counts[cluster] += 1;
            for (sum, &value) in cluster_sums[cluster].iter_mut().zip(vector) {
                *sum += value as f64;
            }
        }

        for ((centroid, sum), &count) in centroids
            .iter_mut()
            .zip(&cluster_sums)
            .zip(&cluster_counts)
        {
            if count == 0 {
                continue;
            }
            *centroid = sum.iter().map(|&s| (s / count as f64) as f32).collect();
        }
    }

    fn compute_convergence(&self, old_centroids: &[Vec<f32>], centroids: &[Vec<f32>]) -> f64 {
        let total_movement: f64 = old_centroids
            .iter()
            .zip(centroids)
            .map(|(old, new)| DistanceMetric::L2.distance(old, new) as f64)
            .sum();
        total_movement / centroids.len() as f64
    }
}
