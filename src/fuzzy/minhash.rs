//! Seeded MinHash signatures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DedupError, Result};

/// Mersenne prime `2^61 - 1`, the modulus of the universal hash family.
const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// A MinHash signature: per permutation, the minimum permuted shingle hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    values: Vec<u64>,
}

impl MinHashSignature {
    /// Signature values, one per permutation.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the signature is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Estimated Jaccard similarity: the fraction of agreeing positions.
    pub fn similarity(&self, other: &MinHashSignature) -> f64 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }
        let agreeing = self
            .values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| a == b)
            .count();
        agreeing as f64 / self.values.len() as f64
    }
}

/// A family of `num_hashes` permutations `h -> (a*h + b) mod p`.
///
/// The coefficients are drawn from a [`StdRng`] seeded with `seed`, so equal
/// seeds produce equal signatures on every run and every machine.
#[derive(Debug, Clone)]
pub struct MinHasher {
    seed: u64,
    coefficients: Vec<(u64, u64)>,
}

impl MinHasher {
    /// Create `num_hashes` permutations from `seed`.
    pub fn new(num_hashes: usize, seed: u64) -> Result<Self> {
        if num_hashes == 0 {
            return Err(DedupError::invalid_config(
                "a MinHash signature needs at least one permutation",
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let coefficients = (0..num_hashes)
            .map(|_| {
                let a = rng.random_range(1..MERSENNE_PRIME);
                let b = rng.random_range(0..MERSENNE_PRIME);
                (a, b)
            })
            .collect();

        Ok(MinHasher { seed, coefficients })
    }

    /// Signature length.
    pub fn num_hashes(&self) -> usize {
        self.coefficients.len()
    }

    /// Seed the permutations were drawn from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Signature of a shingle hash set.
    ///
    /// Returns `None` for an empty set: such a document has nothing to
    /// compare and must not share buckets with other empty documents.
    pub fn signature(&self, shingles: &[u64]) -> Option<MinHashSignature> {
        if shingles.is_empty() {
            return None;
        }

        let mut values = vec![u64::MAX; self.coefficients.len()];
        for &shingle in shingles {
            let x = (shingle % MERSENNE_PRIME) as u128;
            for (slot, &(a, b)) in values.iter_mut().zip(&self.coefficients) {
                let permuted = ((a as u128 * x + b as u128) % MERSENNE_PRIME as u128) as u64;
                if permuted < *slot {
                    *slot = permuted;
                }
            }
        }

        Some(MinHashSignature { values })
    }
}
