//! LSH banding of MinHash signatures.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::error::{DedupError, Result};
use crate::fuzzy::minhash::MinHashSignature;

/// Probability that two documents with Jaccard similarity `jaccard` share at
/// least one of `num_bands` buckets of `rows_per_band` values.
pub fn candidate_probability(jaccard: f64, rows_per_band: usize, num_bands: usize) -> f64 {
    1.0 - (1.0 - jaccard.powi(rows_per_band as i32)).powi(num_bands as i32)
}

/// Splits signatures into bands and hashes each band to a bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LshBander {
    num_bands: usize,
    rows_per_band: usize,
}

impl LshBander {
    /// Create a bander.
    pub fn new(num_bands: usize, rows_per_band: usize) -> Result<Self> {
        if num_bands == 0 || rows_per_band == 0 {
            return Err(DedupError::invalid_config(
                "num_bands and minhashes_per_band must be at least 1",
            ));
        }
        Ok(LshBander {
            num_bands,
            rows_per_band,
        })
    }

    /// Number of bands.
    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Values per band.
    pub fn rows_per_band(&self) -> usize {
        self.rows_per_band
    }

    /// Expected signature length.
    pub fn signature_length(&self) -> usize {
        self.num_bands * self.rows_per_band
    }

    /// One bucket key per band.
    ///
    /// The key of band `i` hashes the band's values with seed `i`, so equal
    /// value runs in different bands never land in the same bucket.
    pub fn bucket_keys(&self, signature: &MinHashSignature) -> Result<Vec<u64>> {
        if signature.len() != self.signature_length() {
            return Err(DedupError::invalid_config(format!(
                "signature length {} does not match {} bands x {} rows",
                signature.len(),
                self.num_bands,
                self.rows_per_band
            )));
        }

        let mut bytes = Vec::with_capacity(self.rows_per_band * 8);
        Ok(signature
            .values()
            .chunks_exact(self.rows_per_band)
            .enumerate()
            .map(|(band, values)| {
                bytes.clear();
                for value in values {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
                xxh3_64_with_seed(&bytes, band as u64)
            })
            .collect())
    }
}
