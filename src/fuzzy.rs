//! Fuzzy (near-duplicate) detection with MinHash and locality-sensitive hashing.
//!
//! # Algorithm
//!
//! 1. **Shingling**: each document becomes the set of its character
//!    n-grams ([`shingle`]).
//! 2. **MinHash**: `num_bands × minhashes_per_band` seeded permutations
//!    reduce the shingle set to a fixed-length signature whose agreement rate
//!    with another signature estimates their Jaccard similarity ([`minhash`]).
//! 3. **Banding**: the signature is cut into `num_bands` contiguous bands,
//!    each hashed to one bucket key ([`lsh`]). Two documents sharing any
//!    bucket become candidates with probability `1 - (1 - J^r)^b`.
//! 4. **Shuffle and merge**: bucket entries are sharded by bucket key;
//!    each shard links bucket members and reduces them with a local
//!    union-find, then a central union-find merges all shards into the final
//!    connected components ([`engine`]).
//!
//! The lowest identifier of every component is kept.

pub mod engine;
pub mod lsh;
pub mod minhash;
pub mod shingle;

pub use engine::{FuzzyCluster, FuzzyMatchEngine, FuzzyResult, FuzzyStats};
pub use lsh::{LshBander, candidate_probability};
pub use minhash::{MinHashSignature, MinHasher};
pub use shingle::{char_ngrams, jaccard, shingle_hashes};
