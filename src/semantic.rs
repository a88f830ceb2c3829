//! Semantic (embedding-space) near-duplicate detection.
//!
//! Embeddings are clustered with seeded k-means. Inside every cluster all
//! pairwise distances are computed in row batches, pairs closer than `eps`
//! are linked, and each connected component keeps one member chosen by the
//! configured [`KeepPolicy`].

pub mod distance;
pub mod engine;
pub mod keep_policy;
pub mod kmeans;

pub use distance::{DistanceMetric, normalize};
pub use engine::{ClusterStats, SemanticMatchEngine, SemanticResult, priorities_from_documents};
pub use keep_policy::{KeepCandidate, KeepPolicy};
pub use kmeans::{KMeans, KMeansModel};
