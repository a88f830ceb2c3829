//! Shared utilities: disjoint-set merging and cooperative cancellation.

pub mod cancel;
pub mod union_find;

pub use cancel::CancellationToken;
pub use union_find::UnionFind;
