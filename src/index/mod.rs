//! Embedding index for cheat-sheet entries.
//!
//! This module implements the vector search core:
//! - Persisted vector matrix + row-aligned metadata log ([`VectorStore`])
//! - Memoized tool-name to row-index mapping ([`ToolIndex`])
//! - Bounded query-embedding cache ([`QueryCache`])
//! - Tool-scoped top-k retrieval ([`SearchEngine`])
//!
//! The central invariant: metadata row *i* always corresponds to matrix
//! row *i*. Both artifacts are regenerated together on every rebuild and
//! never patched row-wise, so they cannot drift apart.

pub mod cache;
pub mod engine;
pub mod store;
pub mod tool_index;

pub use cache::QueryCache;
pub use engine::{ScoredEntry, SearchEngine};
pub use store::{Dimension, Entry, EntrySeed, VectorStore};
pub use tool_index::ToolIndex;
