//! Memoized mapping from tool name to matrix row indices.

use std::collections::HashMap;

use crate::index::store::Entry;

/// Derived cache over the metadata log, not a source of truth.
///
/// Each distinct tool costs one full metadata scan on first request and
/// is memoized afterwards. The memo is cleared as a whole whenever the
/// owning store is rebuilt or reloaded; there is no partial invalidation.
#[derive(Debug, Default)]
pub struct ToolIndex {
    memo: HashMap<String, Vec<u32>>,
}

impl ToolIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row indices belonging to `tool`, matched case-insensitively.
    ///
    /// An unknown tool yields an empty slice, never an error.
    pub fn indices_for(&mut self, tool: &str, metadata: &[Entry]) -> &[u32] {
        let key = tool.to_lowercase();
        self.memo.entry(key.clone()).or_insert_with(|| {
            metadata
                .iter()
                .filter(|entry| entry.tool.to_lowercase() == key)
                .map(|entry| entry.index)
                .collect()
        })
    }

    /// Drop all memoized lookups. Called when the store is swapped.
    pub fn clear(&mut self) {
        self.memo.clear();
    }

    /// Number of distinct tools memoized so far.
    #[must_use]
    pub fn memoized_tools(&self) -> usize {
        self.memo.len()
    }
}
