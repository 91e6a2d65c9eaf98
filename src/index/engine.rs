//! Tool-scoped top-k retrieval over the vector store.
//!
//! The engine wires the query cache, the tool index, and the store
//! together around an injected [`Encoder`]. All stored vectors and query
//! vectors are unit-norm, so similarity is the plain dot product; any
//! encoder substitution must preserve unit-norm output or scores are
//! invalid.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::embedding::Encoder;
use crate::error::{IndexError, IndexResult};
use crate::index::cache::QueryCache;
use crate::index::store::VectorStore;
use crate::index::tool_index::ToolIndex;

/// One search result: entry fields plus the similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub tool: String,
    pub name: String,
    pub command: String,
    pub explanation: String,
    pub tags: Vec<String>,
    pub score: f32,
}

/// Store load lifecycle: `Ready` is the only state serving reads.
///
/// A failed load is remembered and surfaced as the same typed error on
/// every subsequent read instead of being silently re-derived.
enum StoreState {
    Unloaded,
    Ready(VectorStore),
    Failed(LoadFailure),
}

enum LoadFailure {
    NotFound,
    Corrupt { vectors: usize, metadata: usize },
    Other(String),
}

impl LoadFailure {
    fn capture(err: &IndexError) -> Self {
        match err {
            IndexError::StoreNotFound { .. } => Self::NotFound,
            IndexError::StoreCorrupt { vectors, metadata } => Self::Corrupt {
                vectors: *vectors,
                metadata: *metadata,
            },
            other => Self::Other(other.to_string()),
        }
    }

    fn to_error(&self, dir: &Path) -> IndexError {
        match self {
            Self::NotFound => IndexError::StoreNotFound {
                dir: dir.to_path_buf(),
            },
            Self::Corrupt { vectors, metadata } => IndexError::StoreCorrupt {
                vectors: *vectors,
                metadata: *metadata,
            },
            Self::Other(reason) => IndexError::InvalidFormat {
                reason: reason.clone(),
            },
        }
    }
}

/// Semantic search engine over the cheat-sheet index.
///
/// Designed for a single in-process caller issuing one query at a time.
/// The loaded store is immutable; a rebuild swaps in a whole new store
/// via [`SearchEngine::replace_store`], which also invalidates the tool
/// index memo. The query cache survives a swap: its keys are query texts
/// and their embeddings do not depend on the corpus.
pub struct SearchEngine {
    index_dir: PathBuf,
    encoder: Box<dyn Encoder>,
    state: StoreState,
    tools: ToolIndex,
    cache: QueryCache,
}

impl SearchEngine {
    /// Create an engine that lazily loads the store from `index_dir` on
    /// the first search.
    #[must_use]
    pub fn new(index_dir: PathBuf, encoder: Box<dyn Encoder>, cache_size: usize) -> Self {
        Self {
            index_dir,
            encoder,
            state: StoreState::Unloaded,
            tools: ToolIndex::new(),
            cache: QueryCache::new(cache_size),
        }
    }

    /// Create an engine around an already-built store (eager loading).
    #[must_use]
    pub fn with_store(
        index_dir: PathBuf,
        store: VectorStore,
        encoder: Box<dyn Encoder>,
        cache_size: usize,
    ) -> Self {
        Self {
            index_dir,
            encoder,
            state: StoreState::Ready(store),
            tools: ToolIndex::new(),
            cache: QueryCache::new(cache_size),
        }
    }

    /// Swap in a freshly rebuilt store.
    ///
    /// In-flight reads never observe a partial update: the old store
    /// stays intact until this whole-structure replacement.
    pub fn replace_store(&mut self, store: VectorStore) {
        self.state = StoreState::Ready(store);
        self.tools.clear();
    }

    /// The loaded store, if any.
    #[must_use]
    pub fn store(&self) -> Option<&VectorStore> {
        match &self.state {
            StoreState::Ready(store) => Some(store),
            _ => None,
        }
    }

    /// Find the `top_k` entries of `tool` most similar to `query`.
    ///
    /// Results come back highest score first. An unknown tool is a valid
    /// "no results" case, not an error. Ties on exactly equal scores
    /// break by ascending row index so results are reproducible.
    ///
    /// # Errors
    /// - `IndexError::StoreNotFound` when no index has been built yet
    /// - `IndexError::StoreCorrupt` when the persisted pair disagrees
    /// - `IndexError::Encoder` when the model fails; propagated without
    ///   retry, model load failures are not transient within a run
    pub fn search(
        &mut self,
        tool: &str,
        query: &str,
        top_k: usize,
    ) -> IndexResult<Vec<ScoredEntry>> {
        let top_k = top_k.max(1);
        self.ensure_loaded()?;
        let StoreState::Ready(store) = &self.state else {
            // ensure_loaded either leaves the state Ready or returns Err
            return Err(IndexError::StoreNotFound {
                dir: self.index_dir.clone(),
            });
        };

        let rows = self.tools.indices_for(tool, store.metadata());
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec: Vec<f32> = match self.cache.get(query) {
            Some(cached) => cached.to_vec(),
            None => {
                let vector = self.encoder.encode(query)?;
                self.cache.put(query.to_string(), vector.clone());
                vector
            }
        };
        store.dimension().validate_vector(&query_vec)?;

        let mut scored = Vec::with_capacity(rows.len());
        for &row in rows {
            let vector = store.vector(row).ok_or_else(|| IndexError::InvalidFormat {
                reason: format!("row {row} out of bounds for matrix of {} rows", store.len()),
            })?;
            scored.push((row, dot(&query_vec, vector)));
        }

        // Partial selection: isolate the top_k best without fully sorting
        // the remainder, then order just that subset.
        if scored.len() > top_k {
            scored.select_nth_unstable_by(top_k - 1, rank);
            scored.truncate(top_k);
        }
        scored.sort_unstable_by(rank);

        Ok(scored
            .into_iter()
            .map(|(row, score)| {
                let entry = &store.metadata()[row as usize];
                ScoredEntry {
                    tool: entry.tool.clone(),
                    name: entry.name.clone(),
                    command: entry.command.clone(),
                    explanation: entry.explanation.clone(),
                    tags: entry.tags.clone(),
                    score,
                }
            })
            .collect())
    }

    fn ensure_loaded(&mut self) -> IndexResult<()> {
        match &self.state {
            StoreState::Ready(_) => Ok(()),
            StoreState::Failed(failure) => Err(failure.to_error(&self.index_dir)),
            StoreState::Unloaded => match VectorStore::load(&self.index_dir) {
                Ok(store) => {
                    crate::debug_print!(
                        "loaded index with {} entries from {}",
                        store.len(),
                        self.index_dir.display()
                    );
                    self.state = StoreState::Ready(store);
                    self.tools.clear();
                    Ok(())
                }
                Err(err) => {
                    self.state = StoreState::Failed(LoadFailure::capture(&err));
                    Err(err)
                }
            },
        }
    }
}

/// Similarity of two unit-norm vectors (cosine reduces to dot product).
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Ranking order: descending score, ascending row index on exact ties.
fn rank(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEncoder;
    use crate::error::EncoderResult;
    use crate::index::store::{EntrySeed, VectorStore};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tempfile::TempDir;

    fn seed(tool: &str, name: &str, explanation: &str) -> (EntrySeed, String) {
        let seed = EntrySeed {
            tool: tool.to_string(),
            name: name.to_string(),
            command: format!("{tool} --example"),
            explanation: explanation.to_string(),
            tags: vec!["General".to_string()],
        };
        let text = crate::embedding::entry_text(name, explanation);
        (seed, text)
    }

    fn git_corpus() -> Vec<(EntrySeed, String)> {
        vec![
            seed("git", "Revert last commit", "Undo the previous commit"),
            seed("git", "List branches", "Show all local branches"),
            seed("git", "Stash changes", "Save the working tree for later"),
            seed("tar", "Extract archive", "Unpack a tarball"),
        ]
    }

    fn engine_with(corpus: Vec<(EntrySeed, String)>, dim: usize) -> SearchEngine {
        let encoder = MockEncoder::new(dim);
        let store = VectorStore::rebuild(corpus, &encoder, 256).unwrap();
        SearchEngine::with_store(
            PathBuf::from("/nonexistent"),
            store,
            Box::new(MockEncoder::new(dim)),
            200,
        )
    }

    /// Encoder that counts calls, for cache-hit assertions.
    struct CountingEncoder {
        inner: MockEncoder,
        calls: Arc<AtomicUsize>,
    }

    impl CountingEncoder {
        fn new(dim: usize, calls: Arc<AtomicUsize>) -> Self {
            Self {
                inner: MockEncoder::new(dim),
                calls,
            }
        }
    }

    impl Encoder for CountingEncoder {
        fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.encode_batch(texts)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    /// Encoder that maps every text to the same unit vector, forcing
    /// exact score ties.
    struct ConstantEncoder {
        dim: usize,
    }

    impl Encoder for ConstantEncoder {
        fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
            let mut v = vec![0.0; self.dim];
            v[0] = 1.0;
            Ok(texts.iter().map(|_| v.clone()).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    #[test]
    fn results_are_tool_scoped_and_sorted() {
        let mut engine = engine_with(git_corpus(), 64);
        let results = engine.search("git", "undo previous commit", 5).unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 5);
        for result in &results {
            assert_eq!(result.tool, "git");
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn revert_entry_ranks_first_for_undo_query() {
        let mut engine = engine_with(git_corpus(), 64);
        let results = engine.search("git", "undo previous commit", 5).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "Revert last commit");
        assert!(results[0].score > results[1].score);
        assert!(results[0].score > results[2].score);
    }

    #[test]
    fn fewer_entries_than_k_returns_all() {
        let mut engine = engine_with(git_corpus(), 64);
        let results = engine.search("tar", "unpack files", 5).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn at_most_k_results_with_partial_selection() {
        let corpus: Vec<_> = (0..20)
            .map(|i| seed("git", &format!("Command {i}"), &format!("does thing {i}")))
            .collect();
        let mut engine = engine_with(corpus, 64);

        let top3 = engine.search("git", "does thing 7", 3).unwrap();
        assert_eq!(top3.len(), 3);

        // Partial selection must agree with a full sort.
        let all = engine.search("git", "does thing 7", 20).unwrap();
        let expected: Vec<&str> = all.iter().take(3).map(|r| r.name.as_str()).collect();
        let got: Vec<&str> = top3.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn tool_matching_is_case_insensitive() {
        let mut engine = engine_with(git_corpus(), 64);
        let lower = engine.search("git", "stash work", 5).unwrap();
        let upper = engine.search("GIT", "stash work", 5).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn unknown_tool_returns_empty_not_error() {
        let mut engine = engine_with(git_corpus(), 64);
        let results = engine.search("docker", "list containers", 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn exact_ties_break_by_ascending_row_index() {
        let corpus = vec![
            seed("git", "First", "alpha"),
            seed("git", "Second", "beta"),
            seed("git", "Third", "gamma"),
        ];
        let encoder = ConstantEncoder { dim: 8 };
        let store = VectorStore::rebuild(corpus, &encoder, 256).unwrap();
        let mut engine = SearchEngine::with_store(
            PathBuf::from("/nonexistent"),
            store,
            Box::new(ConstantEncoder { dim: 8 }),
            200,
        );

        let results = engine.search("git", "anything", 2).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn repeated_query_hits_cache_not_encoder() {
        let calls = Arc::new(AtomicUsize::new(0));
        let encoder = CountingEncoder::new(64, Arc::clone(&calls));
        let store = VectorStore::rebuild(git_corpus(), &MockEncoder::new(64), 256).unwrap();
        let mut engine = SearchEngine::with_store(
            PathBuf::from("/nonexistent"),
            store,
            Box::new(encoder),
            200,
        );

        engine.search("git", "undo previous commit", 5).unwrap();
        engine.search("git", "undo previous commit", 5).unwrap();
        engine.search("git", "undo previous commit", 5).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        // Query keys are case-sensitive: a different casing must encode.
        engine.search("git", "Undo previous commit", 5).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn missing_store_surfaces_not_found_on_every_search() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = SearchEngine::new(
            temp_dir.path().to_path_buf(),
            Box::new(MockEncoder::new(64)),
            200,
        );

        let first = engine.search("git", "anything", 5);
        assert!(matches!(first, Err(IndexError::StoreNotFound { .. })));

        // The failure is remembered, not silently re-derived.
        let second = engine.search("git", "anything", 5);
        assert!(matches!(second, Err(IndexError::StoreNotFound { .. })));
    }

    #[test]
    fn lazy_load_then_search_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let encoder = MockEncoder::new(64);
        VectorStore::rebuild(git_corpus(), &encoder, 256)
            .unwrap()
            .save(temp_dir.path())
            .unwrap();

        let mut engine = SearchEngine::new(
            temp_dir.path().to_path_buf(),
            Box::new(MockEncoder::new(64)),
            200,
        );
        let results = engine.search("git", "undo previous commit", 5).unwrap();
        assert_eq!(results[0].name, "Revert last commit");
    }

    #[test]
    fn replace_store_invalidates_tool_memo() {
        let mut engine = engine_with(git_corpus(), 64);
        assert_eq!(engine.search("git", "stash work", 5).unwrap().len(), 3);

        let encoder = MockEncoder::new(64);
        let smaller = VectorStore::rebuild(
            vec![seed("git", "Only one", "a single entry")],
            &encoder,
            256,
        )
        .unwrap();
        engine.replace_store(smaller);

        let results = engine.search("git", "stash work", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Only one");
    }

    #[test]
    fn dot_product_matches_cosine_on_unit_vectors() {
        let encoder = MockEncoder::new(64);
        let a = encoder.encode("undo the last commit").unwrap();
        let b = encoder.encode("revert previous commit").unwrap();

        let dot_score = dot(&a, &b);
        let mag = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        let cosine = dot_score / (mag(&a) * mag(&b));
        assert!((dot_score - cosine).abs() < 1e-5);
    }
}
