//! End-to-end pipeline test: cheat sheets on disk, flattened into a
//! rebuild, persisted, then lazily loaded and searched.

use std::path::PathBuf;

use tref::{
    CheatSheetManager, Encoder, EncoderResult, IndexError, SearchEngine, Settings, VectorStore,
};

/// Deterministic stand-in for the embedding model: words hash into
/// dimensions, so texts sharing vocabulary point in similar directions.
struct WordHashEncoder {
    dimension: usize,
}

impl WordHashEncoder {
    fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.05; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let mut hash: usize = 5381;
            for b in word.bytes() {
                hash = hash.wrapping_mul(33).wrapping_add(b as usize);
            }
            embedding[hash % self.dimension] += 1.0;
        }
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        embedding.iter().map(|x| x / magnitude).collect()
    }
}

impl Encoder for WordHashEncoder {
    fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn test_settings(config_dir: PathBuf) -> Settings {
    Settings {
        config_dir: Some(config_dir),
        dimension: 48,
        ..Settings::default()
    }
}

#[test]
fn rebuild_persist_and_search_round_trip() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path().to_path_buf());

    // Seeded defaults include the git sheet with a revert entry.
    let manager = CheatSheetManager::new(&settings).unwrap();
    let inputs = manager.flatten().unwrap();
    assert!(!inputs.is_empty());

    let encoder = WordHashEncoder::new(48);
    let store = VectorStore::rebuild(inputs, &encoder, settings.chunk_size).unwrap();

    // Alignment invariant holds for the full corpus.
    for (i, entry) in store.metadata().iter().enumerate() {
        assert_eq!(entry.index as usize, i);
    }

    store.save(&settings.index_dir()).unwrap();

    // A fresh engine loads the persisted pair lazily on first search.
    let mut engine = SearchEngine::new(
        settings.index_dir(),
        Box::new(WordHashEncoder::new(48)),
        settings.cache_size,
    );

    let results = engine.search("git", "undo the previous commit", 5).unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 5);
    assert_eq!(results[0].name, "Revert last commit");
    for result in &results {
        assert_eq!(result.tool, "git");
    }
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Tool scoping is case-insensitive and unknown tools are empty.
    let upper = engine.search("GIT", "undo the previous commit", 5).unwrap();
    assert_eq!(upper, results);
    assert!(engine.search("docker", "anything", 5).unwrap().is_empty());
}

#[test]
fn search_before_rebuild_reports_store_not_found() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path().to_path_buf());

    // Cheat sheets exist but no index was ever built.
    CheatSheetManager::new(&settings).unwrap();

    let mut engine = SearchEngine::new(
        settings.index_dir(),
        Box::new(WordHashEncoder::new(48)),
        settings.cache_size,
    );
    let result = engine.search("git", "undo commit", 5);
    assert!(matches!(result, Err(IndexError::StoreNotFound { .. })));
}

#[test]
fn edited_corpus_requires_rebuild_to_change_results() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path().to_path_buf());
    let manager = CheatSheetManager::new(&settings).unwrap();

    let encoder = WordHashEncoder::new(48);
    let store =
        VectorStore::rebuild(manager.flatten().unwrap(), &encoder, settings.chunk_size).unwrap();
    store.save(&settings.index_dir()).unwrap();

    // Deleting a sheet does not touch the index until the next rebuild.
    manager.delete("tar").unwrap();
    let mut engine = SearchEngine::new(
        settings.index_dir(),
        Box::new(WordHashEncoder::new(48)),
        settings.cache_size,
    );
    assert!(!engine.search("tar", "extract files", 5).unwrap().is_empty());

    // After a rebuild the tar rows are gone.
    let rebuilt =
        VectorStore::rebuild(manager.flatten().unwrap(), &encoder, settings.chunk_size).unwrap();
    rebuilt.save(&settings.index_dir()).unwrap();
    let mut engine = SearchEngine::new(
        settings.index_dir(),
        Box::new(WordHashEncoder::new(48)),
        settings.cache_size,
    );
    assert!(engine.search("tar", "extract files", 5).unwrap().is_empty());
}
