//! Embedding generation for semantic cheat-sheet search.
//!
//! This module provides the trait and implementations for turning entry
//! texts and queries into fixed-dimension unit-norm vectors. It uses
//! fastembed with the BGESmallENV15 model by default.

use crate::config::Settings;
use crate::error::{EncoderError, EncoderResult};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Trait for generating embeddings from text.
///
/// Implementations must produce unit-norm vectors of a fixed dimension,
/// deterministic for identical input and model. The first call may block
/// on model load; callers accept that latency.
pub trait Encoder: Send + Sync {
    /// Generate embeddings for multiple texts, one per input, same order.
    fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text.
    fn encode(&self, text: &str) -> EncoderResult<Vec<f32>> {
        let mut embeddings = self.encode_batch(&[text])?;
        embeddings.pop().ok_or_else(|| {
            EncoderError::EmbeddingFailed("encoder returned no embedding".to_string())
        })
    }

    /// Get the dimension of embeddings produced by this encoder.
    fn dimension(&self) -> usize;
}

/// FastEmbed implementation using the BGE-small English model.
///
/// Produces 384-dimensional unit-norm embeddings. The model is downloaded
/// on first use and cached under the tref models directory.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedEncoder {
    /// Create a new encoder from settings.
    ///
    /// # Errors
    /// Returns an error if the model name is unknown or the model fails
    /// to initialize or download.
    pub fn new(settings: &Settings) -> EncoderResult<Self> {
        let model = resolve_model(&settings.model)?;
        let cache_dir = settings.models_dir();

        let has_cached_model = cache_dir.exists()
            && cache_dir
                .read_dir()
                .is_ok_and(|mut entries| entries.any(|_| true));

        if has_cached_model {
            eprintln!("Loading embedding model from cache...");
        } else {
            eprintln!("Downloading embedding model (first time only)...");
        }

        let text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(!has_cached_model),
        )
        .map_err(|e| EncoderError::ModelInit(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension: settings.dimension,
        })
    }
}

impl Encoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects Vec<String> for the embed method
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EncoderError::EmbeddingFailed(
                    "failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| EncoderError::EmbeddingFailed(e.to_string()))?;

        // Validate dimensions
        for embedding in embeddings.iter() {
            if embedding.len() != self.dimension {
                return Err(EncoderError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn resolve_model(name: &str) -> EncoderResult<EmbeddingModel> {
    match name {
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => Err(EncoderError::ModelInit(format!(
            "unknown embedding model '{other}' (supported: bge-small-en-v1.5, all-minilm-l6-v2)"
        ))),
    }
}

/// Build the text blob embedded for one cheat-sheet entry.
///
/// The entry name and explanation carry the searchable meaning; the raw
/// command string is deliberately left out (flag soup hurts the embedding).
pub fn entry_text(name: &str, explanation: &str) -> String {
    format!("{name} {explanation}")
}

/// Mock encoder for testing.
///
/// Generates deterministic unit-norm embeddings from word overlap with a
/// small vocabulary, so related texts score higher than unrelated ones.
#[cfg(test)]
pub struct MockEncoder {
    dimension: usize,
}

#[cfg(test)]
impl MockEncoder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.05; self.dimension];
        let lower = text.to_lowercase();

        // Bucket words into dimensions so shared vocabulary means shared
        // directions, which is all the ranking tests need.
        for word in lower.split_whitespace() {
            let mut hash: usize = 5381;
            for b in word.bytes() {
                hash = hash.wrapping_mul(33).wrapping_add(b as usize);
            }
            let slot = hash % self.dimension;
            embedding[slot] += 1.0;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }
}

#[cfg(test)]
impl Encoder for MockEncoder {
    fn encode_batch(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
