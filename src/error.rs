//! Error types for the cheat-sheet search system
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the vector index: store persistence, rebuild, and search.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(
        "No embedding index found in '{dir}'\nSuggestion: Run 'tref rebuild-index' to build it from your cheat sheets"
    )]
    StoreNotFound { dir: PathBuf },

    #[error(
        "Embedding index is corrupted: {vectors} vectors but {metadata} metadata rows\nSuggestion: Run 'tref rebuild-index' to regenerate both files together"
    )]
    StoreCorrupt { vectors: usize, metadata: usize },

    #[error("Invalid index format: {reason}\nSuggestion: Run 'tref rebuild-index' to regenerate the index")]
    InvalidFormat { reason: String },

    #[error(
        "No cheat-sheet entries to index\nSuggestion: Add a cheat sheet with 'tref add <tool>' before rebuilding"
    )]
    EmptyCorpus,

    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse metadata record on line {line}: {source}")]
    MetadataParse {
        line: usize,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// Errors raised by the embedding encoder.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Ensure you have an internet connection for the first-time model download"
    )]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    EmbeddingFailed(String),

    #[error(
        "Embedding dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure the index and the encoder use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised by cheat-sheet file operations.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("No cheat sheet found for '{tool}'\nSuggestion: Run 'tref list' to see available cheat sheets")]
    NotFound { tool: String },

    #[error("Failed to read cheat sheet '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write cheat sheet '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cheat sheet '{path}' is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Editor '{editor}' exited with failure for '{path}'")]
    EditorFailed { editor: String, path: PathBuf },

    #[error("Failed to launch editor '{editor}': {source}")]
    EditorSpawn {
        editor: String,
        source: std::io::Error,
    },
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::StoreNotFound { .. } => "STORE_NOT_FOUND",
            Self::StoreCorrupt { .. } | Self::InvalidFormat { .. } => "STORE_CORRUPT",
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::MetadataParse { .. } => "METADATA_PARSE_ERROR",
            Self::Encoder(_) => "ENCODER_ERROR",
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Result type alias for cheat-sheet operations
pub type SheetResult<T> = Result<T, SheetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        let err = IndexError::StoreNotFound {
            dir: PathBuf::from("/tmp/tref"),
        };
        assert_eq!(err.status_code(), "STORE_NOT_FOUND");

        let err = IndexError::StoreCorrupt {
            vectors: 3,
            metadata: 5,
        };
        assert_eq!(err.status_code(), "STORE_CORRUPT");

        let err = IndexError::EmptyCorpus;
        assert_eq!(err.status_code(), "EMPTY_CORPUS");
    }

    #[test]
    fn corrupt_store_message_names_both_counts() {
        let err = IndexError::StoreCorrupt {
            vectors: 3,
            metadata: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 vectors"));
        assert!(msg.contains("5 metadata rows"));
    }
}
