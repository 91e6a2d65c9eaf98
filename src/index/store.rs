//! Persisted vector matrix and row-aligned metadata log.
//!
//! # Storage Format
//!
//! Two artifacts live side by side in the index directory and are always
//! written together from the same entry ordering:
//! - `vectors.bin`: header (magic, version, dimension, row count) followed
//!   by row-major unit-norm vectors as little-endian f16 values
//! - `meta.jsonl`: one JSON record per line with fields
//!   `{tool, name, command, explanation, tags, index}`, where `index`
//!   equals the line ordinal and the matrix row
//!
//! There is no single-row write path. Any change to the source cheat
//! sheets requires a full rebuild, which replaces both files atomically
//! via temp-file rename.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use half::f16;
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::embedding::Encoder;
use crate::error::{EncoderError, IndexError, IndexResult};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the vectors-file header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes identifying tref vector files.
const MAGIC_BYTES: &[u8; 4] = b"TREF";

/// Number of bytes per stored f16 value.
const BYTES_PER_F16: usize = 2;

/// File name of the vector matrix artifact.
pub const VECTORS_FILE: &str = "vectors.bin";

/// File name of the metadata log artifact.
pub const METADATA_FILE: &str = "meta.jsonl";

/// Type-safe wrapper for the embedding dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension(usize);

impl Dimension {
    /// Creates a new `Dimension` with validation.
    pub fn new(dim: usize) -> IndexResult<Self> {
        if dim == 0 {
            return Err(IndexError::InvalidFormat {
                reason: "vector dimension cannot be zero".to_string(),
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), EncoderError> {
        if vector.len() != self.0 {
            return Err(EncoderError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// One retrievable cheat-sheet entry, as persisted in the metadata log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Lowercase tool identifier grouping entries (non-empty)
    pub tool: String,
    pub name: String,
    pub command: String,
    pub explanation: String,
    /// Source tags plus the section name, in traversal order
    pub tags: Vec<String>,
    /// Dense 0-based row position in the embedding matrix
    pub index: u32,
}

/// An entry before it has been assigned a row index by a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySeed {
    pub tool: String,
    pub name: String,
    pub command: String,
    pub explanation: String,
    pub tags: Vec<String>,
}

impl EntrySeed {
    fn into_entry(self, index: u32) -> Entry {
        Entry {
            tool: self.tool,
            name: self.name,
            command: self.command,
            explanation: self.explanation,
            tags: self.tags,
            index,
        }
    }
}

/// The persisted matrix of entry embeddings and the parallel metadata
/// records, held in memory as f32 rows.
///
/// Created only by [`VectorStore::rebuild`] or [`VectorStore::load`];
/// immutable afterwards. A rebuild produces a whole new store which the
/// caller swaps in, so in-flight readers never observe a partial update.
#[derive(Debug)]
pub struct VectorStore {
    matrix: Vec<Vec<f32>>,
    metadata: Vec<Entry>,
    dimension: Dimension,
}

impl VectorStore {
    /// Rebuild the store from flattened cheat-sheet entries.
    ///
    /// Assigns each entry a row index equal to its position in `inputs`,
    /// encodes the text blobs in `chunk_size` batches to bound peak
    /// memory, and pairs each resulting vector with its metadata row.
    ///
    /// # Errors
    /// Returns `IndexError::EmptyCorpus` when `inputs` is empty, before
    /// anything is written: an empty index is ambiguous with "not yet
    /// built" and must never clobber a prior good one.
    pub fn rebuild(
        inputs: Vec<(EntrySeed, String)>,
        encoder: &dyn Encoder,
        chunk_size: usize,
    ) -> IndexResult<Self> {
        if inputs.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let dimension = Dimension::new(encoder.dimension())?;
        let chunk_size = chunk_size.max(1);

        let (seeds, texts): (Vec<EntrySeed>, Vec<String>) = inputs.into_iter().unzip();

        let mut matrix = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(chunk_size) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let mut vectors = encoder.encode_batch(&refs)?;
            if vectors.len() != refs.len() {
                return Err(EncoderError::EmbeddingFailed(format!(
                    "encoder returned {} embeddings for {} texts",
                    vectors.len(),
                    refs.len()
                ))
                .into());
            }
            for vector in &vectors {
                dimension.validate_vector(vector)?;
            }
            matrix.append(&mut vectors);
        }

        let metadata: Vec<Entry> = seeds
            .into_iter()
            .enumerate()
            .map(|(i, seed)| seed.into_entry(i as u32))
            .collect();

        debug_assert_eq!(matrix.len(), metadata.len());

        Ok(Self {
            matrix,
            metadata,
            dimension,
        })
    }

    /// Write both artifacts into `dir`, replacing any prior index.
    ///
    /// Each file is written to a temp file in the same directory and
    /// renamed into place, so readers see either the old pair or the new
    /// pair of that file, never a torn write.
    pub fn save(&self, dir: &Path) -> IndexResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| IndexError::FileWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

        self.save_vectors(dir)?;
        self.save_metadata(dir)?;
        Ok(())
    }

    fn save_vectors(&self, dir: &Path) -> IndexResult<()> {
        let path = dir.join(VECTORS_FILE);
        let write_err = |e: std::io::Error| IndexError::FileWrite {
            path: path.clone(),
            source: e,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(MAGIC_BYTES).map_err(write_err)?;
        tmp.write_all(&STORAGE_VERSION.to_le_bytes())
            .map_err(write_err)?;
        tmp.write_all(&(self.dimension.get() as u32).to_le_bytes())
            .map_err(write_err)?;
        tmp.write_all(&(self.matrix.len() as u32).to_le_bytes())
            .map_err(write_err)?;

        let mut row_buf = Vec::with_capacity(self.dimension.get() * BYTES_PER_F16);
        for vector in &self.matrix {
            row_buf.clear();
            for &value in vector {
                row_buf.extend_from_slice(&f16::from_f32(value).to_le_bytes());
            }
            tmp.write_all(&row_buf).map_err(write_err)?;
        }
        tmp.flush().map_err(write_err)?;

        tmp.persist(&path).map_err(|e| IndexError::FileWrite {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    fn save_metadata(&self, dir: &Path) -> IndexResult<()> {
        let path = dir.join(METADATA_FILE);
        let write_err = |e: std::io::Error| IndexError::FileWrite {
            path: path.clone(),
            source: e,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        for entry in &self.metadata {
            let line = serde_json::to_string(entry).map_err(|e| IndexError::FileWrite {
                path: path.clone(),
                source: std::io::Error::other(e),
            })?;
            tmp.write_all(line.as_bytes()).map_err(write_err)?;
            tmp.write_all(b"\n").map_err(write_err)?;
        }
        tmp.flush().map_err(write_err)?;

        tmp.persist(&path).map_err(|e| IndexError::FileWrite {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    /// Load a previously saved store from `dir`.
    ///
    /// # Errors
    /// - `IndexError::StoreNotFound` if either artifact is absent
    /// - `IndexError::StoreCorrupt` if the matrix and metadata row counts
    ///   disagree (verified on every load, never assumed)
    /// - `IndexError::InvalidFormat` for a malformed header or misaligned
    ///   metadata indices
    pub fn load(dir: &Path) -> IndexResult<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        if !vectors_path.exists() || !metadata_path.exists() {
            return Err(IndexError::StoreNotFound {
                dir: dir.to_path_buf(),
            });
        }

        let (matrix, dimension) = Self::load_vectors(&vectors_path)?;
        let metadata = Self::load_metadata(&metadata_path)?;

        if matrix.len() != metadata.len() {
            return Err(IndexError::StoreCorrupt {
                vectors: matrix.len(),
                metadata: metadata.len(),
            });
        }

        Ok(Self {
            matrix,
            metadata,
            dimension,
        })
    }

    fn load_vectors(path: &Path) -> IndexResult<(Vec<Vec<f32>>, Dimension)> {
        let file = File::open(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| IndexError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                })?
        };

        if mmap.len() < HEADER_SIZE {
            return Err(IndexError::InvalidFormat {
                reason: "vectors file too small to contain header".to_string(),
            });
        }
        if &mmap[0..4] != MAGIC_BYTES {
            return Err(IndexError::InvalidFormat {
                reason: "vectors file has invalid magic bytes".to_string(),
            });
        }

        let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
        if version != STORAGE_VERSION {
            return Err(IndexError::InvalidFormat {
                reason: format!(
                    "unsupported storage version {version} (expected {STORAGE_VERSION})"
                ),
            });
        }

        let dim = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
        let dimension = Dimension::new(dim)?;
        let count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

        let row_size = dim * BYTES_PER_F16;
        let expected_len = HEADER_SIZE + count * row_size;
        if mmap.len() != expected_len {
            return Err(IndexError::InvalidFormat {
                reason: format!(
                    "vectors file length {} does not match header ({count} rows of dimension {dim})",
                    mmap.len()
                ),
            });
        }

        let mut matrix = Vec::with_capacity(count);
        for row in 0..count {
            let base = HEADER_SIZE + row * row_size;
            let mut vector = Vec::with_capacity(dim);
            for i in 0..dim {
                let offset = base + i * BYTES_PER_F16;
                let value = f16::from_le_bytes([mmap[offset], mmap[offset + 1]]);
                vector.push(value.to_f32());
            }
            matrix.push(vector);
        }

        Ok((matrix, dimension))
    }

    fn load_metadata(path: &Path) -> IndexResult<Vec<Entry>> {
        let file = File::open(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let mut metadata = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IndexError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: Entry = serde_json::from_str(&line).map_err(|e| {
                IndexError::MetadataParse {
                    line: line_no + 1,
                    source: e,
                }
            })?;
            if entry.index as usize != metadata.len() {
                return Err(IndexError::InvalidFormat {
                    reason: format!(
                        "metadata row {} carries index {} (rows must be dense and ordered)",
                        metadata.len(),
                        entry.index
                    ),
                });
            }
            metadata.push(entry);
        }

        Ok(metadata)
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// All metadata rows, in matrix row order.
    #[must_use]
    pub fn metadata(&self) -> &[Entry] {
        &self.metadata
    }

    /// The embedding vector for a matrix row.
    #[must_use]
    pub fn vector(&self, row: u32) -> Option<&[f32]> {
        self.matrix.get(row as usize).map(Vec::as_slice)
    }

    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}
