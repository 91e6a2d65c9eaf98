//! Configuration module for tref.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`settings.toml` in the config directory)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TREF_`:
//! - `TREF_CACHE_SIZE=500` sets `cache_size`
//! - `TREF_TOP_K=10` sets `top_k`
//! - `TREF_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global debug flag, set once from Settings at startup.
static GLOBAL_DEBUG: AtomicBool = AtomicBool::new(false);

/// Check whether global debug output is enabled.
pub fn is_global_debug_enabled() -> bool {
    GLOBAL_DEBUG.load(Ordering::Relaxed)
}

/// Enable or disable global debug output for the process.
pub fn set_global_debug(enabled: bool) {
    GLOBAL_DEBUG.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Override for the config directory (defaults to the platform config dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,

    /// Embedding model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding dimension produced by the model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Batch size for encoding entry texts during a rebuild
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of the query embedding cache
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Default number of search results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,
}

fn default_version() -> u32 {
    1
}

fn default_model() -> String {
    "bge-small-en-v1.5".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_chunk_size() -> usize {
    256
}

fn default_cache_size() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            config_dir: None,
            model: default_model(),
            dimension: default_dimension(),
            chunk_size: default_chunk_size(),
            cache_size: default_cache_size(),
            top_k: default_top_k(),
            debug: false,
        }
    }
}

impl Settings {
    /// Load settings with layering: defaults, then `settings.toml`, then env.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, figment::Error> {
        let toml_path = config_path.unwrap_or_else(|| base_config_dir().join("settings.toml"));

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("TREF_"))
            .extract()
    }

    /// Directory holding cheat sheets, the index, and downloaded models.
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(base_config_dir)
    }

    /// Directory holding the per-tool cheat-sheet JSON files.
    pub fn cheatsheets_dir(&self) -> PathBuf {
        self.config_dir().join("cheatsheets")
    }

    /// Directory holding the persisted vector matrix and metadata log.
    pub fn index_dir(&self) -> PathBuf {
        self.config_dir()
    }

    /// Cache directory for downloaded embedding models.
    pub fn models_dir(&self) -> PathBuf {
        self.config_dir().join("models")
    }
}

/// Platform config directory for tref (`~/.config/tref` on Linux).
fn base_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tref")
}
