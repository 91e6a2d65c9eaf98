/// The main library module for tref
// Debug macro for consistent debug output
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {
        if $crate::config::is_global_debug_enabled() {
            eprintln!("DEBUG: {}", format!($($arg)*));
        }
    };
}

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod sheet;

// Explicit exports for better API clarity
pub use config::Settings;
pub use embedding::{Encoder, FastEmbedEncoder, entry_text};
pub use error::{EncoderError, EncoderResult, IndexError, IndexResult, SheetError, SheetResult};
pub use index::{
    Dimension, Entry, EntrySeed, QueryCache, ScoredEntry, SearchEngine, ToolIndex, VectorStore,
};
pub use sheet::CheatSheetManager;
