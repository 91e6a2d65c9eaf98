//! CLI entry point for tref.
//!
//! Provides commands for managing cheat sheets and searching them
//! semantically. Main components: Cli parser, Commands enum, and the
//! command handlers wiring CheatSheetManager and SearchEngine together.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use tref::{
    CheatSheetManager, FastEmbedEncoder, IndexError, ScoredEntry, SearchEngine, Settings,
    SheetError, VectorStore, debug_print,
};

/// Standard exit codes for CLI operations.
///
/// These codes follow Unix conventions where 0 indicates success,
/// and non-zero values indicate various error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Entity not found but command executed successfully (code 3)
    NotFound = 3,

    /// File I/O error (code 5)
    IoError = 5,

    /// Index corruption detected (code 7)
    IndexCorrupted = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Cheat sheet manager with semantic search
#[derive(Parser)]
#[command(
    name = "tref",
    version = env!("CARGO_PKG_VERSION"),
    about = "Terminal cheat-sheet manager with semantic search",
    long_about = "Store command cheat sheets per tool and search them with natural language.",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// List all cheat sheets
    List,

    /// Print a cheat sheet
    Read {
        /// Tool name
        tool: String,
    },

    /// Open a cheat sheet in $EDITOR
    Edit {
        /// Tool name
        tool: String,
    },

    /// Create a new cheat sheet and open it for editing
    Add {
        /// Tool name
        tool: String,
    },

    /// Delete a cheat sheet
    Delete {
        /// Tool name
        tool: String,
    },

    /// Search a tool's cheat sheet with a natural-language query
    Search {
        /// Tool name
        tool: String,

        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Regenerate the embedding index from the current cheat sheets
    RebuildIndex,

    /// Interactive search loop (reads tool and query from stdin)
    Interactive,

    /// Display active settings
    Config,
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(ExitCode::GeneralError.into());
        }
    };
    tref::config::set_global_debug(settings.debug);
    debug_print!("config dir: {}", settings.config_dir().display());

    let code = run(&settings, cli.command);
    std::process::exit(code.into());
}

fn run(settings: &Settings, command: Commands) -> ExitCode {
    let manager = match CheatSheetManager::new(settings) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::IoError;
        }
    };

    match command {
        Commands::List => cmd_list(&manager),
        Commands::Read { tool } => cmd_read(&manager, &tool),
        Commands::Edit { tool } => cmd_edit(&manager, &tool),
        Commands::Add { tool } => cmd_add(&manager, &tool),
        Commands::Delete { tool } => cmd_delete(&manager, &tool),
        Commands::Search { tool, query, limit } => {
            cmd_search(settings, &tool, &query, limit.unwrap_or(settings.top_k))
        }
        Commands::RebuildIndex => cmd_rebuild(settings, &manager),
        Commands::Interactive => cmd_interactive(settings, &manager),
        Commands::Config => cmd_config(settings),
    }
}

fn cmd_list(manager: &CheatSheetManager) -> ExitCode {
    match manager.list() {
        Ok(tools) => {
            println!("Available cheat sheets:");
            for tool in tools {
                println!("- {tool}");
            }
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::IoError
        }
    }
}

fn cmd_read(manager: &CheatSheetManager, tool: &str) -> ExitCode {
    match manager.read(tool) {
        Ok(document) => {
            match serde_json::to_string_pretty(&document) {
                Ok(pretty) => println!("{pretty}"),
                Err(_) => println!("{document}"),
            }
            ExitCode::Success
        }
        Err(e) => sheet_error_exit(e),
    }
}

fn cmd_edit(manager: &CheatSheetManager, tool: &str) -> ExitCode {
    match manager.edit(tool) {
        Ok(()) => ExitCode::Success,
        Err(e) => sheet_error_exit(e),
    }
}

fn cmd_add(manager: &CheatSheetManager, tool: &str) -> ExitCode {
    match manager.add(tool) {
        Ok(created) => {
            if created {
                println!("Created new cheat sheet for '{tool}'");
            } else {
                println!("Cheat sheet for '{tool}' already exists. Opening for editing.");
            }
            match manager.edit(tool) {
                Ok(()) => ExitCode::Success,
                Err(e) => sheet_error_exit(e),
            }
        }
        Err(e) => sheet_error_exit(e),
    }
}

fn cmd_delete(manager: &CheatSheetManager, tool: &str) -> ExitCode {
    match manager.delete(tool) {
        Ok(()) => {
            println!("Deleted cheat sheet for '{tool}'");
            ExitCode::Success
        }
        Err(e) => sheet_error_exit(e),
    }
}

fn cmd_rebuild(settings: &Settings, manager: &CheatSheetManager) -> ExitCode {
    println!("Generating embeddings from cheat sheets...");

    let inputs = match manager.flatten() {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::IoError;
        }
    };

    let encoder = match FastEmbedEncoder::new(settings) {
        Ok(encoder) => encoder,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::GeneralError;
        }
    };

    let store = match VectorStore::rebuild(inputs, &encoder, settings.chunk_size) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::GeneralError;
        }
    };

    if let Err(e) = store.save(&settings.index_dir()) {
        eprintln!("Error: {e}");
        return ExitCode::IoError;
    }

    let sheet_count = manager.list().map(|t| t.len()).unwrap_or(0);
    println!(
        "Generated {} embeddings from {} cheat sheets",
        store.len(),
        sheet_count
    );
    ExitCode::Success
}

fn cmd_search(settings: &Settings, tool: &str, query: &str, limit: usize) -> ExitCode {
    let mut engine = match build_engine(settings) {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    match engine.search(tool, query, limit.max(1)) {
        Ok(results) => {
            if results.is_empty() {
                println!("No results found");
            } else {
                println!("Top results for '{query}':");
                print_results(&results);
            }
            ExitCode::Success
        }
        Err(e) => index_error_exit(e),
    }
}

fn cmd_interactive(settings: &Settings, manager: &CheatSheetManager) -> ExitCode {
    let mut engine = match build_engine(settings) {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let tools = match manager.list() {
        Ok(tools) => tools,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::IoError;
        }
    };
    println!("Available tools: {}", tools.join(", "));

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let Some(tool) = prompt(&mut lines, "\nEnter tool name (or 'quit'): ") else {
            println!("\nGoodbye!");
            return ExitCode::Success;
        };
        if matches!(tool.to_lowercase().as_str(), "quit" | "exit" | "q") {
            return ExitCode::Success;
        }
        if !tools.contains(&tool) {
            println!("No cheat sheet for '{tool}'. Available: {}", tools.join(", "));
            continue;
        }

        let Some(query) = prompt(&mut lines, "Enter your query: ") else {
            println!("\nGoodbye!");
            return ExitCode::Success;
        };
        if query.is_empty() {
            continue;
        }

        match engine.search(&tool, &query, settings.top_k) {
            Ok(results) if results.is_empty() => println!("\nNo results found"),
            Ok(results) => {
                println!("\nTop results:");
                print_results(&results);
            }
            Err(e) => eprintln!("\nError: {e}"),
        }
    }
}

fn cmd_config(settings: &Settings) -> ExitCode {
    println!("Active settings:");
    println!("  config_dir: {}", settings.config_dir().display());
    println!("  model: {}", settings.model);
    println!("  dimension: {}", settings.dimension);
    println!("  chunk_size: {}", settings.chunk_size);
    println!("  cache_size: {}", settings.cache_size);
    println!("  top_k: {}", settings.top_k);
    println!("  debug: {}", settings.debug);
    ExitCode::Success
}

fn build_engine(settings: &Settings) -> Result<SearchEngine, ExitCode> {
    let encoder = FastEmbedEncoder::new(settings).map_err(|e| {
        eprintln!("Error: {e}");
        ExitCode::GeneralError
    })?;
    Ok(SearchEngine::new(
        settings.index_dir(),
        Box::new(encoder),
        settings.cache_size,
    ))
}

fn prompt(
    lines: &mut std::io::Lines<std::io::StdinLock<'_>>,
    message: &str,
) -> Option<String> {
    print!("{message}");
    let _ = std::io::stdout().flush();
    match lines.next() {
        Some(Ok(line)) => Some(line.trim().to_string()),
        _ => None,
    }
}

fn print_results(results: &[ScoredEntry]) {
    for (i, result) in results.iter().enumerate() {
        println!("\n{}. {} (Score: {:.3})", i + 1, result.name, result.score);
        println!("   Command: {}", result.command);
        println!("   Explanation: {}", result.explanation);
    }
}

fn sheet_error_exit(error: SheetError) -> ExitCode {
    eprintln!("Error: {error}");
    match error {
        SheetError::NotFound { .. } => ExitCode::NotFound,
        SheetError::FileRead { .. } | SheetError::FileWrite { .. } => ExitCode::IoError,
        _ => ExitCode::GeneralError,
    }
}

fn index_error_exit(error: IndexError) -> ExitCode {
    match &error {
        // Absence of the index is advisory, not a crash: the message
        // tells the user to run rebuild-index first.
        IndexError::StoreNotFound { .. } => {
            println!("No embeddings found. Run 'tref rebuild-index' first.");
            ExitCode::NotFound
        }
        IndexError::StoreCorrupt { .. } | IndexError::InvalidFormat { .. } => {
            eprintln!("Error: {error}");
            ExitCode::IndexCorrupted
        }
        _ => {
            eprintln!("Error: {error}");
            ExitCode::GeneralError
        }
    }
}
