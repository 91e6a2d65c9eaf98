//! Cheat-sheet documents: JSON CRUD, editor invocation, and flattening
//! into the entry list the index consumes.
//!
//! Each tool has one JSON file in the cheatsheets directory:
//!
//! ```json
//! {
//!   "Git Cheatsheet": {
//!     "Commits": [
//!       {"name": "...", "command": "...", "explanation": "...", "tags": []}
//!     ]
//!   }
//! }
//! ```
//!
//! Section order is meaningful (it drives tag order and row order in the
//! index), so JSON objects are read with order preserved.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::embedding::entry_text;
use crate::error::{SheetError, SheetResult};
use crate::index::EntrySeed;

/// Default cheat sheets seeded into a fresh config directory.
const DEFAULT_SHEETS: &[(&str, &str)] = &[
    ("git", include_str!("../defaults/git.json")),
    ("tar", include_str!("../defaults/tar.json")),
];

/// Title suffix stripped when deriving the tool identifier.
const TITLE_SUFFIX: &str = " Cheatsheet";

/// One item as authored in a cheat-sheet section.
#[derive(Debug, Deserialize)]
struct SheetItem {
    name: String,
    command: String,
    explanation: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Manages the per-tool cheat-sheet JSON files.
pub struct CheatSheetManager {
    cheatsheets_dir: PathBuf,
}

impl CheatSheetManager {
    /// Open the cheat-sheet directory, creating it and seeding the
    /// bundled defaults on first run (existing files are never touched).
    pub fn new(settings: &Settings) -> SheetResult<Self> {
        let cheatsheets_dir = settings.cheatsheets_dir();
        std::fs::create_dir_all(&cheatsheets_dir).map_err(|e| SheetError::FileWrite {
            path: cheatsheets_dir.clone(),
            source: e,
        })?;

        let manager = Self { cheatsheets_dir };
        manager.seed_defaults()?;
        Ok(manager)
    }

    fn seed_defaults(&self) -> SheetResult<()> {
        for (tool, contents) in DEFAULT_SHEETS {
            let path = self.sheet_path(tool);
            if !path.exists() {
                std::fs::write(&path, contents).map_err(|e| SheetError::FileWrite {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    fn sheet_path(&self, tool: &str) -> PathBuf {
        self.cheatsheets_dir.join(format!("{tool}.json"))
    }

    /// Tool names with a cheat sheet, sorted.
    pub fn list(&self) -> SheetResult<Vec<String>> {
        let entries =
            std::fs::read_dir(&self.cheatsheets_dir).map_err(|e| SheetError::FileRead {
                path: self.cheatsheets_dir.clone(),
                source: e,
            })?;

        let mut tools = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tools.push(stem.to_string());
                }
            }
        }
        tools.sort();
        Ok(tools)
    }

    /// Parse one cheat sheet into its JSON document.
    pub fn read(&self, tool: &str) -> SheetResult<Value> {
        let path = self.sheet_path(tool);
        if !path.exists() {
            return Err(SheetError::NotFound {
                tool: tool.to_string(),
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| SheetError::FileRead {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| SheetError::InvalidJson { path, source: e })
    }

    /// Open a cheat sheet in `$EDITOR` (falling back to nano).
    pub fn edit(&self, tool: &str) -> SheetResult<()> {
        let path = self.sheet_path(tool);
        if !path.exists() {
            return Err(SheetError::NotFound {
                tool: tool.to_string(),
            });
        }
        launch_editor(&path)
    }

    /// Create a new cheat sheet from a template.
    ///
    /// Returns `true` if a new file was created, `false` if the tool
    /// already had one (the caller typically opens the editor either way).
    pub fn add(&self, tool: &str) -> SheetResult<bool> {
        let path = self.sheet_path(tool);
        if path.exists() {
            return Ok(false);
        }

        let template = serde_json::json!({
            (format!("{tool}{TITLE_SUFFIX}")): {
                "General": [
                    {
                        "name": "Example Command",
                        "command": "example --option",
                        "explanation": "What this command does",
                        "tags": []
                    }
                ]
            }
        });
        let contents =
            serde_json::to_string_pretty(&template).map_err(|e| SheetError::FileWrite {
                path: path.clone(),
                source: std::io::Error::other(e),
            })?;
        std::fs::write(&path, contents).map_err(|e| SheetError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(true)
    }

    /// Delete a cheat sheet.
    pub fn delete(&self, tool: &str) -> SheetResult<()> {
        let path = self.sheet_path(tool);
        if !path.exists() {
            return Err(SheetError::NotFound {
                tool: tool.to_string(),
            });
        }
        std::fs::remove_file(&path).map_err(|e| SheetError::FileWrite { path, source: e })
    }

    /// Remove every cheat sheet and reseed the bundled defaults.
    pub fn reset(&self) -> SheetResult<()> {
        for tool in self.list()? {
            let path = self.sheet_path(&tool);
            std::fs::remove_file(&path).map_err(|e| SheetError::FileWrite { path, source: e })?;
        }
        self.seed_defaults()
    }

    /// Flatten all cheat sheets into rebuild input: one `(EntrySeed,
    /// text)` pair per item, in sheet/section/item traversal order.
    ///
    /// The tool identifier is the document title lowercased with the
    /// ` Cheatsheet` suffix stripped; the section name is appended to
    /// each item's tags. An unreadable sheet is skipped with a warning,
    /// the way a single bad file should not block a rebuild.
    pub fn flatten(&self) -> SheetResult<Vec<(EntrySeed, String)>> {
        let mut inputs = Vec::new();
        for tool in self.list()? {
            match self.flatten_sheet(&tool) {
                Ok(mut entries) => inputs.append(&mut entries),
                Err(e) => eprintln!("Skipping {tool}: {e}"),
            }
        }
        Ok(inputs)
    }

    fn flatten_sheet(&self, tool: &str) -> SheetResult<Vec<(EntrySeed, String)>> {
        let document = self.read(tool)?;
        let path = self.sheet_path(tool);

        let invalid = |msg: &str| SheetError::InvalidJson {
            path: path.clone(),
            source: serde_json::Error::io(std::io::Error::other(msg.to_string())),
        };

        let top = document
            .as_object()
            .ok_or_else(|| invalid("document root must be an object"))?;
        let (title, sections) = top
            .iter()
            .next()
            .ok_or_else(|| invalid("document has no title key"))?;
        let sections = sections
            .as_object()
            .ok_or_else(|| invalid("sections must be an object"))?;

        let tool_name = title.trim_end_matches(TITLE_SUFFIX).to_lowercase();

        let mut entries = Vec::new();
        for (section, items) in sections {
            let items = items
                .as_array()
                .ok_or_else(|| invalid("section contents must be an array"))?;
            for item in items {
                let item: SheetItem =
                    serde_json::from_value(item.clone()).map_err(|e| SheetError::InvalidJson {
                        path: path.clone(),
                        source: e,
                    })?;
                let mut tags = item.tags;
                tags.push(section.clone());
                let text = entry_text(&item.name, &item.explanation);
                entries.push((
                    EntrySeed {
                        tool: tool_name.clone(),
                        name: item.name,
                        command: item.command,
                        explanation: item.explanation,
                        tags,
                    },
                    text,
                ));
            }
        }
        Ok(entries)
    }
}

fn launch_editor(path: &Path) -> SheetResult<()> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());
    let status = Command::new(&editor)
        .arg(path)
        .status()
        .map_err(|e| SheetError::EditorSpawn {
            editor: editor.clone(),
            source: e,
        })?;
    if !status.success() {
        return Err(SheetError::EditorFailed {
            editor,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
