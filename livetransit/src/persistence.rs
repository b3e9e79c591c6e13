//! Storage for the user's selection set.
//!
//! The selection survives across sessions as a JSON array of tokens under a
//! versioned key. Bumping the version abandons old selections instead of
//! misreading them.
//!
//! Callers treat every failure here as non-fatal: a failed load means "start
//! with everything visible", a failed save is logged and forgotten.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

/// Versioned key the selection is stored under.
pub const SELECTION_KEY: &str = "livetransit.selected_lines.v7";

/// File name used by [`JsonFileSelectionPersistence`].
pub const SELECTION_FILE_NAME: &str = "selected_lines.v7.json";

/// Load/save backend for the selection token set.
pub trait SelectionPersistence: Send + Sync {
    /// Load the stored tokens, or an empty list if nothing was stored yet.
    fn load(&self) -> Result<Vec<String>, PersistenceError>;

    /// Replace the stored tokens.
    fn save(&self, tokens: &[String]) -> Result<(), PersistenceError>;

    /// Human-readable location, for logs and the CLI.
    fn describe(&self) -> String;
}

/// Get the default selection file path.
pub fn default_selection_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".livetransit").join(SELECTION_FILE_NAME))
}

/// Selection stored as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSelectionPersistence {
    path: PathBuf,
}

impl JsonFileSelectionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persistence at the default location under the home directory.
    pub fn at_default_location() -> Result<Self, PersistenceError> {
        default_selection_path()
            .map(Self::new)
            .ok_or(PersistenceError::NoLocation)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SelectionPersistence for JsonFileSelectionPersistence {
    fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let tokens: Vec<String> = serde_json::from_reader(BufReader::new(file))?;
        Ok(tokens)
    }

    fn save(&self, tokens: &[String]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to temp file first, then rename over the real one
        let temp_path = self.path.with_extension("tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            serde_json::to_writer(BufWriter::new(file), tokens)?;
        }
        std::fs::rename(&temp_path, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            count = tokens.len(),
            "Saved selection"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory backend, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySelectionPersistence {
    tokens: Mutex<Option<Vec<String>>>,
}

impl MemorySelectionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with stored tokens.
    pub fn with_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: Mutex::new(Some(tokens.into_iter().map(Into::into).collect())),
        }
    }

    /// Tokens from the most recent save, if any.
    pub fn stored(&self) -> Option<Vec<String>> {
        self.tokens.lock().ok().and_then(|t| t.clone())
    }
}

impl SelectionPersistence for MemorySelectionPersistence {
    fn load(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.stored().unwrap_or_default())
    }

    fn save(&self, tokens: &[String]) -> Result<(), PersistenceError> {
        if let Ok(mut stored) = self.tokens.lock() {
            *stored = Some(tokens.to_vec());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", SELECTION_KEY)
    }
}
