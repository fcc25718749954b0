//! Conversation History
//!
//! An append-only list of turns that is snapshotted to disk. Every checkpoint
//! writes the whole history to a new file named after the current local time,
//! so the lexicographically-last file in the directory is always the most
//! recent snapshot.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const HISTORY_FILE_PREFIX: &str = "conversation_";
pub const HISTORY_FILE_EXTENSION: &str = ".json";
pub const DEFAULT_CHECKPOINT_EVERY: usize = 3;

/// One user prompt and the answer that was sent back for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
    pub timestamp: String,
    #[serde(alias = "request_id")]
    pub request_id: String,
    pub language: String,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current local time.
    pub fn new(
        user: impl Into<String>,
        assistant: impl Into<String>,
        request_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            timestamp: Local::now().to_rfc3339(),
            request_id: request_id.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The in-memory history together with its backing directory.
#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    checkpoint_every: usize,
    turns: Vec<ConversationTurn>,
}

impl HistoryStore {
    /// Creates an empty store without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>, checkpoint_every: usize) -> Self {
        Self {
            dir: dir.into(),
            checkpoint_every: checkpoint_every.max(1),
            turns: Vec::new(),
        }
    }

    /// Loads the most recent snapshot in `dir`.
    ///
    /// A missing directory, an unreadable file or a corrupt snapshot is logged
    /// and results in an empty history.
    pub fn load(dir: impl Into<PathBuf>, checkpoint_every: usize) -> Self {
        let mut store = Self::new(dir, checkpoint_every);
        match store.read_latest() {
            Ok(Some((path, turns))) => {
                info!(path = %path.display(), turns = turns.len(), "Loaded conversation history");
                store.turns = turns;
            }
            Ok(None) => debug!(dir = %store.dir.display(), "No previous conversation history"),
            Err(e) => warn!(error = %e, "Starting with empty conversation history"),
        }
        store
    }

    fn read_latest(&self) -> Result<Option<(PathBuf, Vec<ConversationTurn>)>, HistoryError> {
        let Some(path) = latest_history_file(&self.dir)? else {
            return Ok(None);
        };
        let bytes = std::fs::read(&path).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        let turns = serde_json::from_slice(&bytes).map_err(|source| HistoryError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(Some((path, turns)))
    }

    /// Appends a turn and writes a checkpoint when the history length reaches
    /// a multiple of the checkpoint interval.
    ///
    /// Returns the snapshot path when a checkpoint was written. A failed
    /// checkpoint is logged and skipped; the turn stays appended.
    pub fn append(&mut self, turn: ConversationTurn) -> Option<PathBuf> {
        self.turns.push(turn);
        if self.turns.len() % self.checkpoint_every != 0 {
            return None;
        }
        match self.flush() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Skipping history checkpoint");
                None
            }
        }
    }

    /// Writes the entire history to a new snapshot file.
    pub fn flush(&self) -> Result<PathBuf, HistoryError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| HistoryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(history_file_name(Local::now()));
        let body = serde_json::to_vec_pretty(&self.turns).map_err(|source| HistoryError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, body).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), turns = self.turns.len(), "Saved conversation history");
        Ok(path)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// `conversation_YYYYMMDD_HHMMSS.json` for the given local time.
pub fn history_file_name(at: chrono::DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        HISTORY_FILE_PREFIX,
        at.format("%Y%m%d_%H%M%S"),
        HISTORY_FILE_EXTENSION
    )
}

/// The lexicographically-last history snapshot in `dir`, if any.
pub fn latest_history_file(dir: &Path) -> Result<Option<PathBuf>, HistoryError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut latest: Option<String> = None;
    for entry in entries {
        let entry = entry.map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(HISTORY_FILE_PREFIX) || !name.ends_with(HISTORY_FILE_EXTENSION) {
            continue;
        }
        if latest.as_ref().is_none_or(|current| name > *current) {
            latest = Some(name);
        }
    }
    Ok(latest.map(|name| dir.join(name)))
}
