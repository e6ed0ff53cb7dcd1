//! Error types for kartei.

use crate::id::NoteId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for note-graph operations.
#[derive(Error, Debug)]
pub enum KastenError {
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("Ambiguous identity in {path}: found {} candidates", candidates.len())]
    AmbiguousIdentity {
        path: PathBuf,
        candidates: Vec<NoteId>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

/// Result type alias for kartei operations.
pub type Result<T> = std::result::Result<T, KastenError>;
