//! Note identities and their extraction from filenames.
//!
//! A canonical identity is a run of exactly 14 digits, typically a
//! `%Y%m%d%H%M%S` timestamp embedded in the filename. A digit run adjacent
//! to more digits is a longer run and therefore never a match.

use crate::diag::{Diagnostic, DiagnosticSink, Severity};
use crate::error::{KastenError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Length of a canonical identity.
pub const ID_LEN: usize = 14;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// Identity of a note.
///
/// Canonically 14 digits; when a filename carries no identity the raw
/// filename is used as a fallback and `is_canonical` returns false.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a proper 14-digit identity rather than a filename
    /// fallback.
    pub fn is_canonical(&self) -> bool {
        self.0.len() == ID_LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Generate a fresh identity from the current local time.
    pub fn generate() -> Self {
        Self(chrono::Local::now().format("%Y%m%d%H%M%S").to_string())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of scanning a filename for identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMatch {
    /// Exactly one 14-digit run.
    Unique(NoteId),
    /// No 14-digit run at all.
    Missing,
    /// More than one candidate; never resolved silently.
    Ambiguous(Vec<NoteId>),
}

/// All 14-digit runs in a string, in order.
pub fn find_identities(name: &str) -> Vec<NoteId> {
    DIGIT_RUN
        .find_iter(name)
        .filter(|m| m.len() == ID_LEN)
        .map(|m| NoteId::new(m.as_str()))
        .collect()
}

/// Remove every 14-digit run from a string; used to compare filename stems
/// against search terms.
pub(crate) fn strip_identities(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last = 0;
    for m in DIGIT_RUN.find_iter(name) {
        if m.len() == ID_LEN {
            out.push_str(&name[last..m.start()]);
            last = m.end();
        }
    }
    out.push_str(&name[last..]);
    out
}

/// Scan a filename for an identity.
pub fn extract_identity(file_name: &str) -> IdentityMatch {
    let mut candidates = find_identities(file_name);
    match candidates.len() {
        0 => IdentityMatch::Missing,
        1 => IdentityMatch::Unique(candidates.remove(0)),
        _ => IdentityMatch::Ambiguous(candidates),
    }
}

/// Resolve the identity for a note path at ingestion time.
///
/// Zero matches fall back to the raw filename (reported as an error);
/// multiple matches take the first (reported as a warning). Both are
/// recoverable so that a batch ingestion never aborts.
pub fn identity_for_path(path: &Path, sink: &dyn DiagnosticSink) -> NoteId {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match extract_identity(&file_name) {
        IdentityMatch::Unique(id) => id,
        IdentityMatch::Missing => {
            sink.report(Diagnostic::with_path(
                Severity::Error,
                path,
                "could not extract note identity, using filename instead",
            ));
            NoteId::new(file_name)
        }
        IdentityMatch::Ambiguous(candidates) => {
            sink.report(Diagnostic::with_path(
                Severity::Warning,
                path,
                format!(
                    "found {} identity candidates, using the first",
                    candidates.len()
                ),
            ));
            candidates.into_iter().next().expect("non-empty candidates")
        }
    }
}

/// Compute a renamed path that embeds a freshly generated identity before
/// the `.md` suffix.
///
/// A path that already carries a unique identity is returned unchanged with
/// a warning; an ambiguous filename is an error and is never resolved
/// silently.
pub fn path_with_identity(path: &Path, sink: &dyn DiagnosticSink) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match extract_identity(&file_name) {
        IdentityMatch::Missing => {
            let id = NoteId::generate();
            let new_name = match file_name.strip_suffix(".md") {
                Some(stem) => format!("{}{}.md", stem, id),
                None => format!("{}{}.md", file_name, id),
            };
            Ok(path.with_file_name(new_name))
        }
        IdentityMatch::Unique(_) => {
            sink.report(Diagnostic::with_path(
                Severity::Warning,
                path,
                "already carries an identity, leaving unchanged",
            ));
            Ok(path.to_path_buf())
        }
        IdentityMatch::Ambiguous(candidates) => Err(KastenError::AmbiguousIdentity {
            path: path.to_path_buf(),
            candidates,
        }),
    }
}
