//! Note representation and parsing.

use crate::diag::{Diagnostic, DiagnosticSink, Severity};
use crate::error::Result;
use crate::id::{self, NoteId};
use crate::scanner::{LineRecord, Scanner};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// Link token: double brackets around exactly 14 digits.
pub(crate) static LINK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([0-9]{14})\]\]").unwrap());

// Tag marker: a `#` immediately followed by a non-whitespace run.
static TAG_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\S+)").unwrap());

/// Heading path entry under which derived backlinks live.
pub(crate) const BACKLINKS_SECTION: &str = "backlinks";

/// A note in the graph.
///
/// Created by parsing, mutated only by re-parse through
/// [`Zettelkasten::reload`](crate::Zettelkasten::reload). Depth and
/// backlinks are derived views owned by the graph, not stored here.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: NoteId,

    /// Filesystem path the note was parsed from.
    pub path: PathBuf,

    /// Unset until a level-1 heading is found.
    pub title: Option<String>,

    pub tags: BTreeSet<String>,

    /// Outbound link identities in encounter order, duplicates allowed.
    pub links: Vec<NoteId>,
}

impl Note {
    /// Parse a note from scanned line records.
    pub fn parse<I>(id: NoteId, path: PathBuf, records: I, sink: &dyn DiagnosticSink) -> Self
    where
        I: IntoIterator<Item = LineRecord>,
    {
        let mut note = Note {
            id,
            path,
            title: None,
            tags: BTreeSet::new(),
            links: Vec::new(),
        };

        for record in records {
            if record.section_path.len() == 1 {
                let candidate = record.section_path[0].trim();
                match &note.title {
                    None => note.title = Some(candidate.to_string()),
                    Some(title) if title != candidate => {
                        sink.report(Diagnostic::with_path(
                            Severity::Warning,
                            &note.path,
                            format!("multiple titles, keeping {:?}", title),
                        ));
                    }
                    Some(_) => {}
                }
            }

            if !record.in_code_block && is_tags_line(&record.text) {
                if !note.tags.is_empty() {
                    sink.report(Diagnostic::with_path(
                        Severity::Warning,
                        &note.path,
                        "tags were already set, overwriting",
                    ));
                }
                note.tags = read_tags(&record.text);
            }

            // Content under a "Backlinks" section is derived output, not
            // authored links.
            if !in_backlinks_section(&record.section_path) {
                for caps in LINK_TOKEN.captures_iter(&record.text) {
                    note.links.push(NoteId::from(&caps[1]));
                }
            }
        }

        note
    }

    /// Scan and parse a note from raw content.
    pub fn from_content(
        id: NoteId,
        path: impl Into<PathBuf>,
        content: &str,
        sink: &dyn DiagnosticSink,
    ) -> Self {
        let path = path.into();
        Self::parse(id, path.clone(), Scanner::new(content), sink)
    }

    /// Load and parse a note from disk, deriving the identity from the
    /// filename.
    pub fn load(path: &Path, sink: &dyn DiagnosticSink) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let id = id::identity_for_path(path, sink);
        Ok(Self::from_content(id, path, &content, sink))
    }

    /// Filename without the `.md` extension.
    pub fn stem(&self) -> &str {
        self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// Title, or the empty string when no level-1 heading was found.
    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Outbound link targets with duplicates removed, as an edge set.
    pub fn link_set(&self) -> BTreeSet<NoteId> {
        self.links.iter().cloned().collect()
    }
}

/// Whether a line is a tags line: trimmed, case-folded text starting with
/// `tags:`.
pub(crate) fn is_tags_line(line: &str) -> bool {
    line.trim().to_lowercase().starts_with("tags:")
}

/// Tokenize a tags line into the stripped tag set.
pub(crate) fn read_tags(line: &str) -> BTreeSet<String> {
    TAG_MARKER
        .captures_iter(line)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub(crate) fn in_backlinks_section(section_path: &[String]) -> bool {
    section_path
        .get(1)
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(BACKLINKS_SECTION))
}

/// Serializable projection of a note for external renderers and search UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: NoteId,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tags: BTreeSet<String>,
    pub links: Vec<NoteId>,
    pub depth: u32,
}
