//! The note graph.
//!
//! Owns all parsed notes keyed by identity and a directed adjacency
//! structure over them. Edges may dangle: a link to an identity that no
//! note carries is legal and never aborts ingestion.
//!
//! Derived views (root, depth, backlinks, orphans) are pure functions of
//! the current edge set. They are cached behind a generation counter that
//! is bumped on every structural mutation; the counter, not object
//! identity, is the cache key.

use crate::config::{KastenConfig, RootSelection};
use crate::diag::{Diagnostic, DiagnosticSink, LogSink, Severity};
use crate::error::{KastenError, Result};
use crate::id::{self, NoteId};
use crate::note::{Note, NoteSummary};
use glob::glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Depth reported for notes unreachable from the root.
pub const DEFAULT_DEPTH: u32 = 0;

/// Directory names never descended into during ingestion.
const VCS_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

/// Derived views, valid for exactly one generation.
#[derive(Debug, Default)]
struct DerivedCache {
    generation: u64,
    valid: bool,
    /// All node identities: every note plus every (possibly dangling)
    /// link target.
    nodes: BTreeSet<NoteId>,
    root: Option<NoteId>,
    /// Predecessor sets, one entry per node.
    backlinks: BTreeMap<NoteId, BTreeSet<NoteId>>,
    /// Shortest-path edge counts from the root; reachable nodes only.
    depths: BTreeMap<NoteId, u32>,
}

/// Aggregate numbers for the whole graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub notes: usize,
    pub tags: usize,
    pub orphans: usize,
    pub links: usize,
}

/// A directed graph of notes, keyed by identity.
pub struct Zettelkasten {
    notes: BTreeMap<NoteId, Note>,
    /// Outbound edge sets, keyed by source note identity.
    outgoing: BTreeMap<NoteId, BTreeSet<NoteId>>,
    config: KastenConfig,
    sink: Rc<dyn DiagnosticSink>,
    generation: u64,
    cache: RefCell<DerivedCache>,
}

impl Default for Zettelkasten {
    fn default() -> Self {
        Self::new(KastenConfig::default())
    }
}

impl Zettelkasten {
    pub fn new(config: KastenConfig) -> Self {
        Self::with_sink(config, Rc::new(LogSink))
    }

    pub fn with_sink(config: KastenConfig, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            notes: BTreeMap::new(),
            outgoing: BTreeMap::new(),
            config,
            sink,
            generation: 0,
            cache: RefCell::new(DerivedCache::default()),
        }
    }

    pub fn config(&self) -> &KastenConfig {
        &self.config
    }

    pub(crate) fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    /// Current structural generation. Bumped on every mutation; derived
    /// caches are keyed on it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // Extending the collection
    // ========================================================================

    /// Insert or replace a note and its edge set.
    pub fn insert(&mut self, note: Note) {
        self.outgoing.insert(note.id.clone(), note.link_set());
        self.notes.insert(note.id.clone(), note);
        self.generation += 1;
    }

    pub fn add_notes(&mut self, notes: impl IntoIterator<Item = Note>) {
        for note in notes {
            self.insert(note);
        }
    }

    /// Recursively ingest every markdown document under `directory`,
    /// skipping version-control metadata directories. Unreadable documents
    /// are reported and skipped; the batch never aborts. Identity
    /// collisions across files resolve to the last ingested note.
    pub fn ingest_directory(&mut self, directory: &Path) -> Result<usize> {
        let pattern = directory.join("**/*.md");
        let mut added = 0;

        for entry in glob(&pattern.to_string_lossy())? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    self.sink.report(Diagnostic::new(
                        Severity::Warning,
                        format!("glob error: {}", e),
                    ));
                    continue;
                }
            };
            if in_vcs_dir(&path, directory) {
                continue;
            }
            match Note::load(&path, self.sink.as_ref()) {
                Ok(note) => {
                    self.insert(note);
                    added += 1;
                }
                Err(e) => {
                    self.sink.report(Diagnostic::with_path(
                        Severity::Error,
                        &path,
                        format!("could not read note: {}", e),
                    ));
                }
            }
        }

        self.sink.report(Diagnostic::new(
            Severity::Info,
            format!("added {} notes from {}", added, directory.display()),
        ));
        Ok(added)
    }

    /// Re-parse the note at its existing path, replacing its edge set.
    pub fn reload(&mut self, id: &NoteId) -> Result<()> {
        let path = self.require(id)?.path.clone();
        let note = Note::load(&path, self.sink.as_ref())?;
        self.insert(note);
        Ok(())
    }

    // Lookup
    // ========================================================================

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn require(&self, id: &NoteId) -> Result<&Note> {
        self.notes
            .get(id)
            .ok_or_else(|| KastenError::NoteNotFound(id.clone()))
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    /// All notes, ordered by identity.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Look a note up by filename.
    ///
    /// # Panics
    ///
    /// Exactly one note must match; anything else is a programming error on
    /// the caller's side, not bad input.
    pub fn get_by_path(&self, path: &Path) -> &Note {
        let name = path.file_name();
        let matches: Vec<&Note> = self
            .notes
            .values()
            .filter(|n| n.path.file_name() == name)
            .collect();
        assert_eq!(
            matches.len(),
            1,
            "expected exactly one note at {}, found {}",
            path.display(),
            matches.len()
        );
        matches[0]
    }

    // Derived views
    // ========================================================================

    fn refresh_cache(&self) {
        let mut cache = self.cache.borrow_mut();
        if cache.valid && cache.generation == self.generation {
            return;
        }

        let mut nodes: BTreeSet<NoteId> = self.notes.keys().cloned().collect();
        let mut backlinks: BTreeMap<NoteId, BTreeSet<NoteId>> = BTreeMap::new();
        for id in self.notes.keys() {
            backlinks.entry(id.clone()).or_default();
        }
        for (source, targets) in &self.outgoing {
            for target in targets {
                nodes.insert(target.clone());
                backlinks
                    .entry(target.clone())
                    .or_default()
                    .insert(source.clone());
            }
        }

        let root = match &self.config.root {
            RootSelection::Fixed { id } => Some(id.clone()),
            RootSelection::LexicographicMin => nodes.first().cloned(),
        };

        // BFS with a visited set; the graph may legally contain cycles.
        let mut depths: BTreeMap<NoteId, u32> = BTreeMap::new();
        if let Some(root) = &root {
            let mut queue = VecDeque::new();
            depths.insert(root.clone(), 0);
            queue.push_back(root.clone());
            while let Some(id) = queue.pop_front() {
                let depth = depths[&id];
                if let Some(targets) = self.outgoing.get(&id) {
                    for target in targets {
                        if !depths.contains_key(target) {
                            depths.insert(target.clone(), depth + 1);
                            queue.push_back(target.clone());
                        }
                    }
                }
            }
        }

        *cache = DerivedCache {
            generation: self.generation,
            valid: true,
            nodes,
            root,
            backlinks,
            depths,
        };
    }

    /// The designated root identity, per configuration. `None` only for an
    /// empty graph under lexicographic selection.
    pub fn root(&self) -> Option<NoteId> {
        self.refresh_cache();
        self.cache.borrow().root.clone()
    }

    /// Shortest path length in edges from the root. Unreachable nodes get
    /// [`DEFAULT_DEPTH`], never an error.
    pub fn depth(&self, id: &NoteId) -> u32 {
        self.refresh_cache();
        self.cache
            .borrow()
            .depths
            .get(id)
            .copied()
            .unwrap_or(DEFAULT_DEPTH)
    }

    /// Largest depth of any reachable note.
    pub fn max_depth(&self) -> u32 {
        self.refresh_cache();
        let cache = self.cache.borrow();
        self.notes
            .keys()
            .filter_map(|id| cache.depths.get(id).copied())
            .max()
            .unwrap_or(0)
    }

    /// The predecessor set of a node.
    pub fn backlinks(&self, id: &NoteId) -> BTreeSet<NoteId> {
        self.refresh_cache();
        self.cache
            .borrow()
            .backlinks
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Notes with an empty predecessor set, excluding the root.
    pub fn orphans(&self) -> Vec<&Note> {
        self.refresh_cache();
        let cache = self.cache.borrow();
        self.notes
            .values()
            .filter(|n| {
                Some(&n.id) != cache.root.as_ref()
                    && cache.backlinks.get(&n.id).is_none_or(|s| s.is_empty())
            })
            .collect()
    }

    /// Total number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(|s| s.len()).sum()
    }

    // Tags
    // ========================================================================

    /// Union of all tag sets.
    pub fn tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for note in self.notes.values() {
            tags.extend(note.tags.iter().cloned());
        }
        tags
    }

    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for note in self.notes.values() {
            for tag in &note.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Tags that act as categories (prefixed `c_`).
    pub fn categories(&self) -> BTreeSet<String> {
        self.tags()
            .into_iter()
            .filter(|t| t.starts_with("c_"))
            .collect()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            notes: self.notes.len(),
            tags: self.tags().len(),
            orphans: self.orphans().len(),
            links: self.edge_count(),
        }
    }

    pub fn summary(&self, id: &NoteId) -> Result<NoteSummary> {
        let note = self.require(id)?;
        Ok(NoteSummary {
            id: note.id.clone(),
            path: note.path.to_string_lossy().into_owned(),
            title: note.title.clone(),
            tags: note.tags.clone(),
            links: note.links.clone(),
            depth: self.depth(id),
        })
    }

    // Search
    // ========================================================================

    /// Tiered, rank-preserving search over identities, titles, and
    /// filename stems.
    ///
    /// An exact canonical-identity hit short-circuits to a single result.
    /// Otherwise: exact normalized match, then prefix, then substring,
    /// concatenated in priority order with the first occurrence winning.
    /// Terms containing `*`, `^` or `$` are treated as anchored regexes
    /// over filename and title.
    pub fn search(&self, term: &str) -> Vec<&Note> {
        let term = term.trim();

        let as_id = NoteId::from(term);
        if as_id.is_canonical() {
            if let Some(note) = self.notes.get(&as_id) {
                return vec![note];
            }
        }

        let name_term = term.replace(' ', "_");
        let title_term = term.replace('_', " ");

        if term.contains(['*', '^', '$']) {
            return self.search_regex(&name_term, &title_term);
        }

        let exact = |note: &Note| {
            id::strip_identities(note.stem()).replace('_', " ").trim() == title_term
                || note.title_or_empty() == title_term
        };
        let prefix = |note: &Note| {
            note.stem().starts_with(&name_term) || note.title_or_empty().starts_with(&title_term)
        };
        let substring = |note: &Note| {
            note.stem().contains(&name_term) || note.title_or_empty().contains(&title_term)
        };
        let tiers: [&dyn Fn(&Note) -> bool; 3] = [&exact, &prefix, &substring];

        let mut results: Vec<&Note> = Vec::new();
        let mut seen: HashSet<&NoteId> = HashSet::new();

        for tier in tiers {
            for note in self.notes.values() {
                if tier(note) && seen.insert(&note.id) {
                    results.push(note);
                }
            }
        }

        results
    }

    fn search_regex(&self, name_pattern: &str, title_pattern: &str) -> Vec<&Note> {
        // Anchored at the start, like the rest of the tiers' name matching.
        let compile = |pattern: &str| Regex::new(&format!("^(?:{})", pattern));
        let (name_re, title_re) = match (compile(name_pattern), compile(title_pattern)) {
            (Ok(n), Ok(t)) => (n, t),
            _ => {
                self.sink.report(Diagnostic::new(
                    Severity::Error,
                    format!("invalid search pattern: {}", name_pattern),
                ));
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        let mut seen: HashSet<&NoteId> = HashSet::new();
        for note in self.notes.values() {
            let file_name = note
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if (name_re.is_match(&file_name) || title_re.is_match(note.title_or_empty()))
                && seen.insert(&note.id)
            {
                results.push(note);
            }
        }
        results
    }

    // Paths
    // ========================================================================

    /// Paths of all notes, ordered by identity.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.notes.values().map(|n| n.path.clone()).collect()
    }
}

fn in_vcs_dir(path: &Path, base: &Path) -> bool {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .any(|c| VCS_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}
