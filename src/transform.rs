//! Rewrite pipeline: corrects, annotates, and rewrites one document.
//!
//! The pipeline always works on a fresh structural scan of the document's
//! current content, because earlier rules in the same pass change the
//! meaning of later lines. Output is stable under repeated application:
//! `transform(transform(x)) == transform(x)` byte for byte, as long as the
//! graph is not mutated in between.

use crate::diag::{Diagnostic, MemorySink, Severity};
use crate::error::Result;
use crate::id::{self, NoteId};
use crate::kasten::Zettelkasten;
use crate::note::{self, Note, LINK_TOKEN};
use crate::scanner::{LineRecord, Scanner, is_setext_underline};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// A previously autogenerated annotation: a markdown link carrying the
// quoted "autogen" title attribute, with any leading spaces.
static AUTOGEN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#" *\[[^\]]*\]\([^)"]* "autogen"\)"#).unwrap());

/// Format a tag set as a canonical tags line, alphabetically sorted.
pub fn format_tags(tags: &BTreeSet<String>) -> String {
    let joined = tags
        .iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ");
    format!("Tags: {}", joined)
}

/// Rewrites note documents against a graph.
///
/// The tag transformer receives the note's current tag set and returns the
/// desired one; the identity transform leaves tags alone.
pub struct NoteTransformer<'zk> {
    kasten: &'zk Zettelkasten,
    tag_transform: Box<dyn Fn(BTreeSet<String>) -> BTreeSet<String> + 'zk>,
}

impl<'zk> NoteTransformer<'zk> {
    pub fn new(kasten: &'zk Zettelkasten) -> Self {
        Self {
            kasten,
            tag_transform: Box::new(|tags| tags),
        }
    }

    pub fn with_tag_transform<F>(kasten: &'zk Zettelkasten, tag_transform: F) -> Self
    where
        F: Fn(BTreeSet<String>) -> BTreeSet<String> + 'zk,
    {
        Self {
            kasten,
            tag_transform: Box::new(tag_transform),
        }
    }

    /// Rewrite the note's live on-disk content.
    pub fn transform(&self, note: &Note) -> Result<String> {
        let content = std::fs::read_to_string(&note.path)?;
        Ok(self.transform_content(note, &content))
    }

    /// Rewrite the given content as the note's current content.
    pub fn transform_content(&self, note: &Note, content: &str) -> String {
        let records: Vec<LineRecord> = Scanner::new(content).collect();

        // The note's tag state must come from the content being rewritten,
        // not from a stale parse; otherwise a tag-inserting transformer
        // would insert again on the next run. Diagnostics of this throwaway
        // parse were already reported when the note entered the graph.
        let scratch = MemorySink::new();
        let fresh = Note::parse(
            note.id.clone(),
            note.path.clone(),
            records.iter().cloned(),
            &scratch,
        );

        let mut out: Vec<String> = Vec::new();
        let mut prev_text: Option<String> = None;

        for record in &records {
            let mut text = record.text.clone();

            // A tags line has no business inside a fenced code block; drop
            // it and an immediately preceding blank line.
            if record.in_code_block && text.to_lowercase().contains("tags:") {
                if out.last().is_some_and(|l| l.trim().is_empty()) {
                    out.pop();
                }
                prev_text = Some(text);
                continue;
            }

            // Setext headings become ATX: the underline row is consumed and
            // the preceding line rewritten.
            if !record.in_code_block && is_setext_underline(&text, '=') {
                if let Some(prev) = out.pop() {
                    text = format!("# {}", prev);
                }
            } else if !record.in_code_block && is_setext_underline(&text, '-') {
                if let Some(prev) = out.pop() {
                    text = format!("## {}", prev);
                }
            }

            // Directly after the title heading of a tagless note, give the
            // transformer a chance to supply tags.
            if fresh.tags.is_empty()
                && !record.in_code_block
                && prev_text.as_deref().is_some_and(|p| p.starts_with("# "))
            {
                let tags = (self.tag_transform)(BTreeSet::new());
                if !tags.is_empty() {
                    out.push(String::new());
                    out.push(format_tags(&tags));
                }
            }

            // An existing tags line is re-tokenized and canonically
            // reformatted; an empty result deletes it.
            if !record.in_code_block && note::is_tags_line(&text) {
                let tags = (self.tag_transform)(note::read_tags(&text));
                if tags.is_empty() {
                    prev_text = Some(text);
                    continue;
                }
                text = format_tags(&tags);
            }

            // Strip stale annotations unconditionally, then re-annotate.
            // This pairing is what makes repeated rewrites stable.
            text = AUTOGEN_LINK.replace_all(&text, "").into_owned();
            let annotated = LINK_TOKEN
                .replace_all(&text, |caps: &regex::Captures| {
                    let ids = id::find_identities(&caps[0]);
                    assert_eq!(ids.len(), 1, "link token must embed exactly one identity");
                    self.format_link(note, &ids[0])
                })
                .into_owned();
            text = annotated;

            if !in_backlinks_subsection(&record.section_path) {
                out.push(text.clone());
            }
            prev_text = Some(text);
        }

        // Append the derived backlinks section with exactly one blank line
        // of separation, regardless of prior trailing whitespace.
        let backlinks = self.kasten.backlinks(&note.id);
        if !records.is_empty() && !backlinks.is_empty() {
            while out.last().is_some_and(|l| l.trim().is_empty()) {
                out.pop();
            }
            out.push(String::new());
            out.push("## Backlinks".to_string());
            out.push(String::new());
            for backlink in &backlinks {
                out.push(format!("* {}", self.format_link(note, backlink)));
            }
        }

        if out.is_empty() {
            String::new()
        } else {
            out.join("\n") + "\n"
        }
    }

    /// Rewrite and write back, either to the note's own path or to an
    /// alternate target for conversion collaborators.
    pub fn transform_write(&self, note: &Note, target: Option<&Path>) -> Result<()> {
        let transformed = self.transform(note)?;
        let path = target.unwrap_or(&note.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, transformed)?;
        Ok(())
    }

    /// Rewrite every note in the graph. With an output base directory each
    /// result lands at `output_basedir/filename`; without one, notes are
    /// rewritten in place.
    pub fn transform_write_all(&self, output_basedir: Option<&Path>) -> Result<()> {
        for note in self.kasten.notes() {
            let target = output_basedir.map(|dir| {
                dir.join(note.path.file_name().unwrap_or(note.path.as_os_str()))
            });
            self.transform_write(note, target.as_deref())?;
        }
        Ok(())
    }

    /// Annotated form of a link token: the raw token plus a markdown link
    /// to the target's title and relative path, marked autogenerated.
    /// Unresolved targets stay raw.
    fn format_link(&self, source: &Note, id: &NoteId) -> String {
        match self.kasten.get(id) {
            Some(target) => {
                let source_dir = source.path.parent().unwrap_or_else(|| Path::new(""));
                let rel = relative_path(source_dir, &target.path);
                format!(
                    "[[{}]] [{}]({} \"autogen\")",
                    id,
                    target.title_or_empty(),
                    rel.display()
                )
            }
            None => {
                self.kasten.sink().report(Diagnostic::with_path(
                    Severity::Error,
                    &source.path,
                    format!("link to unknown note {}", id),
                ));
                format!("[[{}]]", id)
            }
        }
    }
}

/// Whether a line belongs to a backlinks subsection that the pipeline owns
/// and regenerates. Deeper subsections under it are left alone.
fn in_backlinks_subsection(section_path: &[String]) -> bool {
    section_path.len() <= 2
        && section_path
            .last()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(note::BACKLINKS_SECTION))
}

/// Relative path from one directory to a file, `..`-stepping out of
/// non-shared prefixes.
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from_dir.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let mut common = 0;
    while common < from.len()
        && common < to_parts.len()
        && from[common] == to_parts[common]
    {
        common += 1;
    }

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part);
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::MemorySink;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn graph() -> Zettelkasten {
        let sink = MemorySink::new();
        let mut zk = Zettelkasten::default();
        zk.insert(Note::from_content(
            NoteId::from("00000000000001"),
            "zk/source_00000000000001.md",
            "# Source\n\n[[00000000000002]]\n",
            &sink,
        ));
        zk.insert(Note::from_content(
            NoteId::from("00000000000002"),
            "zk/sub/target_00000000000002.md",
            "# Target Note\n",
            &sink,
        ));
        zk
    }

    fn source(zk: &Zettelkasten) -> &Note {
        zk.get(&NoteId::from("00000000000001")).unwrap()
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("zk"), Path::new("zk/sub/t.md")),
            PathBuf::from("sub/t.md")
        );
        assert_eq!(
            relative_path(Path::new("zk/sub"), Path::new("zk/t.md")),
            PathBuf::from("../t.md")
        );
        assert_eq!(
            relative_path(Path::new("zk"), Path::new("zk/t.md")),
            PathBuf::from("t.md")
        );
    }

    #[test]
    fn test_format_tags_sorted() {
        let tags = BTreeSet::from(["zebra".to_string(), "alpha".to_string()]);
        assert_eq!(format_tags(&tags), "Tags: #alpha #zebra");
    }

    #[test]
    fn test_setext_conversion() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(&note, "Title\n=====\n\nSub\n---\ntext\n");
        assert_eq!(out, "# Title\n\n## Sub\ntext\n");
    }

    #[test]
    fn test_misplaced_tags_in_code_block_removed_with_blank() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(&note, "# T\n```\ncode\n\nTags: #oops\n```\n");
        assert_eq!(out, "# T\n```\ncode\n```\n");
    }

    #[test]
    fn test_tag_insertion_after_title() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::with_tag_transform(&zk, |mut tags| {
            tags.insert("inbox".to_string());
            tags
        });
        let out = t.transform_content(&note, "# T\nbody\n");
        assert_eq!(out, "# T\n\nTags: #inbox\nbody\n");
    }

    #[test]
    fn test_existing_tags_reformatted_canonically() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(&note, "# T\n\ntags:   #z #a\n");
        assert_eq!(out, "# T\n\nTags: #a #z\n");
    }

    #[test]
    fn test_empty_transform_result_deletes_tags_line() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::with_tag_transform(&zk, |_| BTreeSet::new());
        let out = t.transform_content(&note, "# T\n\nTags: #a\nbody\n");
        assert_eq!(out, "# T\n\nbody\n");
    }

    #[test]
    fn test_link_annotation_with_relative_path() {
        let zk = graph();
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(source(&zk), "# Source\n\n[[00000000000002]]\n");
        assert!(out.contains(
            "[[00000000000002]] [Target Note](sub/target_00000000000002.md \"autogen\")"
        ));
    }

    #[test]
    fn test_every_occurrence_annotated_once() {
        let zk = graph();
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(
            source(&zk),
            "# Source\n\n[[00000000000002]] and [[00000000000002]]\n",
        );
        assert_eq!(out.matches("\"autogen\"").count(), 2);
        assert_eq!(out.matches("[[00000000000002]]").count(), 2);
    }

    #[test]
    fn test_unresolved_link_left_raw_with_error() {
        let sink = Rc::new(MemorySink::new());
        let mut zk =
            Zettelkasten::with_sink(crate::config::KastenConfig::default(), sink.clone());
        zk.insert(Note::from_content(
            NoteId::from("00000000000001"),
            "a_00000000000001.md",
            "# A\n",
            sink.as_ref(),
        ));
        let t = NoteTransformer::new(&zk);
        let note = zk.get(&NoteId::from("00000000000001")).unwrap();
        let out = t.transform_content(note, "# A\n\n[[99999999999999]]\n");
        assert!(out.contains("[[99999999999999]]\n"));
        assert!(sink.contains("unknown note"));
    }

    #[test]
    fn test_backlinks_section_appended_and_sorted() {
        let sink = MemorySink::new();
        let mut zk = Zettelkasten::default();
        for (id, name) in [
            ("00000000000002", "beta"),
            ("00000000000003", "gamma"),
            ("00000000000001", "alpha"),
        ] {
            zk.insert(Note::from_content(
                NoteId::from(id),
                format!("zk/{}_{}.md", name, id),
                &format!("# {}\n\n[[00000000000001]]\n", name),
                &sink,
            ));
        }

        let t = NoteTransformer::new(&zk);
        let alpha = zk.get(&NoteId::from("00000000000001")).unwrap();
        let out = t.transform_content(alpha, "# alpha\n\n[[00000000000001]]\n");

        let backlinks_at = out.find("## Backlinks").unwrap();
        let beta_at = out.find("beta_00000000000002.md").unwrap();
        let gamma_at = out.find("gamma_00000000000003.md").unwrap();
        assert!(backlinks_at < beta_at && beta_at < gamma_at);
        // Exactly one blank line before the section.
        assert!(out.contains("\"autogen\")\n\n## Backlinks\n\n* "));
    }

    #[test]
    fn test_stale_backlinks_section_replaced() {
        let zk = graph();
        let target = zk.get(&NoteId::from("00000000000002")).unwrap();
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(
            target,
            "# Target Note\n\n## Backlinks\n\n* [[00000000000009]]\n",
        );
        assert_eq!(out.matches("## Backlinks").count(), 1);
        assert!(!out.contains("00000000000009"));
        assert!(out.contains("[[00000000000001]]"));
    }

    #[test]
    fn test_idempotent_without_graph_mutation() {
        let zk = graph();
        let t = NoteTransformer::with_tag_transform(&zk, |mut tags| {
            tags.insert("auto".to_string());
            tags
        });
        let target = zk.get(&NoteId::from("00000000000002")).unwrap();

        let content = "Target Note\n===========\n\nsee [[00000000000001]]\n\n\n";
        let once = t.transform_content(target, content);
        let twice = t.transform_content(target, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_idempotent_for_plain_note() {
        let zk = graph();
        let t = NoteTransformer::new(&zk);
        let note = source(&zk);

        let content = "# Source\n\n[[00000000000002]] twice [[00000000000002]]\n";
        let once = t.transform_content(note, content);
        let twice = t.transform_content(note, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tags_survive_rewrite_and_reparse() {
        let zk = Zettelkasten::default();
        let sink = MemorySink::new();
        let note = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            "",
            &sink,
        );
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(&note, "# T\n\nTags: #a #b\n");
        let reparsed = Note::from_content(
            NoteId::from("00000000000009"),
            "n_00000000000009.md",
            &out,
            &sink,
        );
        assert_eq!(
            reparsed.tags,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_empty_document_stays_empty() {
        let zk = graph();
        let t = NoteTransformer::new(&zk);
        let out = t.transform_content(source(&zk), "");
        assert_eq!(out, "");
    }
}
