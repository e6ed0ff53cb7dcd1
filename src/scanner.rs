//! Structural scanner: annotates raw lines with code-block membership and
//! the current heading path.
//!
//! The scanner is a lazy, single-pass iterator. It cannot be restarted; scan
//! again by constructing a new [`Scanner`] over the same content.

use regex::Regex;
use std::sync::LazyLock;

// ATX-style heading: # Heading, ## Heading, ...
static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#+)\s+(.+)").unwrap());

/// One scanned line.
///
/// `section_path` holds the heading titles from level 1 downward that were
/// in effect on this line. Transient: produced per scan, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    pub text: String,
    /// Whether the line sits inside a fenced code block. The fence line
    /// itself carries the pre-toggle state.
    pub in_code_block: bool,
    pub section_path: Vec<String>,
    pub is_last: bool,
}

/// Whether a line is a Setext underline drawn with `c`.
pub(crate) fn is_setext_underline(line: &str, c: char) -> bool {
    line.len() >= 3 && line.chars().all(|ch| ch == c)
}

/// Lazy scanner over the lines of one document.
pub struct Scanner<'a> {
    lines: Vec<&'a str>,
    idx: usize,
    in_code_block: bool,
    section_path: Vec<String>,
}

impl<'a> Scanner<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().collect(),
            idx: 0,
            in_code_block: false,
            section_path: Vec::new(),
        }
    }

    /// Number of lines that will be produced in total.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Iterator for Scanner<'_> {
    type Item = LineRecord;

    fn next(&mut self) -> Option<LineRecord> {
        let line = *self.lines.get(self.idx)?;
        let is_last = self.idx + 1 == self.lines.len();

        // ATX headings, outside code blocks.
        if !self.in_code_block {
            if let Some(caps) = ATX_HEADING.captures(line) {
                let level = caps[1].len();
                self.section_path.truncate(level - 1);
                self.section_path.push(caps[2].trim().to_string());
            }
        }

        // Setext headings need one line of look-ahead; the last line has
        // none. This runs after ATX detection for the same line.
        if !is_last {
            let next = self.lines[self.idx + 1];
            if is_setext_underline(next, '=') {
                self.section_path = vec![line.to_string()];
            } else if is_setext_underline(next, '-') && !self.section_path.is_empty() {
                self.section_path = vec![self.section_path[0].clone(), line.to_string()];
            }
        }

        let record = LineRecord {
            text: line.to_string(),
            in_code_block: self.in_code_block,
            section_path: self.section_path.clone(),
            is_last,
        };

        // The fence is part of the block it opens or closes, so the toggle
        // applies from the next line on.
        if line.starts_with("```") {
            self.in_code_block = !self.in_code_block;
        }

        self.idx += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.lines.len() - self.idx;
        (remaining, Some(remaining))
    }
}
