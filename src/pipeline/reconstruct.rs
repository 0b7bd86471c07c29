//! Structural reconstruction: normalised lines → Markdown blocks.
//!
//! Extracted text arrives as a flat stream of lines with no structure. This
//! stage classifies each line exactly once, in order, and groups lines into
//! [`MarkdownBlock`]s:
//!
//! | Line | Action |
//! |------|--------|
//! | blank | flush pending paragraph and fenced buffer |
//! | heading | flush pending state, emit `Heading`, swallow one trailing blank |
//! | tabular | flush paragraph, append to fenced buffer |
//! | plain | flush fenced buffer, append to paragraph |
//!
//! The heading test runs before the tabular test on every line: a short
//! all-caps line inside a column-aligned run is promoted to a heading. Output
//! stability depends on that order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest line (in chars, exclusive) still considered a heading.
const MAX_HEADING_LEN: usize = 80;

/// Shortest line (in chars, exclusive) considered an all-caps heading.
const MIN_CAPS_HEADING_LEN: usize = 2;

/// Minimum length (exclusive) for the multi-field tabular test.
const MIN_TABULAR_LEN: usize = 10;

/// One reconstructed Markdown block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum MarkdownBlock {
    Heading(String),
    Paragraph(String),
    /// Lines kept verbatim inside a code fence.
    FencedBlock(Vec<String>),
}

impl MarkdownBlock {
    /// Render this block as Markdown, without surrounding blank lines.
    pub fn to_markdown(&self) -> String {
        match self {
            MarkdownBlock::Heading(text) => format!("## {}", text),
            MarkdownBlock::Paragraph(text) => text.clone(),
            MarkdownBlock::FencedBlock(lines) => {
                let fence = fence_for(lines);
                format!("{fence}\n{}\n{fence}", lines.join("\n"))
            }
        }
    }
}

/// Three backticks, or one more than the longest backtick run inside.
fn fence_for(lines: &[String]) -> String {
    let longest = lines
        .iter()
        .flat_map(|line| line.split(|c| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

// ── Line classifiers ─────────────────────────────────────────────────────────

static RE_CAPS_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{Lu}\p{N}\s\p{P}]+$").unwrap());
static RE_NUMERIC_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{N}\s\p{P}]+$").unwrap());
static RE_COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S\s{2,}\S").unwrap());
static RE_FIELD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static RE_EXCESS_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const SENTENCE_PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Upper-case letters, digits, whitespace and punctuation only, with at least
/// one upper-case letter.
fn is_all_caps(line: &str) -> bool {
    let len = line.chars().count();
    len > MIN_CAPS_HEADING_LEN
        && len < MAX_HEADING_LEN
        && line.chars().any(char::is_uppercase)
        && RE_CAPS_LINE.is_match(line)
        && !RE_NUMERIC_LINE.is_match(line)
}

/// Short, no sentence punctuation at the end, followed by a blank line or end
/// of input.
fn is_short_heading(line: &str, next: Option<&str>) -> bool {
    let len = line.chars().count();
    len > 0
        && len < MAX_HEADING_LEN
        && !line.ends_with(SENTENCE_PUNCTUATION)
        && next.is_none_or(is_blank)
}

fn is_heading(line: &str, next: Option<&str>) -> bool {
    is_all_caps(line) || is_short_heading(line, next)
}

fn is_tabular(line: &str) -> bool {
    if RE_COLUMN_GAP.is_match(line) {
        return true;
    }
    let trimmed = line.trim();
    RE_FIELD_SPLIT.split(trimmed).count() > 2 && trimmed.chars().count() > MIN_TABULAR_LEN
}

// ── Reconstruction ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Accumulator {
    blocks: Vec<MarkdownBlock>,
    paragraph: Vec<String>,
    fenced: Vec<String>,
}

impl Accumulator {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = self.paragraph.join(" ");
            self.paragraph.clear();
            self.blocks.push(MarkdownBlock::Paragraph(text));
        }
    }

    /// A single buffered line was a false positive: it becomes a paragraph.
    fn flush_fenced(&mut self) {
        match self.fenced.len() {
            0 => {}
            1 => {
                let line = self.fenced.remove(0);
                self.blocks.push(MarkdownBlock::Paragraph(line));
            }
            _ => {
                let lines = std::mem::take(&mut self.fenced);
                self.blocks.push(MarkdownBlock::FencedBlock(lines));
            }
        }
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_fenced();
    }
}

/// Classify `text` line by line into Markdown blocks.
///
/// Returns an empty vector only when `text` has no non-blank line.
pub fn reconstruct(text: &str) -> Vec<MarkdownBlock> {
    let lines: Vec<&str> = text.lines().collect();
    let mut acc = Accumulator::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        let next = lines.get(i + 1).copied();

        if trimmed.is_empty() {
            acc.flush_all();
        } else if is_heading(trimmed, next) {
            acc.flush_all();
            acc.blocks.push(MarkdownBlock::Heading(trimmed.to_string()));
            if next.is_some_and(is_blank) {
                i += 1;
            }
        } else if is_tabular(line) {
            acc.flush_paragraph();
            acc.fenced.push(line.trim_end().to_string());
        } else {
            acc.flush_fenced();
            acc.paragraph.push(trimmed.to_string());
        }

        i += 1;
    }

    acc.flush_all();
    acc.blocks
}

/// Serialise blocks to a Markdown document.
///
/// Blocks are separated by one blank line; runs of three or more newlines are
/// collapsed to a single blank line and the result is trimmed.
pub fn render_markdown(blocks: &[MarkdownBlock]) -> String {
    let joined = blocks
        .iter()
        .map(MarkdownBlock::to_markdown)
        .collect::<Vec<_>>()
        .join("\n\n");
    RE_EXCESS_BLANKS
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
