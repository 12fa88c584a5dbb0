//! Boundary-safe chunking of source text
//!
//! Splits a source file into N contiguous chunks whose boundaries fall
//! on declaration boundaries whenever the text parses. Chunks sent to a
//! generation backend are independently parseable that way, which
//! materially cuts down on malformed-output retries.

use crate::index::{DeclKind, Declaration, StructuralIndex};

/// One contiguous slice of source text produced by the splitter.
///
/// `start_line`/`end_line` form a `[start, end)` range over the 0-based
/// line array of the original text. Chunks from one split are disjoint
/// and concatenate back to the input byte-for-byte.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Chunk {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line)
    }
}

/// Find the deepest declaration boundary at or before `max_lines`.
///
/// Returns the largest declaration end line that fits the budget, or
/// `0` when no declaration boundary qualifies (split before the first
/// declaration). A function that does not fit contributes the line just
/// before its `def` instead; a class contributes its header line, so a
/// split can land between two methods through recursion into the body.
/// Unparsable text falls back to `min(max_lines, newline_count)`.
pub fn find_split_point(source: &str, max_lines: usize) -> usize {
    let index = StructuralIndex::build(source);
    split_point(&index, source, max_lines)
}

fn split_point(index: &StructuralIndex, source: &str, max_lines: usize) -> usize {
    if index.parse_failed {
        return max_lines.min(source.matches('\n').count());
    }
    best_boundary(&index.declarations, max_lines)
}

fn best_boundary(decls: &[Declaration], max_lines: usize) -> usize {
    let mut best = 0;
    for decl in decls {
        best = best.max(best_boundary(&decl.children, max_lines));
        let line = boundary_line(decl, max_lines);
        if line <= max_lines && line > best {
            best = line;
        }
    }
    best
}

fn boundary_line(decl: &Declaration, max_lines: usize) -> usize {
    match decl.kind {
        DeclKind::Function => {
            if decl.end_line <= max_lines {
                decl.end_line
            } else {
                decl.start_line.saturating_sub(1)
            }
        }
        DeclKind::Class => decl.start_line,
    }
}

/// Partition `source` into `num_parts` boundary-safe chunks.
///
/// Targets an even `lines_per_part` (minimum 1) and snaps each target
/// to the nearest declaration boundary below it; the last chunk always
/// extends to end-of-file. A source ending in a newline gets a
/// synthesized empty trailing line so reassembly preserves exact line
/// counts.
pub fn split_source(source: &str, num_parts: usize) -> Vec<Chunk> {
    if num_parts == 0 {
        return Vec::new();
    }

    let mut lines = split_keeping_newlines(source);
    if source.ends_with('\n') {
        lines.push("");
    }
    let num_lines = lines.len();
    let lines_per_part = (num_lines / num_parts).max(1);

    let index = StructuralIndex::build(source);
    let mut chunks = Vec::with_capacity(num_parts);
    let mut current_line = 0usize;

    for i in 0..num_parts {
        let target = (i + 1) * lines_per_part;
        let next = if i == num_parts - 1 {
            num_lines
        } else {
            split_point(&index, source, target).clamp(current_line, num_lines)
        };

        chunks.push(Chunk {
            text: lines[current_line..next].concat(),
            start_line: current_line,
            end_line: next,
        });
        current_line = next;
    }
    chunks
}

fn split_keeping_newlines(source: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            out.push(&source[start..=i]);
            start = i + 1;
        }
    }
    if start < source.len() {
        out.push(&source[start..]);
    }
    out
}
