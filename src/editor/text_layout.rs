//! Content-stream text analysis for the digital editor.
//!
//! Walks a page's text-showing operators, tracking enough of the text state
//! machine (Td/TD/Tm/TL/T*/Tf) to give each shown string an approximate
//! position, and keeps per-operand provenance so a matched character range
//! can be traced back to the exact bytes that must be scrubbed.
//!
//! Positions are approximations: the general transformation matrix is not
//! applied and glyph widths are estimated with a fixed ratio of the font
//! size. That is enough to place covers; exactness lives in the byte-level
//! scrub, not the geometry.

use std::ops::Range;

use lopdf::content::Content;
use lopdf::Object;
use tracing::trace;

/// Approximate advance per glyph as a fraction of the font size.
pub const GLYPH_WIDTH_RATIO: f32 = 0.5;

/// Baseline tolerance (points) for treating two runs as the same line.
const BASELINE_TOLERANCE: f32 = 1.0;

/// Horizontal gap (fraction of font size) above which adjacent runs on the
/// same line get a separating space in the searchable text.
const WORD_GAP_RATIO: f32 = 0.25;

/// One shown string operand, with provenance and approximate geometry.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Operand text, decoded byte-per-char. Char index i corresponds to
    /// operand byte i.
    pub text: String,
    /// Index into the page's decoded operation list.
    pub op_index: usize,
    /// Index within a TJ array operand; `None` for Tj / ' / ".
    pub element_index: Option<usize>,
    /// Baseline origin in text space (points).
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

impl TextRun {
    fn char_width(&self) -> f32 {
        self.font_size * GLYPH_WIDTH_RATIO
    }

    fn end_x(&self) -> f32 {
        self.x + self.text.chars().count() as f32 * self.char_width()
    }
}

/// Axis-aligned rectangle in PDF points. `y` is the baseline of the lowest
/// matched run; `height` the largest font size involved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Byte range inside one string operand that a match covers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPiece {
    pub op_index: usize,
    pub element_index: Option<usize>,
    /// Byte offsets into the operand string.
    pub start: usize,
    pub end: usize,
}

/// A located match: where it sits in the searchable text, which operand
/// bytes carry it, and the approximate page-space rectangle it occupies.
#[derive(Debug, Clone)]
pub struct MatchSite {
    pub range: Range<usize>,
    pub pieces: Vec<RunPiece>,
    pub rect: Rect,
}

/// Searchable text of one page with run provenance.
pub struct PageLayout {
    /// Concatenated run text with inferred separators.
    pub chars: Vec<char>,
    runs: Vec<TextRun>,
    /// Per-run char range inside `chars`, parallel to `runs`.
    spans: Vec<Range<usize>>,
}

/// Parse the page content and build its searchable layout.
pub fn analyze_page(content: &Content) -> PageLayout {
    let runs = parse_text_runs(content);

    let mut chars: Vec<char> = Vec::new();
    let mut spans: Vec<Range<usize>> = Vec::with_capacity(runs.len());
    let mut previous: Option<&TextRun> = None;

    for run in &runs {
        if let Some(prev) = previous {
            let same_line = (run.y - prev.y).abs() <= BASELINE_TOLERANCE;
            let gap = run.x - prev.end_x();
            if !same_line || gap > WORD_GAP_RATIO * run.font_size {
                chars.push(' ');
            }
        }
        let start = chars.len();
        chars.extend(run.text.chars());
        spans.push(start..chars.len());
        previous = Some(run);
    }

    PageLayout { chars, runs, spans }
}

impl PageLayout {
    /// Map a char range in the searchable text back to operand bytes and an
    /// approximate rectangle. Separator chars between runs carry no
    /// provenance and are skipped.
    pub fn resolve(&self, range: Range<usize>) -> MatchSite {
        let mut pieces = Vec::new();
        let mut rect: Option<Rect> = None;

        for (run, span) in self.runs.iter().zip(&self.spans) {
            let start = range.start.max(span.start);
            let end = range.end.min(span.end);
            if start >= end {
                continue;
            }
            // Char offset within the run equals the operand byte offset.
            let local = (start - span.start)..(end - span.start);
            pieces.push(RunPiece {
                op_index: run.op_index,
                element_index: run.element_index,
                start: local.start,
                end: local.end,
            });

            let piece_x = run.x + local.start as f32 * run.char_width();
            let piece_w = (local.end - local.start) as f32 * run.char_width();
            let piece = Rect {
                x: piece_x,
                y: run.y,
                width: piece_w,
                height: run.font_size,
            };
            rect = Some(match rect {
                None => piece,
                Some(r) => union(r, piece),
            });
        }

        let rect = rect.unwrap_or(Rect {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        });
        MatchSite { range, pieces, rect }
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let right = (a.x + a.width).max(b.x + b.width);
    Rect {
        x,
        y,
        width: right - x,
        height: a.height.max(b.height),
    }
}

fn parse_text_runs(content: &Content) -> Vec<TextRun> {
    let mut runs = Vec::new();

    let mut font_size = 12.0f32;
    let mut leading = 0.0f32;
    let mut line_x = 0.0f32;
    let mut line_y = 0.0f32;
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    for (op_index, op) in content.operations.iter().enumerate() {
        match op.operator.as_str() {
            "BT" => {
                line_x = 0.0;
                line_y = 0.0;
                x = 0.0;
                y = 0.0;
            }
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(number) {
                    font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Td" | "TD" => {
                let tx = op.operands.first().and_then(number).unwrap_or(0.0);
                let ty = op.operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    leading = -ty;
                }
                line_x += tx;
                line_y += ty;
                x = line_x;
                y = line_y;
            }
            "Tm" => {
                line_x = op.operands.get(4).and_then(number).unwrap_or(0.0);
                line_y = op.operands.get(5).and_then(number).unwrap_or(0.0);
                x = line_x;
                y = line_y;
            }
            "T*" => {
                line_y -= leading;
                x = line_x;
                y = line_y;
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    x = push_run(&mut runs, bytes, op_index, None, x, y, font_size);
                }
            }
            "'" | "\"" => {
                line_y -= leading;
                x = line_x;
                y = line_y;
                let operand = if op.operator == "'" {
                    op.operands.first()
                } else {
                    op.operands.get(2)
                };
                if let Some(Object::String(bytes, _)) = operand {
                    x = push_run(&mut runs, bytes, op_index, None, x, y, font_size);
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = op.operands.first() {
                    for (element_index, element) in elements.iter().enumerate() {
                        match element {
                            Object::String(bytes, _) => {
                                x = push_run(
                                    &mut runs,
                                    bytes,
                                    op_index,
                                    Some(element_index),
                                    x,
                                    y,
                                    font_size,
                                );
                            }
                            other => {
                                if let Some(adjust) = number(other) {
                                    x -= adjust / 1000.0 * font_size;
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    trace!(runs = runs.len(), "content stream text runs parsed");
    runs
}

fn push_run(
    runs: &mut Vec<TextRun>,
    bytes: &[u8],
    op_index: usize,
    element_index: Option<usize>,
    x: f32,
    y: f32,
    font_size: f32,
) -> f32 {
    let text: String = bytes.iter().map(|&b| b as char).collect();
    let run = TextRun {
        text,
        op_index,
        element_index,
        x,
        y,
        font_size,
    };
    let end = run.end_x();
    runs.push(run);
    end
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

// ── Needle search ───────────────────────────────────────────────────────────

/// Which strategy located a needle. Ordered from most to least precise;
/// the search stops at the first one that fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    WhitespaceNormalized,
    CaseInsensitive,
    FirstWord,
}

/// Find `needle` in `haystack`, trying strategies in order of precision.
pub fn locate(haystack: &[char], needle: &[char]) -> Option<(Range<usize>, MatchStrategy)> {
    if needle.is_empty() || haystack.is_empty() {
        return None;
    }

    if let Some(range) = find_exact(haystack, needle) {
        return Some((range, MatchStrategy::Exact));
    }
    if let Some(range) = find_whitespace_normalized(haystack, needle) {
        return Some((range, MatchStrategy::WhitespaceNormalized));
    }
    if let Some(range) = find_case_insensitive(haystack, needle) {
        return Some((range, MatchStrategy::CaseInsensitive));
    }

    let first_word: Vec<char> = needle
        .split(|c| c.is_whitespace())
        .find(|w| !w.is_empty())?
        .to_vec();
    if first_word.len() < needle.len() {
        if let Some(range) = find_exact(haystack, &first_word)
            .or_else(|| find_case_insensitive(haystack, &first_word))
        {
            return Some((range, MatchStrategy::FirstWord));
        }
    }
    None
}

fn find_exact(haystack: &[char], needle: &[char]) -> Option<Range<usize>> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i..i + needle.len())
}

fn find_case_insensitive(haystack: &[char], needle: &[char]) -> Option<Range<usize>> {
    haystack
        .windows(needle.len())
        .position(|w| {
            w.iter()
                .zip(needle)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        })
        .map(|i| i..i + needle.len())
}

/// Two-pointer match treating every whitespace run, on either side, as a
/// single space. Returns the haystack range covering the match.
fn find_whitespace_normalized(haystack: &[char], needle: &[char]) -> Option<Range<usize>> {
    for start in 0..haystack.len() {
        if haystack[start].is_whitespace() {
            continue;
        }
        if let Some(end) = ws_match_at(haystack, start, needle) {
            return Some(start..end);
        }
    }
    None
}

fn ws_match_at(haystack: &[char], start: usize, needle: &[char]) -> Option<usize> {
    let mut h = start;
    let mut n = 0;
    while n < needle.len() {
        if needle[n].is_whitespace() {
            while n < needle.len() && needle[n].is_whitespace() {
                n += 1;
            }
            let ws_start = h;
            while h < haystack.len() && haystack[h].is_whitespace() {
                h += 1;
            }
            if h == ws_start {
                return None;
            }
        } else {
            if h >= haystack.len() || haystack[h] != needle[n] {
                return None;
            }
            h += 1;
            n += 1;
        }
    }
    Some(h)
}
