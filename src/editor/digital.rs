//! In-place redaction of digital PDFs.
//!
//! For every directive the matched text is scrubbed out of the content
//! stream operands (byte-for-byte, replaced with spaces so surrounding
//! layout is untouched), then an opaque cover is drawn over the matched
//! rectangle and, for non-bar methods, the replacement text is inserted on
//! top. Scrub-then-cover means the PII is gone from the file, not merely
//! hidden under a rectangle.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, info, warn};

use super::text_layout::{
    analyze_page, locate, MatchStrategy, Rect, RunPiece, GLYPH_WIDTH_RATIO,
};
use super::EditorError;
use crate::redaction::{RedactionDirective, RedactionMethod};

/// Resource name the inserted replacement text is set in.
const FONT_RESOURCE: &str = "FRed";

/// Insertion fitting: attempts before giving up on the real replacement.
pub const MAX_INSERTION_ATTEMPTS: usize = 3;
const FONT_SHRINK_FACTOR: f32 = 0.8;
const RECT_EXPAND_FACTOR: f32 = 1.05;
const FALLBACK_TEXT: &str = "[REDACTED]";
const MIN_FONT_SIZE: f32 = 4.0;

/// Cap on matches per directive per page. A directive that fires more often
/// than this is matching noise, not PII.
const MATCH_GUARD: usize = 32;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub pages_edited: usize,
    pub covers_drawn: usize,
    /// Directives whose text was not found on any page.
    pub unmatched: usize,
    /// Insertions that fell back to the generic marker after fitting failed.
    pub fallback_insertions: usize,
}

/// Apply `directives` to every page of a digital PDF. Returns the rewritten
/// document and an edit report.
pub fn redact_digital_pdf(
    pdf_bytes: &[u8],
    directives: &[RedactionDirective],
) -> Result<(Vec<u8>, EditReport), EditorError> {
    let mut doc = Document::load_mem(pdf_bytes).map_err(structure)?;
    let page_ids: Vec<ObjectId> = doc.page_iter().collect();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut report = EditReport::default();
    let mut matched = vec![false; directives.len()];

    for page_id in page_ids {
        let covers = redact_page(&mut doc, page_id, font_id, directives, &mut matched, &mut report)?;
        if covers > 0 {
            report.pages_edited += 1;
            report.covers_drawn += covers;
        }
    }

    for (directive, found) in directives.iter().zip(&matched) {
        if !found {
            warn!(
                entity_type = %directive.entity.entity_type,
                "entity text not found on any page"
            );
        }
    }
    report.unmatched = matched.iter().filter(|found| !**found).count();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    info!(
        pages_edited = report.pages_edited,
        covers = report.covers_drawn,
        unmatched = report.unmatched,
        "digital redaction complete"
    );
    Ok((out, report))
}

fn redact_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    directives: &[RedactionDirective],
    matched: &mut [bool],
    report: &mut EditReport,
) -> Result<usize, EditorError> {
    let raw = doc
        .get_page_content(page_id)
        .map_err(|e| EditorError::ContentDecode(e.to_string()))?;
    let mut content =
        Content::decode(&raw).map_err(|e| EditorError::ContentDecode(e.to_string()))?;

    let layout = analyze_page(&content);
    let mut working = layout.chars.clone();
    let mut overlays: Vec<Operation> = Vec::new();
    let mut covers = 0usize;

    for (index, directive) in directives.iter().enumerate() {
        let needle: Vec<char> = directive.entity.text.chars().collect();
        for _ in 0..MATCH_GUARD {
            let Some((range, strategy)) = locate(&working, &needle) else {
                break;
            };
            matched[index] = true;
            if strategy != MatchStrategy::Exact {
                debug!(
                    entity_type = %directive.entity.entity_type,
                    ?strategy,
                    "inexact text match"
                );
            }

            let site = layout.resolve(range.clone());
            for piece in &site.pieces {
                scrub_piece(&mut content, piece);
            }
            for i in range {
                working[i] = ' ';
            }

            overlays.extend(cover_operations(&site.rect, directive.method));
            covers += 1;
            if let Some(replacement) = directive.replacement.as_deref() {
                let plan = plan_insertion(replacement, &site.rect);
                if plan.fallback {
                    report.fallback_insertions += 1;
                }
                overlays.extend(text_operations(&plan));
            }
        }
    }

    if covers == 0 {
        return Ok(0);
    }

    // Isolate whatever graphics state the original stream leaves behind.
    content.operations.insert(0, Operation::new("q", vec![]));
    content.operations.push(Operation::new("Q", vec![]));
    content.operations.extend(overlays);

    let encoded = content
        .encode()
        .map_err(|e| EditorError::ContentDecode(e.to_string()))?;
    ensure_redaction_font(doc, page_id, font_id)?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(structure)?;
    page.set("Contents", Object::Reference(stream_id));

    Ok(covers)
}

/// Overwrite the matched operand bytes with spaces. Length-preserving, so
/// positioning of the surrounding text is unaffected.
fn scrub_piece(content: &mut Content, piece: &RunPiece) {
    let Some(op) = content.operations.get_mut(piece.op_index) else {
        return;
    };
    let operand = match piece.element_index {
        None => {
            if op.operator == "\"" {
                op.operands.get_mut(2)
            } else {
                op.operands.first_mut()
            }
        }
        Some(i) => match op.operands.first_mut() {
            Some(Object::Array(elements)) => elements.get_mut(i),
            _ => None,
        },
    };
    if let Some(Object::String(bytes, _)) = operand {
        for b in bytes.iter_mut().take(piece.end).skip(piece.start) {
            *b = b' ';
        }
    }
}

fn cover_operations(rect: &Rect, method: RedactionMethod) -> Vec<Operation> {
    let (r, g, b) = if method == RedactionMethod::BlackBar {
        (0.0f32, 0.0f32, 0.0f32)
    } else {
        (1.0f32, 1.0f32, 1.0f32)
    };
    // Pad past the glyph box: below the baseline for descenders, a point on
    // either side for estimation error.
    let x = rect.x - 1.0;
    let y = rect.y - 0.25 * rect.height;
    let w = rect.width + 2.0;
    let h = rect.height * 1.2;
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

struct InsertionPlan {
    text: String,
    font_size: f32,
    x: f32,
    y: f32,
    fallback: bool,
}

/// Fit the replacement into the matched rectangle: shrink the font and
/// loosen the width budget a little per attempt, then give up and write the
/// generic marker instead of overflowing into neighboring text.
fn plan_insertion(replacement: &str, rect: &Rect) -> InsertionPlan {
    let text = replacement.trim_end();
    let chars = text.chars().count().max(1) as f32;
    let mut font_size = rect.height.clamp(MIN_FONT_SIZE, 14.0);
    let mut budget = rect.width;

    for _ in 0..MAX_INSERTION_ATTEMPTS {
        if chars * font_size * GLYPH_WIDTH_RATIO <= budget {
            return InsertionPlan {
                text: text.to_string(),
                font_size,
                x: rect.x,
                y: rect.y,
                fallback: false,
            };
        }
        font_size = (font_size * FONT_SHRINK_FACTOR).max(MIN_FONT_SIZE);
        budget *= RECT_EXPAND_FACTOR;
    }

    let fallback_chars = FALLBACK_TEXT.chars().count() as f32;
    let font_size = (rect.width / (fallback_chars * GLYPH_WIDTH_RATIO))
        .clamp(MIN_FONT_SIZE, rect.height.max(MIN_FONT_SIZE));
    InsertionPlan {
        text: FALLBACK_TEXT.to_string(),
        font_size,
        x: rect.x,
        y: rect.y,
        fallback: true,
    }
}

fn text_operations(plan: &InsertionPlan) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![0.0f32.into(), 0.0f32.into(), 0.0f32.into()]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                plan.font_size.into(),
            ],
        ),
        Operation::new("Td", vec![plan.x.into(), plan.y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_text(&plan.text),
                StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Make the replacement-text font reachable from the page.
///
/// A page with its own Resources gets the font added there (following
/// references as needed). A page inheriting Resources from an ancestor gets
/// a cloned copy set on itself, so siblings are unaffected.
fn ensure_redaction_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), EditorError> {
    enum Own {
        Reference(ObjectId),
        Inline,
        Missing,
    }

    let own = {
        let page = doc.get_dictionary(page_id).map_err(structure)?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Own::Reference(*id),
            Ok(Object::Dictionary(_)) => Own::Inline,
            _ => Own::Missing,
        }
    };

    match own {
        Own::Reference(rid) => {
            let fonts_ref = {
                let resources = doc
                    .get_object(rid)
                    .and_then(Object::as_dict)
                    .map_err(structure)?;
                match resources.get(b"Font") {
                    Ok(Object::Reference(id)) => Some(*id),
                    _ => None,
                }
            };
            if let Some(fid) = fonts_ref {
                let fonts = doc
                    .get_object_mut(fid)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?;
                fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            } else {
                let resources = doc
                    .get_object_mut(rid)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?;
                set_font_inline(resources, font_id);
            }
        }
        Own::Inline => {
            let fonts_ref = {
                let page = doc.get_dictionary(page_id).map_err(structure)?;
                let resources = page
                    .get(b"Resources")
                    .and_then(Object::as_dict)
                    .map_err(structure)?;
                match resources.get(b"Font") {
                    Ok(Object::Reference(id)) => Some(*id),
                    _ => None,
                }
            };
            if let Some(fid) = fonts_ref {
                let fonts = doc
                    .get_object_mut(fid)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?;
                fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            } else {
                let page = doc
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?;
                if let Ok(Object::Dictionary(resources)) = page.get_mut(b"Resources") {
                    set_font_inline(resources, font_id);
                }
            }
        }
        Own::Missing => {
            let mut resources = inherited_resources(doc, page_id).unwrap_or_default();
            set_font_inline(&mut resources, font_id);
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(structure)?;
            page.set("Resources", Object::Dictionary(resources));
        }
    }
    Ok(())
}

fn set_font_inline(resources: &mut lopdf::Dictionary, font_id: ObjectId) {
    if !matches!(resources.get(b"Font"), Ok(Object::Dictionary(_))) {
        resources.set("Font", lopdf::Dictionary::new());
    }
    if let Ok(Object::Dictionary(fonts)) = resources.get_mut(b"Font") {
        fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    }
}

/// Resolve the Resources dict a page inherits, as an owned copy with a
/// referenced Font subdict flattened inline.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<lopdf::Dictionary> {
    let mut current = page_id;
    for _ in 0..16 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(obj) = dict.get(b"Resources") {
            let resolved = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
                Object::Dictionary(d) => d,
                _ => return None,
            };
            let mut owned = resolved.clone();
            if let Ok(Object::Reference(fid)) = resolved.get(b"Font") {
                if let Ok(fonts) = doc.get_object(*fid).and_then(Object::as_dict) {
                    owned.set("Font", Object::Dictionary(fonts.clone()));
                }
            }
            return Some(owned);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => current = *id,
            _ => return None,
        }
    }
    None
}

fn structure(e: lopdf::Error) -> EditorError {
    EditorError::PdfStructure(e.to_string())
}
