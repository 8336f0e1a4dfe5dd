//! Raster-level redaction for scanned pages.
//!
//! Entities are matched against the page's OCR words by sliding a window
//! over consecutive words and comparing the cleaned join against the entity
//! text, so the same regrouping that produced the detection input also
//! drives the match (an SSN detected as `123-45-6789` still matches the
//! three raw words `123 45 6789`). Matched word boxes are painted over in
//! the page image itself; replacement text is recorded as a placement for
//! the assembly step to draw.

use image::{Rgb, RgbImage};
use tracing::{debug, warn};

use crate::detection::patterns::is_identifier_type;
use crate::extraction::ocr::clean_ocr_text;
use crate::extraction::types::{BoundingBox, OcrWord};
use crate::redaction::{RedactionDirective, RedactionMethod};

/// Pixels of margin painted around a matched word box.
const COVER_MARGIN_PX: u32 = 2;

/// Extra words a window may span beyond the entity's own word count,
/// absorbing OCR over-segmentation.
const WINDOW_SLACK: usize = 3;

/// Replacement text to draw at assembly time, positioned in page raster
/// coordinates at the page's render DPI.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Result of redacting one scanned page.
#[derive(Debug)]
pub struct ScannedPageEdit {
    pub image: RgbImage,
    pub placements: Vec<TextPlacement>,
    pub covers_drawn: usize,
    /// Parallel to the directive slice: whether each directive matched on
    /// this page.
    pub matched: Vec<bool>,
}

/// Apply `directives` to one scanned page.
pub fn redact_page_image(
    image: &RgbImage,
    words: &[OcrWord],
    directives: &[RedactionDirective],
) -> ScannedPageEdit {
    let mut edited = image.clone();
    let mut placements = Vec::new();
    let mut covers_drawn = 0usize;
    let mut matched = vec![false; directives.len()];

    for (index, directive) in directives.iter().enumerate() {
        let mut sites = find_word_matches(words, &directive.entity.text);
        if sites.is_empty()
            && directive.method == RedactionMethod::Partial
            && is_identifier_type(&directive.entity.entity_type)
        {
            // Partial keeps the last four payload characters, which are also
            // the part OCR must have read correctly for detection to have
            // fired; match on those when the masked portion was mangled.
            sites = find_trailing_matches(words, &directive.entity.text);
        }
        if sites.is_empty() {
            continue;
        }
        matched[index] = true;

        for (start, len) in sites {
            let bbox = words[start..start + len]
                .iter()
                .skip(1)
                .fold(words[start].bbox, |acc, w| acc.union(&w.bbox));

            let color = if directive.method == RedactionMethod::BlackBar {
                Rgb([0u8, 0, 0])
            } else {
                Rgb([255u8, 255, 255])
            };
            paint_cover(&mut edited, &bbox, color);
            covers_drawn += 1;

            if let Some(replacement) = directive.replacement.as_deref() {
                placements.push(TextPlacement {
                    text: replacement.trim_end().to_string(),
                    bbox,
                });
            }
            debug!(
                entity_type = %directive.entity.entity_type,
                words = len,
                "scanned match covered"
            );
        }
    }

    if covers_drawn == 0 && !directives.is_empty() {
        warn!("no directive matched any OCR words on this page");
    }

    ScannedPageEdit {
        image: edited,
        placements,
        covers_drawn,
        matched,
    }
}

/// Find non-overlapping word windows whose cleaned join equals the entity
/// text (case-insensitive). Returns `(start_index, word_count)` pairs.
pub fn find_word_matches(words: &[OcrWord], entity_text: &str) -> Vec<(usize, usize)> {
    let target = clean_ocr_text(entity_text).to_lowercase();
    if target.is_empty() {
        return Vec::new();
    }
    let max_window = entity_text.split_whitespace().count() + WINDOW_SLACK;

    let mut matches = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let mut advanced = false;
        for len in 1..=max_window.min(words.len() - i) {
            let joined = words[i..i + len]
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if clean_ocr_text(&joined).to_lowercase() == target {
                matches.push((i, len));
                i += len;
                advanced = true;
                break;
            }
        }
        if !advanced {
            i += 1;
        }
    }
    matches
}

/// Relaxed identifier matching: a word window whose alphanumeric payload has
/// the entity's length and the same trailing four characters.
pub fn find_trailing_matches(words: &[OcrWord], entity_text: &str) -> Vec<(usize, usize)> {
    let payload = alphanumeric(entity_text);
    if payload.len() < 4 {
        return Vec::new();
    }
    let tail = &payload[payload.len() - 4..];
    let max_window = entity_text.split_whitespace().count() + WINDOW_SLACK;

    let mut matches = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let mut advanced = false;
        for len in 1..=max_window.min(words.len() - i) {
            let window: String = words[i..i + len]
                .iter()
                .flat_map(|w| w.text.chars())
                .filter(|c| c.is_alphanumeric())
                .collect();
            if window.len() == payload.len() && window.ends_with(tail) {
                matches.push((i, len));
                i += len;
                advanced = true;
                break;
            }
            if window.len() > payload.len() {
                break;
            }
        }
        if !advanced {
            i += 1;
        }
    }
    matches
}

fn alphanumeric(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Fill the box (plus margin) with a solid color, clamped to the image.
pub fn paint_cover(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let x0 = (bbox.x as i64 - COVER_MARGIN_PX as i64).max(0) as u32;
    let y0 = (bbox.y as i64 - COVER_MARGIN_PX as i64).max(0) as u32;
    let x1 = ((bbox.x + bbox.width) as u32 + COVER_MARGIN_PX).min(image.width());
    let y1 = ((bbox.y + bbox.height) as u32 + COVER_MARGIN_PX).min(image.height());

    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, color);
        }
    }
}
