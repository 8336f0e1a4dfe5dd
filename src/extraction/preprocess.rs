//! OCR preprocessing chain and image-quality diagnostics.
//!
//! grayscale -> denoise -> contrast normalization -> optional deskew.
//! Quality checks produce warnings only; a degraded page is still OCRed.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};

use super::types::ExtractionWarning;
use super::ExtractionError;

/// Laplacian variance below this suggests a blurry scan. Diagnostic only.
pub const BLUR_WARNING_VARIANCE: f32 = 100.0;

/// Skew angles below this are left alone; correction noise outweighs gain.
pub const SKEW_CORRECTION_MIN_DEG: f32 = 1.5;

/// Pixels darker than this count as ink for projection profiling.
const INK_THRESHOLD: u8 = 128;

/// Contrast normalization branch. `Adaptive` (min-max stretch) is the
/// default; `SimpleThreshold` binarizes outright and is the last resort in
/// the per-page retry ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessBranch {
    Adaptive,
    SimpleThreshold,
}

#[derive(Debug, Default)]
pub struct QualityReport {
    pub blur_variance: f32,
    pub skew_angle: Option<f32>,
    pub warnings: Vec<ExtractionWarning>,
}

#[derive(Debug)]
pub struct PreprocessedPage {
    /// Grayscale PNG ready for the OCR engine.
    pub png_bytes: Vec<u8>,
    pub report: QualityReport,
}

/// Run the full preprocessing chain on encoded page-image bytes.
pub fn preprocess_for_ocr(
    image_bytes: &[u8],
    branch: PreprocessBranch,
) -> Result<PreprocessedPage, ExtractionError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| ExtractionError::ImageProcessing(format!("failed to decode page: {e}")))?;
    let gray = rgb_to_gray(&decoded.to_rgb8());

    let mut report = QualityReport::default();
    report.blur_variance = compute_laplacian_variance(&gray);
    if report.blur_variance < BLUR_WARNING_VARIANCE && !is_mostly_blank(&gray) {
        report.warnings.push(ExtractionWarning::BlurryImage {
            variance: report.blur_variance,
        });
    }

    let denoised = mean_filter_3x3(&gray);
    let normalized = match branch {
        PreprocessBranch::Adaptive => stretch_contrast(&denoised),
        PreprocessBranch::SimpleThreshold => binarize(&denoised),
    };

    report.skew_angle = detect_skew_angle(&normalized);
    let straightened = match report.skew_angle {
        Some(angle) if angle.abs() >= SKEW_CORRECTION_MIN_DEG => {
            report
                .warnings
                .push(ExtractionWarning::SkewedPage { angle_degrees: angle });
            rotate_gray(&normalized, -angle)
        }
        _ => normalized,
    };

    Ok(PreprocessedPage {
        png_bytes: encode_gray_png(&straightened)?,
        report,
    })
}

/// ITU-R BT.601 luminance conversion.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma =
            (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }
    gray
}

/// 3x3 mean filter. Enough denoising for typical scan speckle without
/// rounding character edges the way a wider kernel would.
pub fn mean_filter_3x3(img: &GrayImage) -> GrayImage {
    let (w, h) = (img.width(), img.height());
    if w < 3 || h < 3 {
        return img.clone();
    }
    let mut out = img.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut sum = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    sum += img.get_pixel(x + dx - 1, y + dy - 1).0[0] as u32;
                }
            }
            out.put_pixel(x, y, Luma([(sum / 9) as u8]));
        }
    }
    out
}

/// Min-max contrast stretch to the full 0-255 range.
pub fn stretch_contrast(img: &GrayImage) -> GrayImage {
    let (mut lo, mut hi) = (255u8, 0u8);
    for p in img.pixels() {
        lo = lo.min(p.0[0]);
        hi = hi.max(p.0[0]);
    }
    if hi <= lo {
        return img.clone();
    }
    let range = (hi - lo) as f32;
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        let v = ((p.0[0] - lo) as f32 / range * 255.0).round() as u8;
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

/// Global binarization at the mean intensity.
pub fn binarize(img: &GrayImage) -> GrayImage {
    let sum: u64 = img.pixels().map(|p| p.0[0] as u64).sum();
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let threshold = (sum / count) as u8;

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        out.put_pixel(x, y, Luma([if p.0[0] < threshold { 0 } else { 255 }]));
    }
    out
}

fn is_mostly_blank(img: &GrayImage) -> bool {
    let total = (img.width() as usize * img.height() as usize).max(1);
    let bright = img.pixels().filter(|p| p.0[0] > 220).count();
    bright as f32 / total as f32 > 0.95
}

/// Laplacian variance sharpness metric: 3x3 kernel `[0,1,0; 1,-4,1; 0,1,0]`.
/// Blurry documents fall below 100, sharp text exceeds 500.
pub fn compute_laplacian_variance(img: &GrayImage) -> f32 {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let at = |dx: i64, dy: i64| img.get_pixel((x + dx) as u32, (y + dy) as u32).0[0] as f64;
            let lap = at(0, -1) + at(0, 1) + at(-1, 0) + at(1, 0) - 4.0 * at(0, 0);
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    ((sum_sq / count as f64) - mean * mean).max(0.0) as f32
}

/// Estimate page skew by projection profile: test candidate angles from
/// -5 to +5 degrees and keep the one giving the crispest row transitions.
/// Returns `None` for straight pages (|angle| < 0.5) or pages with too
/// little ink to profile.
pub fn detect_skew_angle(img: &GrayImage) -> Option<f32> {
    let (w, h) = (img.width(), img.height());
    if w < 50 || h < 50 {
        return None;
    }
    let ink = img.pixels().filter(|p| p.0[0] < INK_THRESHOLD).count();
    if (ink as f32) / (w as f32 * h as f32) < 0.02 {
        return None;
    }

    let mut best = (0.0f32, f64::NEG_INFINITY);
    let mut angle = -5.0f32;
    while angle <= 5.0 {
        let score = projection_variance(img, angle);
        if score > best.1 {
            best = (angle, score);
        }
        angle += 0.25;
    }

    (best.0.abs() >= 0.5).then_some(best.0)
}

fn projection_variance(img: &GrayImage, angle_deg: f32) -> f64 {
    let (w, h) = (img.width(), img.height());
    let tan_a = (angle_deg.to_radians()).tan() as f64;
    let mut rows = vec![0u32; h as usize];

    for y in 0..h {
        let shift = (y as f64 * tan_a).round() as i64;
        let mut count = 0u32;
        let mut x = 0u32;
        // Every 4th pixel is enough resolution for the profile.
        while x < w {
            let sx = x as i64 + shift;
            if (0..w as i64).contains(&sx) && img.get_pixel(sx as u32, y).0[0] < INK_THRESHOLD {
                count += 1;
            }
            x += 4;
        }
        rows[y as usize] = count;
    }

    rows.windows(2)
        .map(|pair| {
            let diff = pair[1] as f64 - pair[0] as f64;
            diff * diff
        })
        .sum()
}

/// Rotate about the image center by `angle_deg` (counter-clockwise positive),
/// nearest-neighbor sampling, white background.
pub fn rotate_gray(img: &GrayImage, angle_deg: f32) -> GrayImage {
    let (w, h) = (img.width(), img.height());
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();

    let mut out = GrayImage::from_pixel(w, h, Luma([255]));
    for y in 0..h {
        for x in 0..w {
            // Inverse mapping: where does this output pixel come from?
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = (cos_a * dx + sin_a * dy + cx).round();
            let sy = (-sin_a * dx + cos_a * dy + cy).round();
            if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
                out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

fn encode_gray_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
