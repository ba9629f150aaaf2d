// ============================================================================
// TEXT RASTERIZER — ab_glyph layout + coverage rendering, system font lookup
// ============================================================================

use crate::color::Color;
use crate::layer::TextAlign;
use crate::log_warn;
use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lay out a single line, returning positioned glyphs (left edge at x=0
/// before the alignment offset) plus metrics.
/// Returns `(glyphs, total_width, ascent, descent, line_height)`.
pub fn layout_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    align: TextAlign,
) -> (Vec<(GlyphId, f32, f32)>, f32, f32, f32, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();
    let line_height = scaled.height();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let total_width = cursor_x;

    let offset = match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => -total_width * 0.5,
        TextAlign::Right => -total_width,
    };
    for glyph in &mut glyphs {
        glyph.1 += offset;
    }

    (glyphs, total_width, ascent, descent, line_height)
}

/// Rasterize text into `target` (a transparent scratch buffer).
///
/// `(origin_x, origin_y)` anchors the top of the first line, so the first
/// baseline sits at `origin_y + ascent`. Multiline via '\n'. Bold is a
/// one-pixel double strike, italic a shear around each baseline.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_text(
    target: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    font_size: f32,
    align: TextAlign,
    origin_x: f32,
    origin_y: f32,
    color: Color,
    bold: bool,
    italic: bool,
) {
    let w = target.width() as i32;
    let h = target.height() as i32;
    if w == 0 || h == 0 || text.is_empty() {
        return;
    }

    let scaled = font.as_scaled(font_size);
    let line_height = scaled.height();
    let rgba = color.0;

    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_height;
        let (glyphs, _, _, _, _) = layout_text(font, line, font_size, align);

        for &(glyph_id, gx, gy) in &glyphs {
            let baseline_y = origin_y + gy + y_offset;
            let glyph =
                glyph_id.with_scale_and_position(font_size, point(origin_x + gx, baseline_y));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                if cov <= 0.001 {
                    return;
                }
                let mut cx = bounds.min.x + px as f32;
                let cy = bounds.min.y + py as f32;
                if italic {
                    cx += (baseline_y - cy) * 0.2;
                }
                let ix = cx.round() as i32;
                let iy = cy.round() as i32;
                put_coverage(target, w, h, ix, iy, rgba, cov);
                if bold {
                    put_coverage(target, w, h, ix + 1, iy, rgba, cov);
                }
            });
        }
    }
}

#[inline]
fn put_coverage(target: &mut RgbaImage, w: i32, h: i32, x: i32, y: i32, rgba: [u8; 4], cov: f32) {
    if x < 0 || y < 0 || x >= w || y >= h {
        return;
    }
    let a = (rgba[3] as f32 * cov).round().min(255.0) as u8;
    let px = target.get_pixel_mut(x as u32, y as u32);
    if a > px.0[3] {
        px.0 = [rgba[0], rgba[1], rgba[2], a];
    }
}

// ============================================================================
// FONT STORE — well-known system paths, no fontconfig dependency
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum FontClass {
    Sans,
    Serif,
    Mono,
}

fn classify_family(family: &str) -> FontClass {
    let f = family.to_ascii_lowercase();
    if f.contains("courier") || f.contains("mono") || f.contains("consol") {
        FontClass::Mono
    } else if f.contains("times") || f.contains("serif") || f.contains("georgia") {
        FontClass::Serif
    } else {
        FontClass::Sans
    }
}

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/truetype/noto",
    "/usr/share/fonts/noto",
    "/Library/Fonts",
    "/System/Library/Fonts",
];

fn candidate_stems(class: FontClass) -> &'static [&'static str] {
    match class {
        FontClass::Sans => &["DejaVuSans", "LiberationSans", "NotoSans"],
        FontClass::Serif => &["DejaVuSerif", "LiberationSerif", "NotoSerif"],
        FontClass::Mono => &["DejaVuSansMono", "LiberationMono", "NotoSansMono"],
    }
}

fn style_suffixes(bold: bool, italic: bool) -> &'static [&'static str] {
    match (bold, italic) {
        (true, true) => &["-BoldOblique", "-BoldItalic"],
        (true, false) => &["-Bold"],
        (false, true) => &["-Oblique", "-Italic"],
        (false, false) => &["", "-Regular"],
    }
}

/// Resolves and caches fonts for text layers.
///
/// Families map to a generic class (sans/serif/mono) and are looked up under
/// the usual Linux and macOS font directories; the first readable face wins.
/// A family with no resolvable face caches the miss and the text layer
/// renders empty.
#[derive(Default)]
pub struct FontStore {
    cache: Mutex<HashMap<(FontClass, bool, bool), Option<FontArc>>>,
}

impl FontStore {
    pub fn new() -> FontStore {
        FontStore::default()
    }

    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> Option<FontArc> {
        let class = classify_family(family);
        let key = (class, bold, italic);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
            let loaded = load_first_match(class, bold, italic)
                // A styled face that is missing falls back to the regular cut
                .or_else(|| {
                    if bold || italic {
                        load_first_match(class, false, false)
                    } else {
                        None
                    }
                });
            if loaded.is_none() {
                log_warn!(
                    "no font found for family '{}' (bold={}, italic={}), text renders empty",
                    family,
                    bold,
                    italic
                );
            }
            cache.insert(key, loaded.clone());
            loaded
        } else {
            load_first_match(class, bold, italic)
        }
    }
}

fn load_first_match(class: FontClass, bold: bool, italic: bool) -> Option<FontArc> {
    for dir in FONT_DIRS {
        for stem in candidate_stems(class) {
            for suffix in style_suffixes(bold, italic) {
                let path = format!("{}/{}{}.ttf", dir, stem, suffix);
                if let Ok(bytes) = std::fs::read(&path) {
                    if let Ok(font) = FontArc::try_from_vec(bytes) {
                        return Some(font);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_common_families() {
        assert!(matches!(classify_family("Courier New"), FontClass::Mono));
        assert!(matches!(classify_family("Times New Roman"), FontClass::Serif));
        assert!(matches!(classify_family("Arial"), FontClass::Sans));
        assert!(matches!(classify_family("Verdana"), FontClass::Sans));
    }

    #[test]
    fn rasterize_with_resolved_font_marks_pixels() {
        let store = FontStore::new();
        let Some(font) = store.resolve("Arial", false, false) else {
            // No system font in this environment; resolution degrades to None
            return;
        };
        let mut img = RgbaImage::new(200, 60);
        rasterize_text(
            &mut img,
            &font,
            "Hi",
            32.0,
            TextAlign::Left,
            10.0,
            5.0,
            Color::BLACK,
            false,
            false,
        );
        assert!(img.pixels().any(|p| p.0[3] > 0));
    }

    #[test]
    fn alignment_offsets_shift_layout() {
        let store = FontStore::new();
        let Some(font) = store.resolve("Arial", false, false) else {
            return;
        };
        let (left, width, _, _, _) = layout_text(&font, "test", 24.0, TextAlign::Left);
        let (right, _, _, _, _) = layout_text(&font, "test", 24.0, TextAlign::Right);
        assert!(width > 0.0);
        assert!((left[0].1 - (right[0].1 + width)).abs() < 0.01);
    }
}
