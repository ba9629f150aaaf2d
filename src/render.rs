// ============================================================================
// COMPOSITOR — per-layer raster, filter stack, blend-mode compositing
// ============================================================================

use crate::cache::BitmapCache;
use crate::document::Document;
use crate::layer::{BlendMode, Layer, LayerContent};
use crate::ops::filters::apply_filters;
use crate::ops::gradient::rasterize_gradient;
use crate::ops::pattern::rasterize_pattern;
use crate::ops::shapes::rasterize_shape;
use crate::ops::text::{rasterize_text, FontStore};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Composite the document into a flat RGBA image.
///
/// Pure function of (document, cache, fonts): the surface clears to opaque
/// white, then every visible layer is rendered alone into a transparent
/// scratch buffer, run through its filter stack, and blended on top with
/// `opacity / 100` and its blend mode. Hidden layers cost nothing.
pub fn composite(doc: &Document, cache: &BitmapCache, fonts: &FontStore) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(doc.width, doc.height, Rgba([255, 255, 255, 255]));
    for layer in &doc.layers {
        if !layer.visible {
            continue;
        }
        let scratch = render_layer(doc, layer, cache, fonts);
        blend_buffer(&mut out, &scratch, layer.blend_mode, layer.opacity / 100.0);
    }
    out
}

/// Render a single layer, filters included, into a transparent buffer of the
/// document's size. Shared by the compositor and the magic wand.
pub fn render_layer(
    doc: &Document,
    layer: &Layer,
    cache: &BitmapCache,
    fonts: &FontStore,
) -> RgbaImage {
    let mut scratch = RgbaImage::new(doc.width, doc.height);
    render_content(&mut scratch, layer, cache, fonts);
    apply_filters(&mut scratch, &layer.filters);
    scratch
}

/// The magic wand's view of a layer: the layer alone, filters applied and
/// its opacity folded into the alpha channel.
pub fn render_layer_isolated(
    doc: &Document,
    layer: &Layer,
    cache: &BitmapCache,
    fonts: &FontStore,
) -> RgbaImage {
    let mut img = render_layer(doc, layer, cache, fonts);
    let opacity = (layer.opacity / 100.0).clamp(0.0, 1.0);
    if opacity < 1.0 {
        for px in img.pixels_mut() {
            px.0[3] = (px.0[3] as f32 * opacity).round() as u8;
        }
    }
    img
}

fn render_content(scratch: &mut RgbaImage, layer: &Layer, cache: &BitmapCache, fonts: &FontStore) {
    match &layer.content {
        LayerContent::Background { color } => {
            let px = Rgba(color.0);
            for p in scratch.pixels_mut() {
                *p = px;
            }
        }
        LayerContent::Text {
            text,
            font_family,
            font_size,
            color,
            bold,
            italic,
            align,
        } => {
            // Missing fonts degrade to an empty layer, never an error
            if let Some(font) = fonts.resolve(font_family, *bold, *italic) {
                rasterize_text(
                    scratch,
                    &font,
                    text,
                    *font_size,
                    *align,
                    layer.transform.x,
                    layer.transform.y,
                    *color,
                    *bold,
                    *italic,
                );
            }
        }
        LayerContent::Shape {
            shape,
            fill,
            stroke_color,
            stroke_width,
            sides,
        } => {
            rasterize_shape(
                scratch,
                &layer.transform,
                *shape,
                *fill,
                *stroke_color,
                *stroke_width,
                *sides,
            );
        }
        LayerContent::Gradient { colors, direction } => {
            rasterize_gradient(scratch, &layer.transform, colors, *direction);
        }
        LayerContent::Pattern {
            pattern,
            color1,
            color2,
            size,
        } => {
            rasterize_pattern(scratch, *pattern, *color1, *color2, *size);
        }
        LayerContent::Image { scale, .. } => {
            if let Some(bitmap) = cache.get(layer.id) {
                draw_bitmap(scratch, layer, bitmap, *scale);
            }
        }
    }
}

/// Draws a decoded bitmap into the layer's transformed bounding box with
/// bilinear sampling. The content `scale` multiplies the transform scale.
fn draw_bitmap(target: &mut RgbaImage, layer: &Layer, bitmap: &RgbaImage, scale: f32) {
    let t = &layer.transform;
    let bw = bitmap.width() as f32;
    let bh = bitmap.height() as f32;
    if bw == 0.0 || bh == 0.0 || t.width <= 0.0 || t.height <= 0.0 {
        return;
    }

    let hx = t.width * 0.5;
    let hy = t.height * 0.5;
    let cx = t.x + hx;
    let cy = t.y + hy;

    let rot = t.rotation.to_radians();
    let (sin_r, cos_r) = rot.sin_cos();
    let sx = t.scale_x * scale;
    let sy = t.scale_y * scale;
    if sx.abs() < 1e-6 || sy.abs() < 1e-6 {
        return;
    }

    let w = target.width();
    let stride = w as usize * 4;
    let buf: &mut [u8] = target;

    buf.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = row as f32 + 0.5;
            for col in 0..w as usize {
                let px = col as f32 + 0.5;
                // Inverse rotate then inverse scale into box-local space
                let dx = px - cx;
                let dy = py - cy;
                let lx = (dx * cos_r + dy * sin_r) / sx;
                let ly = (-dx * sin_r + dy * cos_r) / sy;
                // Box-local to source pixel coordinates
                let u = (lx + hx) / t.width * bw - 0.5;
                let v = (ly + hy) / t.height * bh - 0.5;
                if u < -0.5 || v < -0.5 || u > bw - 0.5 || v > bh - 0.5 {
                    continue;
                }
                let sample = bilinear(bitmap, u, v);
                if sample[3] > 0 {
                    let idx = col * 4;
                    row_buf[idx..idx + 4].copy_from_slice(&sample);
                }
            }
        });
}

fn bilinear(img: &RgbaImage, u: f32, v: f32) -> [u8; 4] {
    let w = img.width() as i32;
    let h = img.height() as i32;
    let x0 = u.floor() as i32;
    let y0 = v.floor() as i32;
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let sample = |x: i32, y: i32| -> [f32; 4] {
        let xc = x.clamp(0, w - 1) as u32;
        let yc = y.clamp(0, h - 1) as u32;
        let p = img.get_pixel(xc, yc).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * fx;
        let bot = p01[c] + (p11[c] - p01[c]) * fx;
        out[c] = (top + (bot - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

// ============================================================================
// BLENDING
// ============================================================================

fn blend_buffer(base: &mut RgbaImage, top: &RgbaImage, mode: BlendMode, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let w = base.width() as usize;
    let stride = w * 4;
    let top_raw = top.as_raw();
    let buf: &mut [u8] = base;

    buf.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let top_row = &top_raw[row * stride..(row + 1) * stride];
            for col in 0..w {
                let idx = col * 4;
                let t = Rgba([
                    top_row[idx],
                    top_row[idx + 1],
                    top_row[idx + 2],
                    top_row[idx + 3],
                ]);
                if t.0[3] == 0 {
                    continue;
                }
                let b = Rgba([
                    row_buf[idx],
                    row_buf[idx + 1],
                    row_buf[idx + 2],
                    row_buf[idx + 3],
                ]);
                let out = blend_pixel(b, t, mode, opacity);
                row_buf[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

/// Source-over compositing with separable blend modes on unpremultiplied
/// RGBA. `opacity` scales the top alpha before compositing.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top.0[3] == 0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel
    if matches!(mode, BlendMode::Normal) && opacity >= 1.0 && top.0[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base.0[0] as f32 / 255.0;
    let base_g = base.0[1] as f32 / 255.0;
    let base_b = base.0[2] as f32 / 255.0;
    let base_a = base.0[3] as f32 / 255.0;

    let top_r = top.0[0] as f32 / 255.0;
    let top_g = top.0[1] as f32 / 255.0;
    let top_b = top.0[2] as f32 / 255.0;
    let top_a = (top.0[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
        BlendMode::ColorDodge => (
            color_dodge_channel(base_r, top_r),
            color_dodge_channel(base_g, top_g),
            color_dodge_channel(base_b, top_b),
        ),
        BlendMode::ColorBurn => (
            color_burn_channel(base_r, top_r),
            color_burn_channel(base_g, top_g),
            color_burn_channel(base_b, top_b),
        ),
        BlendMode::HardLight => (
            overlay_channel(top_r, base_r),
            overlay_channel(top_g, base_g),
            overlay_channel(top_b, base_b),
        ),
        BlendMode::SoftLight => (
            soft_light_channel(base_r, top_r),
            soft_light_channel(base_g, top_g),
            soft_light_channel(base_b, top_b),
        ),
        BlendMode::Difference => (
            (base_r - top_r).abs(),
            (base_g - top_g).abs(),
            (base_b - top_b).abs(),
        ),
        BlendMode::Exclusion => (
            base_r + top_r - 2.0 * base_r * top_r,
            base_g + top_g - 2.0 * base_g * top_g,
            base_b + top_b - 2.0 * base_b * top_b,
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).clamp(0.0, 255.0) as u8,
        (out_g * 255.0).clamp(0.0, 255.0) as u8,
        (out_b * 255.0).clamp(0.0, 255.0) as u8,
        (out_a * 255.0).clamp(0.0, 255.0) as u8,
    ])
}

// Blend mode helper functions
fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if top == 0.0 {
        0.0
    } else {
        (1.0 - (1.0 - base) / top).max(0.0)
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::layer::ShapeKind;

    fn empty_env() -> (BitmapCache, FontStore) {
        (BitmapCache::new(), FontStore::new())
    }

    fn red_rect_doc() -> Document {
        let mut doc = Document::new(200, 200);
        let id = doc.add_layer(
            LayerContent::Shape {
                shape: ShapeKind::Rectangle,
                fill: Color([255, 0, 0, 255]),
                stroke_color: Color::BLACK,
                stroke_width: 0.0,
                sides: 6,
            },
            "red",
        );
        doc.set_property(id, "x", &serde_json::json!(50));
        doc.set_property(id, "y", &serde_json::json!(50));
        doc
    }

    #[test]
    fn composite_starts_white() {
        let doc = Document::new(50, 50);
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(49, 49).0, [255, 255, 255, 255]);
    }

    #[test]
    fn red_rectangle_over_white_background() {
        let doc = red_rect_doc();
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(100, 100).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(190, 190).0, [255, 255, 255, 255]);
    }

    #[test]
    fn hidden_layer_contributes_nothing() {
        let mut doc = red_rect_doc();
        let id = doc.active_layer.unwrap();
        doc.set_visible(id, false);
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(100, 100).0, [255, 255, 255, 255]);
    }

    #[test]
    fn zero_opacity_layer_is_invisible_but_queryable() {
        let mut doc = red_rect_doc();
        let id = doc.active_layer.unwrap();
        doc.set_opacity(id, 0.0);
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(100, 100).0, [255, 255, 255, 255]);
        assert!(doc.layer(id).is_some());
    }

    #[test]
    fn half_opacity_mixes_toward_base() {
        let mut doc = red_rect_doc();
        let id = doc.active_layer.unwrap();
        doc.set_opacity(id, 50.0);
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        let p = img.get_pixel(100, 100).0;
        assert!(p[0] > 240);
        assert!((p[1] as i16 - 128).abs() < 6);
        assert!((p[2] as i16 - 128).abs() < 6);
    }

    #[test]
    fn multiply_blend_darkens() {
        let out = blend_pixel(
            Rgba([200, 200, 200, 255]),
            Rgba([128, 128, 128, 255]),
            BlendMode::Multiply,
            1.0,
        );
        assert!(out.0[0] < 128);
        assert_eq!(out.0[3], 255);
    }

    #[test]
    fn normal_blend_fast_path_overwrites() {
        let out = blend_pixel(
            Rgba([1, 2, 3, 255]),
            Rgba([9, 8, 7, 255]),
            BlendMode::Normal,
            1.0,
        );
        assert_eq!(out.0, [9, 8, 7, 255]);
    }

    #[test]
    fn missing_bitmap_renders_image_layer_empty() {
        let mut doc = Document::new(64, 64);
        doc.add_layer(
            LayerContent::Image {
                source: "cape.png".to_string(),
                original_width: 32,
                original_height: 32,
                scale: 1.0,
            },
            "img",
        );
        let (cache, fonts) = empty_env();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(32, 32).0, [255, 255, 255, 255]);
    }

    #[test]
    fn cached_bitmap_is_drawn_into_the_box() {
        let mut doc = Document::new(64, 64);
        let id = doc.add_layer(
            LayerContent::Image {
                source: "cape.png".to_string(),
                original_width: 8,
                original_height: 8,
                scale: 1.0,
            },
            "img",
        );
        doc.set_property(id, "x", &serde_json::json!(10));
        doc.set_property(id, "y", &serde_json::json!(10));
        doc.set_property(id, "width", &serde_json::json!(20));
        doc.set_property(id, "height", &serde_json::json!(20));
        let mut cache = BitmapCache::new();
        cache.insert(id, RgbaImage::from_pixel(8, 8, Rgba([0, 200, 0, 255])));
        let fonts = FontStore::new();
        let img = composite(&doc, &cache, &fonts);
        assert_eq!(img.get_pixel(20, 20).0, [0, 200, 0, 255]);
        assert_eq!(img.get_pixel(50, 50).0, [255, 255, 255, 255]);
    }
}
