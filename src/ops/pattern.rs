// ============================================================================
// PATTERN FILLS — stripe and dot tiles
// ============================================================================

use crate::color::Color;
use crate::layer::PatternKind;
use image::RgbaImage;
use rayon::prelude::*;

/// Fills the whole surface with `color1`, then paints the motif in `color2`:
/// vertical stripes of width `size` every `2*size` px, or a dot grid with
/// spacing `2*size` and radius `size/2`.
pub fn rasterize_pattern(
    target: &mut RgbaImage,
    kind: PatternKind,
    color1: Color,
    color2: Color,
    size: f32,
) {
    let w = target.width() as usize;
    let h = target.height() as usize;
    if w == 0 || h == 0 {
        return;
    }
    let size = size.max(1.0);
    let period = size * 2.0;
    let base = color1.0;
    let accent = color2.0;

    let stride = w * 4;
    let buf: &mut [u8] = target;

    buf.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let fx = x as f32 + 0.5;
                let fy = y as f32 + 0.5;
                let px = match kind {
                    PatternKind::Stripes => {
                        if fx.rem_euclid(period) < size {
                            accent
                        } else {
                            base
                        }
                    }
                    PatternKind::Dots => {
                        let cx = (fx / period).floor() * period + size;
                        let cy = (fy / period).floor() * period + size;
                        let dx = fx - cx;
                        let dy = fy - cy;
                        let r = size * 0.5;
                        if dx * dx + dy * dy <= r * r {
                            accent
                        } else {
                            base
                        }
                    }
                };
                let idx = x * 4;
                row[idx..idx + 4].copy_from_slice(&px);
            }
        });
}
