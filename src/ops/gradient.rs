// ============================================================================
// GRADIENT FILLS — linear (horizontal/vertical/diagonal) and radial
// ============================================================================

use crate::color::Color;
use crate::layer::{GradientDirection, Transform};
use image::RgbaImage;
use rayon::prelude::*;

/// Renders a gradient into the layer's rectangle (the whole surface when the
/// transform has no area). Stops are evenly spaced: color i sits at
/// i / (n - 1); a single color paints solid.
pub fn rasterize_gradient(
    target: &mut RgbaImage,
    transform: &Transform,
    colors: &[Color],
    direction: GradientDirection,
) {
    if colors.is_empty() {
        return;
    }
    let surface_w = target.width();
    let surface_h = target.height();
    if surface_w == 0 || surface_h == 0 {
        return;
    }

    // Degenerate rect means "fill everything": background gradients carry
    // no explicit size.
    let (rx, ry, rw, rh) = if transform.width <= 0.0 || transform.height <= 0.0 {
        (0.0, 0.0, surface_w as f32, surface_h as f32)
    } else {
        (transform.x, transform.y, transform.width, transform.height)
    };

    let x0 = (rx.floor().max(0.0)) as u32;
    let y0 = (ry.floor().max(0.0)) as u32;
    let x1 = ((rx + rw).ceil().min(surface_w as f32)).max(0.0) as u32;
    let y1 = ((ry + rh).ceil().min(surface_h as f32)).max(0.0) as u32;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = surface_w as usize * 4;
    let buf: &mut [u8] = target;

    buf.par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let fy = y as f32 + 0.5;
            for x in x0..x1 {
                let fx = x as f32 + 0.5;
                let t = match direction {
                    GradientDirection::Horizontal => (fx - rx) / rw,
                    GradientDirection::Vertical => (fy - ry) / rh,
                    GradientDirection::Diagonal => ((fx - rx) / rw + (fy - ry) / rh) * 0.5,
                    GradientDirection::Radial => {
                        let cx = rx + rw * 0.5;
                        let cy = ry + rh * 0.5;
                        let dx = (fx - cx) / (rw * 0.5);
                        let dy = (fy - cy) / (rh * 0.5);
                        (dx * dx + dy * dy).sqrt()
                    }
                };
                let px = sample(colors, t.clamp(0.0, 1.0));
                let idx = x as usize * 4;
                row[idx..idx + 4].copy_from_slice(&px);
            }
        });
}

fn sample(colors: &[Color], t: f32) -> [u8; 4] {
    if colors.len() == 1 {
        return colors[0].0;
    }
    let span = (colors.len() - 1) as f32;
    let pos = t * span;
    let i = (pos.floor() as usize).min(colors.len() - 2);
    let frac = pos - i as f32;
    let a = colors[i].0;
    let b = colors[i + 1].0;
    let mut out = [0u8; 4];
    for c in 0..4 {
        out[c] = (a[c] as f32 + (b[c] as f32 - a[c] as f32) * frac).round() as u8;
    }
    out
}
