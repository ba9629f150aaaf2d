// ============================================================================
// SHAPE RASTERIZER — SDF-based fill + stroke with anti-aliasing
// ============================================================================

use crate::color::Color;
use crate::layer::{ShapeKind, Transform};
use image::RgbaImage;
use rayon::prelude::*;

// ============================================================================
// SDF functions — return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for a circle of radius `r`.
#[inline]
fn sdf_circle(px: f32, py: f32, r: f32) -> f32 {
    (px * px + py * py).sqrt() - r
}

/// SDF for a regular polygon with `n` sides, circumscribed radius `r`,
/// one vertex pointing up.
fn sdf_polygon(px: f32, py: f32, r: f32, n: u32) -> f32 {
    let angle = std::f32::consts::TAU / n as f32;
    let half = angle * 0.5;
    let theta = py.atan2(px) + std::f32::consts::FRAC_PI_2;
    let theta = ((theta % angle) + angle) % angle - half;
    let len = (px * px + py * py).sqrt();
    len * theta.cos() - r * half.cos()
}

/// SDF for a 5-point star, outer radius `ro`, inner radius `ri`, one point
/// up. The ten vertices alternate outer/inner starting from the top tip.
fn sdf_star(px: f32, py: f32, ro: f32, ri: f32) -> f32 {
    let step = std::f32::consts::PI / 5.0;
    let mut verts = [(0.0f32, 0.0f32); 10];
    for (i, v) in verts.iter_mut().enumerate() {
        let r = if i % 2 == 0 { ro } else { ri };
        let a = i as f32 * step - std::f32::consts::FRAC_PI_2;
        *v = (r * a.cos(), r * a.sin());
    }
    sdf_polygon_verts(&verts, px, py)
}

/// Signed distance to a simple polygon given explicit vertices. The sign
/// comes from even-odd crossing parity, so concave outlines work too.
fn sdf_polygon_verts(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].0) * (px - verts[0].0) + (py - verts[0].1) * (py - verts[0].1);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let t = ((wx * ex + wy * ey) / (ex * ex + ey * ey)).clamp(0.0, 1.0);
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // Winding number contribution (crossing test)
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Isoceles triangle, apex up, filling the half-extents.
fn sdf_triangle(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let verts: [(f32, f32); 3] = [(0.0, -hy), (hx, hy), (-hx, hy)];
    sdf_polygon_verts(&verts, px, py)
}

/// SDF at local coordinates (centered at origin, y down).
fn shape_sdf(kind: ShapeKind, sides: u32, px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    match kind {
        ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::Circle => sdf_circle(px, py, hx.min(hy)),
        ShapeKind::Triangle => sdf_triangle(px, py, hx, hy),
        // Inner radius half the outer
        ShapeKind::Star => sdf_star(px, py, hx.min(hy), hx.min(hy) * 0.5),
        ShapeKind::Polygon => sdf_polygon(px, py, hx.min(hy), sides.max(3)),
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ============================================================================
// RASTERIZATION
// ============================================================================

/// Rasterize a shape layer into `target` (a transparent scratch buffer).
///
/// The shape fills the transform's bounding box and is rotated/scaled/skewed
/// around the box center; sampling runs through the inverse of that matrix.
/// Fill coverage is always painted; a stroke band on top only when
/// `stroke_width > 0`.
pub fn rasterize_shape(
    target: &mut RgbaImage,
    transform: &Transform,
    kind: ShapeKind,
    fill: Color,
    stroke_color: Color,
    stroke_width: f32,
    sides: u32,
) {
    let w = target.width();
    let h = target.height();
    if w == 0 || h == 0 || transform.width <= 0.0 || transform.height <= 0.0 {
        return;
    }

    let hx = transform.width * 0.5;
    let hy = transform.height * 0.5;
    let cx = transform.x + hx;
    let cy = transform.y + hy;

    // Forward matrix M = R * K * S (rotate, skew, scale); sampling inverts it.
    let rot = transform.rotation.to_radians();
    let (sin_r, cos_r) = rot.sin_cos();
    let kx = transform.skew_x.to_radians().tan();
    let ky = transform.skew_y.to_radians().tan();
    let sx = transform.scale_x;
    let sy = transform.scale_y;

    // R = [c -s; s c], K = [1 kx; ky 1], S = [sx 0; 0 sy]
    let k00 = sx;
    let k01 = kx * sy;
    let k10 = ky * sx;
    let k11 = sy;
    let a = cos_r * k00 - sin_r * k10;
    let b = cos_r * k01 - sin_r * k11;
    let c = sin_r * k00 + cos_r * k10;
    let d = sin_r * k01 + cos_r * k11;
    let det = a * d - b * c;
    if det.abs() < 1e-8 {
        return;
    }
    let ia = d / det;
    let ib = -b / det;
    let ic = -c / det;
    let id = a / det;

    let fill_px = fill.0;
    let stroke_px = stroke_color.0;
    let stroke_half = stroke_width * 0.5;

    let row_bytes = w as usize * 4;
    let buf: &mut [u8] = target;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py_canvas = row as f32 + 0.5;
            for col in 0..w as usize {
                let px_canvas = col as f32 + 0.5;

                let dx = px_canvas - cx;
                let dy = py_canvas - cy;
                let lx = ia * dx + ib * dy;
                let ly = ic * dx + id * dy;

                let dist = shape_sdf(kind, sides, lx, ly, hx, hy);

                let fill_cov = smoothstep(0.5, -0.5, dist);
                let (color, coverage) = if stroke_width > 0.0 {
                    let band = dist.abs() - stroke_half;
                    let stroke_cov = smoothstep(0.5, -0.5, band);
                    if stroke_cov > 0.001 {
                        // Stroke paints over the fill at the boundary
                        (stroke_px, stroke_cov.max(fill_cov))
                    } else {
                        (fill_px, fill_cov)
                    }
                } else {
                    (fill_px, fill_cov)
                };

                if coverage > 0.001 {
                    let idx = col * 4;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = (color[3] as f32 * coverage).round().min(255.0) as u8;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(x: f32, y: f32, w: f32, h: f32) -> Transform {
        Transform {
            x,
            y,
            width: w,
            height: h,
            ..Transform::default()
        }
    }

    #[test]
    fn rectangle_fills_its_bounding_box() {
        let mut img = RgbaImage::new(60, 60);
        rasterize_shape(
            &mut img,
            &transform(10.0, 10.0, 40.0, 40.0),
            ShapeKind::Rectangle,
            Color([255, 0, 0, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        assert_eq!(img.get_pixel(30, 30).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(5, 5).0[3], 0);
        assert_eq!(img.get_pixel(55, 30).0[3], 0);
    }

    #[test]
    fn circle_is_inscribed() {
        let mut img = RgbaImage::new(100, 100);
        rasterize_shape(
            &mut img,
            &transform(0.0, 0.0, 100.0, 100.0),
            ShapeKind::Circle,
            Color([0, 0, 255, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        // Center solid, corners outside the inscribed disc
        assert_eq!(img.get_pixel(50, 50).0[3], 255);
        assert_eq!(img.get_pixel(2, 2).0[3], 0);
        assert_eq!(img.get_pixel(97, 97).0[3], 0);
    }

    #[test]
    fn triangle_apex_points_up() {
        let mut img = RgbaImage::new(100, 100);
        rasterize_shape(
            &mut img,
            &transform(0.0, 0.0, 100.0, 100.0),
            ShapeKind::Triangle,
            Color([0, 255, 0, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        // Apex column is filled near the top center, empty at the top corners
        assert!(img.get_pixel(50, 10).0[3] > 0);
        assert_eq!(img.get_pixel(5, 10).0[3], 0);
        assert_eq!(img.get_pixel(95, 10).0[3], 0);
        // Base spans the bottom
        assert!(img.get_pixel(10, 95).0[3] > 0);
        assert!(img.get_pixel(90, 95).0[3] > 0);
    }

    #[test]
    fn star_points_up_with_half_inner_radius() {
        let mut img = RgbaImage::new(100, 100);
        rasterize_shape(
            &mut img,
            &transform(0.0, 0.0, 100.0, 100.0),
            ShapeKind::Star,
            Color([255, 200, 0, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        // The top tip reaches toward the outer radius
        assert!(img.get_pixel(50, 8).0[3] > 0);
        // Between two arms coverage stops at the inner radius
        assert!(img.get_pixel(60, 35).0[3] > 0);
        assert_eq!(img.get_pixel(74, 18).0[3], 0);
        // Straight down lies on an inner vertex, not a tip
        assert_eq!(img.get_pixel(50, 92).0[3], 0);
    }

    #[test]
    fn polygon_renders_vertex_up() {
        let mut img = RgbaImage::new(100, 100);
        rasterize_shape(
            &mut img,
            &transform(0.0, 0.0, 100.0, 100.0),
            ShapeKind::Polygon,
            Color([0, 128, 255, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        // A hexagon vertex reaches the top of the bounding circle
        assert!(img.get_pixel(50, 6).0[3] > 0);
        // The flat side faces right: coverage ends at the apothem
        assert_eq!(img.get_pixel(95, 50).0[3], 0);
        assert!(img.get_pixel(88, 50).0[3] > 0);
    }

    #[test]
    fn stroke_band_paints_only_when_width_positive() {
        let mut filled = RgbaImage::new(60, 60);
        rasterize_shape(
            &mut filled,
            &transform(10.0, 10.0, 40.0, 40.0),
            ShapeKind::Rectangle,
            Color([255, 0, 0, 255]),
            Color([0, 0, 0, 255]),
            4.0,
            6,
        );
        // Boundary pixels carry the stroke color, the interior the fill
        assert_eq!(filled.get_pixel(30, 10).0[..3], [0, 0, 0]);
        assert_eq!(filled.get_pixel(30, 30).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rotation_moves_coverage() {
        let mut img = RgbaImage::new(100, 100);
        let mut t = transform(30.0, 45.0, 40.0, 10.0);
        t.rotation = 90.0;
        rasterize_shape(
            &mut img,
            &t,
            ShapeKind::Rectangle,
            Color([255, 255, 255, 255]),
            Color::BLACK,
            0.0,
            6,
        );
        // A thin horizontal bar rotated 90 degrees reads vertical
        assert!(img.get_pixel(50, 35).0[3] > 0);
        assert!(img.get_pixel(50, 65).0[3] > 0);
        assert_eq!(img.get_pixel(35, 50).0[3], 0);
    }
}
