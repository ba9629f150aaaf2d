// ============================================================================
// IMAGE FILTERS — per-layer filter stack (color adjustments, blur, emboss)
// ============================================================================

use crate::layer::FilterSettings;
use image::RgbaImage;
use rayon::prelude::*;

/// Applies a layer's filter stack to its rendered scratch buffer, in a fixed
/// order so combined filters are deterministic:
/// grayscale, sepia, invert, hue shift, saturation, brightness, contrast,
/// blur, emboss.
pub fn apply_filters(img: &mut RgbaImage, settings: &FilterSettings) {
    if settings.is_neutral() {
        return;
    }
    if settings.grayscale {
        apply_pixel_transform(img, |r, g, b, a| {
            let lum = 0.2126 * r + 0.7152 * g + 0.0722 * b;
            (lum, lum, lum, a)
        });
    }
    if settings.sepia {
        apply_pixel_transform(img, |r, g, b, a| {
            let sr = 0.393 * r + 0.769 * g + 0.189 * b;
            let sg = 0.349 * r + 0.686 * g + 0.168 * b;
            let sb = 0.272 * r + 0.534 * g + 0.131 * b;
            (sr, sg, sb, a)
        });
    }
    if settings.invert {
        apply_pixel_transform(img, |r, g, b, a| (255.0 - r, 255.0 - g, 255.0 - b, a));
    }
    if settings.hue_shift != 0.0 || settings.saturation != 1.0 {
        let hue = settings.hue_shift / 360.0;
        let sat = settings.saturation.max(0.0);
        apply_pixel_transform(img, move |r, g, b, a| {
            let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
            let h = (h + hue).rem_euclid(1.0);
            let s = (s * sat).clamp(0.0, 1.0);
            let (nr, ng, nb) = hsl_to_rgb(h, s, l);
            (nr * 255.0, ng * 255.0, nb * 255.0, a)
        });
    }
    if settings.brightness != 1.0 {
        let k = settings.brightness.max(0.0);
        apply_pixel_transform(img, move |r, g, b, a| (r * k, g * k, b * k, a));
    }
    if settings.contrast != 1.0 {
        let k = settings.contrast.max(0.0);
        apply_pixel_transform(img, move |r, g, b, a| {
            (
                (r - 128.0) * k + 128.0,
                (g - 128.0) * k + 128.0,
                (b - 128.0) * k + 128.0,
                a,
            )
        });
    }
    if settings.blur_radius > 0.0 {
        // CSS blur(Npx) reads roughly as a gaussian with sigma N/2
        *img = parallel_gaussian_blur(img, settings.blur_radius * 0.5);
    }
    if settings.emboss {
        *img = emboss(img);
    }
}

/// Per-pixel RGB(A) transform, parallel by row. Channels are f32 in 0..255
/// and clamped on write.
fn apply_pixel_transform<F>(img: &mut RgbaImage, f: F)
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = img.width() as usize;
    if w == 0 {
        return;
    }
    let stride = w * 4;
    let buf: &mut [u8] = img;
    buf.par_chunks_mut(stride).for_each(|row| {
        for x in 0..w {
            let pi = x * 4;
            let (r, g, b, a) = f(
                row[pi] as f32,
                row[pi + 1] as f32,
                row[pi + 2] as f32,
                row[pi + 3] as f32,
            );
            row[pi] = r.round().clamp(0.0, 255.0) as u8;
            row[pi + 1] = g.round().clamp(0.0, 255.0) as u8;
            row[pi + 2] = b.round().clamp(0.0, 255.0) as u8;
            row[pi + 3] = a.round().clamp(0.0, 255.0) as u8;
        }
    });
}

// ---------------------------------------------------------------------------
//  Parallel separable Gaussian blur (rayon)
// ---------------------------------------------------------------------------

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, slot) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *slot = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

pub fn parallel_gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || sigma <= 0.0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let src_raw = src.as_raw();

    let pixel_count = w * h * 4;
    let buf_in: Vec<f32> = src_raw.iter().map(|&b| b as f32).collect();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; pixel_count];
    buf_h
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in_start = y * w * 4;
            for x in 0..w {
                let mut r = 0.0f32;
                let mut g = 0.0f32;
                let mut b = 0.0f32;
                let mut a = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius as isize)
                        .max(0)
                        .min(w as isize - 1) as usize;
                    let idx = row_in_start + sx * 4;
                    r += buf_in[idx] * kv;
                    g += buf_in[idx + 1] * kv;
                    b += buf_in[idx + 2] * kv;
                    a += buf_in[idx + 3] * kv;
                }
                let out_idx = x * 4;
                row_out[out_idx] = r;
                row_out[out_idx + 1] = g;
                row_out[out_idx + 2] = b;
                row_out[out_idx + 3] = a;
            }
        });

    // --- Vertical pass (parallel by row) ---
    let mut buf_v = vec![0.0f32; pixel_count];
    buf_v
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut r = 0.0f32;
                let mut g = 0.0f32;
                let mut b = 0.0f32;
                let mut a = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius as isize)
                        .max(0)
                        .min(h as isize - 1) as usize;
                    let idx = sy * w * 4 + x * 4;
                    r += buf_h[idx] * kv;
                    g += buf_h[idx + 1] * kv;
                    b += buf_h[idx + 2] * kv;
                    a += buf_h[idx + 3] * kv;
                }
                let out_idx = x * 4;
                row_out[out_idx] = r;
                row_out[out_idx + 1] = g;
                row_out[out_idx + 2] = b;
                row_out[out_idx + 3] = a;
            }
        });

    let dst_raw: Vec<u8> = buf_v
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

// ---------------------------------------------------------------------------
//  Emboss (3x3 directional kernel, alpha preserved)
// ---------------------------------------------------------------------------

const EMBOSS_KERNEL: [[f32; 3]; 3] = [[-2.0, -1.0, 0.0], [-1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];

fn emboss(src: &RgbaImage) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let src_raw = src.as_raw();
    let stride = w * 4;
    let mut dst_raw = vec![0u8; stride * h];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (ky, krow) in EMBOSS_KERNEL.iter().enumerate() {
                    let sy = (y as isize + ky as isize - 1).clamp(0, h as isize - 1) as usize;
                    for (kx, &kv) in krow.iter().enumerate() {
                        let sx = (x as isize + kx as isize - 1).clamp(0, w as isize - 1) as usize;
                        let idx = sy * stride + sx * 4;
                        acc[0] += src_raw[idx] as f32 * kv;
                        acc[1] += src_raw[idx + 1] as f32 * kv;
                        acc[2] += src_raw[idx + 2] as f32 * kv;
                    }
                }
                let pi = x * 4;
                row_out[pi] = acc[0].round().clamp(0.0, 255.0) as u8;
                row_out[pi + 1] = acc[1].round().clamp(0.0, 255.0) as u8;
                row_out[pi + 2] = acc[2].round().clamp(0.0, 255.0) as u8;
                row_out[pi + 3] = src_raw[y * stride + pi + 3];
            }
        });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

// ---------------------------------------------------------------------------
//  HSL conversion
// ---------------------------------------------------------------------------

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 {
            h += 6.0;
        }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// HSL (H: 0..1, S: 0..1, L: 0..1) → RGB (0..1)
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (r, g, b)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn neutral_settings_leave_pixels_untouched() {
        let mut img = solid(8, 8, [10, 120, 240, 255]);
        let before = img.clone();
        apply_filters(&mut img, &FilterSettings::default());
        assert_eq!(img, before);
    }

    #[test]
    fn grayscale_collapses_channels() {
        let mut img = solid(4, 4, [200, 50, 100, 255]);
        apply_filters(
            &mut img,
            &FilterSettings {
                grayscale: true,
                ..FilterSettings::default()
            },
        );
        let p = img.get_pixel(0, 0).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn invert_flips_rgb_preserves_alpha() {
        let mut img = solid(2, 2, [10, 20, 30, 128]);
        apply_filters(
            &mut img,
            &FilterSettings {
                invert: true,
                ..FilterSettings::default()
            },
        );
        assert_eq!(img.get_pixel(0, 0).0, [245, 235, 225, 128]);
    }

    #[test]
    fn brightness_scales_channels() {
        let mut img = solid(2, 2, [100, 100, 100, 255]);
        apply_filters(
            &mut img,
            &FilterSettings {
                brightness: 2.0,
                ..FilterSettings::default()
            },
        );
        assert_eq!(img.get_pixel(0, 0).0, [200, 200, 200, 255]);
    }

    #[test]
    fn blur_spreads_into_neighbors() {
        let mut img = RgbaImage::new(21, 21);
        img.put_pixel(10, 10, Rgba([255, 255, 255, 255]));
        apply_filters(
            &mut img,
            &FilterSettings {
                blur_radius: 4.0,
                ..FilterSettings::default()
            },
        );
        assert!(img.get_pixel(10, 10).0[3] < 255);
        assert!(img.get_pixel(12, 10).0[3] > 0);
    }

    #[test]
    fn blur_preserves_solid_fill() {
        let mut img = solid(16, 16, [10, 200, 30, 255]);
        apply_filters(
            &mut img,
            &FilterSettings {
                blur_radius: 3.0,
                ..FilterSettings::default()
            },
        );
        // Clamped-edge sampling keeps a constant image constant
        assert_eq!(img.get_pixel(8, 8).0, [10, 200, 30, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [10, 200, 30, 255]);
    }

    #[test]
    fn hue_shift_full_turn_is_identity() {
        let mut img = solid(2, 2, [180, 40, 90, 255]);
        apply_filters(
            &mut img,
            &FilterSettings {
                hue_shift: 360.0,
                ..FilterSettings::default()
            },
        );
        let p = img.get_pixel(0, 0).0;
        for (got, want) in p.iter().zip([180u8, 40, 90, 255]) {
            assert!((*got as i16 - want as i16).abs() <= 2, "{:?}", p);
        }
    }
}
