// ============================================================================
// SELECTION ENGINE — magic wand flood fill and global color select
// ============================================================================

use crate::cache::BitmapCache;
use crate::color::color_distance;
use crate::document::Document;
use crate::layer::LayerId;
use crate::ops::text::FontStore;
use crate::render::render_layer_isolated;
use image::RgbaImage;

pub const DEFAULT_TOLERANCE: f32 = 32.0;

#[derive(Clone, Copy, Debug)]
pub struct MagicWandOptions {
    /// Maximum Euclidean RGBA distance from the seed color.
    pub tolerance: f32,
    /// When false, every in-tolerance pixel joins regardless of adjacency.
    pub contiguous: bool,
}

impl Default for MagicWandOptions {
    fn default() -> Self {
        MagicWandOptions {
            tolerance: DEFAULT_TOLERANCE,
            contiguous: true,
        }
    }
}

/// A pixel selection on one layer. The mask is `width * height` bytes with
/// 255 marking selected pixels. The layer reference is weak: deleting the
/// layer invalidates the selection.
#[derive(Clone, Debug)]
pub struct Selection {
    pub layer: LayerId,
    pub width: u32,
    pub height: u32,
    pub mask: Vec<u8>,
    pub count: usize,
}

impl Selection {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.mask[(y * self.width + x) as usize] != 0
    }

    /// Selected coordinates in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width;
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m != 0)
            .map(move |(i, _)| (i as u32 % w, i as u32 / w))
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Select a region of the active layer starting at `(x, y)`.
///
/// The layer is rendered alone (its own pixels, filters and opacity only) so
/// neighboring layers never leak into the selection; a fully transparent
/// area is a selectable color like any other. Returns None when the point is
/// out of bounds or no active layer resolves.
pub fn magic_wand(
    doc: &Document,
    cache: &BitmapCache,
    fonts: &FontStore,
    x: u32,
    y: u32,
    options: MagicWandOptions,
) -> Option<Selection> {
    if x >= doc.width || y >= doc.height {
        return None;
    }
    let layer = doc.active()?;
    let isolated = render_layer_isolated(doc, layer, cache, fonts);

    let (mask, count) = if options.contiguous {
        flood_fill_mask(&isolated, x, y, options.tolerance)
    } else {
        global_color_mask(&isolated, x, y, options.tolerance)
    };

    Some(Selection {
        layer: layer.id,
        width: doc.width,
        height: doc.height,
        mask,
        count,
    })
}

/// Iterative 4-connected flood fill. The mask doubles as the visited set and
/// the stack holds packed pixel indices, so the worst case is O(w*h) with no
/// recursion.
fn flood_fill_mask(img: &RgbaImage, seed_x: u32, seed_y: u32, tolerance: f32) -> (Vec<u8>, usize) {
    let w = img.width();
    let h = img.height();
    let mut mask = vec![0u8; (w * h) as usize];
    let seed = *img.get_pixel(seed_x, seed_y);
    let mut count = 0usize;

    let mut stack: Vec<u32> = Vec::with_capacity(1024);
    stack.push(seed_y * w + seed_x);

    while let Some(packed) = stack.pop() {
        let idx = packed as usize;
        if mask[idx] != 0 {
            continue;
        }
        let x = packed % w;
        let y = packed / w;
        if color_distance(*img.get_pixel(x, y), seed) > tolerance {
            continue;
        }
        mask[idx] = 255;
        count += 1;

        if x > 0 {
            stack.push(packed - 1);
        }
        if x + 1 < w {
            stack.push(packed + 1);
        }
        if y > 0 {
            stack.push(packed - w);
        }
        if y + 1 < h {
            stack.push(packed + w);
        }
    }

    (mask, count)
}

/// Non-contiguous variant: every pixel within tolerance of the seed color
/// joins, connected or not.
fn global_color_mask(img: &RgbaImage, seed_x: u32, seed_y: u32, tolerance: f32) -> (Vec<u8>, usize) {
    let w = img.width();
    let h = img.height();
    let mut mask = vec![0u8; (w * h) as usize];
    let seed = *img.get_pixel(seed_x, seed_y);
    let mut count = 0usize;

    for y in 0..h {
        for x in 0..w {
            if color_distance(*img.get_pixel(x, y), seed) <= tolerance {
                mask[(y * w + x) as usize] = 255;
                count += 1;
            }
        }
    }

    (mask, count)
}
