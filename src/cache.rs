// ============================================================================
// BITMAP CACHE — decoded image-layer pixels, keyed by layer id
// ============================================================================

use crate::layer::LayerId;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

/// Decoded bitmaps for image layers.
///
/// The document model only stores the opaque source reference; the pixels
/// live here, keyed by layer id, and never enter serialization or history
/// snapshots. A restored or loaded image layer re-links to its bitmap by id;
/// a missing entry makes the layer render empty. Entries are evicted only
/// when their layer is deleted or a document is loaded over the session, so
/// the cache is bounded by the number of live image layers.
#[derive(Default, Clone)]
pub struct BitmapCache {
    entries: HashMap<LayerId, Arc<RgbaImage>>,
}

impl BitmapCache {
    pub fn new() -> BitmapCache {
        BitmapCache::default()
    }

    pub fn insert(&mut self, id: LayerId, bitmap: RgbaImage) {
        self.entries.insert(id, Arc::new(bitmap));
    }

    pub fn get(&self, id: LayerId) -> Option<&Arc<RgbaImage>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: LayerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry whose id is not in `live`. Used after loading a
    /// document, when old layer ids can no longer be referenced.
    pub fn retain_ids(&mut self, live: &[LayerId]) {
        self.entries.retain(|id, _| live.contains(id));
    }
}
