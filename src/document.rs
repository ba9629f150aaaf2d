// ============================================================================
// DOCUMENT — ordered layer stack, active layer, selection ownership
// ============================================================================

use crate::color::Color;
use crate::layer::{Layer, LayerContent, LayerId};
use crate::selection::Selection;
use serde_json::Value;

pub const DEFAULT_CANVAS_SIZE: u32 = 400;

/// The editable document: a bottom-to-top stack of layers on a fixed-size
/// canvas, plus the transient active-layer and selection references.
///
/// Invariants kept by every mutator:
/// - the stack is never empty (construction and `clear` seed a white
///   background layer),
/// - `order` fields always equal vec position,
/// - `active_layer` and the selection's layer are id lookups, so a stale id
///   simply reads as "none".
#[derive(Clone, Debug)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    pub active_layer: Option<LayerId>,
    pub selection: Option<Selection>,
    next_layer_id: u64,
}

impl Document {
    pub fn new(width: u32, height: u32) -> Document {
        let mut doc = Document {
            width: width.max(1),
            height: height.max(1),
            layers: Vec::new(),
            active_layer: None,
            selection: None,
            next_layer_id: 1,
        };
        doc.seed_background();
        doc
    }

    fn seed_background(&mut self) {
        let id = self.add_layer(
            LayerContent::Background {
                color: Color::WHITE,
            },
            "Background",
        );
        self.active_layer = Some(id);
    }

    fn alloc_id(&mut self) -> LayerId {
        let id = LayerId(self.next_layer_id);
        self.next_layer_id += 1;
        id
    }

    fn renumber(&mut self) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.order = i as u32;
        }
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Resolves the active id. Returns None when the id is stale.
    pub fn active(&self) -> Option<&Layer> {
        self.active_layer.and_then(|id| self.layer(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active_layer?;
        self.layer_mut(id)
    }

    // ------------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------------

    /// Appends a new layer at the top of the paint order and makes it active.
    pub fn add_layer(&mut self, content: LayerContent, name: impl Into<String>) -> LayerId {
        let id = self.alloc_id();
        let mut layer = Layer::new(id, name, content);
        layer.order = self.layers.len() as u32;
        self.layers.push(layer);
        self.active_layer = Some(id);
        id
    }

    /// Removes the layer. The active reference and any selection produced
    /// from the removed layer are cleared. Returns false for a stale id.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.layers.remove(idx);
        if self.active_layer == Some(id) {
            self.active_layer = None;
        }
        if self.selection.as_ref().is_some_and(|s| s.layer == id) {
            self.selection = None;
        }
        self.renumber();
        true
    }

    /// Moves a layer to a new stack index (clamped) and renumbers.
    pub fn reorder(&mut self, id: LayerId, new_index: usize) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let new_index = new_index.min(self.layers.len() - 1);
        if idx != new_index {
            let layer = self.layers.remove(idx);
            self.layers.insert(new_index, layer);
            self.renumber();
        }
        true
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        match self.layer_mut(id) {
            Some(l) => {
                l.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> bool {
        match self.layer_mut(id) {
            Some(l) => {
                l.locked = locked;
                true
            }
            None => false,
        }
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        match self.layer_mut(id) {
            Some(l) => {
                l.set_opacity(opacity);
                true
            }
            None => false,
        }
    }

    pub fn rename(&mut self, id: LayerId, name: impl Into<String>) -> bool {
        match self.layer_mut(id) {
            Some(l) => {
                l.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Schema-checked property update on one layer. Locked layers refuse
    /// every key except `locked` itself: the lock guards pixel and placement
    /// edits, and must stay reversible through the same path that set it.
    ///
    /// A geometry change invalidates a selection produced from this layer;
    /// the mask no longer lines up with the pixels it was traced from.
    pub fn set_property(&mut self, id: LayerId, key: &str, value: &Value) -> bool {
        let changed = match self.layer_mut(id) {
            Some(l) if !l.locked || key == "locked" => l.set_property(key, value),
            _ => false,
        };
        if changed
            && is_geometry_key(key)
            && self.selection.as_ref().is_some_and(|s| s.layer == id)
        {
            self.selection = None;
        }
        changed
    }

    /// Drops everything and re-seeds the single white background layer.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.selection = None;
        self.active_layer = None;
        self.seed_background();
    }

    // ------------------------------------------------------------------------
    // Snapshot plumbing (used by the history manager and the loader)
    // ------------------------------------------------------------------------

    pub fn next_layer_id(&self) -> u64 {
        self.next_layer_id
    }

    /// Replaces the stack wholesale, renumbers, and bumps the id counter past
    /// every restored id so later allocations stay unique.
    pub fn restore_layers(&mut self, layers: Vec<Layer>, active: Option<LayerId>) {
        self.layers = layers;
        self.renumber();
        let max_id = self.layers.iter().map(|l| l.id.0).max().unwrap_or(0);
        self.next_layer_id = self.next_layer_id.max(max_id + 1);
        self.active_layer = active.filter(|id| self.layer(*id).is_some());
        self.selection = None;
        if self.layers.is_empty() {
            self.seed_background();
        }
    }
}

/// Keys whose mutation moves or reshapes the layer's raster footprint.
fn is_geometry_key(key: &str) -> bool {
    matches!(
        key,
        "x" | "y" | "width" | "height" | "rotation" | "scaleX" | "scaleY" | "skewX" | "skewY"
    )
}

impl Default for Document {
    fn default() -> Self {
        Document::new(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE)
    }
}
