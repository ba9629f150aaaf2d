// ============================================================================
// EDITOR SESSION — tool state machine, input dispatch, history coalescing
// ============================================================================

use crate::cache::BitmapCache;
use crate::document::Document;
use crate::error::Result;
use crate::history::History;
use crate::layer::{FilterSettings, LayerContent, LayerId};
use crate::ops::text::FontStore;
use crate::selection::{magic_wand, MagicWandOptions};
use crate::{log_info, persist, render};
use image::RgbaImage;
use serde_json::Value;
use uuid::Uuid;

pub const ZOOM_MIN: f32 = 0.5;
pub const ZOOM_MAX: f32 = 5.0;
pub const ZOOM_STEP: f32 = 1.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Magic,
    Brush,
    Eraser,
    Text,
    Shape,
    Gradient,
    Pattern,
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Undo,
    Redo,
    Save,
    Export,
    ZoomIn,
    ZoomOut,
    ResetView,
    DeleteActiveLayer,
}

/// What a key command produced. Save and Export hand their payload back to
/// the caller; everything else just mutates the session.
pub enum KeyOutcome {
    Handled,
    Document(String),
    Png(Vec<u8>),
}

/// One open editor. Owns the document, its history, the bitmap cache and the
/// tool state; every mutation flows through here so exactly one snapshot is
/// recorded per discrete interaction. There is no global instance: embedders
/// create as many sessions as they need.
pub struct EditorSession {
    pub id: Uuid,
    pub doc: Document,
    pub history: History,
    pub cache: BitmapCache,
    pub fonts: FontStore,
    pub tool: Tool,
    pub wand_options: MagicWandOptions,
    /// Editing defaults copied into each new layer.
    pub default_filters: FilterSettings,
    pub zoom: f32,
    pub pan: (f32, f32),
    is_drawing: bool,
    drag_last: (f32, f32),
    /// Set by live mutations; pointer_up / commit_edit turn it into a snapshot.
    dirty_edit: bool,
}

impl EditorSession {
    pub fn new() -> EditorSession {
        Self::with_document(Document::default())
    }

    pub fn with_document(doc: Document) -> EditorSession {
        let mut history = History::default();
        history.record(&doc, "New document");
        EditorSession {
            id: Uuid::new_v4(),
            doc,
            history,
            cache: BitmapCache::new(),
            fonts: FontStore::new(),
            tool: Tool::default(),
            wand_options: MagicWandOptions::default(),
            default_filters: FilterSettings::default(),
            zoom: 1.0,
            pan: (0.0, 0.0),
            is_drawing: false,
            drag_last: (0.0, 0.0),
            dirty_edit: false,
        }
    }

    /// Replaces the session's document with a loaded one. History restarts
    /// at the loaded state and bitmaps for ids that no longer exist are
    /// evicted.
    pub fn load(&mut self, json: &str) -> Result<()> {
        let doc = persist::load_document(json)?;
        let live: Vec<LayerId> = doc.layers.iter().map(|l| l.id).collect();
        self.cache.retain_ids(&live);
        self.doc = doc;
        self.history.clear();
        self.history.record(&self.doc, "Open document");
        log_info!("session {}: document loaded ({} layers)", self.id, self.doc.layers.len());
        Ok(())
    }

    pub fn composite(&self) -> RgbaImage {
        render::composite(&self.doc, &self.cache, &self.fonts)
    }

    // ------------------------------------------------------------------------
    // Structural operations (one snapshot each)
    // ------------------------------------------------------------------------

    pub fn add_layer(&mut self, content: LayerContent, name: impl Into<String>) -> LayerId {
        let name = name.into();
        let id = self.doc.add_layer(content, name.clone());
        if let Some(layer) = self.doc.layer_mut(id) {
            layer.filters = self.default_filters;
        }
        self.history.record(&self.doc, format!("Add layer: {}", name));
        id
    }

    /// Deletes a layer and its cached bitmap. The stack never goes empty:
    /// removing the last layer re-seeds the white background.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        if !self.doc.delete_layer(id) {
            return false;
        }
        self.cache.remove(id);
        if self.doc.layers.is_empty() {
            self.doc.clear();
        }
        self.history.record(&self.doc, "Delete layer");
        true
    }

    pub fn reorder_layer(&mut self, id: LayerId, new_index: usize) -> bool {
        if self.doc.reorder(id, new_index) {
            self.history.record(&self.doc, "Reorder layers");
            true
        } else {
            false
        }
    }

    pub fn set_active(&mut self, id: LayerId) -> bool {
        if self.doc.layer(id).is_some() {
            self.doc.active_layer = Some(id);
            true
        } else {
            false
        }
    }

    /// Discrete property edit: mutate and snapshot in one step.
    pub fn set_property(&mut self, id: LayerId, key: &str, value: &Value) -> bool {
        if self.doc.set_property(id, key, value) {
            self.history.record(&self.doc, format!("Set {}", key));
            true
        } else {
            false
        }
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        if self.doc.set_visible(id, visible) {
            let desc = if visible { "Show layer" } else { "Hide layer" };
            self.history.record(&self.doc, desc);
            true
        } else {
            false
        }
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> bool {
        if self.doc.set_locked(id, locked) {
            let desc = if locked { "Lock layer" } else { "Unlock layer" };
            self.history.record(&self.doc, desc);
            true
        } else {
            false
        }
    }

    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> bool {
        if self.doc.rename(id, name) {
            self.history.record(&self.doc, "Rename layer");
            true
        } else {
            false
        }
    }

    /// Continuous edit (slider drag): mutates without snapshotting. Call
    /// `commit_edit` once on release.
    pub fn set_property_live(&mut self, id: LayerId, key: &str, value: &Value) -> bool {
        if self.doc.set_property(id, key, value) {
            self.dirty_edit = true;
            true
        } else {
            false
        }
    }

    /// Commits pending live edits as one history entry.
    pub fn commit_edit(&mut self, description: impl Into<String>) {
        if self.dirty_edit {
            self.history.record(&self.doc, description);
            self.dirty_edit = false;
        }
    }

    // ------------------------------------------------------------------------
    // Pointer state machine
    // ------------------------------------------------------------------------

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.is_drawing = true;
        self.drag_last = (x, y);
        match self.tool {
            Tool::Magic => {
                if x >= 0.0 && y >= 0.0 {
                    self.doc.selection = magic_wand(
                        &self.doc,
                        &self.cache,
                        &self.fonts,
                        x as u32,
                        y as u32,
                        self.wand_options,
                    );
                }
            }
            Tool::Select => {
                if let Some(id) = self.hit_test(x, y) {
                    self.doc.active_layer = Some(id);
                }
            }
            // The paint tools accumulate through pointer_move
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.is_drawing {
            return;
        }
        let (lx, ly) = self.drag_last;
        let dx = x - lx;
        let dy = y - ly;
        self.drag_last = (x, y);

        if self.tool == Tool::Select {
            let mut moved = None;
            if let Some(layer) = self.doc.active_mut() {
                if !layer.locked {
                    layer.transform.x += dx;
                    layer.transform.y += dy;
                    moved = Some(layer.id);
                    self.dirty_edit = true;
                }
            }
            // The drag moved the pixels out from under any mask traced on them
            if let Some(id) = moved {
                if self.doc.selection.as_ref().is_some_and(|s| s.layer == id) {
                    self.doc.selection = None;
                }
            }
        }
    }

    /// Ends the gesture; a mutation since pointer_down becomes one snapshot.
    pub fn pointer_up(&mut self) {
        self.is_drawing = false;
        self.commit_edit("Move layer");
    }

    /// Topmost visible, unlocked layer whose bounding box contains the point.
    fn hit_test(&self, x: f32, y: f32) -> Option<LayerId> {
        self.doc
            .layers
            .iter()
            .rev()
            .find(|l| {
                l.visible
                    && !l.locked
                    && x >= l.transform.x
                    && y >= l.transform.y
                    && x < l.transform.x + l.transform.width
                    && y < l.transform.y + l.transform.height
            })
            .map(|l| l.id)
    }

    // ------------------------------------------------------------------------
    // Keyboard dispatch
    // ------------------------------------------------------------------------

    pub fn key(&mut self, cmd: KeyCommand) -> Result<KeyOutcome> {
        match cmd {
            KeyCommand::Undo => {
                if let Some(desc) = self.history.undo(&mut self.doc) {
                    log_info!("undo: {}", desc);
                }
                Ok(KeyOutcome::Handled)
            }
            KeyCommand::Redo => {
                if let Some(desc) = self.history.redo(&mut self.doc) {
                    log_info!("redo: {}", desc);
                }
                Ok(KeyOutcome::Handled)
            }
            KeyCommand::Save => Ok(KeyOutcome::Document(persist::save_document(&self.doc)?)),
            KeyCommand::Export => Ok(KeyOutcome::Png(persist::export_png(
                &self.doc,
                &self.cache,
                &self.fonts,
            )?)),
            KeyCommand::ZoomIn => {
                self.zoom = (self.zoom * ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX);
                Ok(KeyOutcome::Handled)
            }
            KeyCommand::ZoomOut => {
                self.zoom = (self.zoom / ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX);
                Ok(KeyOutcome::Handled)
            }
            KeyCommand::ResetView => {
                self.zoom = 1.0;
                self.pan = (0.0, 0.0);
                Ok(KeyOutcome::Handled)
            }
            KeyCommand::DeleteActiveLayer => {
                if let Some(id) = self.doc.active_layer {
                    self.delete_layer(id);
                }
                Ok(KeyOutcome::Handled)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Asynchronous image decode completion
    // ------------------------------------------------------------------------

    /// Completes an image-layer decode. The layer id is re-checked before
    /// anything is stored, so a completion arriving after its layer was
    /// deleted is quietly discarded instead of resurrecting state.
    pub fn finish_image_decode(&mut self, id: LayerId, bytes: &[u8]) -> Result<()> {
        if self.doc.layer(id).is_none() {
            log_info!("decode completion for deleted layer {:?} discarded", id);
            return Ok(());
        }
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (w, h) = (decoded.width(), decoded.height());
        if let Some(layer) = self.doc.layer_mut(id) {
            if let LayerContent::Image {
                original_width,
                original_height,
                ..
            } = &mut layer.content
            {
                *original_width = w;
                *original_height = h;
            }
        }
        self.cache.insert(id, decoded);
        self.history.record(&self.doc, "Load image");
        Ok(())
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        EditorSession::new()
    }
}
