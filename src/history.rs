// ============================================================================
// HISTORY MANAGER — bounded snapshot undo/redo stacks
// ============================================================================

use crate::document::Document;
use crate::layer::{Layer, LayerId};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAP: usize = 50;

/// A deep copy of the undoable document state: the layer stack plus the
/// active-layer reference. Transient state (selection, decoded bitmaps) is
/// deliberately excluded; image layers re-link to cached bitmaps by id when
/// a snapshot is restored.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub layers: Vec<Layer>,
    pub active_layer: Option<LayerId>,
    pub description: String,
}

impl Snapshot {
    pub fn capture(doc: &Document, description: impl Into<String>) -> Snapshot {
        Snapshot {
            layers: doc.layers.clone(),
            active_layer: doc.active_layer,
            description: description.into(),
        }
    }

    pub fn restore_into(&self, doc: &mut Document) {
        doc.restore_layers(self.layers.clone(), self.active_layer);
    }
}

/// Undo/redo stacks of whole-document snapshots.
///
/// The undo stack always includes the current state on top; the entry at the
/// bottom is the floor (the initial state) and is never popped, so `undo`
/// with one entry is a no-op rather than an empty canvas. The stack is
/// capped: recording past the cap silently evicts the oldest snapshot.
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_HISTORY_CAP)
    }
}

impl History {
    pub fn new(cap: usize) -> History {
        History {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            cap: cap.max(1),
        }
    }

    /// Pushes the document's current state and clears the redo stack.
    pub fn record(&mut self, doc: &Document, description: impl Into<String>) {
        self.redo_stack.clear();
        self.undo_stack.push_back(Snapshot::capture(doc, description));
        while self.undo_stack.len() > self.cap {
            self.undo_stack.pop_front();
        }
    }

    /// Steps back one state. Returns the description of the undone edit, or
    /// None at the floor.
    pub fn undo(&mut self, doc: &mut Document) -> Option<String> {
        if self.undo_stack.len() <= 1 {
            return None;
        }
        let current = self.undo_stack.pop_back()?;
        let description = current.description.clone();
        self.redo_stack.push(current);
        if let Some(prev) = self.undo_stack.back() {
            prev.restore_into(doc);
        }
        Some(description)
    }

    /// Re-applies the most recently undone state. No-op when nothing was
    /// undone since the last record.
    pub fn redo(&mut self, doc: &mut Document) -> Option<String> {
        let snapshot = self.redo_stack.pop()?;
        let description = snapshot.description.clone();
        snapshot.restore_into(doc);
        self.undo_stack.push_back(snapshot);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Descriptions of recorded states, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .map(|s| s.description.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::layer::LayerContent;
    use serde_json::json;

    fn doc_with_history() -> (Document, History) {
        let doc = Document::default();
        let mut history = History::default();
        history.record(&doc, "Initial");
        (doc, history)
    }

    #[test]
    fn undo_restores_deep_equal_prior_state() {
        let (mut doc, mut history) = doc_with_history();
        let before = doc.layers.clone();
        let id = doc.add_layer(
            LayerContent::Background {
                color: Color::BLACK,
            },
            "fill",
        );
        doc.set_property(id, "x", &json!(25));
        history.record(&doc, "Add fill");
        assert_eq!(history.undo(&mut doc), Some("Add fill".to_string()));
        assert_eq!(doc.layers, before);
    }

    #[test]
    fn undo_at_floor_is_noop() {
        let (mut doc, mut history) = doc_with_history();
        assert!(!history.can_undo());
        assert_eq!(history.undo(&mut doc), None);
        assert_eq!(doc.layers.len(), 1);
    }

    #[test]
    fn redo_on_empty_stack_is_noop() {
        let (mut doc, mut history) = doc_with_history();
        assert_eq!(history.redo(&mut doc), None);
    }

    #[test]
    fn redo_reapplies_undone_edit() {
        let (mut doc, mut history) = doc_with_history();
        doc.add_layer(
            LayerContent::Background {
                color: Color::BLACK,
            },
            "fill",
        );
        history.record(&doc, "Add fill");
        let after = doc.layers.clone();
        history.undo(&mut doc);
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(history.redo(&mut doc), Some("Add fill".to_string()));
        assert_eq!(doc.layers, after);
    }

    #[test]
    fn new_record_clears_redo() {
        let (mut doc, mut history) = doc_with_history();
        doc.add_layer(
            LayerContent::Background {
                color: Color::BLACK,
            },
            "fill",
        );
        history.record(&doc, "Add fill");
        history.undo(&mut doc);
        assert!(history.can_redo());
        doc.rename(doc.layers[0].id, "renamed");
        history.record(&doc, "Rename");
        assert!(!history.can_redo());
    }

    #[test]
    fn cap_evicts_oldest_silently() {
        let mut doc = Document::default();
        let mut history = History::new(5);
        for i in 0..10 {
            doc.rename(doc.layers[0].id, format!("step {}", i));
            history.record(&doc, format!("Rename {}", i));
        }
        assert_eq!(history.undo_count(), 5);
        // Undo down to the retained floor, which is step 5, not step 0.
        while history.can_undo() {
            history.undo(&mut doc);
        }
        assert_eq!(doc.layers[0].name, "step 5");
    }

    #[test]
    fn snapshots_are_independent_copies() {
        let (mut doc, mut history) = doc_with_history();
        let id = doc.layers[0].id;
        doc.rename(id, "mutated after capture");
        history.undo(&mut doc);
        // The floor was captured before the rename and must not see it.
        assert_eq!(doc.layers[0].name, "mutated after capture");
        assert_eq!(history.undo_history(), vec!["Initial"]);
    }
}
