// ============================================================================
// Capeforge — layered cape-texture editor core
// ============================================================================
//
// The library owns everything except presentation: the layer/document model,
// snapshot undo history, CPU compositing with blend modes and filters, magic
// wand selection, text/shape/gradient/pattern rasterization, and the JSON
// document format. Embedders drive it through `EditorSession`; the bundled
// binary uses the same API for headless batch rendering.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod cache;
pub mod cli;
pub mod color;
pub mod document;
pub mod error;
pub mod history;
pub mod layer;
pub mod ops;
pub mod persist;
pub mod render;
pub mod selection;
pub mod session;

pub use cache::BitmapCache;
pub use color::Color;
pub use document::{Document, DEFAULT_CANVAS_SIZE};
pub use error::{CapeError, Result};
pub use history::History;
pub use layer::{
    BlendMode, FilterSettings, GradientDirection, Layer, LayerContent, LayerId, PatternKind,
    ShapeKind, TextAlign, Transform,
};
pub use ops::text::FontStore;
pub use selection::{magic_wand, MagicWandOptions, Selection};
pub use session::{EditorSession, KeyCommand, KeyOutcome, Tool};
