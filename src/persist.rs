// ============================================================================
// PERSISTENCE — cape document JSON save/load and PNG export
// ============================================================================

use crate::cache::BitmapCache;
use crate::document::{Document, DEFAULT_CANVAS_SIZE};
use crate::error::{CapeError, Result};
use crate::layer::Layer;
use crate::ops::text::FontStore;
use crate::render::composite;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const FORMAT_VERSION: &str = "2.0";

/// The on-disk document shape:
/// `{ layers, width, height, timestamp, version }`.
#[derive(Serialize, Deserialize)]
struct CapeFile {
    layers: Vec<Layer>,
    #[serde(default = "default_dim")]
    width: u32,
    #[serde(default = "default_dim")]
    height: u32,
    /// Milliseconds since the epoch at save time.
    #[serde(default)]
    timestamp: u64,
    #[serde(default = "default_version")]
    version: String,
}

fn default_dim() -> u32 {
    DEFAULT_CANVAS_SIZE
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// Serializes the document. Transient state (selection, cached bitmaps) is
/// not part of the format; image layers keep only their source reference.
pub fn save_document(doc: &Document) -> Result<String> {
    let file = CapeFile {
        layers: doc.layers.clone(),
        width: doc.width,
        height: doc.height,
        timestamp: now_ms(),
        version: FORMAT_VERSION.to_string(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Rebuilds a document from its JSON form. Orders are renumbered, the id
/// counter moves past every restored id, and a file with zero layers
/// re-seeds the default background. Image layers come back without pixels
/// until a fresh decode re-fills the cache.
pub fn load_document(json: &str) -> Result<Document> {
    let file: CapeFile = serde_json::from_str(json)?;
    let mut doc = Document::new(file.width, file.height);
    let active = file.layers.last().map(|l| l.id);
    doc.restore_layers(file.layers, active);
    Ok(doc)
}

/// Encodes the current composite as PNG bytes. Failure leaves no partial
/// state behind.
pub fn export_png(doc: &Document, cache: &BitmapCache, fonts: &FontStore) -> Result<Vec<u8>> {
    let img = composite(doc, cache, fonts);
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| CapeError::Encode(e.to_string()))?;
    Ok(bytes)
}

pub fn save_document_file(doc: &Document, path: &Path) -> Result<()> {
    let json = save_document(doc)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_document_file(path: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(path)?;
    load_document(&json)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
