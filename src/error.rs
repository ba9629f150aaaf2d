// ============================================================================
// ERRORS — boundary failures only; internal pipeline errors degrade silently
// ============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("png encode failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, CapeError>;
