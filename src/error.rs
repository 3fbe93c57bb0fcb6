//! Error types for the creation engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the creation engine.
///
/// Pointer handling never produces these; a bad pointer event is dropped and
/// logged instead. Only operations with a caller that can react (undo/redo
/// restores, text replies, exports, settings) return them.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Stored layer content could not be decoded back into pixels.
    /// The live surface keeps its pixels if they already belonged to that
    /// layer, otherwise it is cleared.
    #[error("Failed to restore layer '{layer}': {reason}")]
    RestoreFailed { layer: String, reason: String },

    /// A decode-and-draw is still in flight; the canvas may not be touched yet.
    #[error("A layer restore is still in progress")]
    RestorePending,

    #[error("Layer index {index} out of range ({len} layers)")]
    LayerIndexOutOfRange { index: usize, len: usize },

    #[error("Layer '{0}' no longer exists")]
    LayerNotFound(String),

    #[error("No open text request with id {0}")]
    UnknownTextRequest(u64),

    #[error("No font available for '{0}'")]
    FontUnavailable(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => EngineError::Encode(e.to_string()),
            other => EngineError::Decode(other.to_string()),
        }
    }
}
