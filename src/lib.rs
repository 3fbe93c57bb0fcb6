//! Raster drawing engine behind the NFT creation canvas: pointer gestures,
//! paint tools, layers, undo/redo history and flattened export.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use app::{AppOutput, CreationApp};
pub use error::{EngineError, Result};
pub use settings::EngineSettings;
