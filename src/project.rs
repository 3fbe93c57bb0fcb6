use serde::{Deserialize, Serialize};

use crate::canvas::{Layer, LayerKind};
use crate::components::history::{now_millis, HistoryEntry, HistoryManager};
use crate::components::layers::LayerStack;
use crate::components::tools::Tool;
use crate::error::Result;
use crate::io::content_data_url;
use crate::ops::symmetry::{SymmetryAxis, SymmetrySettings};

// ============================================================================
// CREATION STATE – serializable view of the aggregate root
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub w: u32,
    pub h: u32,
}

/// A layer as written to a project file.  `content` is a PNG data URL, or
/// `""` for a blank layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub content: String,
    pub kind: LayerKind,
}

impl LayerRecord {
    pub fn from_layer(layer: &Layer) -> Result<Self> {
        Ok(Self {
            id: layer.id.clone(),
            name: layer.name.clone(),
            visible: layer.visible,
            opacity: layer.opacity,
            content: content_data_url(&layer.content)?,
            kind: layer.kind,
        })
    }
}

/// History entry metadata; pixel snapshots are not duplicated into the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub timestamp: u64,
    pub layer_ids: Vec<String>,
}

impl From<&HistoryEntry> for HistoryRecord {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            layer_ids: entry.layers.iter().map(|l| l.id.clone()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationState {
    pub active_layer_index: usize,
    pub layers: Vec<LayerRecord>,
    pub selected_tool: Tool,
    pub canvas_size: CanvasSize,
    pub zoom: f32,
    pub history: Vec<HistoryRecord>,
    pub history_length: usize,
    pub history_index: isize,
    pub symmetry_enabled: bool,
    pub symmetry_axis: SymmetryAxis,
    pub symmetry_settings: SymmetrySettings,
}

/// Borrowed engine state a [`CreationState`] is captured from.
pub struct StateParts<'a> {
    pub layers: &'a LayerStack,
    pub history: &'a HistoryManager,
    pub tool: &'a Tool,
    pub canvas_size: CanvasSize,
    pub zoom: f32,
    pub symmetry_enabled: bool,
    pub symmetry: &'a SymmetrySettings,
}

impl CreationState {
    /// Encodes every layer's content; fails only if PNG encoding does.
    pub fn capture(parts: StateParts<'_>) -> Result<Self> {
        let layers = parts
            .layers
            .layers()
            .iter()
            .map(LayerRecord::from_layer)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            active_layer_index: parts.layers.active_index(),
            layers,
            selected_tool: parts.tool.clone(),
            canvas_size: parts.canvas_size,
            zoom: parts.zoom,
            history: parts.history.entries().map(HistoryRecord::from).collect(),
            history_length: parts.history.len(),
            history_index: parts.history.index(),
            symmetry_enabled: parts.symmetry_enabled,
            symmetry_axis: parts.symmetry.axis,
            symmetry_settings: *parts.symmetry,
        })
    }
}

// ============================================================================
// PROJECT EXPORT – { metadata, creationState, gallerySettings, timestamp }
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExport {
    /// Opaque, supplied by the listing form.
    pub metadata: serde_json::Value,
    pub creation_state: CreationState,
    /// Opaque, supplied by the gallery UI.
    pub gallery_settings: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ProjectExport {
    pub fn new(
        creation_state: CreationState,
        metadata: serde_json::Value,
        gallery_settings: serde_json::Value,
    ) -> Self {
        Self {
            metadata,
            creation_state,
            gallery_settings,
            timestamp: now_millis(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
