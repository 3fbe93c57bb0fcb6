use std::collections::HashMap;
use std::sync::mpsc;

use image::RgbaImage;

use crate::canvas::{Layer, LayerContent, LayerKind, LiveCanvas, TiledImage};
use crate::components::history::{HistoryEntry, HistoryManager};
use crate::components::layers::LayerStack;
use crate::components::pointer::{CanvasSurface, Gesture, PointerEvent, ViewportRect};
use crate::components::tools::{PaintContext, TextSettings, Tool, ToolEngine, ToolKind, ToolOutcome};
use crate::error::{EngineError, Result};
use crate::io::encode_png;
use crate::ops::composite::flatten;
use crate::ops::symmetry::SymmetrySettings;
use crate::ops::text::{AbGlyphRasterizer, FontLibrary, TextRasterizer};
use crate::project::{CanvasSize, CreationState, ProjectExport, StateParts};
use crate::settings::{BindableAction, EngineSettings, KeyEvent};

/// Result of a decode-and-draw running on the rayon pool.
struct RestoreResult {
    layer_id: String,
    pixels: Result<TiledImage>,
}

struct PendingRestore {
    layer_id: String,
    layer_name: String,
    receiver: mpsc::Receiver<RestoreResult>,
}

/// A text placement waiting for the UI to supply its string.
struct PendingText {
    x: f32,
    y: f32,
    settings: TextSettings,
    layer_id: String,
    symmetry: Option<SymmetrySettings>,
}

/// What an input event did, for the host to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum AppOutput {
    None,
    /// The live canvas changed; redraw the preview.
    Painted,
    /// A history entry was appended.
    Committed { history_len: usize },
    /// A preview was abandoned and the canvas put back.
    Reverted,
    /// Ask the user for text; answer with [`CreationApp::submit_text`].
    TextRequested { request: u64, x: f32, y: f32 },
    /// The event arrived while a restore was in flight and was ignored.
    Dropped,
    /// Undo/redo moved the history cursor here.
    HistoryMoved { index: isize },
    ToolSelected(ToolKind),
    /// `Ctrl+S`: the project JSON to offer as a download.
    ProjectExported(String),
    /// `Ctrl+E`: the flattened PNG to offer as a download.
    ImageExported(Vec<u8>),
}

// ============================================================================
// CREATION APP – owns the whole engine and serializes every mutation
// ============================================================================

pub struct CreationApp {
    settings: EngineSettings,
    layers: LayerStack,
    history: HistoryManager,
    canvas: LiveCanvas,
    /// Id of the layer whose pixels `canvas` holds.
    live_layer: String,
    surface: CanvasSurface,
    engine: ToolEngine,
    tool: Tool,
    /// Last-used settings of every tool kind, so B/E/T restore them.
    palette: HashMap<ToolKind, Tool>,
    symmetry_enabled: bool,
    symmetry: SymmetrySettings,
    zoom: f32,
    rasterizer: Box<dyn TextRasterizer>,
    pending_text: HashMap<u64, PendingText>,
    next_request: u64,
    restore: Option<PendingRestore>,
    metadata: serde_json::Value,
    gallery_settings: serde_json::Value,
}

impl CreationApp {
    /// Engine with one white background layer seeded as the first history
    /// entry.
    pub fn new(settings: EngineSettings, rasterizer: Box<dyn TextRasterizer>) -> Result<Self> {
        let (w, h) = (settings.canvas_width, settings.canvas_height);
        if w == 0 || h == 0 || w as u64 * h as u64 > 256_000_000 {
            return Err(EngineError::Config(format!("unsupported canvas size {}×{}", w, h)));
        }

        let background = TiledImage::new_filled(w, h, image::Rgba(settings.background));
        let layers = LayerStack::new(Layer::new(
            "Background",
            LayerKind::Drawing,
            LayerContent::Raster(background.clone()),
        ));
        let mut history = HistoryManager::new(settings.max_history);
        history.commit(layers.layers());

        let mut canvas = LiveCanvas::new(w, h);
        canvas.replace(&background);
        let live_layer = layers.active().id.clone();

        let symmetry = SymmetrySettings {
            axis: crate::ops::symmetry::SymmetryAxis {
                x: w as f32 / 2.0,
                y: h as f32 / 2.0,
            },
            ..SymmetrySettings::default()
        };

        log::info!("engine: created {}×{} canvas", w, h);

        Ok(Self {
            surface: CanvasSurface::new(w, h),
            engine: ToolEngine::new(),
            tool: Tool::default(),
            palette: HashMap::new(),
            symmetry_enabled: false,
            symmetry,
            zoom: settings.clamp_zoom(1.0),
            rasterizer,
            pending_text: HashMap::new(),
            next_request: 1,
            restore: None,
            metadata: serde_json::Value::Null,
            gallery_settings: serde_json::Value::Null,
            settings,
            layers,
            history,
            canvas,
            live_layer,
        })
    }

    /// Engine with an `ab_glyph` text rasterizer loaded from
    /// `settings.font_path`.  A missing font only disables text placement.
    pub fn with_settings(settings: EngineSettings) -> Result<Self> {
        let mut fonts = FontLibrary::new();
        if let Some(path) = &settings.font_path {
            if let Err(e) = fonts.load_file("default", path) {
                log::warn!("engine: could not load font {}: {}", path.display(), e);
            }
        }
        Self::new(settings, Box::new(AbGlyphRasterizer::new(fonts)))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// The active layer's working surface.
    pub fn canvas(&self) -> &LiveCanvas {
        &self.canvas
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn symmetry_enabled(&self) -> bool {
        self.symmetry_enabled
    }

    pub fn symmetry(&self) -> &SymmetrySettings {
        &self.symmetry
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn open_text_requests(&self) -> usize {
        self.pending_text.len()
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    pub fn set_viewport(&mut self, rect: ViewportRect) {
        self.surface.set_viewport(rect);
    }

    /// Feed one pointer event.  Never fails: events that cannot be applied
    /// are dropped and logged.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> AppOutput {
        if let Err(e) = self.pump() {
            log::error!("engine: {}", e);
        }
        if self.is_restoring() {
            log::warn!("engine: dropped {:?} while a layer restore is in flight", event);
            return AppOutput::Dropped;
        }
        // A second down without an up: settle the first gesture
        if matches!(event, PointerEvent::Down { .. }) && self.surface.is_pressed() {
            self.interrupt_gesture();
        }
        match self.surface.handle(event) {
            Some(gesture) => self.apply_gesture(gesture),
            None => AppOutput::None,
        }
    }

    fn apply_gesture(&mut self, gesture: Gesture) -> AppOutput {
        match gesture {
            Gesture::Start { x, y } => {
                let symmetry = if self.symmetry_enabled { Some(&self.symmetry) } else { None };
                let ctx = PaintContext { symmetry };
                match self.engine.begin(&self.tool, &mut self.canvas, x, y, ctx) {
                    ToolOutcome::TextRequested { x, y } => self.open_text_request(x, y),
                    _ => AppOutput::None,
                }
            }
            Gesture::Move { x, y } => match self.engine.update(&mut self.canvas, x, y) {
                ToolOutcome::Painted => AppOutput::Painted,
                _ => AppOutput::None,
            },
            Gesture::End { reason } => {
                match self.engine.finish(&mut self.canvas, reason, self.settings.leave_policy) {
                    ToolOutcome::Commit => self.commit_live(),
                    ToolOutcome::Reverted => AppOutput::Reverted,
                    _ => AppOutput::None,
                }
            }
        }
    }

    /// End any in-flight gesture the way `up` would.
    fn interrupt_gesture(&mut self) -> AppOutput {
        match self.surface.interrupt() {
            Some(gesture) => self.apply_gesture(gesture),
            None => AppOutput::None,
        }
    }

    /// Read the live surface back into the active layer and record it.
    fn commit_live(&mut self) -> AppOutput {
        let index = self.layers.active_index();
        let content = LayerContent::Raster(self.canvas.snapshot());
        if let Err(e) = self.layers.set_content(index, content) {
            log::error!("engine: commit failed: {}", e);
            return AppOutput::None;
        }
        let history_len = self.history.commit(self.layers.layers());
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "engine: commit on layer {} (history length {}, {} KiB)",
                index,
                history_len,
                self.history.memory_usage() / 1024
            );
        }
        AppOutput::Committed { history_len }
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    fn open_text_request(&mut self, x: f32, y: f32) -> AppOutput {
        let Tool::Text(settings) = &self.tool else {
            return AppOutput::None;
        };
        let request = self.next_request;
        self.next_request += 1;
        self.pending_text.insert(
            request,
            PendingText {
                x,
                y,
                settings: settings.clone(),
                layer_id: self.layers.active().id.clone(),
                symmetry: if self.symmetry_enabled { Some(self.symmetry) } else { None },
            },
        );
        log::info!("text: request {} at ({:.1}, {:.1})", request, x, y);
        AppOutput::TextRequested { request, x, y }
    }

    /// Answer a text request.  `None` or blank text cancels it.
    ///
    /// The text lands on the layer that was active when the request was
    /// made, at the clicked point, as one history entry.
    pub fn submit_text(&mut self, request: u64, text: Option<&str>) -> Result<AppOutput> {
        if !self.pending_text.contains_key(&request) {
            return Err(EngineError::UnknownTextRequest(request));
        }
        self.pump()?;
        if self.is_restoring() {
            return Err(EngineError::RestorePending);
        }
        let Some(pending) = self.pending_text.remove(&request) else {
            return Err(EngineError::UnknownTextRequest(request));
        };

        let text = match text {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                log::info!("text: request {} cancelled", request);
                return Ok(AppOutput::None);
            }
        };

        let index = self
            .layers
            .index_of(&pending.layer_id)
            .ok_or_else(|| EngineError::LayerNotFound(pending.layer_id.clone()))?;

        self.interrupt_gesture();

        if index == self.layers.active_index() {
            let painted = ToolEngine::place_text(
                &mut self.canvas,
                self.rasterizer.as_ref(),
                &pending.settings,
                text,
                pending.x,
                pending.y,
                pending.symmetry.as_ref(),
            )?;
            if !painted {
                return Ok(AppOutput::None);
            }
            self.layers.mark_text(index)?;
            return Ok(self.commit_live());
        }

        // The target layer is no longer active: paint on a scratch surface
        let (w, h) = (self.width(), self.height());
        let layer = &self.layers.layers()[index];
        let base = layer.content.decode(w, h).map_err(|e| EngineError::RestoreFailed {
            layer: layer.name.clone(),
            reason: e.to_string(),
        })?;
        let mut scratch = LiveCanvas::new(w, h);
        scratch.replace(&base);
        let painted = ToolEngine::place_text(
            &mut scratch,
            self.rasterizer.as_ref(),
            &pending.settings,
            text,
            pending.x,
            pending.y,
            pending.symmetry.as_ref(),
        )?;
        if !painted {
            return Ok(AppOutput::None);
        }
        self.layers.mark_text(index)?;
        self.layers.set_content(index, LayerContent::Raster(scratch.snapshot()))?;
        let history_len = self.history.commit(self.layers.layers());
        Ok(AppOutput::Committed { history_len })
    }

    // ------------------------------------------------------------------
    // Restore gate
    // ------------------------------------------------------------------

    pub fn is_restoring(&self) -> bool {
        self.restore.is_some()
    }

    /// Load the active layer's content into the live surface.  Encoded
    /// content is decoded on the rayon pool when `background_restore` is
    /// set; until it lands the gate stays closed.
    fn load_active(&mut self) -> Result<()> {
        // A newer restore supersedes whatever was in flight
        self.restore = None;

        let (w, h) = (self.width(), self.height());
        let layer = self.layers.active();
        let layer_id = layer.id.clone();
        let layer_name = layer.name.clone();

        if let LayerContent::Encoded(_) = &layer.content {
            if self.settings.background_restore {
                let content = layer.content.clone();
                let (sender, receiver) = mpsc::channel();
                let id = layer_id.clone();
                log::debug!("restore: decoding '{}' in background", layer_name);
                rayon::spawn(move || {
                    let _ = sender.send(RestoreResult {
                        layer_id: id,
                        pixels: content.decode(w, h),
                    });
                });
                self.restore = Some(PendingRestore {
                    layer_id,
                    layer_name,
                    receiver,
                });
                return Ok(());
            }
        }

        let pixels = layer.content.decode(w, h);
        self.finish_restore(&layer_id, &layer_name, pixels)
    }

    fn finish_restore(&mut self, layer_id: &str, layer_name: &str, pixels: Result<TiledImage>) -> Result<()> {
        match pixels {
            Ok(pixels) => {
                if self.layers.active().id == layer_id {
                    self.canvas.replace(&pixels);
                    self.live_layer = layer_id.to_string();
                    log::debug!("restore: '{}' drawn", layer_name);
                } else {
                    log::debug!("restore: '{}' is no longer active, discarded", layer_name);
                }
                Ok(())
            }
            Err(e) => {
                // A failed restore of the layer already on the surface keeps
                // its stale pixels; another layer's pixels must never be
                // committed into this one.
                if self.layers.active().id == layer_id && self.live_layer != layer_id {
                    self.canvas.clear();
                    self.live_layer = layer_id.to_string();
                }
                log::error!("restore: '{}' failed: {}", layer_name, e);
                Err(EngineError::RestoreFailed {
                    layer: layer_name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Complete a finished background restore.  Returns whether one landed.
    pub fn pump(&mut self) -> Result<bool> {
        let received = match &self.restore {
            None => return Ok(false),
            Some(pending) => pending.receiver.try_recv(),
        };
        match received {
            Ok(result) => {
                let pending = self.restore.take();
                let name = pending.map(|p| p.layer_name).unwrap_or_default();
                self.finish_restore(&result.layer_id, &name, result.pixels)?;
                Ok(true)
            }
            Err(mpsc::TryRecvError::Empty) => Ok(false),
            Err(mpsc::TryRecvError::Disconnected) => {
                let name = self.restore.take().map(|p| p.layer_name).unwrap_or_default();
                Err(EngineError::RestoreFailed {
                    layer: name,
                    reason: "decoder exited without a result".into(),
                })
            }
        }
    }

    /// Block until any in-flight restore has landed.
    pub fn wait_for_restore(&mut self) -> Result<()> {
        let Some(pending) = self.restore.take() else {
            return Ok(());
        };
        match pending.receiver.recv() {
            Ok(result) => self.finish_restore(&result.layer_id, &pending.layer_name, result.pixels),
            Err(_) => Err(EngineError::RestoreFailed {
                layer: pending.layer_name,
                reason: "decoder exited without a result".into(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> Result<AppOutput> {
        self.interrupt_gesture();
        let Some(entry) = self.history.undo().cloned() else {
            return Ok(AppOutput::None);
        };
        log::info!("history: undo to {}", self.history.index());
        self.restore_entry(&entry)?;
        Ok(AppOutput::HistoryMoved {
            index: self.history.index(),
        })
    }

    pub fn redo(&mut self) -> Result<AppOutput> {
        self.interrupt_gesture();
        let Some(entry) = self.history.redo().cloned() else {
            return Ok(AppOutput::None);
        };
        log::info!("history: redo to {}", self.history.index());
        self.restore_entry(&entry)?;
        Ok(AppOutput::HistoryMoved {
            index: self.history.index(),
        })
    }

    /// Give every current layer its content from `entry` (matched by id),
    /// then redraw the active layer's live surface.  Layers newer than the
    /// entry fall back to the content they were created with.
    fn restore_entry(&mut self, entry: &HistoryEntry) -> Result<()> {
        for index in 0..self.layers.len() {
            let id = self.layers.layers()[index].id.clone();
            let content = self.history.content_at(entry, &id);
            self.layers.set_content(index, content)?;
        }
        self.load_active()
    }

    // ------------------------------------------------------------------
    // Layers (structural; never recorded in history)
    // ------------------------------------------------------------------

    pub fn set_active_layer(&mut self, index: usize) -> Result<()> {
        crate::canvas::check_index(index, self.layers.len())?;
        if index == self.layers.active_index() {
            return Ok(());
        }
        self.interrupt_gesture();
        self.layers.set_active(index)?;
        log::info!("layers: active = {}", index);
        self.load_active()
    }

    /// Append a blank layer and make it active.
    pub fn add_layer(&mut self) -> usize {
        self.interrupt_gesture();
        let index = self.layers.add_layer();
        self.restore = None;
        self.canvas.clear();
        self.live_layer = self.layers.active().id.clone();
        log::info!("layers: added '{}'", self.layers.active().name);
        index
    }

    /// Append an image layer holding encoded `bytes`; its pixels reach the
    /// live surface through the restore gate.
    pub fn add_image_layer(&mut self, name: &str, bytes: Vec<u8>) -> Result<usize> {
        image::guess_format(&bytes).map_err(|e| EngineError::Decode(e.to_string()))?;
        self.interrupt_gesture();
        let layer = Layer::new(name, LayerKind::Image, LayerContent::Encoded(bytes.into()));
        self.history.record_origin(&layer);
        let index = self.layers.push(layer);
        log::info!("layers: added image layer '{}'", name);
        self.load_active()?;
        Ok(index)
    }

    /// Remove a layer.  Returns `false` for the last remaining layer.
    pub fn remove_layer(&mut self, index: usize) -> Result<bool> {
        crate::canvas::check_index(index, self.layers.len())?;
        self.interrupt_gesture();
        let Some(removed) = self.layers.remove(index)? else {
            log::warn!("layers: refusing to remove the last layer");
            return Ok(false);
        };
        self.history.forget_origin(&removed.id);
        log::info!("layers: removed '{}'", removed.name);
        self.load_active()?;
        Ok(true)
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> Result<()> {
        self.layers.rename(index, name)
    }

    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        self.layers.move_layer(from, to)
    }

    pub fn toggle_visibility(&mut self, index: usize) -> Result<bool> {
        self.layers.toggle_visibility(index)
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Result<()> {
        self.layers.set_opacity(index, opacity)
    }

    // ------------------------------------------------------------------
    // Tools, zoom, symmetry
    // ------------------------------------------------------------------

    pub fn select_tool(&mut self, tool: Tool) {
        self.interrupt_gesture();
        self.palette.insert(tool.kind(), tool.clone());
        self.tool = tool;
    }

    /// Switch to `kind` with its last-used settings.
    pub fn select_tool_kind(&mut self, kind: ToolKind) {
        let tool = self
            .palette
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Tool::default_for(kind));
        self.select_tool(tool);
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = self.settings.clamp_zoom(zoom);
        self.zoom
    }

    pub fn set_symmetry_enabled(&mut self, enabled: bool) {
        self.symmetry_enabled = enabled;
    }

    pub fn set_symmetry(&mut self, settings: SymmetrySettings) {
        self.symmetry = settings;
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    pub fn handle_key(&mut self, event: &KeyEvent) -> Result<AppOutput> {
        let Some(action) = self.settings.keybindings.resolve(event) else {
            return Ok(AppOutput::None);
        };
        match action {
            BindableAction::Undo => self.undo(),
            BindableAction::Redo => self.redo(),
            BindableAction::ExportProject => Ok(AppOutput::ProjectExported(self.export_project_json()?)),
            BindableAction::ExportImage => Ok(AppOutput::ImageExported(self.export_png()?)),
            BindableAction::ToolBrush => Ok(self.select_kind_output(ToolKind::Brush)),
            BindableAction::ToolEraser => Ok(self.select_kind_output(ToolKind::Eraser)),
            BindableAction::ToolText => Ok(self.select_kind_output(ToolKind::Text)),
        }
    }

    fn select_kind_output(&mut self, kind: ToolKind) -> AppOutput {
        self.select_tool_kind(kind);
        AppOutput::ToolSelected(kind)
    }

    // ------------------------------------------------------------------
    // Rendering & export
    // ------------------------------------------------------------------

    /// Flatten the committed layer state.
    pub fn flatten(&self) -> RgbaImage {
        flatten(self.layers.layers(), self.width(), self.height(), None)
    }

    /// Flatten with the live surface standing in for the active layer, so
    /// an in-progress gesture shows up.
    pub fn render_preview(&self) -> RgbaImage {
        let live = if self.is_restoring() {
            None
        } else {
            Some((self.layers.active_index(), self.canvas.pixels()))
        };
        flatten(self.layers.layers(), self.width(), self.height(), live)
    }

    pub fn export_png(&self) -> Result<Vec<u8>> {
        let png = encode_png(&self.flatten())?;
        log::info!("export: PNG ({} bytes)", png.len());
        Ok(png)
    }

    /// Opaque collaborator data carried into the project export.
    pub fn set_export_context(&mut self, metadata: serde_json::Value, gallery_settings: serde_json::Value) {
        self.metadata = metadata;
        self.gallery_settings = gallery_settings;
    }

    pub fn creation_state(&self) -> Result<CreationState> {
        CreationState::capture(StateParts {
            layers: &self.layers,
            history: &self.history,
            tool: &self.tool,
            canvas_size: CanvasSize {
                w: self.width(),
                h: self.height(),
            },
            zoom: self.zoom,
            symmetry_enabled: self.symmetry_enabled,
            symmetry: &self.symmetry,
        })
    }

    pub fn export_project(&self) -> Result<ProjectExport> {
        Ok(ProjectExport::new(
            self.creation_state()?,
            self.metadata.clone(),
            self.gallery_settings.clone(),
        ))
    }

    pub fn export_project_json(&self) -> Result<String> {
        let json = self.export_project()?.to_json()?;
        log::info!("export: project JSON ({} bytes)", json.len());
        Ok(json)
    }
}
