// ============================================================================
// nftcanvas CLI: headless replay of recorded editor sessions
// ============================================================================
//
// Usage examples:
//   nftcanvas --script session.json --png out.png
//   nftcanvas --script session.json --png out.png --project out.json
//   nftcanvas --script "sessions/*.json" --output-dir rendered/
//
// Each script is a JSON array of recorded events (pointer, key, tool and
// layer operations) replayed against a fresh engine.  Background restores
// are awaited after every event so a replay is deterministic.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;

use crate::app::{AppOutput, CreationApp};
use crate::components::pointer::{PointerEvent, ViewportRect};
use crate::components::tools::{Tool, ToolKind};
use crate::error::{EngineError, Result};
use crate::ops::symmetry::SymmetrySettings;
use crate::settings::{EngineSettings, KeyEvent};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// nftcanvas headless renderer.
///
/// Replays recorded drawing sessions and writes the flattened artwork.
#[derive(Parser, Debug)]
#[command(
    name = "nftcanvas",
    about = "Replay recorded drawing sessions and export the artwork",
    long_about = "Replay a JSON list of recorded canvas events against a fresh\n\
                  engine and write the flattened PNG and/or the project JSON.\n\n\
                  Example:\n  \
                  nftcanvas --script session.json --png out.png --project out.json\n  \
                  nftcanvas --script \"sessions/*.json\" --output-dir rendered/"
)]
pub struct CliArgs {
    /// Event script(s). Glob patterns accepted (e.g. "sessions/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Flattened PNG output. Only valid for a single script.
    #[arg(long, value_name = "FILE.png")]
    pub png: Option<PathBuf>,

    /// Project JSON output. Only valid for a single script.
    #[arg(long, value_name = "FILE.json")]
    pub project: Option<PathBuf>,

    /// Output directory for batch replay: writes <stem>.png and <stem>.json.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Settings file (defaults to the per-user config file).
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// TTF/OTF font for the text tool (overrides the settings file).
    #[arg(long, value_name = "FONT")]
    pub font: Option<PathBuf>,

    /// Write the effective settings (after --font) to this file.
    #[arg(long, value_name = "FILE")]
    pub save_settings: Option<PathBuf>,

    /// Print per-event outcomes and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Replay script format
// ============================================================================

/// One recorded event.  Scripts are JSON arrays of these, tagged by `op`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayEvent {
    Viewport { left: f32, top: f32, width: f32, height: f32 },
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
    Key(KeyEvent),
    SelectTool { tool: Tool },
    /// Switch by name ("brush", "eraser", ...) keeping last-used settings.
    SelectToolKind { kind: String },
    /// Answer the most recent text request; `null` cancels it.
    Text { text: Option<String> },
    Undo,
    Redo,
    AddLayer,
    /// PNG path, relative to the script's directory.
    AddImageLayer { name: String, path: PathBuf },
    RemoveLayer { index: usize },
    SetActiveLayer { index: usize },
    RenameLayer { index: usize, name: String },
    MoveLayer { from: usize, to: usize },
    ToggleVisibility { index: usize },
    SetOpacity { index: usize, opacity: f32 },
    Zoom { zoom: f32 },
    Symmetry {
        enabled: bool,
        #[serde(default)]
        settings: Option<SymmetrySettings>,
    },
    /// Opaque data carried into the project export.
    ExportContext {
        #[serde(default)]
        metadata: serde_json::Value,
        #[serde(default)]
        gallery_settings: serde_json::Value,
    },
}

pub fn parse_script(json: &str) -> Result<Vec<ReplayEvent>> {
    Ok(serde_json::from_str(json)?)
}

/// Drive `app` through `events`.  `base_dir` resolves image paths.
///
/// Returns the outcome of every event.  Stops at the first event whose
/// operation fails.
pub fn replay(app: &mut CreationApp, events: &[ReplayEvent], base_dir: &Path) -> Result<Vec<AppOutput>> {
    let mut outputs = Vec::with_capacity(events.len());
    let mut last_request: Option<u64> = None;

    for (idx, event) in events.iter().enumerate() {
        let out = apply_event(app, event, base_dir, &mut last_request).map_err(|e| {
            log::error!("replay: event {} failed: {}", idx, e);
            e
        })?;
        if let AppOutput::TextRequested { request, .. } = out {
            last_request = Some(request);
        }
        app.wait_for_restore()?;
        outputs.push(out);
    }
    Ok(outputs)
}

fn apply_event(
    app: &mut CreationApp,
    event: &ReplayEvent,
    base_dir: &Path,
    last_request: &mut Option<u64>,
) -> Result<AppOutput> {
    let out = match event {
        ReplayEvent::Viewport { left, top, width, height } => {
            app.set_viewport(ViewportRect::new(*left, *top, *width, *height));
            AppOutput::None
        }
        ReplayEvent::Down { x, y } => app.handle_pointer(PointerEvent::Down { x: *x, y: *y }),
        ReplayEvent::Move { x, y } => app.handle_pointer(PointerEvent::Move { x: *x, y: *y }),
        ReplayEvent::Up => app.handle_pointer(PointerEvent::Up),
        ReplayEvent::Leave => app.handle_pointer(PointerEvent::Leave),
        ReplayEvent::Key(key) => app.handle_key(key)?,
        ReplayEvent::SelectTool { tool } => {
            app.select_tool(tool.clone());
            AppOutput::ToolSelected(tool.kind())
        }
        ReplayEvent::SelectToolKind { kind } => {
            let kind = ToolKind::from_name(kind)
                .ok_or_else(|| EngineError::Config(format!("unknown tool '{}'", kind)))?;
            app.select_tool_kind(kind);
            AppOutput::ToolSelected(kind)
        }
        ReplayEvent::Text { text } => {
            let request = last_request
                .take()
                .ok_or(EngineError::UnknownTextRequest(0))?;
            app.submit_text(request, text.as_deref())?
        }
        ReplayEvent::Undo => app.undo()?,
        ReplayEvent::Redo => app.redo()?,
        ReplayEvent::AddLayer => {
            app.add_layer();
            AppOutput::None
        }
        ReplayEvent::AddImageLayer { name, path } => {
            let bytes = std::fs::read(base_dir.join(path))?;
            app.add_image_layer(name, bytes)?;
            AppOutput::None
        }
        ReplayEvent::RemoveLayer { index } => {
            app.remove_layer(*index)?;
            AppOutput::None
        }
        ReplayEvent::SetActiveLayer { index } => {
            app.set_active_layer(*index)?;
            AppOutput::None
        }
        ReplayEvent::RenameLayer { index, name } => {
            app.rename_layer(*index, name)?;
            AppOutput::None
        }
        ReplayEvent::MoveLayer { from, to } => {
            app.move_layer(*from, *to)?;
            AppOutput::None
        }
        ReplayEvent::ToggleVisibility { index } => {
            app.toggle_visibility(*index)?;
            AppOutput::None
        }
        ReplayEvent::SetOpacity { index, opacity } => {
            app.set_opacity(*index, *opacity)?;
            AppOutput::None
        }
        ReplayEvent::Zoom { zoom } => {
            app.set_zoom(*zoom);
            AppOutput::None
        }
        ReplayEvent::Symmetry { enabled, settings } => {
            if let Some(s) = settings {
                app.set_symmetry(*s);
            }
            app.set_symmetry_enabled(*enabled);
            AppOutput::None
        }
        ReplayEvent::ExportContext { metadata, gallery_settings } => {
            app.set_export_context(metadata.clone(), gallery_settings.clone());
            AppOutput::None
        }
    };
    Ok(out)
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all replays and return an OS exit code.
/// `0` = every script succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let scripts = resolve_inputs(&args.script);
    if scripts.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let single_outputs = args.png.is_some() || args.project.is_some();
    if scripts.len() > 1 && single_outputs && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --png/--project only accept a single file.\n\
             Use --output-dir for batch replay.",
            scripts.len()
        );
        return ExitCode::FAILURE;
    }

    let mut settings = match &args.settings {
        Some(path) => match EngineSettings::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: could not read settings '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineSettings::load(),
    };
    if let Some(font) = &args.font {
        settings.font_path = Some(font.clone());
    }
    if let Some(path) = &args.save_settings {
        if let Err(e) = settings.save_to(path) {
            eprintln!("error: could not write settings '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        log::info!("cli: wrote settings to {}", path.display());
    }
    if args.verbose {
        if let Some(path) = crate::logger::log_path() {
            println!("log: {}", path.display());
        }
    }

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let total = scripts.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script) in scripts.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script.display());
        }
        let start = Instant::now();
        let (png, project) = output_paths(script, &args);

        match run_one(script, settings.clone(), png.as_deref(), project.as_deref(), args.verbose) {
            Ok(()) => {
                if args.verbose || multi {
                    println!("  done ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_one(
    script: &Path,
    settings: EngineSettings,
    png: Option<&Path>,
    project: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let source = std::fs::read_to_string(script)?;
    let events = parse_script(&source)?;
    let mut app = CreationApp::with_settings(settings)?;
    let base_dir = script.parent().unwrap_or(Path::new("."));

    let outputs = replay(&mut app, &events, base_dir)?;
    if verbose {
        for (event, out) in events.iter().zip(&outputs) {
            if *out != AppOutput::None {
                println!("  {:?} → {}", event, describe(out));
            }
        }
        println!(
            "  history: {} entries, index {}",
            app.history().len(),
            app.history().index()
        );
    }

    if let Some(path) = png {
        crate::io::write_png(&app.flatten(), path)?;
        log::info!("cli: wrote {}", path.display());
    }
    if let Some(path) = project {
        let value = app.export_project()?.to_value()?;
        crate::io::write_json(&value, path)?;
        log::info!("cli: wrote {}", path.display());
    }
    Ok(())
}

fn describe(out: &AppOutput) -> String {
    match out {
        AppOutput::ImageExported(png) => format!("PNG ({} bytes)", png.len()),
        AppOutput::ProjectExported(json) => format!("project JSON ({} bytes)", json.len()),
        other => format!("{:?}", other),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// PNG and project paths for one script.
///
/// Explicit `--png`/`--project` win; otherwise `--output-dir` derives
/// `<stem>.png` and `<stem>.json`; with neither, a PNG is written next to
/// the script.
fn output_paths(script: &Path, args: &CliArgs) -> (Option<PathBuf>, Option<PathBuf>) {
    if args.png.is_some() || args.project.is_some() {
        return (args.png.clone(), args.project.clone());
    }
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "canvas".to_string());
    match &args.output_dir {
        Some(dir) => (
            Some(dir.join(format!("{}.png", stem))),
            Some(dir.join(format!("{}.json", stem))),
        ),
        None => {
            let parent = script.parent().unwrap_or(Path::new("."));
            (Some(parent.join(format!("{}.png", stem))), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::text::{GlyphMask, TextRasterizer};
    use image::Rgba;

    struct NoGlyphs;

    impl TextRasterizer for NoGlyphs {
        fn rasterize(&self, _font: &str, _text: &str, _size: f32) -> Result<GlyphMask> {
            Ok(GlyphMask::default())
        }
    }

    fn engine(size: u32) -> CreationApp {
        let settings = EngineSettings {
            canvas_width: size,
            canvas_height: size,
            ..EngineSettings::default()
        };
        CreationApp::new(settings, Box::new(NoGlyphs)).unwrap()
    }

    #[test]
    fn parses_tagged_events() {
        let events = parse_script(
            r#"[
                {"op": "viewport", "left": 0, "top": 0, "width": 64, "height": 64},
                {"op": "select_tool", "tool": {"type": "brush", "settings": {"size": 4, "color": [255, 0, 0, 255], "opacity": 1}}},
                {"op": "down", "x": 10, "y": 10},
                {"op": "move", "x": 50, "y": 10},
                {"op": "up"},
                {"op": "key", "key": "z", "ctrl": true},
                {"op": "text", "text": null}
            ]"#,
        )
        .unwrap();
        assert_eq!(events.len(), 7);
        assert!(matches!(events[5], ReplayEvent::Key(ref k) if k.ctrl && k.key == "z"));
    }

    #[test]
    fn replay_draws_and_undoes() {
        let mut app = engine(64);
        let events = parse_script(
            r#"[
                {"op": "viewport", "left": 0, "top": 0, "width": 64, "height": 64},
                {"op": "down", "x": 10, "y": 10},
                {"op": "move", "x": 50, "y": 10},
                {"op": "up"},
                {"op": "down", "x": 10, "y": 40},
                {"op": "move", "x": 50, "y": 40},
                {"op": "up"},
                {"op": "key", "key": "z", "ctrl": true}
            ]"#,
        )
        .unwrap();
        let outputs = replay(&mut app, &events, Path::new(".")).unwrap();
        assert_eq!(outputs[3], AppOutput::Committed { history_len: 2 });
        assert_eq!(outputs[7], AppOutput::HistoryMoved { index: 1 });
        let flat = app.flatten();
        assert_eq!(*flat.get_pixel(30, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*flat.get_pixel(30, 40), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn text_without_request_fails() {
        let mut app = engine(16);
        let events = parse_script(r#"[{"op": "text", "text": "hi"}]"#).unwrap();
        assert!(matches!(
            replay(&mut app, &events, Path::new(".")),
            Err(EngineError::UnknownTextRequest(_))
        ));
    }

    #[test]
    fn unknown_tool_name_is_a_config_error() {
        let mut app = engine(16);
        let events = parse_script(r#"[{"op": "select_tool_kind", "kind": "lasso"}]"#).unwrap();
        assert!(matches!(
            replay(&mut app, &events, Path::new(".")),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn batch_outputs_derive_from_stem() {
        let args = CliArgs::parse_from(["nftcanvas", "--script", "a.json", "--output-dir", "out"]);
        let (png, project) = output_paths(Path::new("sessions/a.json"), &args);
        assert_eq!(png, Some(PathBuf::from("out/a.png")));
        assert_eq!(project, Some(PathBuf::from("out/a.json")));
    }
}
