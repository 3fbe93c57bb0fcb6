use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{CompositeOp, LiveCanvas, PreviewBuffer};
use crate::components::pointer::EndReason;
use crate::error::Result;
use crate::ops::gradient::{paint_gradient, GradientSettings};
use crate::ops::pattern::{PatternSampler, PatternSettings};
use crate::ops::shapes::{rasterize_shape, PlacedShape, ShapeKind};
use crate::ops::stroke::{composite_stroke, StrokeMask};
use crate::ops::symmetry::SymmetrySettings;
use crate::ops::text::TextRasterizer;
use crate::ops::{merge_rect, PixelRect};

// ============================================================================
// TOOL SETTINGS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    /// Stroke width in pixels.
    pub size: f32,
    pub color: [u8; 4],
    pub opacity: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: [0, 0, 0, 255],
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextSettings {
    pub font: String,
    pub size: f32,
    pub color: [u8; 4],
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            font: "sans-serif".to_string(),
            size: 24.0,
            color: [0, 0, 0, 255],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeSettings {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// Outline width in pixels.
    pub size: f32,
    pub color: [u8; 4],
    pub opacity: f32,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Rectangle,
            size: 4.0,
            color: [0, 0, 0, 255],
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct SymmetryToolSettings {
    pub symmetry: SymmetrySettings,
    pub brush: BrushSettings,
}

// ============================================================================
// TOOL – closed tagged union, exactly one selected at a time
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "lowercase")]
pub enum Tool {
    Brush(BrushSettings),
    Eraser(BrushSettings),
    Text(TextSettings),
    Shape(ShapeSettings),
    Gradient(GradientSettings),
    Pattern(PatternSettings),
    Symmetry(SymmetryToolSettings),
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Brush(BrushSettings::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Brush,
    Eraser,
    Text,
    Shape,
    Gradient,
    Pattern,
    Symmetry,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Brush,
            ToolKind::Eraser,
            ToolKind::Text,
            ToolKind::Shape,
            ToolKind::Gradient,
            ToolKind::Pattern,
            ToolKind::Symmetry,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Brush => "brush",
            ToolKind::Eraser => "eraser",
            ToolKind::Text => "text",
            ToolKind::Shape => "shape",
            ToolKind::Gradient => "gradient",
            ToolKind::Pattern => "pattern",
            ToolKind::Symmetry => "symmetry",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        ToolKind::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
    }
}

impl Tool {
    pub fn kind(&self) -> ToolKind {
        match self {
            Tool::Brush(_) => ToolKind::Brush,
            Tool::Eraser(_) => ToolKind::Eraser,
            Tool::Text(_) => ToolKind::Text,
            Tool::Shape(_) => ToolKind::Shape,
            Tool::Gradient(_) => ToolKind::Gradient,
            Tool::Pattern(_) => ToolKind::Pattern,
            Tool::Symmetry(_) => ToolKind::Symmetry,
        }
    }

    /// The tool of `kind` with default settings.
    pub fn default_for(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Brush => Tool::Brush(BrushSettings::default()),
            ToolKind::Eraser => Tool::Eraser(BrushSettings {
                size: 20.0,
                ..BrushSettings::default()
            }),
            ToolKind::Text => Tool::Text(TextSettings::default()),
            ToolKind::Shape => Tool::Shape(ShapeSettings::default()),
            ToolKind::Gradient => Tool::Gradient(GradientSettings::default()),
            ToolKind::Pattern => Tool::Pattern(PatternSettings::default()),
            ToolKind::Symmetry => Tool::Symmetry(SymmetryToolSettings::default()),
        }
    }
}

// ============================================================================
// TOOL ENGINE – gesture stream → paint operations on the live canvas
// ============================================================================

/// What an unconfirmed pointer exit does to a shape or gradient preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LeavePolicy {
    /// `leave` behaves exactly like `up`.
    #[default]
    Commit,
    /// `leave` restores the gesture-start pixels and records nothing.
    Revert,
}

impl LeavePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            LeavePolicy::Commit => "commit",
            LeavePolicy::Revert => "revert",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commit" => Some(LeavePolicy::Commit),
            "revert" => Some(LeavePolicy::Revert),
            _ => None,
        }
    }
}

/// Per-gesture context supplied by the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaintContext<'a> {
    /// Global symmetry, when `symmetryEnabled` is on.
    pub symmetry: Option<&'a SymmetrySettings>,
}

/// Result of feeding one gesture signal to the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolOutcome {
    /// Nothing changed.
    None,
    /// The live canvas changed; the gesture continues.
    Painted,
    /// The gesture finished with a change that must be recorded.
    Commit,
    /// The gesture was abandoned and the canvas put back as it was at start.
    Reverted,
    /// The text tool wants a string for this point.
    TextRequested { x: f32, y: f32 },
}

enum StrokePaint {
    Solid(Rgba<u8>),
    Erase,
    Pattern(PatternSampler),
}

enum GestureState {
    Idle,
    Stroke {
        last: (f32, f32),
        base: PreviewBuffer,
        mask: StrokeMask,
        radius: f32,
        opacity: f32,
        paint: StrokePaint,
        symmetry: Option<SymmetrySettings>,
        painted: bool,
    },
    Shape {
        anchor: (f32, f32),
        preview: PreviewBuffer,
        settings: ShapeSettings,
        symmetry: Option<SymmetrySettings>,
        drawn: bool,
    },
    Gradient {
        anchor: (f32, f32),
        preview: PreviewBuffer,
        settings: GradientSettings,
        drawn: bool,
    },
}

/// Dispatches the gesture stream of the selected tool.
///
/// Holds only the in-flight gesture; tool settings are captured when the
/// gesture starts so a mid-gesture settings edit cannot split one stroke.
pub struct ToolEngine {
    state: GestureState,
}

impl Default for ToolEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolEngine {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, GestureState::Idle)
    }

    /// Gesture start at canvas `(x, y)`.
    pub fn begin(
        &mut self,
        tool: &Tool,
        canvas: &mut LiveCanvas,
        x: f32,
        y: f32,
        ctx: PaintContext<'_>,
    ) -> ToolOutcome {
        // Drop any stale gesture
        self.state = GestureState::Idle;
        let global_symmetry = ctx.symmetry.copied();

        self.state = match tool {
            Tool::Brush(s) => stroke_state(
                canvas,
                (x, y),
                StrokePaint::Solid(Rgba(s.color)),
                s.size,
                s.opacity,
                global_symmetry,
            ),
            Tool::Eraser(s) => stroke_state(
                canvas,
                (x, y),
                StrokePaint::Erase,
                s.size,
                s.opacity,
                global_symmetry,
            ),
            Tool::Pattern(s) => stroke_state(
                canvas,
                (x, y),
                StrokePaint::Pattern(PatternSampler::new(s)),
                s.size,
                s.opacity,
                global_symmetry,
            ),
            Tool::Symmetry(s) => stroke_state(
                canvas,
                (x, y),
                StrokePaint::Solid(Rgba(s.brush.color)),
                s.brush.size,
                s.brush.opacity,
                Some(s.symmetry),
            ),
            Tool::Shape(s) => GestureState::Shape {
                anchor: (x, y),
                preview: PreviewBuffer::capture(canvas),
                settings: *s,
                symmetry: global_symmetry,
                drawn: false,
            },
            Tool::Gradient(s) => GestureState::Gradient {
                anchor: (x, y),
                preview: PreviewBuffer::capture(canvas),
                settings: s.clone(),
                drawn: false,
            },
            Tool::Text(_) => return ToolOutcome::TextRequested { x, y },
        };
        ToolOutcome::None
    }

    /// Pointer moved to canvas `(x, y)` while pressed.
    pub fn update(&mut self, canvas: &mut LiveCanvas, x: f32, y: f32) -> ToolOutcome {
        match &mut self.state {
            GestureState::Idle => ToolOutcome::None,
            GestureState::Stroke {
                last,
                base,
                mask,
                radius,
                opacity,
                paint,
                symmetry,
                painted,
            } => {
                let from = *last;
                let to = (x, y);
                let mut dirty = mask.add_segment(from, to, *radius);
                if let Some(sym) = symmetry {
                    for t in sym.transforms() {
                        let seg = mask.add_segment(t.apply(from.0, from.1), t.apply(to.0, to.1), *radius);
                        dirty = merge_rect(dirty, seg);
                    }
                }
                *last = to;
                let Some(rect) = dirty else {
                    return ToolOutcome::None;
                };
                paint_stroke(canvas, base, mask, rect, *opacity, paint);
                *painted = true;
                ToolOutcome::Painted
            }
            GestureState::Shape {
                anchor,
                preview,
                settings,
                symmetry,
                drawn,
            } => {
                // Undo the previous preview frame, then draw this one
                preview.restore_into(canvas);
                let placed = PlacedShape::from_drag(settings.kind, *anchor, (x, y), settings.size.max(1.0));
                let mut copies = vec![placed];
                if let Some(sym) = symmetry {
                    copies.extend(sym.transforms().iter().map(|t| placed.transformed(t)));
                }
                let color = Rgba(settings.color);
                let opacity = settings.opacity.clamp(0.0, 1.0);
                for shape in &copies {
                    if let Some(mask) = rasterize_shape(shape, canvas.width(), canvas.height()) {
                        mask.paint(canvas, color, opacity);
                    }
                }
                *drawn = true;
                ToolOutcome::Painted
            }
            GestureState::Gradient {
                anchor,
                preview,
                settings,
                drawn,
            } => {
                preview.restore_into(canvas);
                paint_gradient(canvas, settings, *anchor, (x, y));
                *drawn = true;
                ToolOutcome::Painted
            }
        }
    }

    /// Gesture end.  Returns `Commit` when a history entry is due.
    pub fn finish(&mut self, canvas: &mut LiveCanvas, reason: EndReason, policy: LeavePolicy) -> ToolOutcome {
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        match state {
            GestureState::Idle => ToolOutcome::None,
            GestureState::Stroke { painted, .. } => {
                if painted {
                    ToolOutcome::Commit
                } else {
                    ToolOutcome::None
                }
            }
            GestureState::Shape { preview, drawn, .. }
            | GestureState::Gradient { preview, drawn, .. } => {
                if !drawn {
                    return ToolOutcome::None;
                }
                if reason == EndReason::Leave && policy == LeavePolicy::Revert {
                    preview.restore_into(canvas);
                    return ToolOutcome::Reverted;
                }
                // The last preview frame is the committed raster
                ToolOutcome::Commit
            }
        }
    }

    /// Rasterize `text` with its pen origin at `(x, y)` (and at each mirror
    /// point).  Returns whether any pixel was painted.
    pub fn place_text(
        canvas: &mut LiveCanvas,
        rasterizer: &dyn TextRasterizer,
        settings: &TextSettings,
        text: &str,
        x: f32,
        y: f32,
        symmetry: Option<&SymmetrySettings>,
    ) -> Result<bool> {
        let glyphs = rasterizer.rasterize(&settings.font, text, settings.size)?;
        let mut points = vec![(x, y)];
        if let Some(sym) = symmetry {
            points.extend(sym.mirror_points(x, y));
        }
        let color = Rgba(settings.color);
        let mut painted = false;
        for (px, py) in points {
            if let Some(mask) = glyphs.place(px, py, canvas.width(), canvas.height()) {
                mask.paint(canvas, color, 1.0);
                painted = true;
            }
        }
        Ok(painted)
    }
}

fn stroke_state(
    canvas: &LiveCanvas,
    start: (f32, f32),
    paint: StrokePaint,
    size: f32,
    opacity: f32,
    symmetry: Option<SymmetrySettings>,
) -> GestureState {
    GestureState::Stroke {
        last: start,
        base: PreviewBuffer::capture(canvas),
        mask: StrokeMask::new(canvas.width(), canvas.height()),
        radius: size.max(1.0) * 0.5,
        opacity: opacity.clamp(0.0, 1.0),
        paint,
        symmetry,
        painted: false,
    }
}

fn paint_stroke(
    canvas: &mut LiveCanvas,
    base: &PreviewBuffer,
    mask: &StrokeMask,
    rect: PixelRect,
    opacity: f32,
    paint: &StrokePaint,
) {
    match paint {
        StrokePaint::Solid(color) => {
            let color = *color;
            composite_stroke(canvas, base.pixels(), mask, rect, opacity, |_, _| color);
        }
        StrokePaint::Pattern(sampler) => {
            composite_stroke(canvas, base.pixels(), mask, rect, opacity, |x, y| sampler.sample(x, y));
        }
        StrokePaint::Erase => {
            // Subtract mode only for this segment
            canvas.with_composite(CompositeOp::DestinationOut, |c| {
                composite_stroke(c, base.pixels(), mask, rect, opacity, |_, _| Rgba([0, 0, 0, 255]));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::symmetry::{SymmetryAxis, SymmetryKind};
    use crate::ops::text::GlyphMask;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn white_canvas(size: u32) -> LiveCanvas {
        let mut canvas = LiveCanvas::new(size, size);
        canvas.pixels_mut().fill(WHITE);
        canvas
    }

    fn brush(size: f32) -> Tool {
        Tool::Brush(BrushSettings {
            size,
            color: [0, 0, 0, 255],
            opacity: 1.0,
        })
    }

    fn drag(engine: &mut ToolEngine, tool: &Tool, canvas: &mut LiveCanvas, pts: &[(f32, f32)], ctx: PaintContext<'_>) {
        engine.begin(tool, canvas, pts[0].0, pts[0].1, ctx);
        for &(x, y) in &pts[1..] {
            engine.update(canvas, x, y);
        }
    }

    #[test]
    fn brush_click_without_move_paints_nothing() {
        let mut canvas = white_canvas(32);
        let mut engine = ToolEngine::new();
        engine.begin(&brush(4.0), &mut canvas, 5.0, 5.0, PaintContext::default());
        let out = engine.finish(&mut canvas, EndReason::Up, LeavePolicy::Commit);
        assert_eq!(out, ToolOutcome::None);
        assert_eq!(*canvas.pixels().get_pixel(5, 5), WHITE);
    }

    #[test]
    fn brush_stroke_commits_on_leave() {
        let mut canvas = white_canvas(32);
        let mut engine = ToolEngine::new();
        drag(&mut engine, &brush(4.0), &mut canvas, &[(5.0, 5.0), (20.0, 5.0)], PaintContext::default());
        assert_eq!(*canvas.pixels().get_pixel(12, 5), BLACK);
        let out = engine.finish(&mut canvas, EndReason::Leave, LeavePolicy::Revert);
        assert_eq!(out, ToolOutcome::Commit);
        assert!(!engine.is_active());
    }

    #[test]
    fn eraser_leaves_composite_op_reset() {
        let mut canvas = white_canvas(32);
        let mut engine = ToolEngine::new();
        let eraser = Tool::Eraser(BrushSettings::default());
        drag(&mut engine, &eraser, &mut canvas, &[(16.0, 2.0), (16.0, 30.0)], PaintContext::default());
        assert_eq!(canvas.pixels().get_pixel(16, 16)[3], 0);
        assert_eq!(canvas.composite_op(), CompositeOp::SourceOver);
        assert_eq!(engine.finish(&mut canvas, EndReason::Up, LeavePolicy::Commit), ToolOutcome::Commit);
    }

    #[test]
    fn shape_preview_replaces_previous_frame() {
        let mut canvas = white_canvas(64);
        let start = canvas.snapshot();
        let mut engine = ToolEngine::new();
        let tool = Tool::Shape(ShapeSettings::default());
        drag(&mut engine, &tool, &mut canvas, &[(10.0, 10.0), (50.0, 50.0), (20.0, 20.0)], PaintContext::default());
        // the larger first frame is gone
        assert_eq!(*canvas.pixels().get_pixel(50, 30), WHITE);
        assert_ne!(*canvas.pixels().get_pixel(20, 15), WHITE);

        let out = engine.finish(&mut canvas, EndReason::Leave, LeavePolicy::Revert);
        assert_eq!(out, ToolOutcome::Reverted);
        assert!(canvas.pixels().pixels_eq(&start));
    }

    #[test]
    fn shape_leave_commits_by_default() {
        let mut canvas = white_canvas(64);
        let mut engine = ToolEngine::new();
        let tool = Tool::Shape(ShapeSettings {
            kind: ShapeKind::Circle,
            ..ShapeSettings::default()
        });
        drag(&mut engine, &tool, &mut canvas, &[(32.0, 32.0), (42.0, 32.0)], PaintContext::default());
        assert_eq!(engine.finish(&mut canvas, EndReason::Leave, LeavePolicy::Commit), ToolOutcome::Commit);
        assert_ne!(*canvas.pixels().get_pixel(41, 32), WHITE);
    }

    #[test]
    fn symmetry_mirrors_within_one_gesture() {
        let mut canvas = white_canvas(64);
        let mut engine = ToolEngine::new();
        let sym = SymmetrySettings {
            kind: SymmetryKind::Horizontal,
            fold_count: 2,
            axis: SymmetryAxis { x: 32.0, y: 32.0 },
        };
        let ctx = PaintContext { symmetry: Some(&sym) };
        drag(&mut engine, &brush(2.0), &mut canvas, &[(10.0, 10.0), (10.0, 20.0)], ctx);
        assert_eq!(*canvas.pixels().get_pixel(9, 15), BLACK);
        assert_eq!(*canvas.pixels().get_pixel(54, 15), BLACK);
        assert_eq!(engine.finish(&mut canvas, EndReason::Up, LeavePolicy::Commit), ToolOutcome::Commit);
    }

    #[test]
    fn symmetry_tool_uses_its_own_axis() {
        let mut canvas = white_canvas(64);
        let mut engine = ToolEngine::new();
        let tool = Tool::Symmetry(SymmetryToolSettings {
            symmetry: SymmetrySettings {
                kind: SymmetryKind::Vertical,
                fold_count: 2,
                axis: SymmetryAxis { x: 0.0, y: 20.0 },
            },
            brush: BrushSettings {
                size: 2.0,
                ..BrushSettings::default()
            },
        });
        drag(&mut engine, &tool, &mut canvas, &[(30.0, 5.0), (40.0, 5.0)], PaintContext::default());
        assert_eq!(*canvas.pixels().get_pixel(35, 4), BLACK);
        assert_eq!(*canvas.pixels().get_pixel(35, 34), BLACK);
    }

    #[test]
    fn text_start_requests_input_without_painting() {
        let mut canvas = white_canvas(16);
        let mut engine = ToolEngine::new();
        let out = engine.begin(&Tool::Text(TextSettings::default()), &mut canvas, 3.0, 4.0, PaintContext::default());
        assert_eq!(out, ToolOutcome::TextRequested { x: 3.0, y: 4.0 });
        assert!(!engine.is_active());
    }

    struct BoxGlyphs;

    impl TextRasterizer for BoxGlyphs {
        fn rasterize(&self, _font: &str, text: &str, _size: f32) -> Result<GlyphMask> {
            let width = text.chars().count() as u32 * 2;
            Ok(GlyphMask {
                width,
                height: 3,
                coverage: vec![1.0; width as usize * 3],
                offset_x: 0,
                offset_y: -3,
            })
        }
    }

    #[test]
    fn text_is_placed_above_the_baseline() {
        let mut canvas = white_canvas(32);
        let painted = ToolEngine::place_text(
            &mut canvas,
            &BoxGlyphs,
            &TextSettings::default(),
            "ab",
            4.0,
            10.0,
            None,
        )
        .unwrap();
        assert!(painted);
        assert_eq!(*canvas.pixels().get_pixel(4, 7), BLACK);
        assert_eq!(*canvas.pixels().get_pixel(7, 9), BLACK);
        assert_eq!(*canvas.pixels().get_pixel(4, 10), WHITE);
        assert_eq!(*canvas.pixels().get_pixel(8, 8), WHITE);
    }

    fn half_gradient() -> GradientSettings {
        GradientSettings {
            opacity: 0.5,
            ..GradientSettings::default()
        }
    }

    #[test]
    fn gradient_preview_replaces_previous_frame() {
        let mut canvas = white_canvas(64);
        let mut engine = ToolEngine::new();
        let tool = Tool::Gradient(half_gradient());
        drag(&mut engine, &tool, &mut canvas, &[(0.0, 0.0), (63.0, 0.0), (20.0, 0.0)], PaintContext::default());

        let mut expected = white_canvas(64);
        paint_gradient(&mut expected, &half_gradient(), (0.0, 0.0), (20.0, 0.0));
        assert!(canvas.pixels().pixels_eq(expected.pixels()));
        assert_eq!(engine.finish(&mut canvas, EndReason::Up, LeavePolicy::Commit), ToolOutcome::Commit);
    }

    #[test]
    fn gradient_leave_reverts_under_revert_policy() {
        let mut canvas = white_canvas(32);
        let start = canvas.snapshot();
        let mut engine = ToolEngine::new();
        let tool = Tool::Gradient(GradientSettings::default());
        drag(&mut engine, &tool, &mut canvas, &[(0.0, 0.0), (31.0, 31.0)], PaintContext::default());
        assert_ne!(*canvas.pixels().get_pixel(2, 2), WHITE);
        assert_eq!(engine.finish(&mut canvas, EndReason::Leave, LeavePolicy::Revert), ToolOutcome::Reverted);
        assert!(canvas.pixels().pixels_eq(&start));
    }

    #[test]
    fn gradient_and_pattern_clicks_paint_nothing() {
        for tool in [
            Tool::Gradient(GradientSettings::default()),
            Tool::Pattern(PatternSettings::default()),
        ] {
            let mut canvas = white_canvas(16);
            let start = canvas.snapshot();
            let mut engine = ToolEngine::new();
            engine.begin(&tool, &mut canvas, 5.0, 5.0, PaintContext::default());
            assert_eq!(engine.finish(&mut canvas, EndReason::Up, LeavePolicy::Commit), ToolOutcome::None);
            assert!(canvas.pixels().pixels_eq(&start));
        }
    }

    #[test]
    fn pattern_backtrack_does_not_stack_paint() {
        let tool = Tool::Pattern(PatternSettings {
            size: 6.0,
            opacity: 0.5,
            ..PatternSettings::default()
        });
        let mut once = white_canvas(64);
        let mut engine = ToolEngine::new();
        drag(&mut engine, &tool, &mut once, &[(10.0, 16.0), (50.0, 16.0)], PaintContext::default());

        let mut twice = white_canvas(64);
        let mut engine = ToolEngine::new();
        drag(&mut engine, &tool, &mut twice, &[(10.0, 16.0), (50.0, 16.0), (10.0, 16.0)], PaintContext::default());

        assert_ne!(*once.pixels().get_pixel(30, 16), WHITE);
        assert_eq!(once.pixels().get_pixel(30, 16), twice.pixels().get_pixel(30, 16));
        assert_eq!(engine.finish(&mut twice, EndReason::Up, LeavePolicy::Commit), ToolOutcome::Commit);
    }

    #[test]
    fn tool_serializes_as_tagged_union() {
        let json = serde_json::to_value(Tool::Shape(ShapeSettings::default())).unwrap();
        assert_eq!(json["type"], "shape");
        assert_eq!(json["settings"]["type"], "rectangle");
        let back: Tool = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ToolKind::Shape);
    }
}
